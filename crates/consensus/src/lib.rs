//! Chain parameters, monetary units and subsidy schedule.

pub mod constants;
pub mod money;
pub mod params;
pub mod rewards;

pub use money::{Amount, COIN};
pub use params::{chain_params, ChainParams, Network};
pub use rewards::{block_subsidy, block_tax};

/// 32-byte hash in internal (little-endian) byte order.
pub type Hash256 = [u8; 32];
