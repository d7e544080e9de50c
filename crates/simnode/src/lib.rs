//! Simulated chain backend for driving the wallet in tests and demos.

pub mod blockgen;
pub mod cli;
pub mod error;
pub mod mempool;
pub mod node;

pub use blockgen::{create_block, create_coinbase, genesis_block, organization_script, BlockArgs};
pub use error::SimNodeError;
pub use node::SimNode;
