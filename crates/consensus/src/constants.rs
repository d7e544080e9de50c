//! Chain-wide constants shared by the wallet and the simulated node.

/// Block version written by the block generator.
pub const CURRENT_BLOCK_VERSION: i32 = 1;
/// Transaction version written by the block generator.
pub const CURRENT_TX_VERSION: i32 = 1;
/// Sequence number marking a final input.
pub const MAX_TX_IN_SEQUENCE_NUM: u32 = u32::MAX;
/// Output index carried by the null outpoint of a coinbase input.
pub const MAX_PREV_OUT_INDEX: u32 = u32::MAX;
/// Maximum script size (consensus).
pub const MAX_SCRIPT_SIZE: usize = 10_000;
/// Child indexes at or above this value are hardened in BIP32.
pub const HARDENED_KEY_START: u32 = 0x8000_0000;
