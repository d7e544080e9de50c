//! Script construction and standard output classification.

pub mod builder;
pub mod opcodes;
pub mod standard;

pub use builder::{
    coinbase_extra_nonce_script, coinbase_sig_script, null_data_script, op_true_script,
    ScriptBuilder, ScriptError,
};
pub use standard::{classify_script_pubkey, extract_script_hash, script_contains, ScriptType};
