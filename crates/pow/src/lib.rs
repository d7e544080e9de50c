//! Compact targets and the nonce search used to produce test blocks.

pub mod difficulty;
pub mod solve;

pub use difficulty::{compact_to_target, hash_meets_target, target_to_compact, CompactError};
pub use solve::{solve_header, SolveError};
