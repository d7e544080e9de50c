//! Chain data types and their consensus wire encoding.

pub mod address;
pub mod block;
pub mod encoding;
pub mod hash;
pub mod outpoint;
pub mod transaction;

pub use address::{Address, AddressError, AddressKind};
pub use block::{merkle_root, Block, BlockHeader};
pub use encoding::{decode, encode, DecodeError};
pub use hash::{hash160, sha256, sha256d};
pub use outpoint::OutPoint;
pub use transaction::{Transaction, TxIn, TxOut};
