//! In-memory, reorg-aware wallet that follows a node's block notifications
//! and tracks the outputs paying to a deterministic key chain.

pub mod config;
pub mod error;
pub mod intake;
pub mod keys;
pub mod ledger;
pub mod node;
pub mod queue;
pub mod undo;
pub mod wallet;

pub use config::{FaultPolicy, WalletConfig};
pub use error::{Fault, Poisoned, WalletError};
pub use keys::{KeyChain, OwnedAddress, SpendingKey};
pub use ledger::{Balance, UnspentOutput, Utxo, UtxoLedger};
pub use node::{BlockSubscriber, NodeConnection, NodeError, Subscribers};
pub use queue::{ChainUpdate, Signal, Synchronizer, UpdateQueue};
pub use undo::{UndoEntry, UndoJournal};
pub use wallet::InMemoryWallet;
