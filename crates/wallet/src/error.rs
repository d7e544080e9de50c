use std::fmt;
use std::time::Duration;

use memwallet_log::log_error;
use memwallet_primitives::{DecodeError, OutPoint};

use crate::config::FaultPolicy;
use crate::node::NodeError;

/// Errors returned to callers of the wallet API. None of these leave the
/// ledger in a partially updated state.
#[derive(Debug)]
pub enum WalletError {
    AlreadyStarted,
    NotStarted,
    InvalidSeed(String),
    KeyDerivation(String),
    KeysExhausted,
    UnknownKeyIndex(u32),
    UnknownOutpoint(OutPoint),
    SyncTimeout { target: u32, reached: u32, waited: Duration },
    Node(NodeError),
    /// A thread panicked while holding the named lock.
    Poisoned(&'static str),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::AlreadyStarted => write!(f, "wallet is already started"),
            WalletError::NotStarted => write!(f, "wallet is not started"),
            WalletError::InvalidSeed(msg) => write!(f, "invalid wallet seed: {msg}"),
            WalletError::KeyDerivation(msg) => write!(f, "key derivation failed: {msg}"),
            WalletError::KeysExhausted => write!(f, "non-hardened key index space exhausted"),
            WalletError::UnknownKeyIndex(index) => write!(f, "no key issued at index {index}"),
            WalletError::UnknownOutpoint(outpoint) => write!(f, "unknown outpoint {outpoint}"),
            WalletError::SyncTimeout {
                target,
                reached,
                waited,
            } => write!(
                f,
                "timed out after {waited:?} waiting for height {target} (reached {reached})"
            ),
            WalletError::Node(err) => write!(f, "{err}"),
            WalletError::Poisoned(lock) => write!(f, "{lock} lock poisoned"),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<NodeError> for WalletError {
    fn from(err: NodeError) -> Self {
        WalletError::Node(err)
    }
}

/// A poisoned lock, named by what it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poisoned(pub &'static str);

impl fmt::Display for Poisoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lock poisoned", self.0)
    }
}

impl std::error::Error for Poisoned {}

impl From<Poisoned> for WalletError {
    fn from(err: Poisoned) -> Self {
        WalletError::Poisoned(err.0)
    }
}

/// Conditions on the synchronization path after which the ledger can no
/// longer be trusted. They are raised, never returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    MalformedHeader(DecodeError),
    MalformedTransaction {
        height: u32,
        index: usize,
        error: DecodeError,
    },
    MissingUndo {
        height: u32,
    },
    Setup(String),
    Poisoned(&'static str),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::MalformedHeader(err) => write!(f, "malformed block header: {err}"),
            Fault::MalformedTransaction {
                height,
                index,
                error,
            } => write!(
                f,
                "malformed transaction {index} in block {height}: {error}"
            ),
            Fault::MissingUndo { height } => {
                write!(f, "no undo entry for disconnected height {height}")
            }
            Fault::Setup(msg) => write!(f, "wallet setup failed: {msg}"),
            Fault::Poisoned(lock) => write!(f, "{lock} lock poisoned"),
        }
    }
}

impl std::error::Error for Fault {}

impl From<Poisoned> for Fault {
    fn from(err: Poisoned) -> Self {
        Fault::Poisoned(err.0)
    }
}

pub fn raise(policy: FaultPolicy, fault: Fault) -> ! {
    log_error!("fatal wallet fault: {fault}");
    match policy {
        FaultPolicy::Abort => std::process::abort(),
        FaultPolicy::Panic => panic!("fatal wallet fault: {fault}"),
    }
}
