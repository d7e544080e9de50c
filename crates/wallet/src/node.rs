//! The node connection the wallet follows.

use std::fmt;
use std::sync::{Arc, RwLock};

use memwallet_consensus::Hash256;
use memwallet_primitives::{Address, OutPoint};

use crate::error::Poisoned;

const POISONED: Poisoned = Poisoned("subscriber list");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    Disconnected,
    Rejected(String),
    Transport(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Disconnected => write!(f, "node connection is closed"),
            NodeError::Rejected(reason) => write!(f, "rejected by node: {reason}"),
            NodeError::Transport(reason) => write!(f, "node transport error: {reason}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<Poisoned> for NodeError {
    fn from(err: Poisoned) -> Self {
        NodeError::Transport(err.to_string())
    }
}

/// Receives raw block notifications on the node's dispatch thread.
pub trait BlockSubscriber: Send + Sync {
    /// `header` is the serialized block header; `filtered_txns` holds the
    /// serialized transactions that matched the subscriber's filter.
    fn block_connected(&self, header: &[u8], filtered_txns: &[Vec<u8>]);

    fn block_disconnected(&self, header: &[u8]);
}

pub trait NodeConnection: Send + Sync {
    fn subscribe(&self, subscriber: Arc<dyn BlockSubscriber>) -> Result<(), NodeError>;

    /// Asks the node to start delivering block notifications.
    fn notify_blocks(&self) -> Result<(), NodeError>;

    /// Adds addresses and outpoints to the transaction filter. With `reload`
    /// the filter is replaced instead of extended.
    fn load_tx_filter(
        &self,
        reload: bool,
        addresses: &[Address],
        outpoints: &[OutPoint],
    ) -> Result<(), NodeError>;

    fn send_raw_transaction(&self, raw: &[u8], allow_high_fees: bool)
        -> Result<Hash256, NodeError>;

    fn disconnect(&self);
}

/// Ordered subscriber list. Every notification reaches every subscriber in
/// registration order; no subscriber owns the dispatch.
#[derive(Default)]
pub struct Subscribers {
    inner: RwLock<Vec<Arc<dyn BlockSubscriber>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, subscriber: Arc<dyn BlockSubscriber>) -> Result<(), Poisoned> {
        self.inner.write().map_err(|_| POISONED)?.push(subscriber);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), Poisoned> {
        self.inner.write().map_err(|_| POISONED)?.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize, Poisoned> {
        Ok(self.inner.read().map_err(|_| POISONED)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, Poisoned> {
        Ok(self.len()? == 0)
    }

    // Callbacks run on a snapshot so a subscriber may (un)subscribe from
    // inside a notification.
    fn snapshot(&self) -> Result<Vec<Arc<dyn BlockSubscriber>>, Poisoned> {
        Ok(self.inner.read().map_err(|_| POISONED)?.clone())
    }

    pub fn block_connected(
        &self,
        header: &[u8],
        filtered_txns: &[Vec<u8>],
    ) -> Result<(), Poisoned> {
        for subscriber in self.snapshot()? {
            subscriber.block_connected(header, filtered_txns);
        }
        Ok(())
    }

    pub fn block_disconnected(&self, header: &[u8]) -> Result<(), Poisoned> {
        for subscriber in self.snapshot()? {
            subscriber.block_disconnected(header);
        }
        Ok(())
    }
}
