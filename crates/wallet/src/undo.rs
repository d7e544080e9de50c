//! Per-height reversal records.

use std::collections::{BTreeMap, HashMap};

use memwallet_primitives::OutPoint;

use crate::ledger::Utxo;

/// What one applied block changed in the ledger.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UndoEntry {
    /// Ledger height before the block was applied.
    pub prev_height: u32,
    /// Outputs the block added, in creation order.
    pub created: Vec<OutPoint>,
    /// Full records of outputs the block spent that existed before it.
    pub destroyed: HashMap<OutPoint, Utxo>,
}

impl UndoEntry {
    pub fn new(prev_height: u32) -> Self {
        Self {
            prev_height,
            ..Self::default()
        }
    }
}

/// One entry per applied, not yet disconnected, height.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UndoJournal {
    entries: BTreeMap<u32, UndoEntry>,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the entry for `height`, returning any entry it replaced.
    pub fn record(&mut self, height: u32, entry: UndoEntry) -> Option<UndoEntry> {
        self.entries.insert(height, entry)
    }

    /// Removes and returns the entry for `height`.
    pub fn take(&mut self, height: u32) -> Option<UndoEntry> {
        self.entries.remove(&height)
    }

    pub fn get(&self, height: u32) -> Option<&UndoEntry> {
        self.entries.get(&height)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
