//! Transactions waiting for the next generated block.

use std::collections::HashMap;

use memwallet_consensus::Hash256;
use memwallet_primitives::{OutPoint, Transaction};

#[derive(Default)]
pub struct Mempool {
    entries: Vec<(Hash256, Transaction)>,
    spent: HashMap<OutPoint, Hash256>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.iter().any(|(id, _)| id == txid)
    }

    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spent.contains_key(outpoint)
    }

    pub fn spender(&self, outpoint: &OutPoint) -> Option<Hash256> {
        self.spent.get(outpoint).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Caller has already checked the inputs against the chain view.
    pub fn insert(&mut self, txid: Hash256, tx: Transaction) {
        for input in &tx.vin {
            self.spent.insert(input.prevout, txid);
        }
        self.entries.push((txid, tx));
    }

    /// Pooled transactions in arrival order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.entries.iter().map(|(_, tx)| tx.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.spent.clear();
    }

    /// Empties the pool in arrival order.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        self.spent.clear();
        self.entries.drain(..).map(|(_, tx)| tx).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memwallet_primitives::{TxIn, TxOut};

    #[test]
    fn tracks_spenders_until_drained() {
        let prevout = OutPoint::new([1; 32], 0);
        let tx = Transaction {
            vin: vec![TxIn::new(prevout, Vec::new())],
            vout: vec![TxOut::new(1, vec![0x51])],
            ..Transaction::default()
        };
        let txid = tx.txid();
        let mut pool = Mempool::new();
        pool.insert(txid, tx.clone());
        assert!(pool.contains(&txid));
        assert_eq!(pool.spender(&prevout), Some(txid));
        assert_eq!(pool.take_all(), vec![tx]);
        assert!(pool.is_empty());
        assert!(!pool.is_spent(&prevout));
    }
}
