//! Wallet-owned unspent outputs and the apply/reverse rules that keep them
//! in step with the chain.

use std::collections::{HashMap, HashSet};

use memwallet_consensus::money::money_range;
use memwallet_consensus::Amount;
use memwallet_log::{log_debug, log_warn};
use memwallet_primitives::{Address, OutPoint, Transaction};

use crate::error::{Fault, WalletError};
use crate::keys::KeyChain;
use crate::undo::{UndoEntry, UndoJournal};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub value: Amount,
    pub key_index: u32,
    /// First height at which the output counts; 0 unless it is a coinbase.
    pub maturity_height: u32,
    pub script_pubkey: Vec<u8>,
    pub locked: bool,
}

impl Utxo {
    pub fn is_mature(&self, height: u32) -> bool {
        height >= self.maturity_height
    }

    pub fn is_spendable(&self, height: u32) -> bool {
        !self.locked && self.is_mature(height)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub key_index: u32,
    pub address: Address,
    pub script_pubkey: Vec<u8>,
    pub maturity_height: u32,
}

/// Owned value split by availability. Locked outputs count as locked
/// whether or not they are mature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    pub spendable: Amount,
    pub immature: Amount,
    pub locked: Amount,
}

impl Balance {
    pub fn total(&self) -> Amount {
        self.spendable
            .saturating_add(self.immature)
            .saturating_add(self.locked)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockEffect {
    pub created: usize,
    pub destroyed: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UtxoLedger {
    height: u32,
    utxos: HashMap<OutPoint, Utxo>,
    journal: UndoJournal,
    coinbase_maturity: u32,
}

impl UtxoLedger {
    pub fn new(coinbase_maturity: u32) -> Self {
        Self {
            height: 0,
            utxos: HashMap::new(),
            journal: UndoJournal::new(),
            coinbase_maturity,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.utxos.get(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn journal(&self) -> &UndoJournal {
        &self.journal
    }

    /// Applies one block's filtered transactions at `height`.
    ///
    /// Within each transaction outputs are scanned before inputs. Inputs that
    /// reference outputs the ledger does not hold are ignored, as are owned
    /// outputs whose value is outside the money range.
    pub fn apply(
        &mut self,
        height: u32,
        transactions: &[Transaction],
        keys: &KeyChain,
    ) -> BlockEffect {
        let prev_height = self.height;
        if height != prev_height.saturating_add(1) && !self.journal.is_empty() {
            log_warn!("applying height {height} on top of {prev_height}");
        }
        self.height = height;

        let mut undo = UndoEntry::new(prev_height);
        let mut created_here = HashSet::new();
        for tx in transactions {
            let txid = tx.txid();
            let maturity_height = if tx.is_coinbase() {
                height.saturating_add(self.coinbase_maturity)
            } else {
                0
            };

            for (index, output) in tx.vout.iter().enumerate() {
                let Some(key_index) = keys.owner_of(&output.script_pubkey) else {
                    continue;
                };
                let outpoint = OutPoint::new(txid, index as u32);
                if !money_range(output.value) {
                    log_warn!(
                        "ignoring output {outpoint} at height {height} with value {}",
                        output.value
                    );
                    continue;
                }
                self.utxos.insert(
                    outpoint,
                    Utxo {
                        value: output.value,
                        key_index,
                        maturity_height,
                        script_pubkey: output.script_pubkey.clone(),
                        locked: false,
                    },
                );
                created_here.insert(outpoint);
                undo.created.push(outpoint);
            }

            for input in &tx.vin {
                let Some(spent) = self.utxos.remove(&input.prevout) else {
                    continue;
                };
                // Reversal already drops outputs created by this block.
                if !created_here.contains(&input.prevout) {
                    undo.destroyed.insert(input.prevout, spent);
                }
            }
        }

        let effect = BlockEffect {
            created: undo.created.len(),
            destroyed: undo.destroyed.len(),
        };
        if self.journal.record(height, undo).is_some() {
            log_warn!("replaced existing undo entry for height {height}");
        }
        log_debug!(
            "applied block {height}: {} created, {} destroyed",
            effect.created,
            effect.destroyed
        );
        effect
    }

    /// Undoes the block applied at `height` using its journal entry.
    ///
    /// When `height` is the current tip the height moves back to what it was
    /// before that block; otherwise only the outputs are restored.
    pub fn reverse(&mut self, height: u32) -> Result<BlockEffect, Fault> {
        let undo = self
            .journal
            .take(height)
            .ok_or(Fault::MissingUndo { height })?;

        for outpoint in &undo.created {
            self.utxos.remove(outpoint);
        }
        let effect = BlockEffect {
            created: undo.created.len(),
            destroyed: undo.destroyed.len(),
        };
        self.utxos.extend(undo.destroyed);

        if height == self.height {
            self.height = undo.prev_height;
        } else {
            log_warn!(
                "reversed height {height} below tip {}; height left unchanged",
                self.height
            );
        }
        log_debug!(
            "reversed block {height}: {} removed, {} restored",
            effect.created,
            effect.destroyed
        );
        Ok(effect)
    }

    pub fn balance(&self) -> Amount {
        self.utxos
            .values()
            .filter(|utxo| utxo.is_spendable(self.height))
            .fold(0, |total: Amount, utxo| total.saturating_add(utxo.value))
    }

    pub fn balance_breakdown(&self) -> Balance {
        let mut balance = Balance::default();
        for utxo in self.utxos.values() {
            let bucket = if utxo.locked {
                &mut balance.locked
            } else if utxo.is_mature(self.height) {
                &mut balance.spendable
            } else {
                &mut balance.immature
            };
            *bucket = bucket.saturating_add(utxo.value);
        }
        balance
    }

    /// Spendable outputs sorted by outpoint.
    pub fn list_unspent(&self, keys: &KeyChain) -> Vec<UnspentOutput> {
        let mut unspent: Vec<UnspentOutput> = self
            .utxos
            .iter()
            .filter(|(_, utxo)| utxo.is_spendable(self.height))
            .filter_map(|(outpoint, utxo)| {
                let address = keys.address(utxo.key_index)?;
                Some(UnspentOutput {
                    outpoint: *outpoint,
                    value: utxo.value,
                    key_index: utxo.key_index,
                    address,
                    script_pubkey: utxo.script_pubkey.clone(),
                    maturity_height: utxo.maturity_height,
                })
            })
            .collect();
        unspent.sort_by(|a, b| a.outpoint.cmp(&b.outpoint));
        unspent
    }

    pub fn set_locked(&mut self, outpoint: &OutPoint, locked: bool) -> Result<(), WalletError> {
        let utxo = self
            .utxos
            .get_mut(outpoint)
            .ok_or(WalletError::UnknownOutpoint(*outpoint))?;
        utxo.locked = locked;
        Ok(())
    }

    pub fn locked_outpoints(&self) -> Vec<OutPoint> {
        let mut locked: Vec<OutPoint> = self
            .utxos
            .iter()
            .filter(|(_, utxo)| utxo.locked)
            .map(|(outpoint, _)| *outpoint)
            .collect();
        locked.sort();
        locked
    }
}
