//! Block notifications arriving from the node.
//!
//! Connects are decoded, queued and signalled; the synchronizer applies them
//! later. Disconnects are reversed immediately under the ledger lock.

use std::sync::Arc;

use crossbeam_channel::Sender;
use memwallet_log::{log_debug, log_trace};
use memwallet_primitives::{BlockHeader, Transaction};

use crate::error::{raise, Fault};
use crate::node::BlockSubscriber;
use crate::queue::Signal;
use crate::wallet::Shared;

pub struct Intake {
    shared: Arc<Shared>,
    signals: Sender<Signal>,
}

impl Intake {
    pub(crate) fn new(shared: Arc<Shared>, signals: Sender<Signal>) -> Self {
        Self { shared, signals }
    }

    fn decode_header(&self, header: &[u8]) -> BlockHeader {
        match BlockHeader::consensus_decode(header) {
            Ok(header) => header,
            Err(err) => raise(self.shared.fault_policy(), Fault::MalformedHeader(err)),
        }
    }
}

impl BlockSubscriber for Intake {
    fn block_connected(&self, header: &[u8], filtered_txns: &[Vec<u8>]) {
        let header = self.decode_header(header);
        let height = header.height;
        let mut transactions = Vec::with_capacity(filtered_txns.len());
        for (index, raw) in filtered_txns.iter().enumerate() {
            match Transaction::consensus_decode(raw) {
                Ok(tx) => transactions.push(tx),
                Err(error) => raise(
                    self.shared.fault_policy(),
                    Fault::MalformedTransaction {
                        height,
                        index,
                        error,
                    },
                ),
            }
        }

        let sequence = match self.shared.queue().push(height, transactions) {
            Ok(sequence) => sequence,
            Err(err) => raise(self.shared.fault_policy(), err.into()),
        };
        log_trace!("queued block {height} as update {sequence}");
        // Unbounded channel: never blocks the node's dispatch thread.
        if self.signals.send(Signal::UpdateAvailable).is_err() {
            log_debug!("synchronizer gone; block {height} stays queued");
        }
    }

    fn block_disconnected(&self, header: &[u8]) {
        let header = self.decode_header(header);
        // The lock guard is released before a fault is raised.
        let result = self
            .shared
            .with_state_mut(|state| state.ledger.reverse(header.height))
            .map_err(Fault::from)
            .and_then(|reversed| reversed);
        if let Err(fault) = result {
            raise(self.shared.fault_policy(), fault);
        }
    }
}
