#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use memwallet::node::{BlockSubscriber, NodeConnection, NodeError, Subscribers};
use memwallet::{FaultPolicy, InMemoryWallet, WalletConfig};
use memwallet_consensus::{Amount, Hash256, Network};
use memwallet_primitives::{Address, BlockHeader, OutPoint, Transaction, TxIn, TxOut};

#[derive(Default)]
pub struct MockState {
    pub filter: Vec<Address>,
    pub watched: Vec<OutPoint>,
    pub reloads: usize,
    pub notifying: bool,
    pub disconnected: bool,
    pub fail_filter: bool,
    pub sent: Vec<Vec<u8>>,
}

/// Node double that delivers notifications synchronously on the caller's
/// thread and records every request the wallet makes.
#[derive(Default)]
pub struct MockNode {
    subscribers: Subscribers,
    pub state: Mutex<MockState>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_block(&self, height: u32, txs: &[Transaction]) {
        let raw: Vec<Vec<u8>> = txs.iter().map(Transaction::consensus_encode).collect();
        self.subscribers
            .block_connected(&header(height).consensus_encode(), &raw)
            .expect("subscriber list");
    }

    pub fn disconnect_block(&self, height: u32) {
        self.subscribers
            .block_disconnected(&header(height).consensus_encode())
            .expect("subscriber list");
    }

    pub fn connect_raw(&self, header: &[u8], txns: &[Vec<u8>]) {
        self.subscribers
            .block_connected(header, txns)
            .expect("subscriber list");
    }

    pub fn filter(&self) -> Vec<Address> {
        self.state.lock().expect("mock state").filter.clone()
    }

    pub fn set_fail_filter(&self, fail: bool) {
        self.state.lock().expect("mock state").fail_filter = fail;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len().expect("subscriber list")
    }
}

impl NodeConnection for MockNode {
    fn subscribe(&self, subscriber: Arc<dyn BlockSubscriber>) -> Result<(), NodeError> {
        Ok(self.subscribers.push(subscriber)?)
    }

    fn notify_blocks(&self) -> Result<(), NodeError> {
        self.state.lock().expect("mock state").notifying = true;
        Ok(())
    }

    fn load_tx_filter(
        &self,
        reload: bool,
        addresses: &[Address],
        outpoints: &[OutPoint],
    ) -> Result<(), NodeError> {
        let mut state = self.state.lock().expect("mock state");
        if state.fail_filter {
            return Err(NodeError::Transport("filter update refused".to_string()));
        }
        if reload {
            state.reloads += 1;
            state.filter.clear();
            state.watched.clear();
        }
        state.filter.extend_from_slice(addresses);
        state.watched.extend_from_slice(outpoints);
        Ok(())
    }

    fn send_raw_transaction(
        &self,
        raw: &[u8],
        _allow_high_fees: bool,
    ) -> Result<Hash256, NodeError> {
        let tx = Transaction::consensus_decode(raw)
            .map_err(|err| NodeError::Rejected(err.to_string()))?;
        self.state.lock().expect("mock state").sent.push(raw.to_vec());
        Ok(tx.txid())
    }

    fn disconnect(&self) {
        let _ = self.subscribers.clear();
        let mut state = self.state.lock().expect("mock state");
        state.disconnected = true;
        state.notifying = false;
    }
}

pub fn header(height: u32) -> BlockHeader {
    BlockHeader {
        version: 1,
        prev_block: [0u8; 32],
        merkle_root: [0u8; 32],
        time: 1_700_000_000 + height,
        bits: 0x207f_ffff,
        height,
        nonce: 0,
    }
}

pub fn test_wallet(harness_id: u32) -> InMemoryWallet {
    let config = WalletConfig::for_harness(Network::Regtest, harness_id)
        .with_fault_policy(FaultPolicy::Panic)
        .with_sync_poll_interval(std::time::Duration::from_millis(5));
    InMemoryWallet::new(config).expect("wallet")
}

pub fn coinbase_to(address: &Address, height: u32, value: Amount) -> Transaction {
    Transaction {
        vin: vec![TxIn::new(OutPoint::null(), vec![0x02, height as u8, (height >> 8) as u8])],
        vout: vec![TxOut::new(value, address.script_pubkey())],
        ..Transaction::default()
    }
}

pub fn payment(prevouts: &[OutPoint], outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        vin: prevouts
            .iter()
            .map(|prevout| TxIn::new(*prevout, Vec::new()))
            .collect(),
        vout: outputs,
        ..Transaction::default()
    }
}
