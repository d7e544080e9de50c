//! In-process node that mines its own chain and announces it to subscribers.
//!
//! Lock order is `chain` then `filter`. Notifications are queued while those
//! locks are held and delivered later on the dispatch thread, which takes
//! neither.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use memwallet::{BlockSubscriber, NodeConnection, NodeError, Subscribers};
use memwallet_consensus::constants::CURRENT_BLOCK_VERSION;
use memwallet_consensus::money::money_range;
use memwallet_consensus::{chain_params, Amount, ChainParams, Hash256, Network};
use memwallet_log::{log_debug, log_error, log_info, log_trace, log_warn};
use memwallet_primitives::hash::hash_to_hex;
use memwallet_primitives::{Address, Block, BlockHeader, OutPoint, Transaction, TxOut};
use memwallet_script::script_contains;

use crate::blockgen::{create_block, genesis_block, BlockArgs};
use crate::error::SimNodeError;
use crate::mempool::Mempool;

struct Coin {
    output: TxOut,
    height: u32,
    coinbase: bool,
}

struct ChainState {
    /// Never empty: index 0 is the genesis block.
    blocks: Vec<Block>,
    coins: HashMap<OutPoint, Coin>,
    mempool: Mempool,
}

impl ChainState {
    fn tip(&self) -> &BlockHeader {
        &self.blocks[self.blocks.len() - 1].header
    }

    fn connect(&mut self, block: &Block) {
        let height = block.height();
        for tx in &block.transactions {
            let coinbase = tx.is_coinbase();
            if !coinbase {
                for input in &tx.vin {
                    self.coins.remove(&input.prevout);
                }
            }
            let txid = tx.txid();
            for (index, output) in tx.vout.iter().enumerate() {
                self.coins.insert(
                    OutPoint::new(txid, index as u32),
                    Coin {
                        output: output.clone(),
                        height,
                        coinbase,
                    },
                );
            }
        }
    }

    fn rebuild_coins(&mut self) {
        self.coins.clear();
        let blocks = std::mem::take(&mut self.blocks);
        for block in &blocks {
            self.connect(block);
        }
        self.blocks = blocks;
    }

    /// Checks `tx` for inclusion in the next block and returns its fee.
    fn check_transaction(
        &self,
        tx: &Transaction,
        coinbase_maturity: u32,
    ) -> Result<Amount, SimNodeError> {
        if tx.is_coinbase() {
            return Err(SimNodeError::CoinbaseNotAllowed);
        }
        if tx.vin.is_empty() {
            return Err(SimNodeError::NoInputs);
        }

        let spend_height = self.tip().height + 1;
        let mut seen = HashSet::with_capacity(tx.vin.len());
        let mut input: Amount = 0;
        for txin in &tx.vin {
            let prevout = txin.prevout;
            if !seen.insert(prevout) || self.mempool.is_spent(&prevout) {
                return Err(SimNodeError::DoubleSpend(prevout));
            }
            let coin = self
                .coins
                .get(&prevout)
                .ok_or(SimNodeError::MissingInput(prevout))?;
            let maturity_height = coin.height.saturating_add(coinbase_maturity);
            if coin.coinbase && spend_height < maturity_height {
                return Err(SimNodeError::ImmatureSpend {
                    outpoint: prevout,
                    maturity_height,
                });
            }
            input += coin.output.value;
        }

        if let Some(output) = tx.vout.iter().find(|output| !money_range(output.value)) {
            return Err(SimNodeError::OutputOutOfRange(output.value));
        }
        let output = tx.value_out();
        if output > input {
            return Err(SimNodeError::InsufficientInput { input, output });
        }
        Ok(input - output)
    }
}

/// Hashes and outpoints a subscriber asked to hear about.
#[derive(Default)]
struct TxFilter {
    hashes: Vec<[u8; 20]>,
    outpoints: HashSet<OutPoint>,
}

impl TxFilter {
    fn load(&mut self, reload: bool, addresses: &[Address], outpoints: &[OutPoint]) {
        if reload {
            self.hashes.clear();
            self.outpoints.clear();
        }
        for address in addresses {
            let hash = address.script_address();
            if !self.hashes.contains(&hash) {
                self.hashes.push(hash);
            }
        }
        self.outpoints.extend(outpoints.iter().copied());
    }

    /// Matching outputs become watched outpoints so later spends of them
    /// match too.
    fn matches(&mut self, tx: &Transaction) -> bool {
        let mut matched = false;
        let txid = tx.txid();
        for (index, output) in tx.vout.iter().enumerate() {
            if self
                .hashes
                .iter()
                .any(|hash| script_contains(&output.script_pubkey, hash))
            {
                matched = true;
                self.outpoints.insert(OutPoint::new(txid, index as u32));
            }
        }
        if !tx.is_coinbase() {
            matched |= tx
                .vin
                .iter()
                .any(|input| self.outpoints.contains(&input.prevout));
        }
        matched
    }
}

enum Notification {
    Connected { header: Vec<u8>, txns: Vec<Vec<u8>> },
    Disconnected { header: Vec<u8> },
    Flush(Sender<()>),
}

fn dispatch_loop(subscribers: Arc<Subscribers>, notifications: Receiver<Notification>) {
    for notification in notifications.iter() {
        let delivered = match notification {
            Notification::Connected { header, txns } => {
                subscribers.block_connected(&header, &txns)
            }
            Notification::Disconnected { header } => subscribers.block_disconnected(&header),
            Notification::Flush(ack) => {
                let _ = ack.send(());
                Ok(())
            }
        };
        if let Err(err) = delivered {
            log_error!("notification dropped: {err}");
        }
    }
    log_trace!("simnode dispatcher exiting");
}

/// A single-process chain backend for wallet tests.
pub struct SimNode {
    params: ChainParams,
    chain: Mutex<ChainState>,
    filter: Mutex<TxFilter>,
    subscribers: Arc<Subscribers>,
    notifying: AtomicBool,
    dispatch: Sender<Notification>,
}

impl SimNode {
    pub fn new(network: Network) -> Result<Arc<Self>, SimNodeError> {
        let params = chain_params(network);
        let genesis = genesis_block(&params)?;
        let mut chain = ChainState {
            blocks: Vec::new(),
            coins: HashMap::new(),
            mempool: Mempool::new(),
        };
        chain.connect(&genesis);
        chain.blocks.push(genesis);

        let subscribers = Arc::new(Subscribers::new());
        let (dispatch, notifications) = unbounded();
        let dispatch_subscribers = Arc::clone(&subscribers);
        // Exits once the node (the only sender) is dropped.
        thread::spawn(move || dispatch_loop(dispatch_subscribers, notifications));

        log_debug!("simnode started on {network}");
        Ok(Arc::new(Self {
            params,
            chain: Mutex::new(chain),
            filter: Mutex::new(TxFilter::default()),
            subscribers,
            notifying: AtomicBool::new(false),
            dispatch,
        }))
    }

    pub fn network(&self) -> Network {
        self.params.network
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    fn chain(&self) -> Result<MutexGuard<'_, ChainState>, SimNodeError> {
        self.chain
            .lock()
            .map_err(|_| SimNodeError::Poisoned("simnode chain"))
    }

    fn filter(&self) -> Result<MutexGuard<'_, TxFilter>, SimNodeError> {
        self.filter
            .lock()
            .map_err(|_| SimNodeError::Poisoned("simnode filter"))
    }

    pub fn tip_height(&self) -> Result<u32, SimNodeError> {
        Ok(self.chain()?.tip().height)
    }

    pub fn tip_hash(&self) -> Result<Hash256, SimNodeError> {
        Ok(self.chain()?.tip().hash())
    }

    pub fn block_at(&self, height: u32) -> Result<Block, SimNodeError> {
        self.chain()?
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(SimNodeError::UnknownHeight(height))
    }

    pub fn mempool_len(&self) -> Result<usize, SimNodeError> {
        Ok(self.chain()?.mempool.len())
    }

    pub fn mempool_contains(&self, txid: &Hash256) -> Result<bool, SimNodeError> {
        Ok(self.chain()?.mempool.contains(txid))
    }

    pub fn is_notifying(&self) -> bool {
        self.notifying.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> Result<usize, SimNodeError> {
        Ok(self.subscribers.len()?)
    }

    /// Mines `count` blocks paying the subsidy to `mining_address`, or to
    /// OP_TRUE when none is given. Pooled transactions go into the first.
    pub fn generate(
        &self,
        count: u32,
        mining_address: Option<&Address>,
    ) -> Result<Vec<Hash256>, SimNodeError> {
        (0..count)
            .map(|_| self.mine(mining_address, Vec::new()))
            .collect()
    }

    /// Mines one block whose coinbase pays `outputs` instead of the subsidy.
    pub fn mine_to(&self, outputs: Vec<TxOut>) -> Result<Hash256, SimNodeError> {
        self.mine(None, outputs)
    }

    fn mine(
        &self,
        mining_address: Option<&Address>,
        mine_to: Vec<TxOut>,
    ) -> Result<Hash256, SimNodeError> {
        let mut chain = self.chain()?;
        let block = create_block(BlockArgs {
            prev: chain.tip(),
            transactions: chain.mempool.transactions(),
            version: CURRENT_BLOCK_VERSION,
            time: None,
            mine_to,
            mining_address,
            extra_nonce: rand::random::<u64>(),
            params: &self.params,
        })?;
        chain.mempool.clear();
        chain.connect(&block);

        let hash = block.hash();
        let height = block.height();
        if self.is_notifying() {
            let txns: Vec<Vec<u8>> = {
                let mut filter = self.filter()?;
                block
                    .transactions
                    .iter()
                    .filter(|tx| filter.matches(tx))
                    .map(Transaction::consensus_encode)
                    .collect()
            };
            self.dispatch
                .send(Notification::Connected {
                    header: block.header.consensus_encode(),
                    txns,
                })
                .map_err(|_| SimNodeError::DispatchStopped)?;
        }
        log_debug!(
            "mined block {height} {} with {} transactions",
            hash_to_hex(&hash),
            block.transactions.len()
        );
        chain.blocks.push(block);
        Ok(hash)
    }

    /// Disconnects the top `count` blocks, newest first, and returns the new
    /// tip height. Their transactions go back to the mempool when they are
    /// still valid on the shorter chain.
    pub fn invalidate_tip(&self, count: u32) -> Result<u32, SimNodeError> {
        let mut chain = self.chain()?;
        if count as usize >= chain.blocks.len() {
            return Err(SimNodeError::InvalidateGenesis);
        }

        let mut returned: Vec<Vec<Transaction>> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let Some(block) = chain.blocks.pop() else {
                return Err(SimNodeError::InvalidateGenesis);
            };
            if self.is_notifying() {
                self.dispatch
                    .send(Notification::Disconnected {
                        header: block.header.consensus_encode(),
                    })
                    .map_err(|_| SimNodeError::DispatchStopped)?;
            }
            log_debug!("disconnected block {}", block.height());
            returned.push(block.transactions.into_iter().skip(1).collect());
        }

        let mut pending: Vec<Transaction> = returned.into_iter().rev().flatten().collect();
        pending.extend(chain.mempool.take_all());
        chain.rebuild_coins();
        for tx in pending {
            let txid = tx.txid();
            match chain.check_transaction(&tx, self.params.coinbase_maturity) {
                Ok(_) => chain.mempool.insert(txid, tx),
                Err(err) => log_debug!("dropped {} after reorg: {err}", hash_to_hex(&txid)),
            }
        }

        let height = chain.tip().height;
        log_info!("invalidated {count} blocks; tip is now {height}");
        Ok(height)
    }

    /// Validates `tx` against the chain tip and pools it for the next block.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash256, SimNodeError> {
        let mut chain = self.chain()?;
        let fee = chain.check_transaction(&tx, self.params.coinbase_maturity)?;
        let txid = tx.txid();
        log_debug!("accepted {} paying fee {fee}", hash_to_hex(&txid));
        chain.mempool.insert(txid, tx);
        Ok(txid)
    }

    /// Waits until every notification queued so far has been delivered.
    pub fn flush(&self) -> Result<(), SimNodeError> {
        let (ack, done) = bounded(1);
        self.dispatch
            .send(Notification::Flush(ack))
            .map_err(|_| SimNodeError::DispatchStopped)?;
        done.recv().map_err(|_| SimNodeError::DispatchStopped)
    }
}

impl NodeConnection for SimNode {
    fn subscribe(&self, subscriber: Arc<dyn BlockSubscriber>) -> Result<(), NodeError> {
        Ok(self.subscribers.push(subscriber)?)
    }

    fn notify_blocks(&self) -> Result<(), NodeError> {
        self.notifying.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn load_tx_filter(
        &self,
        reload: bool,
        addresses: &[Address],
        outpoints: &[OutPoint],
    ) -> Result<(), NodeError> {
        self.filter()
            .map_err(|err| NodeError::Transport(err.to_string()))?
            .load(reload, addresses, outpoints);
        Ok(())
    }

    fn send_raw_transaction(
        &self,
        raw: &[u8],
        _allow_high_fees: bool,
    ) -> Result<Hash256, NodeError> {
        let tx = Transaction::consensus_decode(raw)
            .map_err(|err| NodeError::Rejected(err.to_string()))?;
        self.submit_transaction(tx).map_err(|err| match err {
            SimNodeError::Poisoned(_) => NodeError::Transport(err.to_string()),
            err => NodeError::Rejected(err.to_string()),
        })
    }

    fn disconnect(&self) {
        self.notifying.store(false, Ordering::SeqCst);
        if let Err(err) = self.subscribers.clear() {
            log_warn!("disconnect left subscribers registered: {err}");
        }
    }
}
