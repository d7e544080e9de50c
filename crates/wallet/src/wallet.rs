//! The wallet facade: lifecycle, address issuance and ledger reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use memwallet_consensus::{chain_params, Amount, Hash256, Network};
use memwallet_log::{log_debug, log_error, log_info, log_warn};
use memwallet_primitives::hash::hash_to_hex;
use memwallet_primitives::{Address, OutPoint, Transaction, TxIn};

use crate::config::{FaultPolicy, WalletConfig};
use crate::error::{raise, Fault, Poisoned, WalletError};
use crate::intake::Intake;
use crate::keys::{KeyChain, SpendingKey};
use crate::ledger::{Balance, UnspentOutput, UtxoLedger};
use crate::node::NodeConnection;
use crate::queue::{Signal, Synchronizer, UpdateQueue};

/// Everything guarded by the ledger lock.
pub(crate) struct WalletState {
    pub(crate) keys: KeyChain,
    pub(crate) ledger: UtxoLedger,
}

pub(crate) struct Shared {
    network: Network,
    fault_policy: FaultPolicy,
    state: RwLock<WalletState>,
    queue: Arc<UpdateQueue>,
}

impl Shared {
    pub(crate) fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub(crate) fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    pub(crate) fn with_state<R>(
        &self,
        f: impl FnOnce(&WalletState) -> R,
    ) -> Result<R, Poisoned> {
        let state = self.state.read().map_err(|_| Poisoned("wallet state"))?;
        Ok(f(&state))
    }

    pub(crate) fn with_state_mut<R>(
        &self,
        f: impl FnOnce(&mut WalletState) -> R,
    ) -> Result<R, Poisoned> {
        let mut state = self.state.write().map_err(|_| Poisoned("wallet state"))?;
        Ok(f(&mut state))
    }
}

struct Runtime {
    node: Arc<dyn NodeConnection>,
    signals: Sender<Signal>,
    stop: Arc<AtomicBool>,
    synchronizer: Synchronizer,
}

/// Wallet that keeps its owned outputs in memory and follows one node.
pub struct InMemoryWallet {
    shared: Arc<Shared>,
    coinbase: Address,
    sync_poll_interval: Duration,
    runtime: Mutex<Option<Runtime>>,
}

impl InMemoryWallet {
    pub fn new(config: WalletConfig) -> Result<Self, WalletError> {
        let keys = KeyChain::new(&config.seed, config.network)?;
        let ledger = UtxoLedger::new(chain_params(config.network).coinbase_maturity);
        let coinbase = keys.coinbase_address();
        log_debug!(
            "wallet created on {} with coinbase address {coinbase}",
            config.network
        );
        Ok(Self {
            shared: Arc::new(Shared {
                network: config.network,
                fault_policy: config.fault_policy,
                state: RwLock::new(WalletState { keys, ledger }),
                queue: Arc::new(UpdateQueue::new()),
            }),
            coinbase,
            sync_poll_interval: config.sync_poll_interval,
            runtime: Mutex::new(None),
        })
    }

    pub fn network(&self) -> Network {
        self.shared.network
    }

    fn runtime(&self) -> Result<MutexGuard<'_, Option<Runtime>>, Poisoned> {
        self.runtime.lock().map_err(|_| Poisoned("wallet runtime"))
    }

    /// Subscribes to `node`, loads the filter with every issued address and
    /// starts the synchronizer. Node failures here are setup faults.
    pub fn start(&self, node: Arc<dyn NodeConnection>) -> Result<(), WalletError> {
        let mut runtime = self.runtime()?;
        if runtime.is_some() {
            return Err(WalletError::AlreadyStarted);
        }

        let stale = self.shared.queue.clear()?;
        if stale > 0 {
            log_warn!("dropping {stale} stale queued updates from a previous run");
        }

        let (signals, receiver) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let intake = Arc::new(Intake::new(Arc::clone(&self.shared), signals.clone()));
        let policy = self.shared.fault_policy;

        let addresses = self.shared.with_state(|state| state.keys.addresses())?;
        if let Err(err) = node.subscribe(intake) {
            raise(policy, Fault::Setup(format!("subscribe: {err}")));
        }
        if let Err(err) = node.load_tx_filter(true, &addresses, &[]) {
            raise(policy, Fault::Setup(format!("load filter: {err}")));
        }
        if let Err(err) = node.notify_blocks() {
            raise(policy, Fault::Setup(format!("notify blocks: {err}")));
        }

        let shared = Arc::clone(&self.shared);
        let synchronizer = Synchronizer::spawn(
            Arc::clone(&self.shared.queue),
            receiver,
            Arc::clone(&stop),
            policy,
            move |update| {
                let applied = shared.with_state_mut(|state| {
                    state
                        .ledger
                        .apply(update.height, &update.transactions, &state.keys);
                });
                if let Err(err) = applied {
                    raise(policy, err.into());
                }
            },
        );

        *runtime = Some(Runtime {
            node,
            signals,
            stop,
            synchronizer,
        });
        log_info!(
            "wallet started on {} watching {} addresses",
            self.shared.network,
            addresses.len()
        );
        Ok(())
    }

    /// Stops the synchronizer and disconnects from the node. Updates still
    /// queued at this point are not applied.
    pub fn stop(&self) -> Result<(), WalletError> {
        let runtime = self.runtime()?.take().ok_or(WalletError::NotStarted)?;

        runtime.stop.store(true, Ordering::SeqCst);
        let _ = runtime.signals.send(Signal::Stop);
        runtime.node.disconnect();
        if runtime.synchronizer.join().is_err() {
            log_error!("synchronizer thread panicked");
        }

        match self.shared.queue.len() {
            Ok(0) => {}
            Ok(pending) => log_warn!("wallet stopped with {pending} unapplied updates"),
            Err(err) => log_warn!("wallet stopped: {err}"),
        }
        match self.synced_height() {
            Ok(height) => log_info!("wallet stopped at height {height}"),
            Err(err) => log_warn!("wallet stopped: {err}"),
        }
        Ok(())
    }

    /// A poisoned runtime lock reads as not running.
    pub fn is_running(&self) -> bool {
        self.runtime()
            .map(|runtime| runtime.is_some())
            .unwrap_or(false)
    }

    fn node(&self) -> Result<Option<Arc<dyn NodeConnection>>, Poisoned> {
        Ok(self
            .runtime()?
            .as_ref()
            .map(|runtime| Arc::clone(&runtime.node)))
    }

    pub fn synced_height(&self) -> Result<u32, WalletError> {
        Ok(self.shared.with_state(|state| state.ledger.height())?)
    }

    /// Blocks until the synced height reaches `height`, polling.
    pub fn sync(&self, height: u32) -> Result<u32, WalletError> {
        loop {
            let synced = self.synced_height()?;
            if synced >= height {
                return Ok(synced);
            }
            thread::sleep(self.sync_poll_interval);
        }
    }

    pub fn sync_timeout(&self, height: u32, timeout: Duration) -> Result<u32, WalletError> {
        let started = Instant::now();
        loop {
            let synced = self.synced_height()?;
            if synced >= height {
                return Ok(synced);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(WalletError::SyncTimeout {
                    target: height,
                    reached: synced,
                    waited,
                });
            }
            thread::sleep(self.sync_poll_interval.min(timeout - waited));
        }
    }

    /// Issues the next address. With a node attached the address is added to
    /// its filter first; the index is only consumed if that succeeds.
    pub fn new_address(&self) -> Result<Address, WalletError> {
        let node = self.node()?;
        self.shared.with_state_mut(|state| {
            let pending = state.keys.prepare_next()?;
            if let Some(node) = node {
                node.load_tx_filter(false, &[pending.address], &[])?;
            }
            state.keys.commit(pending);
            log_debug!("issued address {} at index {}", pending.address, pending.index);
            Ok(pending.address)
        })?
    }

    /// Index 0, fixed when the wallet is created.
    pub fn coinbase_address(&self) -> Address {
        self.coinbase
    }

    pub fn addresses(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.shared.with_state(|state| state.keys.addresses())?)
    }

    pub fn spending_key(&self, index: u32) -> Result<SpendingKey, WalletError> {
        self.shared.with_state(|state| state.keys.spending_key(index))?
    }

    /// Mature, unlocked value.
    pub fn balance(&self) -> Result<Amount, WalletError> {
        Ok(self.shared.with_state(|state| state.ledger.balance())?)
    }

    pub fn balance_breakdown(&self) -> Result<Balance, WalletError> {
        Ok(self.shared.with_state(|state| state.ledger.balance_breakdown())?)
    }

    pub fn list_unspent(&self) -> Result<Vec<UnspentOutput>, WalletError> {
        Ok(self.shared.with_state(|state| state.ledger.list_unspent(&state.keys))?)
    }

    pub fn lock_outpoint(&self, outpoint: &OutPoint) -> Result<(), WalletError> {
        self.shared
            .with_state_mut(|state| state.ledger.set_locked(outpoint, true))?
    }

    pub fn unlock_outpoint(&self, outpoint: &OutPoint) -> Result<(), WalletError> {
        self.shared
            .with_state_mut(|state| state.ledger.set_locked(outpoint, false))?
    }

    /// Releases the outputs spent by `inputs`, skipping any the wallet does
    /// not hold.
    pub fn unlock_outputs(&self, inputs: &[TxIn]) -> Result<(), WalletError> {
        Ok(self.shared.with_state_mut(|state| {
            for input in inputs {
                let _ = state.ledger.set_locked(&input.prevout, false);
            }
        })?)
    }

    pub fn locked_outpoints(&self) -> Result<Vec<OutPoint>, WalletError> {
        Ok(self.shared.with_state(|state| state.ledger.locked_outpoints())?)
    }

    pub fn broadcast(&self, tx: &Transaction) -> Result<Hash256, WalletError> {
        let node = self.node()?.ok_or(WalletError::NotStarted)?;
        let txid = node.send_raw_transaction(&tx.consensus_encode(), true)?;
        log_debug!("broadcast transaction {}", hash_to_hex(&txid));
        Ok(txid)
    }
}

impl Drop for InMemoryWallet {
    fn drop(&mut self) {
        let running = self
            .runtime
            .get_mut()
            .map(|runtime| runtime.is_some())
            .unwrap_or(false);
        if running {
            let _ = self.stop();
        }
    }
}
