//! Pending chain updates and the single worker that applies them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use memwallet_log::{log_debug, log_warn};
use memwallet_primitives::Transaction;

use crate::config::FaultPolicy;
use crate::error::{raise, Poisoned};

/// One connected block, reduced to what the ledger needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainUpdate {
    /// Position in enqueue order, assigned by [`UpdateQueue::push`].
    pub sequence: u64,
    pub height: u32,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    UpdateAvailable,
    Stop,
}

#[derive(Default)]
struct QueueInner {
    updates: VecDeque<ChainUpdate>,
    next_sequence: u64,
}

/// FIFO of connected blocks waiting for the synchronizer. It has its own
/// lock, separate from the ledger's, so notification delivery never waits
/// on ledger readers or writers.
#[derive(Default)]
pub struct UpdateQueue {
    inner: Mutex<QueueInner>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, QueueInner>, Poisoned> {
        self.inner.lock().map_err(|_| Poisoned("update queue"))
    }

    /// Appends an update and returns its sequence number.
    pub fn push(&self, height: u32, transactions: Vec<Transaction>) -> Result<u64, Poisoned> {
        let mut inner = self.lock_inner()?;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.updates.push_back(ChainUpdate {
            sequence,
            height,
            transactions,
        });
        Ok(sequence)
    }

    pub fn pop(&self) -> Result<Option<ChainUpdate>, Poisoned> {
        Ok(self.lock_inner()?.updates.pop_front())
    }

    /// Drops every pending update, returning how many were dropped.
    pub fn clear(&self) -> Result<usize, Poisoned> {
        let mut inner = self.lock_inner()?;
        let dropped = inner.updates.len();
        inner.updates.clear();
        Ok(dropped)
    }

    pub fn len(&self) -> Result<usize, Poisoned> {
        Ok(self.lock_inner()?.updates.len())
    }

    pub fn is_empty(&self) -> Result<bool, Poisoned> {
        Ok(self.len()? == 0)
    }
}

/// The one thread that drains the queue. Each `UpdateAvailable` signal pops
/// exactly one update from the head; `Stop` (or the stop flag) ends the loop
/// without draining what is left. A poisoned queue is a fault under `policy`.
pub struct Synchronizer {
    handle: JoinHandle<()>,
}

impl Synchronizer {
    pub fn spawn<F>(
        queue: Arc<UpdateQueue>,
        signals: Receiver<Signal>,
        stop: Arc<AtomicBool>,
        policy: FaultPolicy,
        mut apply: F,
    ) -> Self
    where
        F: FnMut(ChainUpdate) + Send + 'static,
    {
        let handle = thread::spawn(move || {
            for signal in signals.iter() {
                if signal == Signal::Stop || stop.load(Ordering::SeqCst) {
                    break;
                }
                match queue.pop() {
                    Ok(Some(update)) => apply(update),
                    Ok(None) => log_warn!("update signal received with an empty queue"),
                    Err(err) => raise(policy, err.into()),
                }
            }
            match queue.len() {
                Ok(left) => log_debug!("synchronizer stopped with {left} queued updates"),
                Err(err) => log_debug!("synchronizer stopped: {err}"),
            }
        });
        Self { handle }
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn queue_is_fifo_with_monotonic_sequence() {
        let queue = UpdateQueue::new();
        assert_eq!(queue.push(5, Vec::new()), Ok(0));
        assert_eq!(queue.push(3, Vec::new()), Ok(1));
        let head = |queue: &UpdateQueue| {
            queue
                .pop()
                .expect("queue")
                .map(|u| (u.sequence, u.height))
        };
        assert_eq!(head(&queue), Some((0, 5)));
        assert_eq!(head(&queue), Some((1, 3)));
        assert_eq!(head(&queue), None);
    }

    #[test]
    fn clear_reports_dropped_updates() {
        let queue = UpdateQueue::new();
        queue.push(1, Vec::new()).expect("push");
        queue.push(2, Vec::new()).expect("push");
        assert_eq!(queue.clear(), Ok(2));
        assert_eq!(queue.is_empty(), Ok(true));
        assert_eq!(queue.push(3, Vec::new()), Ok(2));
    }

    #[test]
    fn concurrent_producers_are_applied_in_enqueue_order() {
        let queue = Arc::new(UpdateQueue::new());
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let applied = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&applied);
        let sync = Synchronizer::spawn(
            Arc::clone(&queue),
            rx,
            Arc::clone(&stop),
            FaultPolicy::Panic,
            move |update| {
                sink.lock()
                    .expect("applied lock")
                    .push((update.sequence, update.height));
            },
        );

        let producers: Vec<_> = (0..8u32)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                thread::spawn(move || {
                    let mut pushed = Vec::new();
                    for n in 0..50u32 {
                        let height = producer * 1000 + n;
                        let sequence = queue.push(height, Vec::new()).expect("push");
                        pushed.push((sequence, height));
                        tx.send(Signal::UpdateAvailable).expect("signal");
                    }
                    pushed
                })
            })
            .collect();
        let mut enqueued: Vec<(u64, u32)> = producers
            .into_iter()
            .flat_map(|handle| handle.join().expect("producer"))
            .collect();
        enqueued.sort();

        tx.send(Signal::Stop).expect("stop");
        sync.join().expect("synchronizer");
        assert_eq!(*applied.lock().expect("applied lock"), enqueued);
    }

    #[test]
    fn stop_leaves_pending_updates_queued() {
        let queue = Arc::new(UpdateQueue::new());
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        tx.send(Signal::Stop).expect("stop");
        queue.push(1, Vec::new()).expect("push");
        tx.send(Signal::UpdateAvailable).expect("signal");
        let sync = Synchronizer::spawn(Arc::clone(&queue), rx, stop, FaultPolicy::Panic, |_| {
            panic!("nothing should be applied after stop");
        });
        sync.join().expect("synchronizer");
        assert_eq!(queue.len(), Ok(1));
    }

    fn poison(queue: &Arc<UpdateQueue>) {
        let queue = Arc::clone(queue);
        let _ = thread::spawn(move || {
            let _guard = queue.inner.lock().expect("update queue lock");
            panic!("poisoning the update queue");
        })
        .join();
    }

    #[test]
    fn poisoned_queue_reports_errors_to_callers() {
        let queue = Arc::new(UpdateQueue::new());
        poison(&queue);
        assert_eq!(queue.push(1, Vec::new()), Err(Poisoned("update queue")));
        assert_eq!(queue.clear(), Err(Poisoned("update queue")));
    }

    #[test]
    fn poisoned_queue_is_a_synchronizer_fault() {
        memwallet_log::enable_capture(256);
        let queue = Arc::new(UpdateQueue::new());
        poison(&queue);
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let sync = Synchronizer::spawn(Arc::clone(&queue), rx, stop, FaultPolicy::Panic, |_| {});
        tx.send(Signal::UpdateAvailable).expect("signal");
        assert!(sync.join().is_err());
        assert!(memwallet_log::captured_messages("memwallet::error")
            .iter()
            .any(|msg| msg.contains("update queue lock poisoned")));
    }
}
