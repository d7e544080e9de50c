//! Wallet configuration.

use std::time::Duration;

use memwallet_consensus::Network;
use zeroize::Zeroizing;

/// Poll interval of `InMemoryWallet::sync`.
pub const DEFAULT_SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed seed shared by every harness wallet. The harness id is appended so
/// that wallets in one process derive distinct, reproducible chains.
pub const HARNESS_SEED: [u8; 32] = [
    0xb4, 0x6b, 0xc6, 0x50, 0x2a, 0x30, 0xbe, 0xb9, 0x2f, 0x0a, 0xeb, 0xc7, 0x76, 0x40, 0x3c, 0x3d,
    0xbf, 0x11, 0xbf, 0xb6, 0x83, 0x05, 0x96, 0x7c, 0x36, 0xda, 0xc9, 0xef, 0x8d, 0x64, 0x15, 0x67,
];

/// What to do when the synchronization path hits an unrecoverable fault.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultPolicy {
    /// Log and abort the process.
    Abort,
    /// Log and panic on the current thread.
    Panic,
}

#[derive(Clone)]
pub struct WalletConfig {
    pub network: Network,
    pub seed: Zeroizing<Vec<u8>>,
    pub sync_poll_interval: Duration,
    pub fault_policy: FaultPolicy,
}

impl WalletConfig {
    pub fn new(network: Network, seed: &[u8]) -> Self {
        Self {
            network,
            seed: Zeroizing::new(seed.to_vec()),
            sync_poll_interval: DEFAULT_SYNC_POLL_INTERVAL,
            fault_policy: FaultPolicy::Abort,
        }
    }

    pub fn for_harness(network: Network, harness_id: u32) -> Self {
        Self::new(network, &harness_seed(harness_id))
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll_interval = interval;
        self
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("network", &self.network)
            .field("seed", &"<redacted>")
            .field("sync_poll_interval", &self.sync_poll_interval)
            .field("fault_policy", &self.fault_policy)
            .finish()
    }
}

pub fn harness_seed(harness_id: u32) -> Zeroizing<Vec<u8>> {
    let mut seed = Zeroizing::new(Vec::with_capacity(HARNESS_SEED.len() + 4));
    seed.extend_from_slice(&HARNESS_SEED);
    seed.extend_from_slice(&harness_id.to_be_bytes());
    seed
}
