//! Per-network chain parameters.

use crate::money::{Amount, COIN};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" | "simnet" => Some(Network::Regtest),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    /// Number of blocks a coinbase output waits before it is spendable.
    pub coinbase_maturity: u32,
    pub pubkey_hash_prefix: [u8; 2],
    pub script_hash_prefix: [u8; 2],
    /// Easiest compact target a block may carry.
    pub pow_limit_bits: u32,
    pub genesis_time: u32,
    pub target_spacing_secs: u32,
    pub base_subsidy: Amount,
    pub subsidy_halving_interval: u32,
    /// Share of the subsidy, in percent, paid to the tax output. Zero disables the tax.
    pub block_tax_proportion: u16,
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => mainnet_chain_params(),
        Network::Testnet => testnet_chain_params(),
        Network::Regtest => regtest_chain_params(),
    }
}

fn mainnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Mainnet,
        coinbase_maturity: 256,
        pubkey_hash_prefix: [0x07, 0x3f],
        script_hash_prefix: [0x07, 0x1a],
        pow_limit_bits: 0x1d00_ffff,
        genesis_time: 1_454_954_400,
        target_spacing_secs: 300,
        base_subsidy: 50 * COIN,
        subsidy_halving_interval: 210_000,
        block_tax_proportion: 10,
    }
}

fn testnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Testnet,
        coinbase_maturity: 16,
        pubkey_hash_prefix: [0x0f, 0x21],
        script_hash_prefix: [0x0e, 0xfc],
        pow_limit_bits: 0x1e00_ffff,
        genesis_time: 1_533_513_600,
        target_spacing_secs: 120,
        base_subsidy: 50 * COIN,
        subsidy_halving_interval: 210_000,
        block_tax_proportion: 10,
    }
}

fn regtest_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Regtest,
        coinbase_maturity: 16,
        pubkey_hash_prefix: [0x0e, 0x91],
        script_hash_prefix: [0x0e, 0x6c],
        pow_limit_bits: 0x207f_ffff,
        genesis_time: 1_401_292_357,
        target_spacing_secs: 1,
        base_subsidy: 5 * COIN,
        subsidy_halving_interval: 150,
        block_tax_proportion: 0,
    }
}
