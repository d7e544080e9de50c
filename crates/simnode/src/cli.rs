//! `memwallet-sim`: mines a short chain against a harness wallet, spends from
//! it and replays a reorg, printing the wallet's view after each step.

use std::sync::Arc;

use memwallet::{InMemoryWallet, WalletConfig, WalletError};
use memwallet_consensus::money::CENT;
use memwallet_consensus::Network;
use memwallet_log as logging;
use memwallet_log::log_info;
use memwallet_primitives::hash::hash_to_hex;
use memwallet_primitives::{Transaction, TxIn, TxOut};

use crate::node::SimNode;

const DEFAULT_BLOCKS: u32 = 40;
const DEFAULT_REORG_DEPTH: u32 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub network: Network,
    pub blocks: u32,
    pub reorg_depth: u32,
    pub harness_id: u32,
    pub log_level: logging::Level,
    pub log_format: logging::Format,
    pub log_timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            blocks: DEFAULT_BLOCKS,
            reorg_depth: DEFAULT_REORG_DEPTH,
            harness_id: 0,
            log_level: logging::Level::Info,
            log_format: logging::Format::Text,
            log_timestamps: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CliAction {
    Run(Config),
    PrintHelp,
    PrintVersion,
}

pub fn run_entry() -> Result<(), String> {
    match parse_args()? {
        CliAction::PrintHelp => {
            println!("{}", usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("memwallet-sim {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Run(config) => run_with_config(config),
    }
}

fn parse_args() -> Result<CliAction, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_u32(flag: &str, value: Option<String>) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}\n{}", usage()))?;
    value
        .parse::<u32>()
        .map_err(|_| format!("invalid {flag} '{value}'\n{}", usage()))
}

pub fn parse_args_from<I>(raw_args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut config = Config::default();
    let mut args = raw_args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "help" | "--help" | "-h" => return Ok(CliAction::PrintHelp),
            "version" | "--version" | "-V" => return Ok(CliAction::PrintVersion),
            "--network" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --network\n{}", usage()))?;
                config.network = Network::parse(&value)
                    .ok_or_else(|| format!("invalid network '{value}'\n{}", usage()))?;
            }
            "--blocks" => config.blocks = parse_u32("--blocks", args.next())?,
            "--reorg-depth" => config.reorg_depth = parse_u32("--reorg-depth", args.next())?,
            "--harness-id" => config.harness_id = parse_u32("--harness-id", args.next())?,
            "--log-level" | "--loglevel" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --log-level\n{}", usage()))?;
                config.log_level = logging::Level::parse(&value)
                    .ok_or_else(|| format!("invalid log level '{value}'\n{}", usage()))?;
            }
            "--log-format" | "--logformat" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --log-format\n{}", usage()))?;
                config.log_format = logging::Format::parse(&value)
                    .ok_or_else(|| format!("invalid log format '{value}'\n{}", usage()))?;
            }
            "--log-timestamps" | "--logtimestamps" => config.log_timestamps = true,
            "--no-log-timestamps" | "--no-logtimestamps" => config.log_timestamps = false,
            other => return Err(format!("unknown argument '{other}'\n{}", usage())),
        }
    }
    if config.reorg_depth > config.blocks {
        return Err(format!(
            "--reorg-depth {} exceeds --blocks {}",
            config.reorg_depth, config.blocks
        ));
    }
    Ok(CliAction::Run(config))
}

pub fn usage() -> String {
    [
        "Usage:",
        "  memwallet-sim [options]",
        "",
        "Options:",
        "  --help, -h  Print this help and exit",
        "  --version, -V  Print version and exit",
        "  --network  Chain to simulate: mainnet|testnet|regtest (default: regtest)",
        "  --blocks  Blocks to mine before spending (default: 40)",
        "  --reorg-depth  Blocks to invalidate and replace at the end (default: 3)",
        "  --harness-id  Wallet seed selector (default: 0)",
        "  --log-level  error|warn|info|debug|trace (default: info)",
        "  --log-format  text|json (default: text)",
        "  --log-timestamps  Enable timestamps in text logs (default: on)",
        "  --no-log-timestamps  Disable timestamps in text logs",
    ]
    .join("\n")
}

fn report(step: &str, wallet: &InMemoryWallet) -> Result<(), WalletError> {
    let balance = wallet.balance_breakdown()?;
    println!(
        "{step}: height {} spendable {} immature {} locked {} outputs {}",
        wallet.synced_height()?,
        balance.spendable,
        balance.immature,
        balance.locked,
        wallet.list_unspent()?.len()
    );
    Ok(())
}

fn catch_up(node: &SimNode, wallet: &InMemoryWallet) -> Result<u32, String> {
    node.flush().map_err(|err| err.to_string())?;
    let target = node.tip_height().map_err(|err| err.to_string())?;
    wallet.sync(target).map_err(|err| err.to_string())
}

fn run_with_config(config: Config) -> Result<(), String> {
    logging::init(logging::LogConfig {
        level: config.log_level,
        format: config.log_format,
        timestamps: config.log_timestamps,
    });
    log_info!(
        "Startup: network={} blocks={} reorg_depth={} harness_id={}",
        config.network,
        config.blocks,
        config.reorg_depth,
        config.harness_id
    );

    let node = SimNode::new(config.network).map_err(|err| err.to_string())?;
    let wallet = InMemoryWallet::new(WalletConfig::for_harness(config.network, config.harness_id))
        .map_err(|err| err.to_string())?;
    wallet
        .start(Arc::clone(&node) as Arc<dyn memwallet::NodeConnection>)
        .map_err(|err| err.to_string())?;

    let mining = wallet.coinbase_address();
    println!("coinbase address {mining}");
    node.generate(config.blocks, Some(&mining))
        .map_err(|err| err.to_string())?;
    catch_up(&node, &wallet)?;
    report("mined", &wallet).map_err(|err| err.to_string())?;

    let unspent = wallet.list_unspent().map_err(|err| err.to_string())?;
    if let Some(coin) = unspent.into_iter().next() {
        wallet
            .lock_outpoint(&coin.outpoint)
            .map_err(|err| err.to_string())?;
        let destination = wallet.new_address().map_err(|err| err.to_string())?;
        let tx = Transaction {
            vin: vec![TxIn::new(coin.outpoint, Vec::new())],
            vout: vec![TxOut::new(coin.value - CENT, destination.script_pubkey())],
            ..Transaction::default()
        };
        let txid = wallet.broadcast(&tx).map_err(|err| err.to_string())?;
        println!("sent {} to {destination} in {}", coin.value - CENT, hash_to_hex(&txid));
        node.generate(1, Some(&mining))
            .map_err(|err| err.to_string())?;
        catch_up(&node, &wallet)?;
        // The spent output is gone; this only clears stale locks.
        wallet
            .unlock_outputs(&tx.vin)
            .map_err(|err| err.to_string())?;
        report("spent", &wallet).map_err(|err| err.to_string())?;
    }

    if config.reorg_depth > 0 {
        let tip = node
            .invalidate_tip(config.reorg_depth)
            .map_err(|err| err.to_string())?;
        node.flush().map_err(|err| err.to_string())?;
        println!("invalidated {} blocks, node tip {tip}", config.reorg_depth);
        report("reorged", &wallet).map_err(|err| err.to_string())?;

        node.generate(config.reorg_depth + 1, Some(&mining))
            .map_err(|err| err.to_string())?;
        catch_up(&node, &wallet)?;
        report("recovered", &wallet).map_err(|err| err.to_string())?;
    }

    wallet.stop().map_err(|err| err.to_string())?;
    log_info!("Shutdown: complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn defaults_run_on_regtest() {
        assert_eq!(
            parse_args_from(Vec::new()).expect("parse"),
            CliAction::Run(Config::default())
        );
    }

    #[test]
    fn parses_every_option() {
        let action = parse_args_from(args(&[
            "--network",
            "testnet",
            "--blocks",
            "30",
            "--reorg-depth",
            "5",
            "--harness-id",
            "7",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--no-log-timestamps",
        ]))
        .expect("parse");
        let CliAction::Run(config) = action else {
            panic!("expected run action");
        };
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.blocks, 30);
        assert_eq!(config.reorg_depth, 5);
        assert_eq!(config.harness_id, 7);
        assert_eq!(config.log_level, logging::Level::Debug);
        assert_eq!(config.log_format, logging::Format::Json);
        assert!(!config.log_timestamps);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args_from(args(&["--blocks", "many"])).is_err());
        assert!(parse_args_from(args(&["--network"])).is_err());
        assert!(parse_args_from(args(&["--frobnicate"])).is_err());
        assert!(parse_args_from(args(&["--blocks", "2", "--reorg-depth", "3"])).is_err());
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(
            parse_args_from(args(&["--help", "--bogus"])).expect("parse"),
            CliAction::PrintHelp
        );
        assert_eq!(
            parse_args_from(args(&["-V"])).expect("parse"),
            CliAction::PrintVersion
        );
    }
}
