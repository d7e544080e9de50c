//! Block templates for the simulated chain.

use memwallet_consensus::constants::CURRENT_BLOCK_VERSION;
use memwallet_consensus::{block_subsidy, block_tax, ChainParams};
use memwallet_pow::solve_header;
use memwallet_primitives::hash::hash160;
use memwallet_primitives::{
    merkle_root, Address, Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut,
};
use memwallet_script::{coinbase_extra_nonce_script, coinbase_sig_script, op_true_script};

use crate::error::SimNodeError;

const ORGANIZATION_SCRIPT_TAG: &[u8] = b"memwallet-sim organization";

/// Inputs for one block on top of `prev`.
pub struct BlockArgs<'a> {
    pub prev: &'a BlockHeader,
    pub transactions: Vec<Transaction>,
    pub version: i32,
    /// Header time; defaults to one second after `prev`.
    pub time: Option<u32>,
    /// Custom coinbase outputs. When non-empty they replace the subsidy payout.
    pub mine_to: Vec<TxOut>,
    pub mining_address: Option<&'a Address>,
    pub extra_nonce: u64,
    pub params: &'a ChainParams,
}

/// Script receiving the block tax on networks that levy one.
pub fn organization_script(params: &ChainParams) -> Vec<u8> {
    Address::from_script_hash(hash160(ORGANIZATION_SCRIPT_TAG), params.network).script_pubkey()
}

/// Coinbase for `height`: a tax output, a null-data output carrying the
/// height and `extra_nonce`, then the subsidy.
pub fn create_coinbase(
    height: u32,
    mining_address: Option<&Address>,
    mine_to: &[TxOut],
    extra_nonce: u64,
    params: &ChainParams,
) -> Result<Transaction, SimNodeError> {
    let subsidy = block_subsidy(height, params);
    let tax = block_tax(height, params);

    let mut vout = Vec::with_capacity(2 + mine_to.len().max(1));
    let tax_script = if params.block_tax_proportion > 0 {
        organization_script(params)
    } else {
        op_true_script()
    };
    vout.push(TxOut::new(tax, tax_script));
    vout.push(TxOut::new(0, coinbase_extra_nonce_script(height, extra_nonce)?));

    if mine_to.is_empty() {
        let payout = match mining_address {
            Some(address) => address.script_pubkey(),
            None => op_true_script(),
        };
        vout.push(TxOut::new(subsidy - tax, payout));
    } else {
        vout.extend_from_slice(mine_to);
    }

    Ok(Transaction {
        vin: vec![TxIn::new(
            OutPoint::null(),
            coinbase_sig_script(height, extra_nonce)?,
        )],
        vout,
        ..Transaction::default()
    })
}

/// Builds and solves the block that follows `args.prev`.
pub fn create_block(args: BlockArgs<'_>) -> Result<Block, SimNodeError> {
    let height = args.prev.height + 1;
    let coinbase = create_coinbase(
        height,
        args.mining_address,
        &args.mine_to,
        args.extra_nonce,
        args.params,
    )?;

    let mut transactions = Vec::with_capacity(1 + args.transactions.len());
    transactions.push(coinbase);
    transactions.extend(args.transactions);
    let txids: Vec<_> = transactions.iter().map(Transaction::txid).collect();

    let mut header = BlockHeader {
        version: args.version,
        prev_block: args.prev.hash(),
        merkle_root: merkle_root(&txids),
        time: args.time.unwrap_or(args.prev.time.saturating_add(1)),
        bits: args.params.pow_limit_bits,
        height,
        nonce: 0,
    };
    solve_header(&mut header)?;
    Ok(Block {
        header,
        transactions,
    })
}

/// Height-zero block paying its subsidy to OP_TRUE. It is never announced.
pub fn genesis_block(params: &ChainParams) -> Result<Block, SimNodeError> {
    let coinbase = create_coinbase(0, None, &[], 0, params)?;
    let header = BlockHeader {
        version: CURRENT_BLOCK_VERSION,
        prev_block: [0u8; 32],
        merkle_root: merkle_root(&[coinbase.txid()]),
        time: params.genesis_time,
        bits: params.pow_limit_bits,
        height: 0,
        nonce: 0,
    };
    Ok(Block {
        header,
        transactions: vec![coinbase],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memwallet_consensus::{chain_params, Network, COIN};
    use memwallet_pow::{compact_to_target, hash_meets_target};
    use memwallet_script::{classify_script_pubkey, ScriptType};

    fn mining_address() -> Address {
        Address::from_pubkey_hash([7u8; 20], Network::Regtest)
    }

    #[test]
    fn coinbase_layout_without_tax() {
        let params = chain_params(Network::Regtest);
        let addr = mining_address();
        let tx = create_coinbase(3, Some(&addr), &[], 42, &params).expect("coinbase");
        assert!(tx.is_coinbase());
        assert_eq!(tx.vout.len(), 3);
        assert_eq!(tx.vout[0].value, 0);
        assert_eq!(tx.vout[0].script_pubkey, op_true_script());
        assert_eq!(classify_script_pubkey(&tx.vout[1].script_pubkey), ScriptType::NullData);
        assert_eq!(tx.vout[2].value, 5 * COIN);
        assert_eq!(tx.vout[2].script_pubkey, addr.script_pubkey());
        assert_eq!(tx.vin[0].script_sig[0], 0x53);
    }

    #[test]
    fn coinbase_pays_tax_to_organization() {
        let params = chain_params(Network::Testnet);
        let tx = create_coinbase(1, None, &[], 0, &params).expect("coinbase");
        assert_eq!(tx.vout[0].value, 5 * COIN);
        assert_eq!(tx.vout[0].script_pubkey, organization_script(&params));
        assert_eq!(tx.vout[2].value, 45 * COIN);
        assert_eq!(tx.vout[2].script_pubkey, op_true_script());
    }

    #[test]
    fn mine_to_replaces_subsidy_payout() {
        let params = chain_params(Network::Regtest);
        let custom = vec![
            TxOut::new(COIN, vec![0x51]),
            TxOut::new(2 * COIN, mining_address().script_pubkey()),
        ];
        let addr = mining_address();
        let tx = create_coinbase(1, Some(&addr), &custom, 0, &params).expect("coinbase");
        assert_eq!(tx.vout.len(), 4);
        assert_eq!(&tx.vout[2..], &custom[..]);
    }

    #[test]
    fn extra_nonce_separates_competing_coinbases() {
        let params = chain_params(Network::Regtest);
        let a = create_coinbase(9, None, &[], 1, &params).expect("coinbase");
        let b = create_coinbase(9, None, &[], 2, &params).expect("coinbase");
        assert_ne!(a.txid(), b.txid());
    }

    #[test]
    fn block_links_to_parent_and_meets_target() {
        let params = chain_params(Network::Regtest);
        let genesis = genesis_block(&params).expect("genesis");
        let spend = Transaction {
            vin: vec![TxIn::new(genesis.transactions[0].outpoint(2), Vec::new())],
            vout: vec![TxOut::new(COIN, vec![0x51])],
            ..Transaction::default()
        };
        let block = create_block(BlockArgs {
            prev: &genesis.header,
            transactions: vec![spend.clone()],
            version: CURRENT_BLOCK_VERSION,
            time: None,
            mine_to: Vec::new(),
            mining_address: None,
            extra_nonce: 0,
            params: &params,
        })
        .expect("block");

        assert_eq!(block.height(), 1);
        assert_eq!(block.header.prev_block, genesis.hash());
        assert_eq!(block.header.time, params.genesis_time + 1);
        assert_eq!(block.transactions[1], spend);
        assert_eq!(block.header.merkle_root, block.compute_merkle_root());
        let target = compact_to_target(block.header.bits).expect("target");
        assert!(hash_meets_target(&block.hash(), &target));
    }
}
