use memwallet_primitives::block::{Block, BlockHeader, HEADER_SIZE};
use memwallet_primitives::encoding::DecodeError;
use memwallet_primitives::outpoint::OutPoint;
use memwallet_primitives::transaction::{Transaction, TxIn, TxOut};

fn coinbase(height: u32) -> Transaction {
    Transaction {
        vin: vec![TxIn::new(OutPoint::null(), vec![0x01, height as u8])],
        vout: vec![TxOut::new(5_0000_0000, vec![0x51])],
        ..Transaction::default()
    }
}

fn block_at(height: u32) -> Block {
    let transactions = vec![coinbase(height)];
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [0u8; 32],
            time: 1_296_688_602,
            bits: 0x207f_ffff,
            height,
            nonce: 0,
        },
        transactions,
    };
    block.header.merkle_root = block.compute_merkle_root();
    block
}

#[test]
fn block_bytes_start_with_header() {
    let block = block_at(7);
    let bytes = block.consensus_encode();
    let header = BlockHeader::consensus_decode(&bytes[..HEADER_SIZE]).expect("decode header");
    assert_eq!(header, block.header);
    assert_eq!(bytes[HEADER_SIZE], 1, "transaction count");
    let decoded = Block::consensus_decode(&bytes).expect("decode block");
    assert_eq!(decoded, block);
    assert_eq!(decoded.height(), 7);
}

#[test]
fn merkle_root_of_single_coinbase_is_its_txid() {
    let block = block_at(3);
    assert_eq!(block.header.merkle_root, block.transactions[0].txid());
    assert!(block.transactions[0].is_coinbase());
}

#[test]
fn distinct_heights_give_distinct_coinbase_txids() {
    assert_ne!(coinbase(1).txid(), coinbase(2).txid());
}

#[test]
fn header_with_trailing_bytes_is_rejected() {
    let mut bytes = block_at(1).header.consensus_encode();
    bytes.push(0xff);
    assert_eq!(
        BlockHeader::consensus_decode(&bytes),
        Err(DecodeError::TrailingBytes)
    );
}
