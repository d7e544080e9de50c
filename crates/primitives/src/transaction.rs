//! Transparent transaction types and serialization.

use memwallet_consensus::constants::{CURRENT_TX_VERSION, MAX_TX_IN_SEQUENCE_NUM};
use memwallet_consensus::{Amount, Hash256};

use crate::encoding::{decode, encode, Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256d;
use crate::outpoint::OutPoint;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Vec<u8>) -> Self {
        Self {
            prevout,
            script_sig,
            sequence: MAX_TX_IN_SEQUENCE_NUM,
        }
    }
}

impl Encodable for TxIn {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.prevout.consensus_encode(encoder);
        encoder.write_var_bytes(&self.script_sig);
        encoder.write_u32_le(self.sequence);
    }
}

impl Decodable for TxIn {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let prevout = OutPoint::consensus_decode(decoder)?;
        let script_sig = decoder.read_var_bytes()?;
        let sequence = decoder.read_u32_le()?;
        Ok(Self {
            prevout,
            script_sig,
            sequence,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

impl Encodable for TxOut {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_i64_le(self.value);
        encoder.write_var_bytes(&self.script_pubkey);
    }
}

impl Decodable for TxOut {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let value = decoder.read_i64_le()?;
        let script_pubkey = decoder.read_var_bytes()?;
        Ok(Self {
            value,
            script_pubkey,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry_height: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: CURRENT_TX_VERSION,
            vin: Vec::new(),
            vout: Vec::new(),
            lock_time: 0,
            expiry_height: 0,
        }
    }
}

impl Transaction {
    pub fn consensus_encode(&self) -> Vec<u8> {
        encode(self)
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(&self.consensus_encode())
    }

    /// A coinbase has exactly one input and that input spends the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout.is_null()
    }

    pub fn value_out(&self) -> Amount {
        self.vout.iter().map(|output| output.value).sum()
    }

    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint::new(self.txid(), index)
    }
}

impl Encodable for Transaction {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_i32_le(self.version);
        encoder.write_varint(self.vin.len() as u64);
        for input in &self.vin {
            input.consensus_encode(encoder);
        }
        encoder.write_varint(self.vout.len() as u64);
        for output in &self.vout {
            output.consensus_encode(encoder);
        }
        encoder.write_u32_le(self.lock_time);
        encoder.write_u32_le(self.expiry_height);
    }
}

impl Decodable for Transaction {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_i32_le()?;
        if version < 1 {
            return Err(DecodeError::InvalidData("transaction version below 1"));
        }
        let vin_count = decoder.read_len()?;
        let mut vin = Vec::with_capacity(vin_count.min(1024));
        for _ in 0..vin_count {
            vin.push(TxIn::consensus_decode(decoder)?);
        }
        let vout_count = decoder.read_len()?;
        let mut vout = Vec::with_capacity(vout_count.min(1024));
        for _ in 0..vout_count {
            vout.push(TxOut::consensus_decode(decoder)?);
        }
        let lock_time = decoder.read_u32_le()?;
        let expiry_height = decoder.read_u32_le()?;
        Ok(Self {
            version,
            vin,
            vout,
            lock_time,
            expiry_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            vin: vec![TxIn::new(OutPoint::new([7u8; 32], 3), vec![0x51])],
            vout: vec![
                TxOut::new(1_000, vec![0x51]),
                TxOut::new(2_500, vec![0x6a, 0x01, 0x00]),
            ],
            ..Transaction::default()
        }
    }

    #[test]
    fn encoded_layout_matches_field_order() {
        let tx = sample();
        let bytes = tx.consensus_encode();
        assert_eq!(&bytes[..4], &1i32.to_le_bytes());
        assert_eq!(bytes[4], 1, "input count");
        assert_eq!(&bytes[5..37], &[7u8; 32]);
        assert_eq!(&bytes[bytes.len() - 8..], &[0u8; 8]);
        assert_eq!(Transaction::consensus_decode(&bytes).expect("decode"), tx);
    }

    #[test]
    fn coinbase_requires_single_null_input() {
        let mut tx = sample();
        assert!(!tx.is_coinbase());
        tx.vin[0].prevout = OutPoint::null();
        assert!(tx.is_coinbase());
        tx.vin.push(TxIn::new(OutPoint::null(), Vec::new()));
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().consensus_encode();
        bytes.push(0);
        assert_eq!(
            Transaction::consensus_decode(&bytes),
            Err(DecodeError::TrailingBytes)
        );
    }

    #[test]
    fn value_out_sums_outputs() {
        assert_eq!(sample().value_out(), 3_500);
    }
}
