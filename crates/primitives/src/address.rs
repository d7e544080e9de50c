//! Base58check transparent addresses.

use std::fmt;

use memwallet_consensus::{chain_params, Network};

use crate::hash::sha256d;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    InvalidLength,
    InvalidCharacter,
    InvalidChecksum,
    UnknownPrefix,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidLength => write!(f, "invalid address length"),
            AddressError::InvalidCharacter => write!(f, "invalid base58 character"),
            AddressError::InvalidChecksum => write!(f, "invalid address checksum"),
            AddressError::UnknownPrefix => write!(f, "address prefix does not match network"),
        }
    }
}

impl std::error::Error for AddressError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    PubKeyHash,
    ScriptHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: [u8; 20],
}

impl Address {
    pub fn from_pubkey_hash(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::PubKeyHash,
            hash,
        }
    }

    pub fn from_script_hash(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::ScriptHash,
            hash,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The 20-byte hash an output script embeds when paying this address.
    pub fn script_address(&self) -> [u8; 20] {
        self.hash
    }

    pub fn script_pubkey(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::PubKeyHash => p2pkh_script(&self.hash),
            AddressKind::ScriptHash => p2sh_script(&self.hash),
        }
    }

    pub fn encode(&self) -> String {
        let params = chain_params(self.network);
        let prefix = match self.kind {
            AddressKind::PubKeyHash => params.pubkey_hash_prefix,
            AddressKind::ScriptHash => params.script_hash_prefix,
        };
        let mut payload = Vec::with_capacity(prefix.len() + self.hash.len());
        payload.extend_from_slice(&prefix);
        payload.extend_from_slice(&self.hash);
        base58check_encode(&payload)
    }

    pub fn decode(encoded: &str, network: Network) -> Result<Self, AddressError> {
        let payload = base58check_decode(encoded)?;
        if payload.len() != 22 {
            return Err(AddressError::InvalidLength);
        }
        let params = chain_params(network);
        let kind = if payload[..2] == params.pubkey_hash_prefix {
            AddressKind::PubKeyHash
        } else if payload[..2] == params.script_hash_prefix {
            AddressKind::ScriptHash
        } else {
            return Err(AddressError::UnknownPrefix);
        };
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[2..]);
        Ok(Self {
            network,
            kind,
            hash,
        })
    }

    /// Recognizes a standard P2PKH/P2SH output script.
    pub fn from_script_pubkey(script: &[u8], network: Network) -> Option<Self> {
        let mut hash = [0u8; 20];
        if is_p2pkh(script) {
            hash.copy_from_slice(&script[3..23]);
            return Some(Self::from_pubkey_hash(hash, network));
        }
        if is_p2sh(script) {
            hash.copy_from_slice(&script[2..22]);
            return Some(Self::from_script_hash(hash, network));
        }
        None
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    const OP_DUP: u8 = 0x76;
    const OP_HASH160: u8 = 0xa9;
    const OP_EQUALVERIFY: u8 = 0x88;
    const OP_CHECKSIG: u8 = 0xac;

    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

fn p2sh_script(hash: &[u8; 20]) -> Vec<u8> {
    const OP_HASH160: u8 = 0xa9;
    const OP_EQUAL: u8 = 0x87;

    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, 0x14]);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == 0x76
        && script[1] == 0xa9
        && script[2] == 0x14
        && script[23] == 0x88
        && script[24] == 0xac
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == 0xa9 && script[1] == 0x14 && script[22] == 0x87
}

fn base58check_encode(payload: &[u8]) -> String {
    let checksum = sha256d(payload);
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum[..4]);
    base58_encode(&data)
}

fn base58check_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let bytes = base58_decode(input)?;
    if bytes.len() < 4 {
        return Err(AddressError::InvalidLength);
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - 4);
    if checksum != &sha256d(payload)[..4] {
        return Err(AddressError::InvalidChecksum);
    }
    Ok(payload.to_vec())
}

fn base58_encode(data: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for byte in data {
        let mut carry = u32::from(*byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let zeros = data.iter().take_while(|b| **b == 0).count();
    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|d| ALPHABET[*d as usize] as char));
    out
}

fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    if input.is_empty() {
        return Err(AddressError::InvalidLength);
    }
    // Little-endian base-256 accumulator.
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for ch in input.bytes() {
        let value = ALPHABET
            .iter()
            .position(|candidate| *candidate == ch)
            .ok_or(AddressError::InvalidCharacter)? as u32;
        let mut carry = value;
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let zeros = input.bytes().take_while(|b| *b == b'1').count();
    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}
