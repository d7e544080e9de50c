//! Deterministic key chain.
//!
//! Every address is the P2PKH address of child `i` of a BIP32 root built
//! from the wallet seed. Child keys are non-hardened and derived directly
//! from the root, so the same seed always yields the same address sequence.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use bip32::{ChildNumber, XPrv};
use memwallet_consensus::constants::HARDENED_KEY_START;
use memwallet_consensus::Network;
use memwallet_primitives::hash::hash160;
use memwallet_primitives::Address;
use memwallet_script::script_contains;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroize;

use crate::error::WalletError;

/// Index of the address that receives coinbase payouts.
pub const COINBASE_KEY_INDEX: u32 = 0;

/// Secret key for one issued index, with its compressed public key.
pub struct SpendingKey {
    index: u32,
    secret: SecretKey,
    pubkey: PublicKey,
}

impl SpendingKey {
    fn from_secret_bytes(index: u32, mut bytes: [u8; 32]) -> Result<Self, WalletError> {
        let secret = SecretKey::from_slice(&bytes);
        bytes.zeroize();
        let secret = secret.map_err(|err| WalletError::KeyDerivation(err.to_string()))?;
        let pubkey = PublicKey::from_secret_key(secp(), &secret);
        Ok(Self {
            index,
            secret,
            pubkey,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> PublicKey {
        self.pubkey
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.pubkey.serialize())
    }

    pub fn address(&self, network: Network) -> Address {
        Address::from_pubkey_hash(self.pubkey_hash(), network)
    }
}

impl std::fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendingKey")
            .field("index", &self.index)
            .field("pubkey", &self.pubkey)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnedAddress {
    pub index: u32,
    pub address: Address,
}

pub struct KeyChain {
    root: XPrv,
    network: Network,
    next_index: u32,
    addrs: BTreeMap<u32, Address>,
}

impl KeyChain {
    /// Builds the chain and registers the coinbase address at index 0.
    pub fn new(seed: &[u8], network: Network) -> Result<Self, WalletError> {
        let root = XPrv::new(seed).map_err(|err| WalletError::InvalidSeed(err.to_string()))?;
        let mut chain = Self {
            root,
            network,
            next_index: COINBASE_KEY_INDEX,
            addrs: BTreeMap::new(),
        };
        let coinbase = chain.prepare_next()?;
        chain.commit(coinbase);
        Ok(chain)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    fn derive(&self, index: u32) -> Result<SpendingKey, WalletError> {
        if index >= HARDENED_KEY_START {
            return Err(WalletError::KeysExhausted);
        }
        let child_number = ChildNumber::new(index, false)
            .map_err(|err| WalletError::KeyDerivation(err.to_string()))?;
        let child = self
            .root
            .derive_child(child_number)
            .map_err(|err| WalletError::KeyDerivation(err.to_string()))?;
        SpendingKey::from_secret_bytes(index, child.to_bytes())
    }

    /// Derives the next address without registering it. Nothing changes
    /// until the result is passed to [`KeyChain::commit`].
    pub fn prepare_next(&self) -> Result<OwnedAddress, WalletError> {
        let key = self.derive(self.next_index)?;
        Ok(OwnedAddress {
            index: key.index(),
            address: key.address(self.network),
        })
    }

    /// Registers a prepared address and advances the index.
    pub fn commit(&mut self, owned: OwnedAddress) {
        debug_assert_eq!(owned.index, self.next_index);
        self.addrs.insert(owned.index, owned.address);
        self.next_index = owned.index + 1;
    }

    /// Re-derives the key of an issued index.
    pub fn spending_key(&self, index: u32) -> Result<SpendingKey, WalletError> {
        if !self.addrs.contains_key(&index) {
            return Err(WalletError::UnknownKeyIndex(index));
        }
        self.derive(index)
    }

    pub fn address(&self, index: u32) -> Option<Address> {
        self.addrs.get(&index).copied()
    }

    pub fn coinbase_address(&self) -> Address {
        self.addrs[&COINBASE_KEY_INDEX]
    }

    /// All issued addresses, lowest index first.
    pub fn addresses(&self) -> Vec<Address> {
        self.addrs.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// The lowest owned index whose address hash occurs anywhere in `script`.
    pub fn owner_of(&self, script: &[u8]) -> Option<u32> {
        self.addrs
            .iter()
            .find(|(_, address)| script_contains(script, &address.script_address()))
            .map(|(index, _)| *index)
    }

    #[cfg(test)]
    pub(crate) fn set_next_index(&mut self, index: u32) {
        self.next_index = index;
    }
}

fn secp() -> &'static Secp256k1<secp256k1::All> {
    static SECP: OnceLock<Secp256k1<secp256k1::All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}
