//! Dogecoin addresses.
//!
//! An address payload is 21 bytes: one network prefix byte followed by a
//! 20-byte HASH160 of either a public key or a redeem script.

use crate::primitives::hash::{hash160, Hash160};
use crate::script::Script;
use crate::{DogeError, Result};
use base58check::{FromBase58Check, ToBase58Check};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Length of a decoded address payload (prefix + hash).
pub const ADDRESS_PAYLOAD_LEN: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn pubkey_hash_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x1e,
            Network::Testnet => 0x71,
        }
    }

    pub fn script_hash_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x16,
            Network::Testnet => 0xc4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// Pay-to-Pubkey-Hash
    PubkeyHash,
    /// Pay-to-Script-Hash
    ScriptHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: Hash160,
}

impl Address {
    /// Address paying to the HASH160 of the given serialized public key.
    pub fn p2pkh(public_key: &[u8], network: Network) -> Self {
        Address {
            network,
            kind: AddressKind::PubkeyHash,
            hash: hash160(public_key),
        }
    }

    /// Address for a secp256k1 key in compressed form.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::p2pkh(&public_key.serialize(), network)
    }

    /// Address paying to the hash of a redeem script.
    pub fn p2sh(script: &Script, network: Network) -> Self {
        Address {
            network,
            kind: AddressKind::ScriptHash,
            hash: script.script_hash(),
        }
    }

    /// Decode a 21-byte address payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() != ADDRESS_PAYLOAD_LEN {
            return Err(DogeError::InvalidInput(format!(
                "Address payload must be {} bytes, got {}",
                ADDRESS_PAYLOAD_LEN,
                payload.len()
            )));
        }
        let (network, kind) = Self::classify_prefix(payload[0])?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(Address { network, kind, hash })
    }

    /// The 21-byte payload: prefix followed by the hash.
    pub fn payload(&self) -> [u8; ADDRESS_PAYLOAD_LEN] {
        let mut payload = [0u8; ADDRESS_PAYLOAD_LEN];
        payload[0] = self.prefix();
        payload[1..].copy_from_slice(&self.hash);
        payload
    }

    pub fn prefix(&self) -> u8 {
        match self.kind {
            AddressKind::PubkeyHash => self.network.pubkey_hash_prefix(),
            AddressKind::ScriptHash => self.network.script_hash_prefix(),
        }
    }

    /// The locking script that pays to this address.
    pub fn script_pubkey(&self) -> Script {
        match self.kind {
            AddressKind::PubkeyHash => Script::new_p2pkh(&self.hash),
            AddressKind::ScriptHash => Script::new_p2sh(&self.hash),
        }
    }

    fn classify_prefix(prefix: u8) -> Result<(Network, AddressKind)> {
        for network in [Network::Mainnet, Network::Testnet] {
            if prefix == network.pubkey_hash_prefix() {
                return Ok((network, AddressKind::PubkeyHash));
            }
            if prefix == network.script_hash_prefix() {
                return Ok((network, AddressKind::ScriptHash));
            }
        }
        Err(DogeError::InvalidInput(format!("Unknown address prefix 0x{:02x}", prefix)))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.hash.to_base58check(self.prefix()))
    }
}

impl FromStr for Address {
    type Err = DogeError;

    fn from_str(s: &str) -> Result<Self> {
        let (version, hash) = s
            .from_base58check()
            .map_err(|e| DogeError::InvalidInput(format!("Invalid base58check address: {:?}", e)))?;
        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
        payload.push(version);
        payload.extend_from_slice(&hash);
        Self::from_payload(&payload)
    }
}
