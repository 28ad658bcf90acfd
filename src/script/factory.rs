//! Builders for standard and contract locking scripts.
//!
//! Every builder is pure: the current time, where one matters, is passed in
//! by the caller. Invalid inputs are reported as [`DogeError::Construction`].

use super::opcode::Opcode;
use super::program::Script;
use crate::primitives::address::{Address, AddressKind};
use crate::primitives::hash::{hash160, sha256};
use crate::{DogeError, Result};

/// Hash used by the reveal branch of a hashed time-locked contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashOperator {
    Sha256,
    Hash160,
}

impl HashOperator {
    pub fn opcode(self) -> Opcode {
        match self {
            HashOperator::Sha256 => Opcode::OP_SHA256,
            HashOperator::Hash160 => Opcode::OP_HASH160,
        }
    }

    /// Digest length in bytes.
    pub fn hash_size(self) -> usize {
        match self {
            HashOperator::Sha256 => 32,
            HashOperator::Hash160 => 20,
        }
    }

    pub fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashOperator::Sha256 => sha256(data).to_vec(),
            HashOperator::Hash160 => hash160(data).to_vec(),
        }
    }
}

/// Re-tag a script builder failure as a template construction failure.
fn construction(error: DogeError) -> DogeError {
    match error {
        DogeError::Construction(_) => error,
        other => DogeError::Construction(other.to_string()),
    }
}

/// Only pay-to-pubkey-hash addresses can be spent with `<sig> <pubkey>`.
fn require_pubkey_hash(address: &Address) -> Result<()> {
    if address.kind != AddressKind::PubkeyHash {
        return Err(DogeError::Construction(format!(
            "{} is not a pay-to-pubkey-hash address",
            address
        )));
    }
    Ok(())
}

pub mod standard {
    use super::*;
    use secp256k1::PublicKey;

    /// `<pubkey> OP_CHECKSIG`
    pub fn p2pk(public_key: &PublicKey) -> Result<Script> {
        Script::new()
            .append_data(&public_key.serialize())
            .and_then(|script| script.append(Opcode::OP_CHECKSIG))
            .map_err(construction)
    }

    /// `OP_DUP OP_HASH160 <key hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh(address: &Address) -> Result<Script> {
        require_pubkey_hash(address)?;
        Ok(Script::new_p2pkh(&address.hash))
    }

    /// Wrap `script` in the pay-to-script-hash template.
    pub fn p2sh(script: &Script) -> Script {
        script.to_p2sh()
    }

    /// `required`-of-N multisig over compressed keys.
    pub fn multisig(public_keys: &[PublicKey], required: usize) -> Result<Script> {
        let serialized: Vec<[u8; 33]> = public_keys.iter().map(PublicKey::serialize).collect();
        Script::multisig(&serialized, required).map_err(construction)
    }

    /// N-of-N multisig.
    pub fn multisig_all(public_keys: &[PublicKey]) -> Result<Script> {
        multisig(public_keys, public_keys.len())
    }
}

pub mod lock_time {
    use super::*;

    /// `<lock_time> OP_CHECKLOCKTIMEVERIFY OP_DROP <script>`
    pub fn build(script: &Script, lock_time: u32) -> Result<Script> {
        Script::new()
            .append_num(lock_time as i64)
            .and_then(|s| s.append(Opcode::OP_CHECKLOCKTIMEVERIFY))
            .and_then(|s| s.append(Opcode::OP_DROP))
            .and_then(|s| s.append_script(script))
            .map_err(construction)
    }

    /// Lock `script` until `interval` seconds after the unix time `now`.
    pub fn build_after(script: &Script, now: u32, interval: u32) -> Result<Script> {
        build(script, unlock_time(now, interval)?)
    }

    /// P2PKH output for `address` that cannot be spent before `lock_time`.
    pub fn build_for_address(address: &Address, lock_time: u32) -> Result<Script> {
        build(&super::standard::p2pkh(address)?, lock_time)
    }

    pub fn build_for_address_after(address: &Address, now: u32, interval: u32) -> Result<Script> {
        build(&super::standard::p2pkh(address)?, unlock_time(now, interval)?)
    }

    pub(super) fn unlock_time(now: u32, interval: u32) -> Result<u32> {
        now.checked_add(interval)
            .ok_or_else(|| DogeError::construction("Lock time overflows a 32-bit timestamp"))
    }
}

pub mod op_return {
    use super::*;

    /// Largest payload accepted in a data-carrier output.
    pub const MAX_OP_RETURN_DATA_SIZE: usize = 220;

    /// `OP_RETURN <data>`
    pub fn build(data: &[u8]) -> Result<Script> {
        if data.len() > MAX_OP_RETURN_DATA_SIZE {
            return Err(DogeError::Construction(format!(
                "OP_RETURN payload of {} bytes exceeds {} bytes",
                data.len(),
                MAX_OP_RETURN_DATA_SIZE
            )));
        }
        Script::new()
            .append(Opcode::OP_RETURN)
            .and_then(|s| s.append_data(data))
            .map_err(construction)
    }

    pub fn build_text(text: &str) -> Result<Script> {
        build(text.as_bytes())
    }
}

pub mod condition {
    use super::*;

    /// Combine `scripts` into one script satisfied by any of them.
    ///
    /// Scripts are paired into `OP_IF a OP_ELSE b OP_ENDIF` level by level;
    /// an unpaired script at the end of a level becomes `OP_DROP s`, so the
    /// spender still supplies one selector per level.
    pub fn build(scripts: &[Script]) -> Result<Script> {
        if scripts.is_empty() {
            return Err(DogeError::construction("At least one script is required"));
        }

        let mut level: Vec<Script> = scripts.to_vec();
        while level.len() > 1 {
            let mut next = Vec::with_capacity((level.len() + 1) / 2);
            for pair in level.chunks(2) {
                let combined = match pair {
                    [a, b] => Script::new()
                        .append(Opcode::OP_IF)
                        .and_then(|s| s.append_script(a))
                        .and_then(|s| s.append(Opcode::OP_ELSE))
                        .and_then(|s| s.append_script(b))
                        .and_then(|s| s.append(Opcode::OP_ENDIF)),
                    [last] => Script::new()
                        .append(Opcode::OP_DROP)
                        .and_then(|s| s.append_script(last)),
                    _ => unreachable!("chunks(2) yields one or two scripts"),
                };
                next.push(combined.map_err(construction)?);
            }
            level = next;
        }
        Ok(level.remove(0))
    }
}

/// Hashed time-locked contracts:
///
/// ```text
/// OP_IF
///     <hash op> <digest> OP_EQUALVERIFY OP_DUP OP_HASH160 <recipient key hash>
/// OP_ELSE
///     <lock time> OP_CHECKLOCKTIMEVERIFY OP_DROP OP_DUP OP_HASH160 <sender key hash>
/// OP_ENDIF
/// OP_EQUALVERIFY OP_CHECKSIG
/// ```
pub mod htlc {
    use super::*;

    pub fn build(
        recipient: &Address,
        sender: &Address,
        lock_time: u32,
        digest: &[u8],
        hash_op: HashOperator,
    ) -> Result<Script> {
        if digest.len() != hash_op.hash_size() {
            return Err(DogeError::Construction(format!(
                "{:?} digest must be {} bytes, got {}",
                hash_op,
                hash_op.hash_size(),
                digest.len()
            )));
        }
        require_pubkey_hash(recipient)?;
        require_pubkey_hash(sender)?;

        Script::new()
            .append(Opcode::OP_IF)
            .and_then(|s| s.append(hash_op.opcode()))
            .and_then(|s| s.append_data(digest))
            .and_then(|s| s.append(Opcode::OP_EQUALVERIFY))
            .and_then(|s| s.append(Opcode::OP_DUP))
            .and_then(|s| s.append(Opcode::OP_HASH160))
            .and_then(|s| s.append_data(&recipient.hash))
            .and_then(|s| s.append(Opcode::OP_ELSE))
            .and_then(|s| s.append_num(lock_time as i64))
            .and_then(|s| s.append(Opcode::OP_CHECKLOCKTIMEVERIFY))
            .and_then(|s| s.append(Opcode::OP_DROP))
            .and_then(|s| s.append(Opcode::OP_DUP))
            .and_then(|s| s.append(Opcode::OP_HASH160))
            .and_then(|s| s.append_data(&sender.hash))
            .and_then(|s| s.append(Opcode::OP_ENDIF))
            .and_then(|s| s.append(Opcode::OP_EQUALVERIFY))
            .and_then(|s| s.append(Opcode::OP_CHECKSIG))
            .map_err(construction)
    }

    /// Like [`build`], committing to `hash_op` applied to `secret`.
    pub fn build_with_secret(
        recipient: &Address,
        sender: &Address,
        lock_time: u32,
        secret: &[u8],
        hash_op: HashOperator,
    ) -> Result<Script> {
        build(recipient, sender, lock_time, &hash_op.hash(secret), hash_op)
    }

    pub fn build_after(
        recipient: &Address,
        sender: &Address,
        now: u32,
        interval: u32,
        digest: &[u8],
        hash_op: HashOperator,
    ) -> Result<Script> {
        build(recipient, sender, super::lock_time::unlock_time(now, interval)?, digest, hash_op)
    }
}
