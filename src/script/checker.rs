//! Signature verification delegate.
//!
//! The script engine never does elliptic-curve math itself. `OP_CHECKSIG`
//! and friends hash the transaction and hand the digest, the DER signature
//! and the public key to a [`SignatureChecker`].

use crate::primitives::hash::Hash256;
use crate::types::VerifyFlags;
use crate::{DogeError, Result};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly};
use std::sync::{Arc, OnceLock};

/// Verifies an ECDSA signature over a 32-byte digest.
pub trait SignatureChecker: Send + Sync {
    /// Returns `Ok(false)` for signatures that simply do not verify, including
    /// ones that cannot be parsed. Errors are reserved for failures of the
    /// delegate itself.
    fn verify_ecdsa(&self, digest: &Hash256, signature_der: &[u8], public_key: &[u8], flags: &VerifyFlags) -> Result<bool>;
}

/// [`SignatureChecker`] backed by libsecp256k1.
pub struct Secp256k1Checker {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Checker {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }

    /// Process-wide instance; the verification context is immutable.
    pub fn shared() -> Arc<dyn SignatureChecker> {
        static SHARED: OnceLock<Arc<Secp256k1Checker>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Secp256k1Checker::new())).clone()
    }
}

impl Default for Secp256k1Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureChecker for Secp256k1Checker {
    fn verify_ecdsa(&self, digest: &Hash256, signature_der: &[u8], public_key: &[u8], _flags: &VerifyFlags) -> Result<bool> {
        let public_key = match PublicKey::from_slice(public_key) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        let mut signature = match Signature::from_der_lax(signature_der) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        // libsecp256k1 only accepts low-S; high-S is rejected earlier when the flag asks for it.
        signature.normalize_s();

        let message = Message::from_digest(*digest);
        Ok(self.secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }
}

/// Strict DER encoding check (BIP66) over a signature that still carries its
/// trailing hash-type byte.
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

/// True when the S value of a DER signature (without hash-type byte) is in
/// the lower half of the curve order.
pub fn is_low_der_signature(signature_der: &[u8]) -> bool {
    match Signature::from_der_lax(signature_der) {
        Ok(signature) => {
            let mut normalized = signature;
            normalized.normalize_s();
            normalized == signature
        }
        Err(_) => false,
    }
}

pub fn is_defined_hash_type(sig: &[u8]) -> bool {
    match sig.last() {
        Some(&hash_type) => {
            let base = hash_type & !0x80;
            (0x01..=0x03).contains(&base)
        }
        None => false,
    }
}

/// SEC1 compressed (33 bytes) or uncompressed (65 bytes) public key shape.
pub fn is_valid_public_key_encoding(public_key: &[u8]) -> bool {
    match public_key.first() {
        Some(0x02) | Some(0x03) => public_key.len() == 33,
        Some(0x04) => public_key.len() == 65,
        _ => false,
    }
}

/// Encoding rules applied before a signature reaches the delegate. An empty
/// signature is always allowed: it is the compact way to provide a failing one.
pub fn check_signature_encoding(sig: &[u8], flags: &VerifyFlags) -> Result<()> {
    if sig.is_empty() {
        return Ok(());
    }
    if (flags.strict_encoding || flags.low_s) && !is_valid_signature_encoding(sig) {
        return Err(DogeError::crypto("Signature is not strict DER"));
    }
    if flags.low_s && !is_low_der_signature(&sig[..sig.len() - 1]) {
        return Err(DogeError::crypto("Signature S value is not low"));
    }
    if flags.strict_encoding && !is_defined_hash_type(sig) {
        return Err(DogeError::crypto("Signature hash type is undefined"));
    }
    Ok(())
}

pub fn check_public_key_encoding(public_key: &[u8], flags: &VerifyFlags) -> Result<()> {
    if flags.strict_encoding && !is_valid_public_key_encoding(public_key) {
        return Err(DogeError::crypto("Public key is not a valid SEC encoding"));
    }
    Ok(())
}
