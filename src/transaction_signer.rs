//! Transaction signing and the unlocking scripts that carry signatures.

use crate::primitives::address::{Address, Network};
use crate::primitives::hash::Hash256;
use crate::primitives::transaction::{SigHashType, Transaction, TxOut};
use crate::script::{Opcode, Script};
use crate::{DogeError, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

/// Signing key information
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub private_key: SecretKey,
    pub public_key: PublicKey,
}

impl SigningKey {
    /// Create a new signing key from a private key
    pub fn new(private_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &private_key);
        Self { private_key, public_key }
    }

    /// Create a signing key from 32 secret bytes.
    pub fn from_slice(secret: &[u8]) -> Result<Self> {
        let private_key = SecretKey::from_slice(secret)
            .map_err(|e| DogeError::InvalidInput(format!("Invalid private key: {}", e)))?;
        Ok(Self::new(private_key))
    }

    /// Compressed SEC encoding of the public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }
}

/// Produces legacy signatures and the unlocking scripts for standard templates.
pub struct TransactionSigner {
    network: Network,
    secp: Secp256k1<secp256k1::All>,
}

impl TransactionSigner {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: Secp256k1::new(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// P2PKH address of `key` on this signer's network.
    pub fn address(&self, key: &SigningKey) -> Address {
        Address::from_public_key(&key.public_key, self.network)
    }

    /// Sign input `input_index` against `script_code`.
    ///
    /// Returns the DER signature followed by the hash-type byte, ready to be
    /// pushed by an unlocking script.
    pub fn sign_input(
        &self,
        transaction: &Transaction,
        input_index: usize,
        script_code: &Script,
        key: &SigningKey,
        sighash_type: SigHashType,
    ) -> Result<Vec<u8>> {
        let digest = transaction.signature_hash(input_index, script_code, sighash_type.as_u8() as u32)?;
        let signature = self.sign_hash(&digest, &key.private_key);

        let mut encoded = signature.serialize_der().to_vec();
        encoded.push(sighash_type.as_u8());
        log::trace!("Signed input {} with {:?}", input_index, sighash_type);
        Ok(encoded)
    }

    /// Sign a P2PKH input in place: `<sig> <pubkey>`.
    pub fn sign_p2pkh(
        &self,
        transaction: &mut Transaction,
        input_index: usize,
        prev_output: &TxOut,
        key: &SigningKey,
        sighash_type: SigHashType,
    ) -> Result<()> {
        let lock_script = prev_output.lock_script()?;
        if !lock_script.is_pay_to_pubkey_hash() {
            return Err(DogeError::invalid_input("Previous output is not pay-to-pubkey-hash"));
        }
        let signature = self.sign_input(transaction, input_index, &lock_script, key, sighash_type)?;
        let unlock_script = Self::p2pkh_unlock_script(&signature, &key.public_key_bytes())?;
        transaction.input[input_index].script_sig = unlock_script.to_bytes();
        Ok(())
    }

    /// Sign a P2SH multisig input in place with `keys`, which must be listed
    /// in the same order as their public keys appear in `redeem_script`.
    pub fn sign_p2sh_multisig(
        &self,
        transaction: &mut Transaction,
        input_index: usize,
        redeem_script: &Script,
        keys: &[SigningKey],
        sighash_type: SigHashType,
    ) -> Result<()> {
        let (required, _) = redeem_script
            .multisig_params()
            .ok_or_else(|| DogeError::invalid_input("Redeem script is not a multisig script"))?;
        if keys.len() < required {
            return Err(DogeError::InvalidInput(format!(
                "{} signatures required, {} keys supplied",
                required,
                keys.len()
            )));
        }

        let mut signatures = Vec::with_capacity(required);
        for key in &keys[..required] {
            signatures.push(self.sign_input(transaction, input_index, redeem_script, key, sighash_type)?);
        }
        let unlock_script = Self::p2sh_multisig_unlock_script(&signatures, redeem_script)?;
        transaction.input[input_index].script_sig = unlock_script.to_bytes();
        Ok(())
    }

    /// `<sig> <pubkey>`
    pub fn p2pkh_unlock_script(signature: &[u8], public_key: &[u8]) -> Result<Script> {
        Script::new().append_data(signature)?.append_data(public_key)
    }

    /// `OP_0 <sig>... <redeem script>`; the leading `OP_0` is the element
    /// `OP_CHECKMULTISIG` consumes beyond its signatures.
    pub fn p2sh_multisig_unlock_script<S: AsRef<[u8]>>(signatures: &[S], redeem_script: &Script) -> Result<Script> {
        let mut script = Script::new().append(Opcode::OP_0)?;
        for signature in signatures {
            script = script.append_data(signature.as_ref())?;
        }
        script.append_data(redeem_script.as_bytes())
    }

    /// Hash-reveal branch of an HTLC: `<sig> <pubkey> <secret> OP_1`.
    pub fn htlc_redeem_script(signature: &[u8], public_key: &[u8], secret: &[u8]) -> Result<Script> {
        Self::p2pkh_unlock_script(signature, public_key)?
            .append_data(secret)?
            .append(Opcode::OP_1)
    }

    /// Timeout branch of an HTLC: `<sig> <pubkey> OP_0`.
    pub fn htlc_refund_script(signature: &[u8], public_key: &[u8]) -> Result<Script> {
        Self::p2pkh_unlock_script(signature, public_key)?.append(Opcode::OP_0)
    }

    fn sign_hash(&self, hash: &Hash256, private_key: &SecretKey) -> Signature {
        self.secp.sign_ecdsa(&Message::from_digest(*hash), private_key)
    }
}
