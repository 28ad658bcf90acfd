//! Dogecoin transaction data structures.
//!
//! Only the fields the script engine needs are modelled: outpoints, script
//! bytes, values, sequence numbers and the lock time. Script bytes are stored
//! raw so that any transaction read off the wire can be represented; they are
//! parsed into [`Script`] at verification time.

use super::encode::{write_bytes, Decodable, Encodable};
use super::hash::{sha256d, Hash256};
use crate::script::{Opcode, Script};
use crate::{DogeError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Sequence number that marks an input as final.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Lock times below this value are block heights, above it unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Signature hash types for legacy transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigHashType {
    /// Sign all inputs and outputs
    All = 0x01,
    /// Sign all inputs, no outputs
    None = 0x02,
    /// Sign all inputs, only the output with the same index
    Single = 0x03,
    /// Sign all inputs and outputs, anyone can add inputs
    AllPlusAnyoneCanPay = 0x81,
    /// Sign all inputs, no outputs, anyone can add inputs
    NonePlusAnyoneCanPay = 0x82,
    /// Sign all inputs, only matching output, anyone can add inputs
    SinglePlusAnyoneCanPay = 0x83,
}

impl Default for SigHashType {
    fn default() -> Self {
        SigHashType::All
    }
}

impl SigHashType {
    pub const ANYONE_CAN_PAY: u32 = 0x80;

    /// Get the byte value of the signature hash type
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Map a raw hash-type byte onto a defined type, if it is one.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(SigHashType::All),
            0x02 => Some(SigHashType::None),
            0x03 => Some(SigHashType::Single),
            0x81 => Some(SigHashType::AllPlusAnyoneCanPay),
            0x82 => Some(SigHashType::NonePlusAnyoneCanPay),
            0x83 => Some(SigHashType::SinglePlusAnyoneCanPay),
            _ => None,
        }
    }

    /// Check if this sighash type uses ANYONECANPAY
    pub fn is_anyone_can_pay(self) -> bool {
        matches!(
            self,
            SigHashType::AllPlusAnyoneCanPay
                | SigHashType::NonePlusAnyoneCanPay
                | SigHashType::SinglePlusAnyoneCanPay
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl Encodable for OutPoint {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.txid.consensus_encode(writer)?;
        written += self.vout.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for OutPoint {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(OutPoint {
            txid: <[u8; 32]>::consensus_decode(reader)?,
            vout: u32::consensus_decode(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    #[serde(with = "hex_bytes")]
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// Parse the unlocking script carried by this input.
    pub fn unlock_script(&self) -> Result<Script> {
        Script::parse(&self.script_sig)
    }
}

impl Encodable for TxIn {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.previous_output.consensus_encode(writer)?;
        written += self.script_sig.consensus_encode(writer)?;
        written += self.sequence.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for TxIn {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxIn {
            previous_output: OutPoint::consensus_decode(reader)?,
            script_sig: Vec::<u8>::consensus_decode(reader)?,
            sequence: u32::consensus_decode(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    #[serde(with = "hex_bytes")]
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script: &Script) -> Self {
        TxOut {
            value,
            script_pubkey: script.to_bytes(),
        }
    }

    /// Parse the locking script carried by this output.
    pub fn lock_script(&self) -> Result<Script> {
        Script::parse(&self.script_pubkey)
    }
}

impl Encodable for TxOut {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.value.consensus_encode(writer)?;
        written += self.script_pubkey.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for TxOut {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxOut {
            value: u64::consensus_decode(reader)?,
            script_pubkey: Vec::<u8>::consensus_decode(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub lock_time: u32,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
}

impl Encodable for Transaction {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.version.consensus_encode(writer)?;
        written += self.input.consensus_encode(writer)?;
        written += self.output.consensus_encode(writer)?;
        written += self.lock_time.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for Transaction {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let version = i32::consensus_decode(reader)?;
        let input = Vec::<TxIn>::consensus_decode(reader)?;
        let output = Vec::<TxOut>::consensus_decode(reader)?;
        let lock_time = u32::consensus_decode(reader)?;
        Ok(Transaction {
            version,
            lock_time,
            input,
            output,
        })
    }
}

impl Transaction {
    /// Double-SHA256 of the serialized transaction, in internal byte order.
    pub fn txid(&self) -> Result<Hash256> {
        Ok(sha256d(&self.consensus_encode_to_vec()?))
    }

    /// Legacy signature hash of input `input_index` against `script_code`.
    ///
    /// `hash_type` is the raw value taken from the signature, so undefined
    /// types hash exactly as the network does. `OP_CODESEPARATOR`s are
    /// stripped from the script code before it is committed to.
    pub fn signature_hash(
        &self,
        input_index: usize,
        script_code: &Script,
        hash_type: u32,
    ) -> Result<Hash256> {
        if input_index >= self.input.len() {
            return Err(DogeError::InvalidInput(format!(
                "Input index {} out of range for {} inputs",
                input_index,
                self.input.len()
            )));
        }

        let base_type = hash_type & 0x1f;
        let anyone_can_pay = hash_type & SigHashType::ANYONE_CAN_PAY != 0;

        if base_type == SigHashType::Single as u32 && input_index >= self.output.len() {
            // Historical quirk: signing a missing output commits to the number one.
            let mut one = [0u8; 32];
            one[0] = 1;
            return Ok(one);
        }

        let mut tx_copy = self.clone();
        let script_bytes = script_code.without_opcode(Opcode::OP_CODESEPARATOR).to_bytes();

        // Clear all input scripts and set the one being signed
        for input in &mut tx_copy.input {
            input.script_sig = Vec::new();
        }
        tx_copy.input[input_index].script_sig = script_bytes;

        if base_type == SigHashType::None as u32 {
            tx_copy.output.clear();
        } else if base_type == SigHashType::Single as u32 {
            tx_copy.output.truncate(input_index + 1);
            for output in tx_copy.output.iter_mut().take(input_index) {
                output.value = u64::MAX;
                output.script_pubkey = Vec::new();
            }
        }

        if base_type == SigHashType::None as u32 || base_type == SigHashType::Single as u32 {
            for (i, input) in tx_copy.input.iter_mut().enumerate() {
                if i != input_index {
                    input.sequence = 0;
                }
            }
        }

        if anyone_can_pay {
            let input = tx_copy.input[input_index].clone();
            tx_copy.input = vec![input];
        }

        let mut serialized = tx_copy.consensus_encode_to_vec()?;
        write_bytes(&mut serialized, &hash_type.to_le_bytes())?;
        Ok(sha256d(&serialized))
    }
}

/// Serde adapter storing raw script bytes as hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
