//! Script container: parsing, serialization, builders and template shapes.

use super::num::encode_num;
use super::opcode::Opcode;
use super::{MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STANDARD_MULTISIG_KEYS};
use crate::primitives::address::{Address, AddressKind};
use crate::primitives::hash::{hash160, Hash160};
use crate::{DogeError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Script instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push data onto the stack (`OP_0`, direct pushes and `OP_PUSHDATA1/2/4`)
    PushBytes(Vec<u8>),
    /// Execute an opcode
    Op(Opcode),
    /// A byte with no assigned opcode
    Invalid(u8),
}

impl Instruction {
    /// True for instructions allowed in a push-only script: data pushes and
    /// any opcode up to `OP_16`, `OP_RESERVED` included.
    ///
    /// [`Opcode::is_push`] classifies by family instead and rejects `OP_RESERVED`.
    pub fn is_push(&self) -> bool {
        match self {
            Instruction::PushBytes(_) => true,
            Instruction::Op(op) => op.value() <= Opcode::OP_16.value(),
            Instruction::Invalid(_) => false,
        }
    }
}

/// A parsed script.
///
/// The raw bytes are kept next to the decoded instructions so serialization
/// is always byte-exact, including non-minimal push encodings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    bytes: Vec<u8>,
    instructions: Vec<Instruction>,
    offsets: Vec<usize>,
}

impl Script {
    /// Create a new empty script
    pub fn new() -> Self {
        Script::default()
    }

    /// Decode `bytes` into instructions.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_SCRIPT_SIZE {
            return Err(DogeError::Structural(format!(
                "Script of {} bytes exceeds the {} byte maximum",
                bytes.len(),
                MAX_SCRIPT_SIZE
            )));
        }

        let mut script = Script::new();
        let mut i = 0;
        while i < bytes.len() {
            let start = i;
            let code = bytes[i];
            i += 1;

            let push_len = match code {
                0x00..=0x4b => Some(code as usize),
                0x4c => Some(read_push_length(bytes, &mut i, 1)?),
                0x4d => Some(read_push_length(bytes, &mut i, 2)?),
                0x4e => Some(read_push_length(bytes, &mut i, 4)?),
                _ => None,
            };

            let instruction = match push_len {
                Some(len) => {
                    if bytes.len() - i < len {
                        return Err(DogeError::structural("Script truncated inside push data"));
                    }
                    let data = bytes[i..i + len].to_vec();
                    i += len;
                    Instruction::PushBytes(data)
                }
                None => match Opcode::from_u8(code) {
                    Some(op) => Instruction::Op(op),
                    None => Instruction::Invalid(code),
                },
            };
            script.push_raw(instruction, &bytes[start..i]);
        }
        Ok(script)
    }

    /// Get the script bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    // Builders

    /// Append a bare opcode. Push-data prefixes need a payload; use
    /// [`Script::append_data`] for those.
    pub fn append(mut self, op: Opcode) -> Result<Self> {
        if matches!(op, Opcode::OP_PUSHDATA1 | Opcode::OP_PUSHDATA2 | Opcode::OP_PUSHDATA4) {
            return Err(DogeError::Structural(format!(
                "{} cannot be appended without its payload",
                op.name()
            )));
        }
        self.check_room(1)?;
        self.push_op(op);
        Ok(self)
    }

    /// Append a minimal push of `data`.
    pub fn append_data(mut self, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(DogeError::Structural(format!(
                "Push of {} bytes exceeds the {} byte maximum",
                data.len(),
                MAX_SCRIPT_ELEMENT_SIZE
            )));
        }
        let encoded = encode_push(data);
        self.check_room(encoded.len())?;
        self.push_raw(Instruction::PushBytes(data.to_vec()), &encoded);
        Ok(self)
    }

    /// Append a number, using `OP_1NEGATE`/`OP_0`..`OP_16` where possible.
    pub fn append_num(self, value: i64) -> Result<Self> {
        match value {
            -1 => self.append(Opcode::OP_1NEGATE),
            0..=16 => match Opcode::small_int(value as usize) {
                Some(op) => self.append(op),
                None => Err(DogeError::Structural(format!("No small integer opcode for {}", value))),
            },
            _ => self.append_data(&encode_num(value)),
        }
    }

    pub fn append_script(mut self, other: &Script) -> Result<Self> {
        self.check_room(other.len())?;
        for (index, instruction) in other.instructions.iter().enumerate() {
            self.push_raw(instruction.clone(), other.instruction_bytes(index));
        }
        Ok(self)
    }

    // Rewriting

    /// The script from instruction `index` onwards.
    pub(crate) fn subscript_from(&self, index: usize) -> Script {
        if index >= self.instructions.len() {
            return Script::new();
        }
        let base = self.offsets[index];
        Script {
            bytes: self.bytes[base..].to_vec(),
            instructions: self.instructions[index..].to_vec(),
            offsets: self.offsets[index..].iter().map(|offset| offset - base).collect(),
        }
    }

    /// Copy of the script with every `op` removed.
    pub fn without_opcode(&self, op: Opcode) -> Script {
        self.filtered(|instruction, _| *instruction != Instruction::Op(op))
    }

    /// Copy of the script with every push of exactly `data` removed.
    pub fn find_and_delete(&self, data: &[u8]) -> Script {
        let needle = encode_push(data);
        self.filtered(|_, raw| raw != needle.as_slice())
    }

    fn filtered<F>(&self, keep: F) -> Script
    where
        F: Fn(&Instruction, &[u8]) -> bool,
    {
        let mut script = Script::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            let raw = self.instruction_bytes(index);
            if keep(instruction, raw) {
                script.push_raw(instruction.clone(), raw);
            }
        }
        script
    }

    // Templates

    /// Create a P2PKH script for the given hash160
    pub fn new_p2pkh(hash160: &Hash160) -> Self {
        let mut script = Script::new();
        script.push_op(Opcode::OP_DUP);
        script.push_op(Opcode::OP_HASH160);
        script.push_raw(Instruction::PushBytes(hash160.to_vec()), &encode_push(hash160));
        script.push_op(Opcode::OP_EQUALVERIFY);
        script.push_op(Opcode::OP_CHECKSIG);
        script
    }

    /// Create a P2SH script for the given hash160
    pub fn new_p2sh(hash160: &Hash160) -> Self {
        let mut script = Script::new();
        script.push_op(Opcode::OP_HASH160);
        script.push_raw(Instruction::PushBytes(hash160.to_vec()), &encode_push(hash160));
        script.push_op(Opcode::OP_EQUAL);
        script
    }

    /// The standard locking script for `address`: P2PKH or P2SH by its kind.
    pub fn pay_to_address(address: &Address) -> Self {
        address.script_pubkey()
    }

    /// P2PKH script for a decoded 21-byte address payload. Script-hash
    /// payloads are rejected.
    pub fn from_address_payload(payload: &[u8]) -> Result<Self> {
        let address = Address::from_payload(payload)?;
        if address.kind != AddressKind::PubkeyHash {
            return Err(DogeError::Construction(format!(
                "{} is not a pay-to-pubkey-hash address",
                address
            )));
        }
        Ok(Script::new_p2pkh(&address.hash))
    }

    /// `OP_m <key>... OP_n OP_CHECKMULTISIG`
    pub fn multisig<K: AsRef<[u8]>>(public_keys: &[K], required: usize) -> Result<Self> {
        let count = public_keys.len();
        if required == 0 || required > count || count > MAX_STANDARD_MULTISIG_KEYS {
            return Err(DogeError::Construction(format!(
                "Invalid multisig threshold {} of {} keys (at most {})",
                required, count, MAX_STANDARD_MULTISIG_KEYS
            )));
        }

        let mut script = Script::new().append_num(required as i64)?;
        for key in public_keys {
            script = script.append_data(key.as_ref())?;
        }
        script
            .append_num(count as i64)?
            .append(Opcode::OP_CHECKMULTISIG)
    }

    // Shapes

    /// Check if this is a P2PKH script pattern
    pub fn is_pay_to_pubkey_hash(&self) -> bool {
        self.bytes.len() == 25
            && self.bytes[0] == Opcode::OP_DUP.value()
            && self.bytes[1] == Opcode::OP_HASH160.value()
            && self.bytes[2] == 0x14
            && self.bytes[23] == Opcode::OP_EQUALVERIFY.value()
            && self.bytes[24] == Opcode::OP_CHECKSIG.value()
    }

    /// Check if this is the canonical `OP_HASH160 <20 bytes> OP_EQUAL` shape
    pub fn is_pay_to_script_hash(&self) -> bool {
        self.bytes.len() == 23
            && self.bytes[0] == Opcode::OP_HASH160.value()
            && self.bytes[1] == 0x14
            && self.bytes[22] == Opcode::OP_EQUAL.value()
    }

    /// True when the script contains nothing but pushes.
    pub fn is_data_only(&self) -> bool {
        self.instructions.iter().all(Instruction::is_push)
    }

    pub fn is_op_return(&self) -> bool {
        self.bytes.first() == Some(&Opcode::OP_RETURN.value())
    }

    pub fn is_multisig(&self) -> bool {
        self.multisig_params().is_some()
    }

    /// Threshold and public keys of a standard multisig script.
    pub fn multisig_params(&self) -> Option<(usize, Vec<Vec<u8>>)> {
        let (last, rest) = self.instructions.split_last()?;
        if *last != Instruction::Op(Opcode::OP_CHECKMULTISIG) || rest.len() < 3 {
            return None;
        }
        let required = small_int_of(&rest[0])?;
        let count = small_int_of(&rest[rest.len() - 1])?;
        let keys = &rest[1..rest.len() - 1];
        if required == 0 || required > count || count != keys.len() {
            return None;
        }

        let mut public_keys = Vec::with_capacity(keys.len());
        for key in keys {
            match key {
                Instruction::PushBytes(data) if !data.is_empty() => public_keys.push(data.clone()),
                _ => return None,
            }
        }
        Some((required, public_keys))
    }

    /// Extract the hash160 from a P2PKH or P2SH script
    pub fn extract_hash160(&self) -> Option<Hash160> {
        let range = if self.is_pay_to_pubkey_hash() {
            3..23
        } else if self.is_pay_to_script_hash() {
            2..22
        } else {
            return None;
        };
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.bytes[range]);
        Some(hash)
    }

    /// HASH160 of the serialized script.
    pub fn script_hash(&self) -> Hash160 {
        hash160(&self.bytes)
    }

    /// The P2SH locking script committing to this script.
    pub fn to_p2sh(&self) -> Script {
        Script::new_p2sh(&self.script_hash())
    }

    /// Parse the assembly form produced by `Display`.
    pub fn from_asm(asm: &str) -> Result<Self> {
        let mut script = Script::new();
        for token in asm.split_whitespace() {
            if token == "0" {
                script = script.append(Opcode::OP_0)?;
            } else if token.starts_with("OP_") {
                let op = Opcode::from_name(token)
                    .ok_or_else(|| DogeError::InvalidInput(format!("Unknown opcode {}", token)))?;
                script = script.append(op)?;
            } else {
                script = script.append_data(&hex::decode(token)?)?;
            }
        }
        Ok(script)
    }

    fn instruction_bytes(&self, index: usize) -> &[u8] {
        let start = self.offsets[index];
        let end = self.offsets.get(index + 1).copied().unwrap_or(self.bytes.len());
        &self.bytes[start..end]
    }

    fn check_room(&self, extra: usize) -> Result<()> {
        if self.bytes.len() + extra > MAX_SCRIPT_SIZE {
            return Err(DogeError::Structural(format!(
                "Script would exceed the {} byte maximum",
                MAX_SCRIPT_SIZE
            )));
        }
        Ok(())
    }

    fn push_op(&mut self, op: Opcode) {
        let instruction = if op == Opcode::OP_0 {
            Instruction::PushBytes(Vec::new())
        } else {
            Instruction::Op(op)
        };
        self.push_raw(instruction, &[op.value()]);
    }

    fn push_raw(&mut self, instruction: Instruction, encoded: &[u8]) {
        self.offsets.push(self.bytes.len());
        self.bytes.extend_from_slice(encoded);
        self.instructions.push(instruction);
    }
}

fn read_push_length(bytes: &[u8], pos: &mut usize, width: usize) -> Result<usize> {
    if bytes.len() - *pos < width {
        return Err(DogeError::structural("Script truncated inside push length"));
    }
    let mut len = 0usize;
    for (shift, byte) in bytes[*pos..*pos + width].iter().enumerate() {
        len |= (*byte as usize) << (8 * shift);
    }
    *pos += width;
    Ok(len)
}

/// Minimal serialized push of `data`.
fn encode_push(data: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(data.len() + 5);
    match data.len() {
        len if len < Opcode::OP_PUSHDATA1.value() as usize => encoded.push(len as u8),
        len if len <= 0xff => {
            encoded.push(Opcode::OP_PUSHDATA1.value());
            encoded.push(len as u8);
        }
        len if len <= 0xffff => {
            encoded.push(Opcode::OP_PUSHDATA2.value());
            encoded.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            encoded.push(Opcode::OP_PUSHDATA4.value());
            encoded.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    encoded.extend_from_slice(data);
    encoded
}

fn small_int_of(instruction: &Instruction) -> Option<usize> {
    match instruction {
        Instruction::PushBytes(data) if data.is_empty() => Some(0),
        Instruction::Op(op) => op.small_int_value(),
        _ => None,
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, instruction) in self.instructions.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match instruction {
                Instruction::PushBytes(data) if data.is_empty() => f.write_str("0")?,
                Instruction::PushBytes(data) => f.write_str(&hex::encode(data))?,
                Instruction::Op(op) => f.write_str(op.name())?,
                Instruction::Invalid(code) => write!(f, "OP_UNKNOWN<0x{:02x}>", code)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.bytes))
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Script::parse(&bytes).map_err(serde::de::Error::custom)
    }
}
