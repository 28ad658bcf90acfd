//! Mutable state for a single script verification.
//!
//! A context owns the main stack, the alternate stack and the condition
//! stack, and binds the transaction input being authorized. It is created
//! fresh for each verification and moved through the unlock, lock and
//! redeem phases by [`ScriptMachine`](super::ScriptMachine).

use super::checker::{self, Secp256k1Checker, SignatureChecker};
use super::num::{cast_to_bool, decode_num, encode_bool, encode_num};
use super::program::Script;
use crate::primitives::hash::hash160;
use crate::primitives::transaction::{Transaction, TxOut, LOCKTIME_THRESHOLD, SEQUENCE_FINAL};
use crate::types::VerifyFlags;
use crate::{DogeError, Result};
use std::sync::Arc;

/// BIP68 sequence field layout.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

pub struct ExecutionContext<'a> {
    /// Main stack; the last element is the top.
    pub stack: Vec<Vec<u8>>,
    pub alt_stack: Vec<Vec<u8>>,
    /// Truth state of every enclosing IF/NOTIF branch.
    pub condition_stack: Vec<bool>,
    pub flags: VerifyFlags,
    pub block_timestamp: Option<u32>,
    pub verbose: bool,
    transaction: Option<&'a Transaction>,
    input_index: usize,
    prev_output: Option<&'a TxOut>,
    checker: Arc<dyn SignatureChecker>,
    script: Script,
    code_start: usize,
    pc: usize,
    op_count: usize,
}

impl<'a> ExecutionContext<'a> {
    /// Bind a context to input `input_index` of `transaction`, spending `prev_output`.
    pub fn new(transaction: &'a Transaction, input_index: usize, prev_output: &'a TxOut) -> Result<Self> {
        if input_index >= transaction.input.len() {
            return Err(DogeError::InvalidInput(format!(
                "Input index {} out of range for {} inputs",
                input_index,
                transaction.input.len()
            )));
        }
        let mut context = Self::detached();
        context.transaction = Some(transaction);
        context.input_index = input_index;
        context.prev_output = Some(prev_output);
        Ok(context)
    }

    /// A context without a transaction. Signature and lock-time opcodes fail in it.
    pub fn detached() -> Self {
        ExecutionContext {
            stack: Vec::new(),
            alt_stack: Vec::new(),
            condition_stack: Vec::new(),
            flags: VerifyFlags::default(),
            block_timestamp: None,
            verbose: false,
            transaction: None,
            input_index: 0,
            prev_output: None,
            checker: Secp256k1Checker::shared(),
            script: Script::new(),
            code_start: 0,
            pc: 0,
            op_count: 0,
        }
    }

    pub fn with_flags(mut self, flags: VerifyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_block_timestamp(mut self, timestamp: u32) -> Self {
        self.block_timestamp = Some(timestamp);
        self
    }

    pub fn with_checker(mut self, checker: Arc<dyn SignatureChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn transaction(&self) -> Result<&'a Transaction> {
        self.transaction
            .ok_or_else(|| DogeError::invalid_input("The transaction to verify is not set"))
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn prev_output(&self) -> Option<&'a TxOut> {
        self.prev_output
    }

    pub fn should_verify_p2sh(&self) -> bool {
        self.flags.p2sh
    }

    // Main stack

    pub fn push(&mut self, item: Vec<u8>) {
        self.stack.push(item);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.stack.push(encode_bool(value));
    }

    pub fn push_num(&mut self, value: i64) {
        self.stack.push(encode_num(value));
    }

    pub fn pop(&mut self) -> Result<Vec<u8>> {
        self.stack.pop().ok_or(DogeError::StackUnderflow(1))
    }

    pub fn pop_num(&mut self, max_len: usize) -> Result<i64> {
        let item = self.pop()?;
        decode_num(&item, max_len)
    }

    /// Fail unless the main stack holds at least `count` items.
    pub fn assert_stack_height(&self, count: usize) -> Result<()> {
        if self.stack.len() < count {
            return Err(DogeError::StackUnderflow(count));
        }
        Ok(())
    }

    fn resolve_index(&self, index: isize) -> Result<usize> {
        let len = self.stack.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            let required = if index < 0 { -index } else { index + 1 };
            return Err(DogeError::StackUnderflow(required as usize));
        }
        Ok(resolved as usize)
    }

    /// Item at `index`; negative indices count from the top (-1 is the top).
    pub fn peek(&self, index: isize) -> Result<&Vec<u8>> {
        let resolved = self.resolve_index(index)?;
        Ok(&self.stack[resolved])
    }

    pub fn peek_num(&self, index: isize, max_len: usize) -> Result<i64> {
        decode_num(self.peek(index)?, max_len)
    }

    /// Boolean coercion of the item at `index`.
    pub fn bool_at(&self, index: isize) -> Result<bool> {
        Ok(cast_to_bool(self.peek(index)?))
    }

    pub fn remove(&mut self, index: isize) -> Result<Vec<u8>> {
        let resolved = self.resolve_index(index)?;
        Ok(self.stack.remove(resolved))
    }

    // Alternate stack

    pub fn push_alt(&mut self, item: Vec<u8>) {
        self.alt_stack.push(item);
    }

    pub fn pop_alt(&mut self) -> Result<Vec<u8>> {
        self.alt_stack
            .pop()
            .ok_or_else(|| DogeError::structural("Alt stack is empty"))
    }

    // Condition stack

    pub fn push_condition(&mut self, value: bool) {
        self.condition_stack.push(value);
    }

    pub fn invert_condition(&mut self) -> Result<()> {
        match self.condition_stack.last_mut() {
            Some(top) => {
                *top = !*top;
                Ok(())
            }
            None => Err(DogeError::structural(
                "Expected an OP_IF or OP_NOTIF branch before OP_ELSE",
            )),
        }
    }

    pub fn pop_condition(&mut self) -> Result<()> {
        self.condition_stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| DogeError::structural("Expected an OP_IF or OP_NOTIF branch before OP_ENDIF"))
    }

    /// True unless execution is inside a false branch.
    pub fn should_execute(&self) -> bool {
        self.condition_stack.iter().all(|&taken| taken)
    }

    // Per-script bookkeeping driven by the machine

    /// Reset the per-script state before running `script`.
    pub(crate) fn begin_script(&mut self, script: &Script) {
        self.alt_stack.clear();
        self.condition_stack.clear();
        self.script = script.clone();
        self.code_start = 0;
        self.pc = 0;
        self.op_count = 0;
    }

    /// Record the index of the instruction about to execute.
    pub(crate) fn set_position(&mut self, instruction_index: usize) {
        self.pc = instruction_index;
    }

    pub(crate) fn mark_code_separator(&mut self) {
        self.code_start = self.pc + 1;
    }

    pub(crate) fn count_ops(&mut self, count: usize) -> Result<()> {
        self.op_count += count;
        if self.op_count > super::MAX_OPS_PER_SCRIPT {
            return Err(DogeError::Structural(format!(
                "Script exceeds {} operations",
                super::MAX_OPS_PER_SCRIPT
            )));
        }
        Ok(())
    }

    /// The part of the running script a signature commits to: everything
    /// after the last executed `OP_CODESEPARATOR`.
    pub fn script_code(&self) -> Script {
        self.script.subscript_from(self.code_start)
    }

    // Delegated checks

    /// Verify `signature` (DER with trailing hash-type byte) against
    /// `public_key` for the bound input, hashing `script_code`.
    pub fn check_signature(&self, signature: &[u8], public_key: &[u8], script_code: &Script) -> Result<bool> {
        checker::check_signature_encoding(signature, &self.flags)?;
        checker::check_public_key_encoding(public_key, &self.flags)?;
        if signature.is_empty() {
            return Ok(false);
        }

        let transaction = self.transaction()?;
        let (der, hash_type) = signature.split_at(signature.len() - 1);
        let digest = transaction.signature_hash(self.input_index, script_code, hash_type[0] as u32)?;
        self.checker.verify_ecdsa(&digest, der, public_key, &self.flags)
    }

    /// Absolute lock-time rule of `OP_CHECKLOCKTIMEVERIFY`.
    pub fn check_lock_time(&self, lock_time: i64) -> Result<()> {
        let transaction = self.transaction()?;
        if lock_time < 0 {
            return Err(DogeError::structural("Negative lock time"));
        }
        if lock_time > u32::MAX as i64 {
            return Err(DogeError::negative("Lock time out of range"));
        }
        let lock_time = lock_time as u32;

        if (transaction.lock_time < LOCKTIME_THRESHOLD) != (lock_time < LOCKTIME_THRESHOLD) {
            return Err(DogeError::negative("Lock time type does not match the transaction"));
        }
        if lock_time > transaction.lock_time {
            return Err(DogeError::negative("Lock time has not been reached"));
        }
        if transaction.input[self.input_index].sequence == SEQUENCE_FINAL {
            return Err(DogeError::negative("Input sequence is final, lock time is disabled"));
        }
        if lock_time >= LOCKTIME_THRESHOLD {
            if let Some(block_timestamp) = self.block_timestamp {
                if transaction.lock_time > block_timestamp {
                    return Err(DogeError::negative("Transaction lock time is after the block time"));
                }
            }
        }
        Ok(())
    }

    /// Relative lock-time rule of `OP_CHECKSEQUENCEVERIFY`.
    pub fn check_sequence(&self, sequence: i64) -> Result<()> {
        let transaction = self.transaction()?;
        if sequence < 0 {
            return Err(DogeError::structural("Negative sequence"));
        }
        if sequence > u32::MAX as i64 {
            return Err(DogeError::negative("Sequence out of range"));
        }
        let sequence = sequence as u32;
        if transaction.version < 2 {
            return Err(DogeError::negative("Relative lock time requires transaction version 2"));
        }

        let tx_sequence = transaction.input[self.input_index].sequence;
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return Err(DogeError::negative("Input sequence disables relative lock time"));
        }
        let mask = SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK;
        let committed = sequence & mask;
        let actual = tx_sequence & mask;
        if (committed & SEQUENCE_LOCKTIME_TYPE_FLAG) != (actual & SEQUENCE_LOCKTIME_TYPE_FLAG) {
            return Err(DogeError::negative("Relative lock time type mismatch"));
        }
        if committed > actual {
            return Err(DogeError::negative("Relative lock time has not been reached"));
        }
        Ok(())
    }

    /// Rebuild the P2SH redeem script from the stack as it stood after the
    /// unlocking script ran, and check it against the hash committed to by
    /// `lock_script`.
    pub fn deserialize_p2sh_lock_script(&self, stack_for_p2sh: &[Vec<u8>], lock_script: &Script) -> Result<Script> {
        let serialized = stack_for_p2sh
            .last()
            .ok_or_else(|| DogeError::structural("P2SH spend left no redeem script on the stack"))?;
        let redeem_script = Script::parse(serialized)?;

        let expected = lock_script
            .extract_hash160()
            .ok_or_else(|| DogeError::structural("Lock script is not a P2SH script"))?;
        if hash160(serialized) != expected {
            return Err(DogeError::negative("Redeem script does not match the P2SH hash"));
        }
        Ok(redeem_script)
    }
}
