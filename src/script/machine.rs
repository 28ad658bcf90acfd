//! Script verification.
//!
//! A spend is authorized by running the unlocking script, then the locking
//! script, on one [`ExecutionContext`]. When the locking script is the
//! canonical pay-to-script-hash template, the redeem script carried by the
//! unlocking script is rebuilt and run as a third phase.

use super::checker::{Secp256k1Checker, SignatureChecker};
use super::context::ExecutionContext;
use super::opcode::{Opcode, OpcodeKind};
use super::program::{Instruction, Script};
use super::{MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STACK_SIZE};
use crate::primitives::transaction::{Transaction, TxOut};
use crate::types::{EngineConfig, VerifyFlags};
use crate::{DogeError, Result};
use log::{debug, trace};
use rayon::prelude::*;
use std::sync::Arc;

/// Verifies transaction inputs against the outputs they spend.
///
/// The machine itself holds no per-verification state; every call builds a
/// fresh context, so one machine can be shared across threads.
#[derive(Clone)]
pub struct ScriptMachine {
    flags: VerifyFlags,
    checker: Arc<dyn SignatureChecker>,
    verbose: bool,
}

impl ScriptMachine {
    pub fn new(flags: VerifyFlags) -> Self {
        Self {
            flags,
            checker: Secp256k1Checker::shared(),
            verbose: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.flags).with_verbose(config.verbose)
    }

    /// Use `checker` instead of libsecp256k1 for signature verification.
    pub fn with_checker(mut self, checker: Arc<dyn SignatureChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn flags(&self) -> VerifyFlags {
        self.flags
    }

    /// A fresh context for input `input_index` of `transaction`, configured
    /// with this machine's flags and checker.
    pub fn context<'a>(
        &self,
        transaction: &'a Transaction,
        input_index: usize,
        prev_output: &'a TxOut,
        block_timestamp: u32,
    ) -> Result<ExecutionContext<'a>> {
        Ok(ExecutionContext::new(transaction, input_index, prev_output)?
            .with_flags(self.flags)
            .with_checker(self.checker.clone())
            .with_block_timestamp(block_timestamp)
            .with_verbose(self.verbose))
    }

    /// Verify input `input_index` of `transaction`, which spends `prev_output`.
    pub fn verify_transaction(
        &self,
        transaction: &Transaction,
        input_index: usize,
        prev_output: &TxOut,
        block_timestamp: u32,
    ) -> Result<bool> {
        let mut context = self.context(transaction, input_index, prev_output, block_timestamp)?;
        let unlock_script = transaction.input[input_index].unlock_script()?;
        let lock_script = prev_output.lock_script()?;

        self.verify(&lock_script, &unlock_script, &mut context)
            .map_err(|e| {
                debug!("Input {} rejected ({:?}): {}", input_index, e.kind(), e);
                e
            })
    }

    /// Verify every input of `transaction` in parallel. `prev_outputs[i]` is
    /// the output spent by input `i`. Results are in input order.
    pub fn verify_inputs(
        &self,
        transaction: &Transaction,
        prev_outputs: &[TxOut],
        block_timestamp: u32,
    ) -> Result<Vec<Result<bool>>> {
        if prev_outputs.len() != transaction.input.len() {
            return Err(DogeError::InvalidInput(format!(
                "{} previous outputs supplied for {} inputs",
                prev_outputs.len(),
                transaction.input.len()
            )));
        }

        Ok(prev_outputs
            .par_iter()
            .enumerate()
            .map(|(index, prev_output)| self.verify_transaction(transaction, index, prev_output, block_timestamp))
            .collect())
    }

    /// Run `unlock_script` then `lock_script` on `context`, with the P2SH
    /// redeem phase when it applies.
    ///
    /// The machine's flags replace those of `context`.
    ///
    /// Returns `Ok(true)` when the spend is authorized. An unauthorized spend
    /// is reported as [`DogeError::NegativeVerdict`]; every other error means
    /// the scripts could not be evaluated.
    pub fn verify(&self, lock_script: &Script, unlock_script: &Script, context: &mut ExecutionContext) -> Result<bool> {
        self.configure(context);
        debug!("Running unlock script ({} bytes)", unlock_script.len());
        self.run(unlock_script, context)?;

        // Taken unconditionally; only consumed below for P2SH spends.
        let stack_for_p2sh = context.stack.clone();

        debug!("Running lock script ({} bytes)", lock_script.len());
        self.run(lock_script, context)?;
        Self::require_true_top(context)?;

        if context.should_verify_p2sh() && lock_script.is_pay_to_script_hash() {
            if !unlock_script.is_data_only() {
                return Err(DogeError::structural("Input script for P2SH spending must be literals-only"));
            }
            let redeem_script = context.deserialize_p2sh_lock_script(&stack_for_p2sh, lock_script)?;

            // The redeem script sees the unlock stack minus its own serialization.
            context.stack = stack_for_p2sh;
            context.stack.pop();

            debug!("Running P2SH redeem script ({} bytes)", redeem_script.len());
            self.run(&redeem_script, context)?;
            Self::require_true_top(context)?;
        } else if context.verbose {
            trace!(
                "P2SH not evaluated: enabled={} pay_to_script_hash={}",
                context.should_verify_p2sh(),
                lock_script.is_pay_to_script_hash()
            );
        }

        debug!("Spend authorized");
        Ok(true)
    }

    /// Execute `script` on `context` under this machine's flags.
    pub fn run(&self, script: &Script, context: &mut ExecutionContext) -> Result<()> {
        self.configure(context);
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(DogeError::structural("Script binary is too long"));
        }

        context.begin_script(script);
        for (index, instruction) in script.instructions().iter().enumerate() {
            context.set_position(index);
            let executing = context.should_execute();

            match instruction {
                Instruction::PushBytes(data) => {
                    if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                        return Err(DogeError::Structural(format!(
                            "Push of {} bytes exceeds the {} byte maximum",
                            data.len(),
                            MAX_SCRIPT_ELEMENT_SIZE
                        )));
                    }
                    if executing {
                        context.push(data.clone());
                    }
                }
                Instruction::Op(op) => {
                    if op.value() > Opcode::OP_16.value() {
                        context.count_ops(1)?;
                    }
                    let always_fails = op.kind() == OpcodeKind::Disabled
                        || matches!(op, Opcode::OP_VERIF | Opcode::OP_VERNOTIF);
                    if executing || op.is_conditional() || always_fails {
                        op.execute(context)?;
                    }
                }
                Instruction::Invalid(code) => {
                    context.count_ops(1)?;
                    if executing {
                        return Err(DogeError::Structural(format!("Invalid opcode 0x{:02x}", code)));
                    }
                }
            }

            if context.verbose && executing {
                trace!("{:>4} {:?} depth={}", index, instruction, context.stack.len());
            }

            if context.stack.len() + context.alt_stack.len() > MAX_STACK_SIZE {
                return Err(DogeError::Structural(format!(
                    "Stack exceeds {} items",
                    MAX_STACK_SIZE
                )));
            }
        }

        if !context.condition_stack.is_empty() {
            return Err(DogeError::structural("Unbalanced conditional: OP_IF without OP_ENDIF"));
        }
        Ok(())
    }

    fn configure(&self, context: &mut ExecutionContext) {
        context.flags = self.flags;
        context.verbose |= self.verbose;
    }

    fn require_true_top(context: &ExecutionContext) -> Result<()> {
        if context.stack.is_empty() {
            return Err(DogeError::negative("Stack is empty after script execution"));
        }
        if !context.bool_at(-1)? {
            return Err(DogeError::negative("Final stack value is false"));
        }
        Ok(())
    }
}

impl Default for ScriptMachine {
    fn default() -> Self {
        Self::new(VerifyFlags::default())
    }
}
