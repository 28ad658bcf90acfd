//! Script opcodes and their execution rules.
//!
//! The catalog is a single static table: numeric code, mnemonic and family
//! for every defined opcode. Executing an opcode dispatches on its family to
//! the rule operating on an [`ExecutionContext`].

use super::context::ExecutionContext;
use super::num::{cast_to_bool, DEFAULT_MAX_NUM_SIZE, LOCKTIME_MAX_NUM_SIZE};
use super::MAX_PUBKEYS_PER_MULTISIG;
use crate::primitives::hash::{hash160, ripemd160, sha1, sha256, sha256d};
use crate::{DogeError, Result};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Opcode families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeKind {
    /// Pushes a constant or inline payload.
    PushData,
    FlowControl,
    Stack,
    Splice,
    Bitwise,
    Arithmetic,
    CryptoHash,
    SignatureCheck,
    LockTime,
    NoOp,
    /// Disabled by the protocol; fails even inside an unexecuted branch.
    Disabled,
    /// Reserved or undefined; fails when executed.
    Invalid,
}

macro_rules! opcodes {
    ($($name:ident = $code:literal => $kind:ident),* $(,)?) => {
        /// Bitcoin-family script opcodes
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $code),*
        }

        impl Opcode {
            /// Every defined opcode, in code order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),*];

            /// Look up an opcode by its numeric code.
            pub fn from_u8(code: u8) -> Option<Opcode> {
                match code {
                    $($code => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Canonical mnemonic, e.g. `OP_CHECKSIG`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name)),*
                }
            }

            pub fn kind(self) -> OpcodeKind {
                match self {
                    $(Opcode::$name => OpcodeKind::$kind),*
                }
            }
        }
    };
}

opcodes! {
    // Push value
    OP_0 = 0x00 => PushData,
    OP_PUSHDATA1 = 0x4c => PushData,
    OP_PUSHDATA2 = 0x4d => PushData,
    OP_PUSHDATA4 = 0x4e => PushData,
    OP_1NEGATE = 0x4f => PushData,
    OP_RESERVED = 0x50 => Invalid,
    OP_1 = 0x51 => PushData,
    OP_2 = 0x52 => PushData,
    OP_3 = 0x53 => PushData,
    OP_4 = 0x54 => PushData,
    OP_5 = 0x55 => PushData,
    OP_6 = 0x56 => PushData,
    OP_7 = 0x57 => PushData,
    OP_8 = 0x58 => PushData,
    OP_9 = 0x59 => PushData,
    OP_10 = 0x5a => PushData,
    OP_11 = 0x5b => PushData,
    OP_12 = 0x5c => PushData,
    OP_13 = 0x5d => PushData,
    OP_14 = 0x5e => PushData,
    OP_15 = 0x5f => PushData,
    OP_16 = 0x60 => PushData,

    // Control
    OP_NOP = 0x61 => NoOp,
    OP_VER = 0x62 => Invalid,
    OP_IF = 0x63 => FlowControl,
    OP_NOTIF = 0x64 => FlowControl,
    OP_VERIF = 0x65 => Invalid,
    OP_VERNOTIF = 0x66 => Invalid,
    OP_ELSE = 0x67 => FlowControl,
    OP_ENDIF = 0x68 => FlowControl,
    OP_VERIFY = 0x69 => FlowControl,
    OP_RETURN = 0x6a => FlowControl,

    // Stack ops
    OP_TOALTSTACK = 0x6b => Stack,
    OP_FROMALTSTACK = 0x6c => Stack,
    OP_2DROP = 0x6d => Stack,
    OP_2DUP = 0x6e => Stack,
    OP_3DUP = 0x6f => Stack,
    OP_2OVER = 0x70 => Stack,
    OP_2ROT = 0x71 => Stack,
    OP_2SWAP = 0x72 => Stack,
    OP_IFDUP = 0x73 => Stack,
    OP_DEPTH = 0x74 => Stack,
    OP_DROP = 0x75 => Stack,
    OP_DUP = 0x76 => Stack,
    OP_NIP = 0x77 => Stack,
    OP_OVER = 0x78 => Stack,
    OP_PICK = 0x79 => Stack,
    OP_ROLL = 0x7a => Stack,
    OP_ROT = 0x7b => Stack,
    OP_SWAP = 0x7c => Stack,
    OP_TUCK = 0x7d => Stack,

    // String splice ops
    OP_CAT = 0x7e => Disabled,
    OP_SUBSTR = 0x7f => Disabled,
    OP_LEFT = 0x80 => Disabled,
    OP_RIGHT = 0x81 => Disabled,
    OP_SIZE = 0x82 => Splice,

    // Bit logic
    OP_INVERT = 0x83 => Disabled,
    OP_AND = 0x84 => Disabled,
    OP_OR = 0x85 => Disabled,
    OP_XOR = 0x86 => Disabled,
    OP_EQUAL = 0x87 => Bitwise,
    OP_EQUALVERIFY = 0x88 => Bitwise,
    OP_RESERVED1 = 0x89 => Invalid,
    OP_RESERVED2 = 0x8a => Invalid,

    // Numeric
    OP_1ADD = 0x8b => Arithmetic,
    OP_1SUB = 0x8c => Arithmetic,
    OP_2MUL = 0x8d => Disabled,
    OP_2DIV = 0x8e => Disabled,
    OP_NEGATE = 0x8f => Arithmetic,
    OP_ABS = 0x90 => Arithmetic,
    OP_NOT = 0x91 => Arithmetic,
    OP_0NOTEQUAL = 0x92 => Arithmetic,
    OP_ADD = 0x93 => Arithmetic,
    OP_SUB = 0x94 => Arithmetic,
    OP_MUL = 0x95 => Disabled,
    OP_DIV = 0x96 => Disabled,
    OP_MOD = 0x97 => Disabled,
    OP_LSHIFT = 0x98 => Disabled,
    OP_RSHIFT = 0x99 => Disabled,
    OP_BOOLAND = 0x9a => Arithmetic,
    OP_BOOLOR = 0x9b => Arithmetic,
    OP_NUMEQUAL = 0x9c => Arithmetic,
    OP_NUMEQUALVERIFY = 0x9d => Arithmetic,
    OP_NUMNOTEQUAL = 0x9e => Arithmetic,
    OP_LESSTHAN = 0x9f => Arithmetic,
    OP_GREATERTHAN = 0xa0 => Arithmetic,
    OP_LESSTHANOREQUAL = 0xa1 => Arithmetic,
    OP_GREATERTHANOREQUAL = 0xa2 => Arithmetic,
    OP_MIN = 0xa3 => Arithmetic,
    OP_MAX = 0xa4 => Arithmetic,
    OP_WITHIN = 0xa5 => Arithmetic,

    // Crypto
    OP_RIPEMD160 = 0xa6 => CryptoHash,
    OP_SHA1 = 0xa7 => CryptoHash,
    OP_SHA256 = 0xa8 => CryptoHash,
    OP_HASH160 = 0xa9 => CryptoHash,
    OP_HASH256 = 0xaa => CryptoHash,
    OP_CODESEPARATOR = 0xab => SignatureCheck,
    OP_CHECKSIG = 0xac => SignatureCheck,
    OP_CHECKSIGVERIFY = 0xad => SignatureCheck,
    OP_CHECKMULTISIG = 0xae => SignatureCheck,
    OP_CHECKMULTISIGVERIFY = 0xaf => SignatureCheck,

    // Expansion
    OP_NOP1 = 0xb0 => NoOp,
    OP_CHECKLOCKTIMEVERIFY = 0xb1 => LockTime,
    OP_CHECKSEQUENCEVERIFY = 0xb2 => LockTime,
    OP_NOP4 = 0xb3 => NoOp,
    OP_NOP5 = 0xb4 => NoOp,
    OP_NOP6 = 0xb5 => NoOp,
    OP_NOP7 = 0xb6 => NoOp,
    OP_NOP8 = 0xb7 => NoOp,
    OP_NOP9 = 0xb8 => NoOp,
    OP_NOP10 = 0xb9 => NoOp,

    OP_INVALIDOPCODE = 0xff => Invalid,
}

impl Opcode {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Look up an opcode by mnemonic. Accepts the names without the `OP_`
    /// prefix too, plus the `OP_FALSE`/`OP_TRUE` aliases.
    pub fn from_name(name: &str) -> Option<Opcode> {
        static BY_NAME: OnceLock<HashMap<&'static str, Opcode>> = OnceLock::new();
        let table = BY_NAME.get_or_init(|| {
            let mut table: HashMap<&'static str, Opcode> =
                Opcode::ALL.iter().map(|op| (op.name(), *op)).collect();
            table.insert("OP_FALSE", Opcode::OP_0);
            table.insert("OP_TRUE", Opcode::OP_1);
            table
        });

        let upper = name.to_ascii_uppercase();
        if let Some(op) = table.get(upper.as_str()) {
            return Some(*op);
        }
        table.get(format!("OP_{}", upper).as_str()).copied()
    }

    /// `OP_1`..`OP_16` for `n` in 1..=16, `OP_0` for zero.
    pub fn small_int(n: usize) -> Option<Opcode> {
        match n {
            0 => Some(Opcode::OP_0),
            1..=16 => Opcode::from_u8(Opcode::OP_1 as u8 + (n as u8 - 1)),
            _ => None,
        }
    }

    /// The value pushed by `OP_0`..`OP_16`, if this is one of them.
    pub fn small_int_value(self) -> Option<usize> {
        match self {
            Opcode::OP_0 => Some(0),
            op if op >= Opcode::OP_1 && op <= Opcode::OP_16 => {
                Some((op as u8 - Opcode::OP_1 as u8 + 1) as usize)
            }
            _ => None,
        }
    }

    /// Opcodes that take part in branch bookkeeping even when the current
    /// branch is not executing.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            Opcode::OP_IF | Opcode::OP_NOTIF | Opcode::OP_ELSE | Opcode::OP_ENDIF
                | Opcode::OP_VERIF | Opcode::OP_VERNOTIF
        )
    }

    /// True for opcodes of the push-data family (`OP_0`..`OP_16`, `OP_1NEGATE`
    /// and the explicit push-data prefixes).
    ///
    /// This classifies by family, so `OP_RESERVED` is not a push here even
    /// though [`Instruction::is_push`](super::program::Instruction::is_push)
    /// accepts it under the push-only rule.
    pub fn is_push(self) -> bool {
        self.kind() == OpcodeKind::PushData
    }

    /// Apply this opcode's rule to `ctx`.
    pub fn execute(self, ctx: &mut ExecutionContext) -> Result<()> {
        match self.kind() {
            OpcodeKind::PushData => push_value(self, ctx),
            OpcodeKind::FlowControl => flow_control(self, ctx),
            OpcodeKind::Stack => stack_manipulation(self, ctx),
            OpcodeKind::Splice => splice(self, ctx),
            OpcodeKind::Bitwise => bitwise(self, ctx),
            OpcodeKind::Arithmetic => arithmetic(self, ctx),
            OpcodeKind::CryptoHash => crypto_hash(self, ctx),
            OpcodeKind::SignatureCheck => signature_check(self, ctx),
            OpcodeKind::LockTime => lock_time(self, ctx),
            OpcodeKind::NoOp => Ok(()),
            OpcodeKind::Disabled => Err(DogeError::Structural(format!("{} is disabled", self.name()))),
            OpcodeKind::Invalid => Err(DogeError::Structural(format!("{} is not a valid opcode", self.name()))),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn push_value(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    match op {
        Opcode::OP_1NEGATE => ctx.push_num(-1),
        _ => match op.small_int_value() {
            Some(n) => ctx.push_num(n as i64),
            None => {
                return Err(DogeError::Structural(format!(
                    "{} executed without a payload",
                    op.name()
                )))
            }
        },
    }
    Ok(())
}

fn flow_control(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    match op {
        Opcode::OP_IF | Opcode::OP_NOTIF => {
            let mut taken = false;
            if ctx.should_execute() {
                ctx.assert_stack_height(1)?;
                taken = cast_to_bool(&ctx.pop()?);
                if op == Opcode::OP_NOTIF {
                    taken = !taken;
                }
            }
            ctx.push_condition(taken);
        }
        Opcode::OP_ELSE => ctx.invert_condition()?,
        Opcode::OP_ENDIF => ctx.pop_condition()?,
        Opcode::OP_VERIFY => {
            ctx.assert_stack_height(1)?;
            if !cast_to_bool(&ctx.pop()?) {
                return Err(DogeError::negative("OP_VERIFY failed"));
            }
        }
        Opcode::OP_RETURN => return Err(DogeError::negative("OP_RETURN executed")),
        _ => unreachable!("{} is not a flow-control opcode", op.name()),
    }
    Ok(())
}

fn stack_manipulation(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    match op {
        Opcode::OP_TOALTSTACK => {
            ctx.assert_stack_height(1)?;
            let value = ctx.pop()?;
            ctx.push_alt(value);
        }
        Opcode::OP_FROMALTSTACK => {
            let value = ctx.pop_alt()?;
            ctx.push(value);
        }
        Opcode::OP_2DROP => {
            ctx.assert_stack_height(2)?;
            ctx.pop()?;
            ctx.pop()?;
        }
        Opcode::OP_2DUP => {
            ctx.assert_stack_height(2)?;
            let a = ctx.peek(-2)?.clone();
            let b = ctx.peek(-1)?.clone();
            ctx.push(a);
            ctx.push(b);
        }
        Opcode::OP_3DUP => {
            ctx.assert_stack_height(3)?;
            let a = ctx.peek(-3)?.clone();
            let b = ctx.peek(-2)?.clone();
            let c = ctx.peek(-1)?.clone();
            ctx.push(a);
            ctx.push(b);
            ctx.push(c);
        }
        Opcode::OP_2OVER => {
            ctx.assert_stack_height(4)?;
            let a = ctx.peek(-4)?.clone();
            let b = ctx.peek(-3)?.clone();
            ctx.push(a);
            ctx.push(b);
        }
        Opcode::OP_2ROT => {
            ctx.assert_stack_height(6)?;
            let a = ctx.remove(-6)?;
            let b = ctx.remove(-5)?;
            ctx.push(a);
            ctx.push(b);
        }
        Opcode::OP_2SWAP => {
            ctx.assert_stack_height(4)?;
            let len = ctx.stack.len();
            ctx.stack.swap(len - 4, len - 2);
            ctx.stack.swap(len - 3, len - 1);
        }
        Opcode::OP_IFDUP => {
            ctx.assert_stack_height(1)?;
            if ctx.bool_at(-1)? {
                let value = ctx.peek(-1)?.clone();
                ctx.push(value);
            }
        }
        Opcode::OP_DEPTH => {
            let depth = ctx.stack.len() as i64;
            ctx.push_num(depth);
        }
        Opcode::OP_DROP => {
            ctx.assert_stack_height(1)?;
            ctx.pop()?;
        }
        Opcode::OP_DUP => {
            ctx.assert_stack_height(1)?;
            let value = ctx.peek(-1)?.clone();
            ctx.push(value);
        }
        Opcode::OP_NIP => {
            ctx.assert_stack_height(2)?;
            ctx.remove(-2)?;
        }
        Opcode::OP_OVER => {
            ctx.assert_stack_height(2)?;
            let value = ctx.peek(-2)?.clone();
            ctx.push(value);
        }
        Opcode::OP_PICK | Opcode::OP_ROLL => {
            ctx.assert_stack_height(2)?;
            let n = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            if n < 0 {
                return Err(DogeError::Structural(format!("{} with negative depth", op.name())));
            }
            let depth = -(n as isize) - 1;
            let value = if op == Opcode::OP_ROLL {
                ctx.remove(depth)?
            } else {
                ctx.peek(depth)?.clone()
            };
            ctx.push(value);
        }
        Opcode::OP_ROT => {
            ctx.assert_stack_height(3)?;
            let value = ctx.remove(-3)?;
            ctx.push(value);
        }
        Opcode::OP_SWAP => {
            ctx.assert_stack_height(2)?;
            let len = ctx.stack.len();
            ctx.stack.swap(len - 2, len - 1);
        }
        Opcode::OP_TUCK => {
            ctx.assert_stack_height(2)?;
            let value = ctx.peek(-1)?.clone();
            let len = ctx.stack.len();
            ctx.stack.insert(len - 2, value);
        }
        _ => unreachable!("{} is not a stack opcode", op.name()),
    }
    Ok(())
}

fn splice(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    // OP_SIZE is the only splice opcode still enabled.
    debug_assert_eq!(op, Opcode::OP_SIZE);
    ctx.assert_stack_height(1)?;
    let size = ctx.peek(-1)?.len() as i64;
    ctx.push_num(size);
    Ok(())
}

fn bitwise(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    ctx.assert_stack_height(2)?;
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    let equal = a == b;
    match op {
        Opcode::OP_EQUAL => ctx.push_bool(equal),
        Opcode::OP_EQUALVERIFY => {
            if !equal {
                return Err(DogeError::negative("OP_EQUALVERIFY failed"));
            }
        }
        _ => unreachable!("{} is not a bitwise opcode", op.name()),
    }
    Ok(())
}

fn arithmetic(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    match op {
        Opcode::OP_1ADD
        | Opcode::OP_1SUB
        | Opcode::OP_NEGATE
        | Opcode::OP_ABS
        | Opcode::OP_NOT
        | Opcode::OP_0NOTEQUAL => {
            ctx.assert_stack_height(1)?;
            let a = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            let result = match op {
                Opcode::OP_1ADD => a + 1,
                Opcode::OP_1SUB => a - 1,
                Opcode::OP_NEGATE => -a,
                Opcode::OP_ABS => a.abs(),
                Opcode::OP_NOT => (a == 0) as i64,
                _ => (a != 0) as i64,
            };
            ctx.push_num(result);
        }
        Opcode::OP_WITHIN => {
            ctx.assert_stack_height(3)?;
            let max = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            let min = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            let value = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            ctx.push_bool(min <= value && value < max);
        }
        _ => {
            ctx.assert_stack_height(2)?;
            let b = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            let a = ctx.pop_num(DEFAULT_MAX_NUM_SIZE)?;
            let result = match op {
                Opcode::OP_ADD => a + b,
                Opcode::OP_SUB => a - b,
                Opcode::OP_BOOLAND => (a != 0 && b != 0) as i64,
                Opcode::OP_BOOLOR => (a != 0 || b != 0) as i64,
                Opcode::OP_NUMEQUAL | Opcode::OP_NUMEQUALVERIFY => (a == b) as i64,
                Opcode::OP_NUMNOTEQUAL => (a != b) as i64,
                Opcode::OP_LESSTHAN => (a < b) as i64,
                Opcode::OP_GREATERTHAN => (a > b) as i64,
                Opcode::OP_LESSTHANOREQUAL => (a <= b) as i64,
                Opcode::OP_GREATERTHANOREQUAL => (a >= b) as i64,
                Opcode::OP_MIN => a.min(b),
                Opcode::OP_MAX => a.max(b),
                _ => unreachable!("{} is not an arithmetic opcode", op.name()),
            };
            if op == Opcode::OP_NUMEQUALVERIFY {
                if result == 0 {
                    return Err(DogeError::negative("OP_NUMEQUALVERIFY failed"));
                }
            } else {
                ctx.push_num(result);
            }
        }
    }
    Ok(())
}

fn crypto_hash(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    ctx.assert_stack_height(1)?;
    let data = ctx.pop()?;
    let digest = match op {
        Opcode::OP_RIPEMD160 => ripemd160(&data).to_vec(),
        Opcode::OP_SHA1 => sha1(&data).to_vec(),
        Opcode::OP_SHA256 => sha256(&data).to_vec(),
        Opcode::OP_HASH160 => hash160(&data).to_vec(),
        Opcode::OP_HASH256 => sha256d(&data).to_vec(),
        _ => unreachable!("{} is not a hash opcode", op.name()),
    };
    ctx.push(digest);
    Ok(())
}

fn signature_check(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    match op {
        Opcode::OP_CODESEPARATOR => {
            ctx.mark_code_separator();
            Ok(())
        }
        Opcode::OP_CHECKSIG | Opcode::OP_CHECKSIGVERIFY => {
            // input : sig pubkey
            ctx.assert_stack_height(2)?;
            let public_key = ctx.pop()?;
            let signature = ctx.pop()?;

            let script_code = ctx.script_code().find_and_delete(&signature);
            let valid = ctx.check_signature(&signature, &public_key, &script_code)?;
            if op == Opcode::OP_CHECKSIGVERIFY {
                if !valid {
                    return Err(DogeError::negative("OP_CHECKSIGVERIFY failed"));
                }
            } else {
                ctx.push_bool(valid);
            }
            Ok(())
        }
        Opcode::OP_CHECKMULTISIG | Opcode::OP_CHECKMULTISIGVERIFY => check_multisig(op, ctx),
        _ => unreachable!("{} is not a signature opcode", op.name()),
    }
}

// input : dummy sig1 .. sigM M pubkey1 .. pubkeyN N
fn check_multisig(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    let mut i = 1usize;
    ctx.assert_stack_height(i)?;

    let key_count = ctx.peek_num(-(i as isize), DEFAULT_MAX_NUM_SIZE)?;
    if key_count < 0 || key_count as usize > MAX_PUBKEYS_PER_MULTISIG {
        return Err(DogeError::Structural(format!("Invalid public key count {}", key_count)));
    }
    let mut keys_left = key_count as usize;
    ctx.count_ops(keys_left)?;
    i += 1;
    let mut ikey = i;
    i += keys_left;
    ctx.assert_stack_height(i)?;

    let sig_count = ctx.peek_num(-(i as isize), DEFAULT_MAX_NUM_SIZE)?;
    if sig_count < 0 || sig_count as usize > keys_left {
        return Err(DogeError::Structural(format!("Invalid signature count {}", sig_count)));
    }
    let mut sigs_left = sig_count as usize;
    i += 1;
    let mut isig = i;
    i += sigs_left;
    // The extra item is the historical dummy consumed by OP_CHECKMULTISIG.
    ctx.assert_stack_height(i)?;

    let mut script_code = ctx.script_code();
    for k in 0..sigs_left {
        let signature = ctx.peek(-((isig + k) as isize))?.clone();
        script_code = script_code.find_and_delete(&signature);
    }

    let mut success = true;
    while success && sigs_left > 0 {
        let signature = ctx.peek(-(isig as isize))?.clone();
        let public_key = ctx.peek(-(ikey as isize))?.clone();
        if ctx.check_signature(&signature, &public_key, &script_code)? {
            isig += 1;
            sigs_left -= 1;
        }
        ikey += 1;
        keys_left -= 1;
        // More signatures left than keys means the rest cannot match.
        if sigs_left > keys_left {
            success = false;
        }
    }

    for _ in 0..i - 1 {
        ctx.pop()?;
    }
    let dummy = ctx.pop()?;
    if ctx.flags.null_dummy && !dummy.is_empty() {
        return Err(DogeError::structural("OP_CHECKMULTISIG dummy element must be empty"));
    }

    if op == Opcode::OP_CHECKMULTISIGVERIFY {
        if !success {
            return Err(DogeError::negative("OP_CHECKMULTISIGVERIFY failed"));
        }
    } else {
        ctx.push_bool(success);
    }
    Ok(())
}

fn lock_time(op: Opcode, ctx: &mut ExecutionContext) -> Result<()> {
    let enabled = match op {
        Opcode::OP_CHECKLOCKTIMEVERIFY => ctx.flags.check_lock_time_verify,
        _ => ctx.flags.check_sequence_verify,
    };
    if !enabled {
        return Ok(());
    }

    ctx.assert_stack_height(1)?;
    // Peek, not pop: the committed value stays for a following OP_DROP.
    let value = ctx.peek_num(-1, LOCKTIME_MAX_NUM_SIZE)?;
    if value < 0 {
        return Err(DogeError::Structural(format!("{} with negative lock time", op.name())));
    }

    match op {
        Opcode::OP_CHECKLOCKTIMEVERIFY => ctx.check_lock_time(value),
        _ => {
            if value & super::context::SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
                return Ok(());
            }
            ctx.check_sequence(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ops: &[Opcode], stack: Vec<Vec<u8>>) -> (Result<()>, Vec<Vec<u8>>) {
        let mut ctx = ExecutionContext::detached();
        ctx.stack = stack;
        for op in ops {
            if let Err(e) = op.execute(&mut ctx) {
                return (Err(e), ctx.stack);
            }
        }
        (Ok(()), ctx.stack)
    }

    #[test]
    fn test_catalog_values() {
        assert_eq!(Opcode::OP_CHECKSIG.value(), 0xac);
        assert_eq!(Opcode::OP_RIPEMD160.value(), 0xa6);
        assert_eq!(Opcode::OP_SHA1.value(), 0xa7);
        assert_eq!(Opcode::OP_ENDIF.value(), 0x68);
        assert_eq!(Opcode::OP_CHECKLOCKTIMEVERIFY.value(), 0xb1);
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_u8(op.value()), Some(*op));
            assert_eq!(Opcode::from_name(op.name()), Some(*op));
        }
        assert_eq!(Opcode::from_u8(0xba), None);
        assert_eq!(Opcode::from_u8(0x20), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::OP_CHECKSIG.name(), "OP_CHECKSIG");
        assert_eq!(Opcode::from_name("checksig"), Some(Opcode::OP_CHECKSIG));
        assert_eq!(Opcode::from_name("OP_TRUE"), Some(Opcode::OP_1));
        assert_eq!(Opcode::from_name("OP_NOTHING"), None);
    }

    #[test]
    fn test_small_ints() {
        assert_eq!(Opcode::small_int(0), Some(Opcode::OP_0));
        assert_eq!(Opcode::small_int(1), Some(Opcode::OP_1));
        assert_eq!(Opcode::small_int(16), Some(Opcode::OP_16));
        assert_eq!(Opcode::small_int(17), None);
        assert_eq!(Opcode::OP_3.small_int_value(), Some(3));
        assert_eq!(Opcode::OP_DUP.small_int_value(), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Opcode::OP_IF.kind(), OpcodeKind::FlowControl);
        assert_eq!(Opcode::OP_CAT.kind(), OpcodeKind::Disabled);
        assert_eq!(Opcode::OP_HASH160.kind(), OpcodeKind::CryptoHash);
        assert_eq!(Opcode::OP_CHECKLOCKTIMEVERIFY.kind(), OpcodeKind::LockTime);
        assert!(Opcode::OP_16.is_push());
        assert!(!Opcode::OP_DUP.is_push());
        assert!(Opcode::OP_VERIF.is_conditional());
        assert!(!Opcode::OP_RESERVED.is_push());
    }

    #[test]
    fn test_stack_ops() {
        let (result, stack) = run(&[Opcode::OP_SWAP], vec![vec![1], vec![2]]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![2], vec![1]]);

        let (_, stack) = run(&[Opcode::OP_ROT], vec![vec![1], vec![2], vec![3]]);
        assert_eq!(stack, vec![vec![2], vec![3], vec![1]]);

        let (_, stack) = run(&[Opcode::OP_TUCK], vec![vec![1], vec![2]]);
        assert_eq!(stack, vec![vec![2], vec![1], vec![2]]);

        let six: Vec<Vec<u8>> = (1..=6).map(|n| vec![n]).collect();
        let (_, stack) = run(&[Opcode::OP_2ROT], six);
        assert_eq!(stack, vec![vec![3], vec![4], vec![5], vec![6], vec![1], vec![2]]);

        let (_, stack) = run(&[Opcode::OP_2SWAP], vec![vec![1], vec![2], vec![3], vec![4]]);
        assert_eq!(stack, vec![vec![3], vec![4], vec![1], vec![2]]);

        let (_, stack) = run(&[Opcode::OP_IFDUP], vec![vec![]]);
        assert_eq!(stack.len(), 1);

        let (_, stack) = run(&[Opcode::OP_DEPTH], vec![vec![9], vec![9]]);
        assert_eq!(stack.last().unwrap(), &vec![2]);
    }

    #[test]
    fn test_copy_ops() {
        let (result, stack) = run(&[Opcode::OP_2OVER], vec![vec![1], vec![2], vec![3], vec![4]]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![1], vec![2], vec![3], vec![4], vec![1], vec![2]]);

        let (result, stack) = run(&[Opcode::OP_3DUP], vec![vec![1], vec![2], vec![3]]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![1], vec![2], vec![3], vec![1], vec![2], vec![3]]);

        let (result, stack) = run(&[Opcode::OP_NIP], vec![vec![1], vec![2]]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![2]]);

        let (result, stack) = run(&[Opcode::OP_OVER], vec![vec![1], vec![2]]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![1], vec![2], vec![1]]);

        let (result, stack) = run(&[Opcode::OP_2OVER], vec![vec![1], vec![2], vec![3]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(4))));
        assert_eq!(stack.len(), 3);

        let (result, _) = run(&[Opcode::OP_3DUP], vec![vec![1], vec![2]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(3))));

        let (result, _) = run(&[Opcode::OP_NIP], vec![vec![1]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(2))));

        let (result, _) = run(&[Opcode::OP_OVER], vec![vec![1]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(2))));
    }

    #[test]
    fn test_check_sequence_verify() {
        use crate::primitives::transaction::{OutPoint, Transaction, TxIn, TxOut};

        let spend = |version: i32| Transaction {
            version,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint { txid: [0x21; 32], vout: 0 },
                script_sig: vec![],
                sequence: 10,
            }],
            output: vec![],
        };
        let prev_output = TxOut::new(1, &super::super::program::Script::new());
        let run_csv = |tx: &Transaction, committed: Vec<u8>| {
            let mut ctx = ExecutionContext::new(tx, 0, &prev_output).unwrap();
            ctx.stack = vec![committed];
            let result = Opcode::OP_CHECKSEQUENCEVERIFY.execute(&mut ctx);
            (result, ctx.stack)
        };

        let tx = spend(2);
        let (result, stack) = run_csv(&tx, vec![5]);
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![5]]);
        assert!(run_csv(&tx, vec![10]).0.is_ok());

        let (result, _) = run_csv(&tx, vec![11]);
        assert!(result.unwrap_err().is_negative_verdict());

        // A committed value with the disable flag set passes as a no-op.
        assert!(run_csv(&tx, vec![0x00, 0x00, 0x00, 0x80, 0x00]).0.is_ok());

        let (result, _) = run_csv(&tx, vec![0x81]);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Structural);

        let old = spend(1);
        let (result, _) = run_csv(&old, vec![5]);
        assert!(result.unwrap_err().is_negative_verdict());

        let (result, _) = run(&[Opcode::OP_CHECKSEQUENCEVERIFY], vec![]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(1))));
    }

    #[test]
    fn test_pick_and_roll() {
        let base = vec![vec![0xa], vec![0xb], vec![0xc], vec![0x01]];
        let (_, stack) = run(&[Opcode::OP_PICK], base.clone());
        assert_eq!(stack, vec![vec![0xa], vec![0xb], vec![0xc], vec![0xb]]);

        let (_, stack) = run(&[Opcode::OP_ROLL], base);
        assert_eq!(stack, vec![vec![0xa], vec![0xc], vec![0xb]]);

        let (result, _) = run(&[Opcode::OP_PICK], vec![vec![0xa], vec![0x05]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(6))));
    }

    #[test]
    fn test_alt_stack_transfer() {
        let (result, stack) = run(
            &[Opcode::OP_TOALTSTACK, Opcode::OP_1, Opcode::OP_FROMALTSTACK],
            vec![vec![0x42]],
        );
        assert!(result.is_ok());
        assert_eq!(stack, vec![vec![0x01], vec![0x42]]);
    }

    #[test]
    fn test_arithmetic() {
        let (_, stack) = run(&[Opcode::OP_2, Opcode::OP_3, Opcode::OP_ADD], vec![]);
        assert_eq!(stack, vec![vec![5]]);

        let (_, stack) = run(&[Opcode::OP_2, Opcode::OP_3, Opcode::OP_SUB], vec![]);
        assert_eq!(stack, vec![vec![0x81]]);

        let (_, stack) = run(&[Opcode::OP_5, Opcode::OP_2, Opcode::OP_8, Opcode::OP_WITHIN], vec![]);
        assert_eq!(stack, vec![vec![1]]);

        let (_, stack) = run(&[Opcode::OP_0, Opcode::OP_NOT], vec![]);
        assert_eq!(stack, vec![vec![1]]);

        let (result, _) = run(&[Opcode::OP_1, Opcode::OP_2, Opcode::OP_NUMEQUALVERIFY], vec![]);
        assert!(result.unwrap_err().is_negative_verdict());

        let (result, _) = run(&[Opcode::OP_1ADD], vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Structural);
    }

    #[test]
    fn test_hash_digest_sizes() {
        for (op, size) in [
            (Opcode::OP_RIPEMD160, 20),
            (Opcode::OP_SHA1, 20),
            (Opcode::OP_SHA256, 32),
            (Opcode::OP_HASH160, 20),
            (Opcode::OP_HASH256, 32),
        ] {
            let (result, stack) = run(&[op], vec![vec![1, 2, 3, 4]]);
            assert!(result.is_ok());
            assert_eq!(stack.len(), 1);
            assert_eq!(stack[0].len(), size);
        }

        let (result, _) = run(&[Opcode::OP_SHA1], vec![]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(1))));
    }

    #[test]
    fn test_flow_control_bookkeeping() {
        let mut ctx = ExecutionContext::detached();
        ctx.push(vec![]);
        Opcode::OP_IF.execute(&mut ctx).unwrap();
        assert_eq!(ctx.condition_stack, vec![false]);
        assert!(ctx.stack.is_empty());

        // Nested IF inside a false branch pushes false without popping.
        Opcode::OP_IF.execute(&mut ctx).unwrap();
        assert_eq!(ctx.condition_stack, vec![false, false]);
        Opcode::OP_ENDIF.execute(&mut ctx).unwrap();

        Opcode::OP_ELSE.execute(&mut ctx).unwrap();
        assert_eq!(ctx.condition_stack, vec![true]);
        Opcode::OP_ENDIF.execute(&mut ctx).unwrap();
        assert!(ctx.condition_stack.is_empty());

        assert_eq!(
            Opcode::OP_ENDIF.execute(&mut ctx).unwrap_err().kind(),
            crate::ErrorKind::Structural
        );
    }

    #[test]
    fn test_notif() {
        let mut ctx = ExecutionContext::detached();
        ctx.push(vec![]);
        Opcode::OP_NOTIF.execute(&mut ctx).unwrap();
        assert_eq!(ctx.condition_stack, vec![true]);
    }

    #[test]
    fn test_verify_and_return() {
        let (result, _) = run(&[Opcode::OP_VERIFY], vec![vec![0x80]]);
        assert!(result.unwrap_err().is_negative_verdict());

        let (result, _) = run(&[Opcode::OP_RETURN], vec![]);
        assert!(result.unwrap_err().is_negative_verdict());
    }

    #[test]
    fn test_checksig_underflow() {
        let (result, _) = run(&[Opcode::OP_CHECKSIG], vec![vec![0x01]]);
        assert!(matches!(result, Err(DogeError::StackUnderflow(2))));
    }

    #[test]
    fn test_invalid_and_disabled() {
        let (result, _) = run(&[Opcode::OP_CAT], vec![vec![1], vec![2]]);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Structural);

        let (result, _) = run(&[Opcode::OP_RESERVED], vec![]);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Structural);
    }

    #[test]
    fn test_lock_time_disabled_is_nop() {
        let mut ctx = ExecutionContext::detached();
        ctx.flags.check_lock_time_verify = false;
        Opcode::OP_CHECKLOCKTIMEVERIFY.execute(&mut ctx).unwrap();
        assert!(ctx.stack.is_empty());
    }
}
