//! Dogecoin script: opcode catalog, program container, execution context,
//! verification machine and template factory.

pub mod checker;
pub mod context;
pub mod factory;
pub mod machine;
pub mod num;
pub mod opcode;
pub mod program;

pub use checker::{Secp256k1Checker, SignatureChecker};
pub use context::ExecutionContext;
pub use factory::HashOperator;
pub use machine::ScriptMachine;
pub use opcode::{Opcode, OpcodeKind};
pub use program::{Instruction, Script};

/// Maximum serialized script length.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum payload of a single push.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push opcodes executed per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum combined depth of the main and alternate stacks.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys `OP_CHECKMULTISIG` accepts.
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Maximum number of keys the multisig builder puts in a standard script.
pub const MAX_STANDARD_MULTISIG_KEYS: usize = 15;
