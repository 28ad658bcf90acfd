use serde::{Deserialize, Serialize};

// Re-export logging types
pub use crate::utils::logging::LogLevel;

/// Script verification flags.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct VerifyFlags {
    /// Require strict DER signatures with a defined hash type and SEC-encoded public keys.
    pub strict_encoding: bool,
    /// Reject signatures whose S value is in the upper half of the curve order.
    pub low_s: bool,
    /// Evaluate the redeem script of pay-to-script-hash outputs.
    pub p2sh: bool,
    pub check_lock_time_verify: bool,
    pub check_sequence_verify: bool,
    /// The extra element consumed by `OP_CHECKMULTISIG` must be empty.
    pub null_dummy: bool,
}

impl Default for VerifyFlags {
    fn default() -> Self {
        Self {
            strict_encoding: false,
            low_s: false,
            p2sh: true,
            check_lock_time_verify: true,
            check_sequence_verify: true,
            null_dummy: false,
        }
    }
}

impl VerifyFlags {
    /// Every rule enabled.
    pub fn standard() -> Self {
        Self {
            strict_encoding: true,
            low_s: true,
            p2sh: true,
            check_lock_time_verify: true,
            check_sequence_verify: true,
            null_dummy: true,
        }
    }

    /// No optional rule enabled; lock-time opcodes behave as NOPs.
    pub fn none() -> Self {
        Self {
            strict_encoding: false,
            low_s: false,
            p2sh: false,
            check_lock_time_verify: false,
            check_sequence_verify: false,
            null_dummy: false,
        }
    }
}

/// Engine configuration, loadable from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub flags: VerifyFlags,
    /// Log level applied by [`crate::init`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    /// Trace every executed opcode
    #[serde(default)]
    pub verbose: bool,
}
