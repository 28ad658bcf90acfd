//! # dogescript
//!
//! The Dogecoin script engine: the stack machine that decides whether a
//! transaction input may spend the output it references, and builders for
//! the locking scripts it evaluates.
//!
//! ## Quick Start
//!
//! ```rust
//! use dogescript::primitives::address::Network;
//! use dogescript::primitives::transaction::{OutPoint, SigHashType, Transaction, TxIn, TxOut};
//! use dogescript::script::{factory, ScriptMachine};
//! use dogescript::transaction_signer::{SigningKey, TransactionSigner};
//! use dogescript::VerifyFlags;
//!
//! let signer = TransactionSigner::new(Network::Mainnet);
//! let key = SigningKey::from_slice(&[0x11; 32])?;
//! let prev_output = TxOut::new(100_000_000, &factory::standard::p2pkh(&signer.address(&key))?);
//!
//! let mut tx = Transaction {
//!     version: 1,
//!     lock_time: 0,
//!     input: vec![TxIn {
//!         previous_output: OutPoint { txid: [0x42; 32], vout: 0 },
//!         script_sig: vec![],
//!         sequence: 0xffff_ffff,
//!     }],
//!     output: vec![],
//! };
//! signer.sign_p2pkh(&mut tx, 0, &prev_output, &key, SigHashType::All)?;
//!
//! let machine = ScriptMachine::new(VerifyFlags::standard());
//! assert!(machine.verify_transaction(&tx, 0, &prev_output, 0)?);
//! # Ok::<(), dogescript::DogeError>(())
//! ```
//!
//! ## Architecture Overview
//!
//! - [`script`]: opcodes, the script container, execution context, machine and factory
//! - [`primitives`]: transactions, addresses, hashing and wire encoding
//! - [`transaction_signer`]: signatures and unlocking scripts for standard templates
//! - [`utils`]: logging and configuration
//!
//! ## Error Handling
//!
//! All public APIs return [`Result<T, DogeError>`](error::DogeError).
//! [`DogeError::kind`] separates a spend that is simply not authorized
//! ([`ErrorKind::NegativeVerdict`]) from scripts that could not be evaluated.
//!
//! ## Thread Safety
//!
//! Each verification owns its [`script::ExecutionContext`]. A
//! [`script::ScriptMachine`] is `Send + Sync` and can verify the inputs of a
//! transaction in parallel with [`script::ScriptMachine::verify_inputs`].

pub mod error;
pub mod primitives;
pub mod script;
pub mod transaction_signer;
pub mod types;
pub mod utils;

pub use error::{DogeError, ErrorKind, Result};
pub use types::{EngineConfig, VerifyFlags};

/// Initializes logging for the engine. Safe to call more than once; only
/// the first call installs the logger.
pub fn init(config: &EngineConfig) -> Result<()> {
    // It's ok if this fails, it just means logging was already initialized.
    let _ = utils::logging::logger_builder(config.log_level).try_init();

    log::info!("Script engine initialized with config: {:?}", config);
    Ok(())
}
