#![allow(dead_code)]

use dogescript::primitives::address::Network;
use dogescript::primitives::transaction::{OutPoint, Transaction, TxIn, TxOut, SEQUENCE_FINAL};
use dogescript::script::Script;
use dogescript::transaction_signer::{SigningKey, TransactionSigner};

/// Deterministic key derived from a one-byte seed.
pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

pub fn signer() -> TransactionSigner {
    TransactionSigner::new(Network::Mainnet)
}

/// A transaction spending `inputs` outpoints into a single output.
pub fn spending_transaction(inputs: usize, lock_time: u32, sequence: u32) -> Transaction {
    Transaction {
        version: 1,
        lock_time,
        input: (0..inputs)
            .map(|vout| TxIn {
                previous_output: OutPoint {
                    txid: [0xd0; 32],
                    vout: vout as u32,
                },
                script_sig: vec![],
                sequence,
            })
            .collect(),
        output: vec![TxOut::new(99_000_000, &Script::new_p2pkh(&[0x55; 20]))],
    }
}

pub fn simple_spend() -> Transaction {
    spending_transaction(1, 0, SEQUENCE_FINAL)
}
