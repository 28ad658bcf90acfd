//! End-to-end verification of signed spends.

mod common;

use common::*;
use dogescript::primitives::address::Network;
use dogescript::primitives::hash::hash160;
use dogescript::primitives::transaction::{SigHashType, TxOut};
use dogescript::script::factory::{self, HashOperator};
use dogescript::script::{ExecutionContext, Opcode, Script, ScriptMachine};
use dogescript::transaction_signer::TransactionSigner;
use dogescript::{ErrorKind, VerifyFlags};

const LOCK_TIME: u32 = 1_700_000_000;

fn machine() -> ScriptMachine {
    ScriptMachine::new(VerifyFlags::standard())
}

#[test]
fn test_p2pkh_spend() {
    let signer = signer();
    let owner = key(1);
    let prev_output = TxOut::new(100_000_000, &factory::standard::p2pkh(&signer.address(&owner)).unwrap());

    let mut tx = simple_spend();
    signer
        .sign_p2pkh(&mut tx, 0, &prev_output, &owner, SigHashType::All)
        .unwrap();

    assert!(machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap());
}

#[test]
fn test_p2pkh_signature_from_other_key() {
    let signer = signer();
    let owner = key(1);
    let thief = key(2);
    let lock_script = factory::standard::p2pkh(&signer.address(&owner)).unwrap();
    let prev_output = TxOut::new(100_000_000, &lock_script);

    let mut tx = simple_spend();
    let signature = signer
        .sign_input(&tx, 0, &lock_script, &thief, SigHashType::All)
        .unwrap();
    tx.input[0].script_sig = TransactionSigner::p2pkh_unlock_script(&signature, &owner.public_key_bytes())
        .unwrap()
        .to_bytes();

    let err = machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegativeVerdict);
}

#[test]
fn test_p2pkh_wrong_public_key_fails_equalverify() {
    let signer = signer();
    let owner = key(1);
    let other = key(2);
    let lock_script = factory::standard::p2pkh(&signer.address(&owner)).unwrap();
    let prev_output = TxOut::new(1, &lock_script);

    let mut tx = simple_spend();
    let signature = signer
        .sign_input(&tx, 0, &lock_script, &other, SigHashType::All)
        .unwrap();
    tx.input[0].script_sig = TransactionSigner::p2pkh_unlock_script(&signature, &other.public_key_bytes())
        .unwrap()
        .to_bytes();

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

#[test]
fn test_signature_commits_to_outputs() {
    let signer = signer();
    let owner = key(1);
    let prev_output = TxOut::new(1, &factory::standard::p2pkh(&signer.address(&owner)).unwrap());

    let mut tx = simple_spend();
    signer
        .sign_p2pkh(&mut tx, 0, &prev_output, &owner, SigHashType::All)
        .unwrap();
    tx.output[0].value -= 1;

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

#[test]
fn test_sighash_none_allows_output_changes() {
    let signer = signer();
    let owner = key(1);
    let prev_output = TxOut::new(1, &factory::standard::p2pkh(&signer.address(&owner)).unwrap());

    let mut tx = simple_spend();
    signer
        .sign_p2pkh(&mut tx, 0, &prev_output, &owner, SigHashType::None)
        .unwrap();
    tx.output[0].value -= 1;

    assert!(machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap());
}

#[test]
fn test_p2pk_spend() {
    let signer = signer();
    let owner = key(3);
    let lock_script = factory::standard::p2pk(&owner.public_key).unwrap();
    let prev_output = TxOut::new(1, &lock_script);

    let mut tx = simple_spend();
    let signature = signer
        .sign_input(&tx, 0, &lock_script, &owner, SigHashType::All)
        .unwrap();
    tx.input[0].script_sig = Script::new().append_data(&signature).unwrap().to_bytes();

    assert!(machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap());
}

fn two_of_three() -> (Script, Vec<dogescript::transaction_signer::SigningKey>) {
    let keys = vec![key(1), key(2), key(3)];
    let public_keys: Vec<_> = keys.iter().map(|k| k.public_key).collect();
    (factory::standard::multisig(&public_keys, 2).unwrap(), keys)
}

#[test]
fn test_p2sh_multisig_spend() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let prev_output = TxOut::new(100_000_000, &factory::standard::p2sh(&redeem_script));

    for signers in [[0usize, 1], [0, 2], [1, 2]] {
        let chosen = vec![keys[signers[0]].clone(), keys[signers[1]].clone()];
        let mut tx = simple_spend();
        signer
            .sign_p2sh_multisig(&mut tx, 0, &redeem_script, &chosen, SigHashType::All)
            .unwrap();
        assert!(machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap());
    }
}

#[test]
fn test_p2sh_multisig_signatures_out_of_order() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let prev_output = TxOut::new(1, &factory::standard::p2sh(&redeem_script));

    let mut tx = simple_spend();
    let chosen = vec![keys[2].clone(), keys[0].clone()];
    signer
        .sign_p2sh_multisig(&mut tx, 0, &redeem_script, &chosen, SigHashType::All)
        .unwrap();

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

#[test]
fn test_p2sh_multisig_one_signature_short() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let prev_output = TxOut::new(1, &factory::standard::p2sh(&redeem_script));

    let tx = simple_spend();
    let only = signer
        .sign_input(&tx, 0, &redeem_script, &keys[0], SigHashType::All)
        .unwrap();
    let mut tx = tx;
    tx.input[0].script_sig = TransactionSigner::p2sh_multisig_unlock_script(&[only.clone(), only], &redeem_script)
        .unwrap()
        .to_bytes();

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

#[test]
fn test_p2sh_unlock_must_be_literals_only() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let prev_output = TxOut::new(1, &factory::standard::p2sh(&redeem_script));

    let mut tx = simple_spend();
    signer
        .sign_p2sh_multisig(&mut tx, 0, &redeem_script, &keys[..2], SigHashType::All)
        .unwrap();
    let tampered = tx.input[0]
        .unlock_script()
        .unwrap()
        .append(Opcode::OP_NOP)
        .unwrap();
    tx.input[0].script_sig = tampered.to_bytes();

    let err = machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_p2sh_wrong_redeem_script() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let other_redeem = factory::standard::multisig_all(&[keys[0].public_key]).unwrap();
    let prev_output = TxOut::new(1, &factory::standard::p2sh(&other_redeem));

    let mut tx = simple_spend();
    signer
        .sign_p2sh_multisig(&mut tx, 0, &redeem_script, &keys[..2], SigHashType::All)
        .unwrap();

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

#[test]
fn test_multisig_requires_null_dummy_under_standard_flags() {
    let signer = signer();
    let (redeem_script, keys) = two_of_three();
    let prev_output = TxOut::new(1, &factory::standard::p2sh(&redeem_script));

    let mut tx = simple_spend();
    let sig_a = signer
        .sign_input(&tx, 0, &redeem_script, &keys[0], SigHashType::All)
        .unwrap();
    let sig_b = signer
        .sign_input(&tx, 0, &redeem_script, &keys[1], SigHashType::All)
        .unwrap();
    let unlock = Script::new()
        .append(Opcode::OP_1)
        .unwrap()
        .append_data(&sig_a)
        .unwrap()
        .append_data(&sig_b)
        .unwrap()
        .append_data(redeem_script.as_bytes())
        .unwrap();
    tx.input[0].script_sig = unlock.to_bytes();

    let err = machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    let lax = ScriptMachine::new(VerifyFlags::default());
    assert!(lax.verify_transaction(&tx, 0, &prev_output, 0).unwrap());
}

struct Htlc {
    script: Script,
    recipient: dogescript::transaction_signer::SigningKey,
    sender: dogescript::transaction_signer::SigningKey,
    secret: Vec<u8>,
}

fn htlc(hash_op: HashOperator) -> Htlc {
    let signer = signer();
    let recipient = key(4);
    let sender = key(5);
    let secret = b"much secret, very hidden".to_vec();
    let digest = hash_op.hash(&secret);
    let script = factory::htlc::build(
        &signer.address(&recipient),
        &signer.address(&sender),
        LOCK_TIME,
        &digest,
        hash_op,
    )
    .unwrap();
    Htlc {
        script,
        recipient,
        sender,
        secret,
    }
}

#[test]
fn test_htlc_hash_reveal_branch() {
    for hash_op in [HashOperator::Hash160, HashOperator::Sha256] {
        let contract = htlc(hash_op);
        let prev_output = TxOut::new(1, &contract.script);

        let mut tx = simple_spend();
        let signature = signer()
            .sign_input(&tx, 0, &contract.script, &contract.recipient, SigHashType::All)
            .unwrap();
        tx.input[0].script_sig = TransactionSigner::htlc_redeem_script(
            &signature,
            &contract.recipient.public_key_bytes(),
            &contract.secret,
        )
        .unwrap()
        .to_bytes();

        assert!(machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap());
    }
}

#[test]
fn test_htlc_wrong_secret() {
    let contract = htlc(HashOperator::Hash160);
    let prev_output = TxOut::new(1, &contract.script);

    let mut tx = simple_spend();
    let signature = signer()
        .sign_input(&tx, 0, &contract.script, &contract.recipient, SigHashType::All)
        .unwrap();
    tx.input[0].script_sig = TransactionSigner::htlc_redeem_script(
        &signature,
        &contract.recipient.public_key_bytes(),
        b"guess",
    )
    .unwrap()
    .to_bytes();

    assert!(machine()
        .verify_transaction(&tx, 0, &prev_output, 0)
        .unwrap_err()
        .is_negative_verdict());
}

fn refund(tx_lock_time: u32, block_timestamp: u32) -> dogescript::Result<bool> {
    let contract = htlc(HashOperator::Hash160);
    let prev_output = TxOut::new(1, &contract.script);

    let mut tx = spending_transaction(1, tx_lock_time, 0xffff_fffe);
    let signature = signer()
        .sign_input(&tx, 0, &contract.script, &contract.sender, SigHashType::All)
        .unwrap();
    tx.input[0].script_sig =
        TransactionSigner::htlc_refund_script(&signature, &contract.sender.public_key_bytes())
            .unwrap()
            .to_bytes();

    machine().verify_transaction(&tx, 0, &prev_output, block_timestamp)
}

#[test]
fn test_htlc_timeout_branch_after_lock_time() {
    assert!(refund(LOCK_TIME + 60, LOCK_TIME + 600).unwrap());
    assert!(refund(LOCK_TIME, LOCK_TIME).unwrap());
}

#[test]
fn test_htlc_timeout_branch_before_lock_time() {
    let err = refund(LOCK_TIME - 1, LOCK_TIME + 600).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegativeVerdict);
}

#[test]
fn test_htlc_timeout_branch_block_time_behind() {
    let err = refund(LOCK_TIME + 60, LOCK_TIME).unwrap_err();
    assert!(err.is_negative_verdict());
}

#[test]
fn test_htlc_timeout_branch_height_lock_time() {
    let err = refund(700_000, LOCK_TIME + 600).unwrap_err();
    assert!(err.is_negative_verdict());
}

#[test]
fn test_lock_time_gated_p2pkh() {
    let signer = signer();
    let owner = key(6);
    let lock_script = factory::lock_time::build_for_address(&signer.address(&owner), 1_000).unwrap();
    let prev_output = TxOut::new(1, &lock_script);

    for (tx_lock_time, sequence, authorized) in [
        (1_000, 0, true),
        (999, 0, false),
        (1_000, 0xffff_ffff, false),
    ] {
        let mut tx = spending_transaction(1, tx_lock_time, sequence);
        let signature = signer
            .sign_input(&tx, 0, &lock_script, &owner, SigHashType::All)
            .unwrap();
        tx.input[0].script_sig = TransactionSigner::p2pkh_unlock_script(&signature, &owner.public_key_bytes())
            .unwrap()
            .to_bytes();

        let result = machine().verify_transaction(&tx, 0, &prev_output, 0);
        if authorized {
            assert!(result.unwrap());
        } else {
            assert!(result.unwrap_err().is_negative_verdict());
        }
    }
}

#[test]
fn test_code_separator_limits_signed_code() {
    let signer = signer();
    let owner = key(7);
    let tail = Script::new()
        .append_data(&owner.public_key_bytes())
        .unwrap()
        .append(Opcode::OP_CHECKSIG)
        .unwrap();
    let lock_script = Script::new()
        .append(Opcode::OP_NOP)
        .unwrap()
        .append(Opcode::OP_CODESEPARATOR)
        .unwrap()
        .append_script(&tail)
        .unwrap();
    let prev_output = TxOut::new(1, &lock_script);

    for (script_code, authorized) in [(&tail, true), (&lock_script, false)] {
        let mut tx = simple_spend();
        let signature = signer
            .sign_input(&tx, 0, script_code, &owner, SigHashType::All)
            .unwrap();
        tx.input[0].script_sig = Script::new().append_data(&signature).unwrap().to_bytes();

        let result = machine().verify_transaction(&tx, 0, &prev_output, 0);
        assert_eq!(result.is_ok(), authorized);
    }
}

#[test]
fn test_strict_encoding_rejects_malformed_signature() {
    let signer = signer();
    let owner = key(1);
    let lock_script = factory::standard::p2pkh(&signer.address(&owner)).unwrap();
    let prev_output = TxOut::new(1, &lock_script);

    let mut tx = simple_spend();
    tx.input[0].script_sig = TransactionSigner::p2pkh_unlock_script(&[0x30, 0x02, 0x01], &owner.public_key_bytes())
        .unwrap()
        .to_bytes();

    let err = machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CryptoDelegate);

    // Without strict encoding the same signature is just invalid.
    let lax = ScriptMachine::new(VerifyFlags::default());
    let err = lax.verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegativeVerdict);
}

#[test]
fn test_checksig_stack_underflow() {
    let mut context = ExecutionContext::detached();
    let lock = Script::from_asm("OP_CHECKSIG").unwrap();
    let unlock = Script::new().append_data(&[0x30]).unwrap();
    let err = ScriptMachine::default().verify(&lock, &unlock, &mut context).unwrap_err();
    assert!(matches!(err, dogescript::DogeError::StackUnderflow(2)));
    assert_eq!(err.kind(), ErrorKind::StackUnderflow);
}

#[test]
fn test_oversized_script_rejected_before_execution() {
    let mut tx = simple_spend();
    tx.input[0].script_sig = vec![0x51; 10_001];
    let prev_output = TxOut::new(1, &Script::from_asm("OP_1").unwrap());

    let err = machine().verify_transaction(&tx, 0, &prev_output, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_verify_inputs_in_parallel() {
    let signer = signer();
    let owners = vec![key(1), key(2), key(3), key(4)];
    let prev_outputs: Vec<TxOut> = owners
        .iter()
        .map(|owner| TxOut::new(1, &factory::standard::p2pkh(&signer.address(owner)).unwrap()))
        .collect();

    let mut tx = spending_transaction(owners.len(), 0, 0xffff_ffff);
    for (index, owner) in owners.iter().enumerate() {
        signer
            .sign_p2pkh(&mut tx, index, &prev_outputs[index], owner, SigHashType::All)
            .unwrap();
    }
    // Input 3 claims input 2's signature.
    tx.input[3].script_sig = tx.input[2].script_sig.clone();

    let results = machine().verify_inputs(&tx, &prev_outputs, 0).unwrap();
    assert_eq!(results.len(), 4);
    assert!(*results[0].as_ref().unwrap());
    assert!(*results[1].as_ref().unwrap());
    assert!(*results[2].as_ref().unwrap());
    assert!(results[3].as_ref().unwrap_err().is_negative_verdict());
}

#[test]
fn test_p2sh_address_round_trip_to_lock_script() {
    let (redeem_script, _) = two_of_three();
    let address = dogescript::primitives::address::Address::p2sh(&redeem_script, Network::Mainnet);
    let lock_script = Script::pay_to_address(&address);
    assert_eq!(lock_script, redeem_script.to_p2sh());
    assert_eq!(
        Script::from_address_payload(&address.payload()).unwrap_err().kind(),
        ErrorKind::Construction
    );
    assert_eq!(lock_script.extract_hash160(), Some(hash160(redeem_script.as_bytes())));
}
