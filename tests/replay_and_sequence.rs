//! Two admission-time guards: a resubmitted, already-settled transaction is
//! rejected as a duplicate rather than silently re-applied, and a sender
//! cannot skip ahead in their own sequence.

mod common;

use ledgerchain::crypto::{self, MINT_ACCOUNT};
use ledgerchain::error::LedgerError;
use ledgerchain::node::NodeApi;
use ledgerchain::transaction::{Transaction, TxType};
use tempfile::tempdir;

fn fund_alice(node: &ledgerchain::node::Node, api: &NodeApi<'_>) {
    node.wallets.generate("alice").unwrap();
    node.wallets.generate("bob").unwrap();
    let airdrop = Transaction {
        timestamp: common::now(),
        src: MINT_ACCOUNT.to_string(),
        dest: "alice".to_string(),
        amount: 100.0,
        token: crypto::BASE_TOKEN.to_string(),
        fee: 0.0,
        tx_type: TxType::MintAirDrop,
        seq: 0,
        tx_sig: None,
        hash: String::new(),
        source: None,
        note: None,
        meta: None,
    };
    api.admit_transaction(airdrop, "node0").unwrap();
    common::mine_one_block(node);
}

#[test]
fn resubmitting_a_settled_transaction_is_rejected_as_duplicate() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "node0");
    let api = NodeApi::new(&node);
    fund_alice(&node, &api);

    let prepared = api.prepare_transaction("alice", 10.0).unwrap();
    let transfer = Transaction {
        timestamp: common::now(),
        src: "alice".to_string(),
        dest: "bob".to_string(),
        amount: 10.0,
        token: crypto::BASE_TOKEN.to_string(),
        fee: prepared.fee,
        tx_type: TxType::Transfer,
        seq: prepared.seq,
        tx_sig: None,
        hash: String::new(),
        source: None,
        note: None,
        meta: None,
    };

    api.admit_transaction(transfer.clone(), "node0").unwrap();
    common::mine_one_block(&node);

    let before = node.mempool.snapshot().len();
    let err = api.admit_transaction(transfer, "node0").unwrap_err();
    match err {
        LedgerError::DuplicateHash { index, .. } => assert!(index >= 0),
        other => panic!("expected DuplicateHash, got {other:?}"),
    }
    assert_eq!(node.mempool.snapshot().len(), before);
}

#[test]
fn skipping_ahead_in_sequence_is_rejected() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "node0");
    let api = NodeApi::new(&node);
    fund_alice(&node, &api);

    let prepared = api.prepare_transaction("alice", 10.0).unwrap();
    let transfer = Transaction {
        timestamp: common::now(),
        src: "alice".to_string(),
        dest: "bob".to_string(),
        amount: 10.0,
        token: crypto::BASE_TOKEN.to_string(),
        fee: prepared.fee,
        tx_type: TxType::Transfer,
        seq: prepared.seq + 1,
        tx_sig: None,
        hash: String::new(),
        source: None,
        note: None,
        meta: None,
    };

    let err = api.admit_transaction(transfer, "node0").unwrap_err();
    match err {
        LedgerError::SequenceGap { expected, got, .. } => {
            assert_eq!(expected, prepared.seq);
            assert_eq!(got, prepared.seq + 1);
        }
        other => panic!("expected SequenceGap, got {other:?}"),
    }
}
