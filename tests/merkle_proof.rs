//! A transaction's inclusion proof, returned by `transaction/verify`,
//! verifies against the settling block's own Merkle root.

mod common;

use ledgerchain::crypto::{self, merkle_verify, MINT_ACCOUNT};
use ledgerchain::node::NodeApi;
use ledgerchain::transaction::{Transaction, TxType};
use tempfile::tempdir;

#[test]
fn proof_verifies_against_the_block_merkle_root() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "node0");
    node.wallets.generate("miner0").unwrap();

    let api = NodeApi::new(&node);
    let tx = Transaction {
        timestamp: common::now(),
        src: MINT_ACCOUNT.to_string(),
        dest: "miner0".to_string(),
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
    let admitted = api.admit_transaction(tx, "node0").unwrap();
    let block = common::mine_one_block(&node);

    let verifications = api.verify_transactions(&[admitted.hash.clone()]).unwrap();
    assert_eq!(verifications.len(), 1);
    let verification = &verifications[0];
    assert_eq!(verification.merkle_root, block.merkle_root);
    assert!(merkle_verify(&admitted.hash, &verification.proof, &block.merkle_root).unwrap());
}
