//! A deposit into a non-base token followed by a transfer: both the
//! transfer's amount and its fee are debited from the sender's own token
//! slot, not `BASE_TOKEN`.

mod common;

use ledgerchain::crypto::MINT_ACCOUNT;
use ledgerchain::node::NodeApi;
use ledgerchain::transaction::{round6, Transaction, TxType};
use tempfile::tempdir;

#[test]
fn deposit_then_transfer_settles_fee_in_the_same_token() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "node0");
    node.wallets.generate("fil").unwrap();
    node.wallets.generate("fred").unwrap();

    let api = NodeApi::new(&node);

    let deposit = Transaction {
        timestamp: common::now(),
        src: MINT_ACCOUNT.to_string(),
        dest: "fil".to_string(),
        amount: 500.0,
        token: "fil".to_string(),
        fee: 0.0,
        tx_type: TxType::MinerDeposit,
        seq: 0,
        tx_sig: None,
        hash: String::new(),
        source: None,
        note: None,
        meta: None,
    };
    api.admit_transaction(deposit, "node0").unwrap();
    common::mine_one_block(&node);

    let fil = node.wallets.get_user("fil", false).unwrap();
    assert_eq!(fil.token_slot("fil").on_chain.balance, 500.0);

    let prepared = api.prepare_transaction("fil", 1.369).unwrap();
    assert_eq!(prepared.fee, 0.01369);
    assert_eq!(prepared.seq, 1);

    let transfer = Transaction {
        timestamp: common::now(),
        src: "fil".to_string(),
        dest: "fred".to_string(),
        amount: 1.369,
        token: "fil".to_string(),
        fee: prepared.fee,
        tx_type: TxType::Transfer,
        seq: prepared.seq,
        tx_sig: None,
        hash: String::new(),
        source: None,
        note: None,
        meta: None,
    };
    api.admit_transaction(transfer, "node0").unwrap();
    common::mine_one_block(&node);

    let fil = node.wallets.get_user("fil", false).unwrap();
    let fred = node.wallets.get_user("fred", false).unwrap();
    assert_eq!(
        fil.token_slot("fil").on_chain.balance,
        round6(500.0 - 1.369 - 0.01369)
    );
    assert_eq!(fred.token_slot("fil").on_chain.balance, 1.369);
}
