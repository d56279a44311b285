//! An airdrop admitted through the mempool settles alongside the block's
//! own mining reward once mined.

mod common;

use ledgerchain::crypto::{self, MINT_ACCOUNT};
use ledgerchain::node::NodeApi;
use ledgerchain::transaction::{Transaction, TxType};
use tempfile::tempdir;

#[test]
fn airdrop_settles_with_mining_reward() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "miner0");
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
    api.admit_transaction(tx, "miner0").unwrap();

    let (reward, _difficulty) = node.chain.reward_schedule(node.chain.height());
    common::mine_one_block(&node);

    let miner0 = node.wallets.get_user("miner0", false).unwrap();
    assert_eq!(
        miner0.token_slot(crypto::BASE_TOKEN).on_chain.balance,
        100.0 + reward
    );
}
