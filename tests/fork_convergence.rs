//! When a competing block at the same height arrives with an older
//! timestamp, it displaces the local block: any local transaction it
//! drops goes back to the mempool to be re-mined, and the winning chain's
//! balances take over.

mod common;

use ledgerchain::blockchain::Block;
use ledgerchain::crypto::{self, MINT_ACCOUNT};
use ledgerchain::node::NodeApi;
use ledgerchain::transaction::{Transaction, TxType, PROTOCOL_VERSION};
use tempfile::tempdir;

fn mine_manual_block(
    prev_hash: String,
    index: u64,
    timestamp: i64,
    miner_name: &str,
    difficulty: u32,
    transactions: Vec<Transaction>,
) -> Block {
    let mut block = Block::new(index, prev_hash, PROTOCOL_VERSION, timestamp, miner_name.to_string(), transactions).unwrap();
    let mut nonce = 0u64;
    loop {
        block.nonce = nonce;
        block.hash = block.calc_hash();
        if block.meets_difficulty(difficulty) {
            break;
        }
        nonce += 1;
    }
    block
}

#[test]
fn older_tip_wins_at_equal_height_and_local_tx_is_restaked() {
    let dir = tempdir().unwrap();
    let node = common::open_node(dir.path(), "nodeA");
    let api = NodeApi::new(&node);

    node.wallets.generate("alice").unwrap();
    node.wallets.generate("bob").unwrap();

    let newer = common::now();
    let older = newer - 10;

    let airdrop_alice = Transaction {
        timestamp: newer,
        src: MINT_ACCOUNT.to_string(),
        dest: "alice".to_string(),
        amount: 50.0,
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
    api.admit_transaction(airdrop_alice, "nodeA").unwrap();
    common::mine_one_block(&node);
    assert_eq!(node.chain.height(), 2);

    let (_, difficulty) = node.chain.reward_schedule(1);
    let genesis_hash = node.chain.block_hash_at(0).unwrap();

    let mut airdrop_bob = Transaction {
        timestamp: older,
        src: MINT_ACCOUNT.to_string(),
        dest: "bob".to_string(),
        amount: 30.0,
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
    airdrop_bob.hash = crypto::hash(&airdrop_bob.body()).unwrap();

    let rival_block1 = mine_manual_block(genesis_hash, 1, older, "nodeB", difficulty, vec![airdrop_bob]);

    node.chain.add_chain(vec![rival_block1], true).unwrap();
    assert_eq!(node.chain.height(), 2);

    let bob = node.wallets.get_user("bob", false).unwrap();
    assert_eq!(bob.token_slot(crypto::BASE_TOKEN).on_chain.balance, 30.0);
    let alice = node.wallets.get_user("alice", false).unwrap();
    assert_eq!(alice.token_slot(crypto::BASE_TOKEN).on_chain.balance, 0.0);

    let restaked = node.mempool.snapshot();
    assert!(restaked.iter().any(|tx| tx.dest == "alice" && tx.tx_type == TxType::MintAirDrop));

    common::mine_one_block(&node);
    assert_eq!(node.chain.height(), 3);
    let alice = node.wallets.get_user("alice", false).unwrap();
    assert_eq!(alice.token_slot(crypto::BASE_TOKEN).on_chain.balance, 50.0);
}
