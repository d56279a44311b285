//! Shared scaffolding for the end-to-end scenario tests: a `Node` rooted in
//! a fresh temp directory, and a helper that drives the miner orchestrator
//! to completion (these tests only ever run at difficulty 2 or 3, so a
//! bounded polling loop never spins for long).

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ledgerchain::blockchain::Block;
use ledgerchain::config::Config;
use ledgerchain::miner::MiningOutcome;
use ledgerchain::node::Node;

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn test_config(root: &Path, node_name: &str) -> Config {
    let mut config = Config::default();
    config.node_name = node_name.to_string();
    config.data_dir = root.join("data");
    config.wallet.wallet_dir = root.join("wallet");
    config
}

pub fn open_node(root: &Path, node_name: &str) -> Node {
    let config = test_config(root, node_name);
    std::fs::create_dir_all(config.node_blocks_dir()).unwrap();
    std::fs::create_dir_all(&config.wallet.wallet_dir).unwrap();
    Node::open(config).expect("node opens")
}

/// Ticks and polls the orchestrator until a mining attempt concludes.
/// Panics if the attempt is aborted or rejected, since no test in this
/// pack triggers either path deliberately.
pub fn mine_one_block(node: &Node) -> Block {
    node.miner.tick().expect("tick succeeds");
    loop {
        if let Some(outcome) = node.miner.poll() {
            return match outcome {
                MiningOutcome::Committed(block) => *block,
                other => panic!("expected a committed block, got {other:?}"),
            };
        }
    }
}
