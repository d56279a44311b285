//! Binary entry point for ledgerchain's node process: loads configuration,
//! opens the ledger, and drives the mining/heartbeat/housekeeping timers
//! until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::interval;
use tracing::{error, info, warn};

use ledgerchain::config::Config;
use ledgerchain::network::{ReqwestPeerClient, SyncService};
use ledgerchain::node::Node;

fn load_config() -> Config {
    let config_path = std::env::var("CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(_) => Config::default(),
    };
    config.apply_env_overrides()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config();
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }
    std::fs::create_dir_all(&config.wallet.wallet_dir)?;
    std::fs::create_dir_all(config.node_blocks_dir())?;

    info!(node_name = %config.node_name, "starting node");
    let node = Arc::new(Node::open(config.clone())?);
    info!(height = node.chain.height(), "ledger opened");

    let client = Arc::new(ReqwestPeerClient::new(config.node_name.clone()));
    let sync = Arc::new(SyncService::new(
        node.peers.clone(),
        client,
        node.chain.clone(),
        config.node_name.clone(),
        format!("{}:8080", config.node_name),
    ));

    let mut mining_timer = interval(Duration::from_secs(config.mining.try_interval));
    let mut heartbeat_timer = interval(Duration::from_secs(config.network.heartbeat_interval));
    let mut housekeeping_timer = interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = mining_timer.tick() => {
                if let Err(e) = node.miner.tick() {
                    warn!(error = %e, "miner tick failed");
                }
                if let Some(outcome) = node.miner.poll() {
                    info!(?outcome, "mining outcome");
                }
            }
            _ = heartbeat_timer.tick() => {
                sync.heartbeat_tick().await;
            }
            _ = housekeeping_timer.tick() => {
                node.purge_stale_mempool();
            }
            _ = signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    Ok(())
}
