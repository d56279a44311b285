//! Layered node configuration: built-in defaults, optionally overridden by a
//! `config.toml` file, then by the environment variables named in the wire
//! protocol's external-interfaces section. Mirrors the shape (defaults ->
//! `from_file`/`to_file` via `toml`, a dedicated `ConfigError`) used
//! throughout this codebase's existing configuration layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Seconds between `announce` gossip rounds to all known peers.
    pub heartbeat_interval: u64,
    /// Seconds a freshly started node waits before considering itself online.
    pub online_delay: u64,
    /// Allowed clock skew (seconds) when admitting a peer-reported timestamp.
    pub node_timestamp_tolerance: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 30,
            online_delay: 5,
            node_timestamp_tolerance: 7200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MempoolConfig {
    /// Per-sender cap on queued-but-unconfirmed transactions.
    pub max_pending_per_user: usize,
    /// Seconds after which a queued transaction is purged as stale.
    pub pending_transaction_stale: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_pending_per_user: 16,
            pending_transaction_stale: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningConfig {
    /// Seconds between mining-orchestrator READY attempts.
    pub try_interval: u64,
    /// Minimum non-system transactions required before a block is attempted.
    pub block_min_transactions: usize,
    /// Maximum transactions pulled into a single block.
    pub block_max_transactions: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            try_interval: 10,
            block_min_transactions: 1,
            block_max_transactions: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WalletConfig {
    /// Directory holding `wallet.json`.
    pub wallet_dir: PathBuf,
    /// Name of the wallet this node signs on behalf of, if any.
    pub user_wallet: Option<String>,
    /// Base58 private key this node uses to sign its own mining/admin transactions.
    pub blockchain_private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// This node's identity (used as `minerName` and as the P2P peer name).
    pub node_name: String,
    /// Root directory for `{data_dir}/{node_name}/NNNNNN.json` block files.
    pub data_dir: PathBuf,
    pub network: NetworkConfig,
    pub mempool: MempoolConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("./data"))
            .join("ledgerchain");

        Self {
            node_name: "node0".to_string(),
            data_dir: data_dir.clone(),
            network: NetworkConfig::default(),
            mempool: MempoolConfig::default(),
            mining: MiningConfig::default(),
            wallet: WalletConfig {
                wallet_dir: data_dir.join("wallet"),
                user_wallet: None,
                blockchain_private_key: None,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Applies the environment variables named in the external-interfaces
    /// section on top of whatever defaults/file values are already set.
    /// Unset variables leave the current value untouched; malformed numeric
    /// variables are ignored (default/file value wins).
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("HEARTBEAT_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.network.heartbeat_interval = n;
            }
        }
        if let Ok(v) = std::env::var("ONLINE_DELAY") {
            if let Ok(n) = v.parse() {
                self.network.online_delay = n;
            }
        }
        if let Ok(v) = std::env::var("NODE_TIMESTAMP_TOLERANCE") {
            if let Ok(n) = v.parse() {
                self.network.node_timestamp_tolerance = n;
            }
        }
        if let Ok(v) = std::env::var("MINING_TRY_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.mining.try_interval = n;
            }
        }
        if let Ok(v) = std::env::var("MAX_PENDING_PER_USER") {
            if let Ok(n) = v.parse() {
                self.mempool.max_pending_per_user = n;
            }
        }
        if let Ok(v) = std::env::var("PENDING_TRANSACTION_STALE") {
            if let Ok(n) = v.parse() {
                self.mempool.pending_transaction_stale = n;
            }
        }
        if let Ok(v) = std::env::var("BLOCKCHAIN_PRIVATEKEY") {
            self.wallet.blockchain_private_key = Some(v);
        }
        if let Ok(v) = std::env::var("USER_WALLET") {
            self.wallet.user_wallet = Some(v);
        }
        if let Ok(v) = std::env::var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WALLET_DIR") {
            self.wallet.wallet_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("NODE_NAME") {
            self.node_name = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Validation("node_name must not be empty".into()));
        }
        if self.mempool.max_pending_per_user == 0 {
            return Err(ConfigError::Validation(
                "mempool.max_pending_per_user must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn node_blocks_dir(&self) -> PathBuf {
        self.data_dir.join(&self.node_name)
    }

    pub fn wallet_file(&self) -> PathBuf {
        self.wallet.wallet_dir.join("wallet.json")
    }

    pub fn get_config_file(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "serialize error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
