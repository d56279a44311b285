//! C5 data model: the transaction envelope, its type tag and node-local
//! metadata. Signing, fee computation, sequencing and ledger mutation live
//! in `handler`.

mod handler;

use serde::{Deserialize, Serialize};

pub use handler::{ApplyView, SequenceView, TransactionHandler, TransactionHandlerError};

/// Percentage of `amount` charged as a fee, before capping.
pub const FEE_PERCENT: f64 = 1.0;
/// Upper bound on any single transaction's fee.
pub const FEE_CAP: f64 = 1_000.0;
/// Units of `BASE_TOKEN` minted into `_mint` at genesis.
pub const GENESIS_ISSUE: f64 = 1_000_000_000.0;
pub const PROTOCOL_VERSION: u32 = 1;

/// Rounds to six decimal places, matching the dust-free accounting invariant.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxType {
    MintIssue,
    MintAirDrop,
    MinerDeposit,
    Transfer,
    MiningReward,
    MiningFees,
    Reversal(String),
}

impl TxType {
    /// Sort bucket used by `Mempool::get_miner_sorted`.
    pub fn sort_order(&self) -> u8 {
        match self {
            TxType::MintIssue => 0,
            TxType::MintAirDrop => 2,
            TxType::MinerDeposit => 3,
            TxType::Transfer => 3,
            TxType::Reversal(_) => 3,
            TxType::MiningFees => 9,
            TxType::MiningReward => 10,
        }
    }

    pub fn is_system_originated(&self) -> bool {
        matches!(
            self,
            TxType::MiningReward | TxType::MiningFees | TxType::Reversal(_)
        )
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::MintIssue => write!(f, "mintIssue"),
            TxType::MintAirDrop => write!(f, "mintAirDrop"),
            TxType::MinerDeposit => write!(f, "minerDeposit"),
            TxType::Transfer => write!(f, "transfer"),
            TxType::MiningReward => write!(f, "miningReward"),
            TxType::MiningFees => write!(f, "miningFees"),
            TxType::Reversal(orig) => write!(f, "reversal:{orig}"),
        }
    }
}

impl std::str::FromStr for TxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "mintIssue" => TxType::MintIssue,
            "mintAirDrop" => TxType::MintAirDrop,
            "minerDeposit" => TxType::MinerDeposit,
            "transfer" => TxType::Transfer,
            "miningReward" => TxType::MiningReward,
            "miningFees" => TxType::MiningFees,
            other => match other.strip_prefix("reversal:") {
                Some(orig) => TxType::Reversal(orig.to_string()),
                None => return Err(format!("unknown transaction type: {other}")),
            },
        })
    }
}

impl TryFrom<String> for TxType {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxType> for String {
    fn from(value: TxType) -> Self {
        value.to_string()
    }
}

/// Node-local bookkeeping: never hashed, never persisted in a block file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<String>,
    #[serde(rename = "queueTime", skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

/// The fields that are hashed: everything except `meta`, `txSig` and `hash`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionBody<'a> {
    pub timestamp: i64,
    pub src: &'a str,
    pub dest: &'a str,
    pub amount: f64,
    pub token: &'a str,
    pub fee: f64,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: &'a Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: &'a Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: i64,
    pub src: String,
    pub dest: String,
    pub amount: f64,
    pub token: String,
    pub fee: f64,
    #[serde(rename = "type", try_from = "String", into = "String")]
    pub tx_type: TxType,
    pub seq: u64,
    #[serde(rename = "txSig", skip_serializing_if = "Option::is_none")]
    pub tx_sig: Option<String>,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<TxMeta>,
}

impl Transaction {
    pub fn body(&self) -> TransactionBody<'_> {
        TransactionBody {
            timestamp: self.timestamp,
            src: &self.src,
            dest: &self.dest,
            amount: self.amount,
            token: &self.token,
            fee: self.fee,
            tx_type: self.tx_type.to_string(),
            seq: self.seq,
            source: &self.source,
            note: &self.note,
        }
    }

    /// Strips `meta` for persistence in a block file (`meta` is node-local).
    pub fn to_persisted(&self) -> Transaction {
        let mut t = self.clone();
        t.meta = None;
        t
    }

    pub fn is_system_src(&self) -> bool {
        crate::crypto::is_system_name(&self.src)
    }
}
