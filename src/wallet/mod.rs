//! C2: the wallet store. An address book of `{publicKey -> Wallet}` with
//! per-token dual balance views, snapshot/restore for speculative audits,
//! and atomic persistence to a single JSON file.

mod store;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use store::{WalletError, WalletStore};

/// The forward-speculative ("tx") view of a token slot: what the balance
/// would be once every transaction currently in the mempool for this
/// address has settled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxView {
    pub amount: f64,
    pub balance: f64,
}

impl Default for TxView {
    fn default() -> Self {
        Self {
            amount: 0.0,
            balance: 0.0,
        }
    }
}

/// The confirmed ("onChain") view of a token slot, plus a capped history of
/// the block indices that touched it (most-recent-first, capped at 10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnChainView {
    pub amount: f64,
    pub balance: f64,
    #[serde(rename = "historyIdx")]
    pub history_idx: Vec<u64>,
}

impl Default for OnChainView {
    fn default() -> Self {
        Self {
            amount: 0.0,
            balance: 0.0,
            history_idx: Vec::new(),
        }
    }
}

impl OnChainView {
    pub const HISTORY_CAP: usize = 10;

    pub fn record_block(&mut self, block_idx: u64) {
        self.history_idx.insert(0, block_idx);
        self.history_idx.truncate(Self::HISTORY_CAP);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSlot {
    pub tx: TxView,
    #[serde(rename = "onChain")]
    pub on_chain: OnChainView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeqView {
    pub tx: u64,
    #[serde(rename = "onChain")]
    pub on_chain: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "privateKey", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub seq: SeqView,
    #[serde(flatten)]
    pub tokens: HashMap<String, TokenSlot>,
}

impl Wallet {
    pub fn new(name: impl Into<String>, public_key: impl Into<String>, created_at: i64) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(crate::crypto::BASE_TOKEN.to_string(), TokenSlot::default());
        Self {
            name: name.into(),
            public_key: public_key.into(),
            private_key: None,
            created_at,
            seq: SeqView::default(),
            tokens,
        }
    }

    pub fn is_system(&self) -> bool {
        crate::crypto::is_system_name(&self.name)
    }

    pub fn token_slot(&self, token: &str) -> TokenSlot {
        self.tokens.get(token).cloned().unwrap_or_default()
    }

    pub fn token_slot_mut(&mut self, token: &str) -> &mut TokenSlot {
        self.tokens.entry(token.to_string()).or_default()
    }

    /// A redacted clone safe for wire responses: never carries `privateKey`.
    pub fn redacted(&self) -> Wallet {
        let mut w = self.clone();
        w.private_key = None;
        w
    }
}
