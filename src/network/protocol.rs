//! C9 wire types: the HTTP+JSON request/response shapes every row of the
//! external wire table (see crate docs on `node`) is built from. Route
//! dispatch and transport are out of scope here; these are the payloads a
//! router would marshal to and from the `NodeApi` functions in `node.rs`.

use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::transaction::Transaction;
use crate::wallet::Wallet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub hostname: String,
    #[serde(rename = "nodeName", skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(rename = "nodeState", skip_serializing_if = "Option::is_none")]
    pub node_state: Option<String>,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(rename = "blockchainHeight", skip_serializing_if = "Option::is_none")]
    pub blockchain_height: Option<u64>,
    #[serde(rename = "blockAtHeight", skip_serializing_if = "Option::is_none")]
    pub block_at_height: Option<String>,
    #[serde(rename = "pendingTransactionsCnt", skip_serializing_if = "Option::is_none")]
    pub pending_transactions_cnt: Option<usize>,
    #[serde(rename = "pingError", default)]
    pub ping_error: u32,
    #[serde(rename = "lastPing", skip_serializing_if = "Option::is_none")]
    pub last_ping: Option<i64>,
}

impl PeerInfo {
    pub fn bare(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            node_name: None,
            version: None,
            node_state: None,
            start_time: None,
            timestamp: None,
            blockchain_height: None,
            block_at_height: None,
            pending_transactions_cnt: None,
            ping_error: 0,
            last_ping: None,
        }
    }
}

/// `node/announce` request and response body (the two are the same shape:
/// each side reports its own state and known peers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncePayload {
    #[serde(rename = "self")]
    pub this_node: PeerInfo,
    pub peers: Vec<PeerInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BlocksResultType {
    Full,
    Hashes,
    Meta,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlocksQuery {
    pub from_index: u64,
    pub result_type: BlocksResultType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHashEntry {
    pub index: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlocksResult {
    Full(Vec<Block>),
    Hashes(Vec<BlockHashEntry>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result: T,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(result: T) -> Self {
        Self { error: None, result }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionVerification {
    pub hash: String,
    pub block: VerifiedBlockRef,
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    pub proof: crate::crypto::MerkleProof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedBlockRef {
    pub index: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSubmission {
    pub tx: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAdmissionResult {
    pub hash: String,
    pub fee: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPrepareRequest {
    pub src: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPrepareResponse {
    pub fee: f64,
    pub seq: u64,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAuthRequest {
    pub action: String,
    pub token: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAuthResponse {
    pub action: String,
    pub fee: f64,
    pub admin: String,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsQuery {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsResult {
    pub result: Vec<Wallet>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("peer returned malformed response: {0}")]
    Malformed(String),
    #[error("peer unreachable: {0}")]
    Unreachable(String),
}
