//! Error kinds shared across the ledger, surfaced in result objects rather
//! than process aborts. See module docs on `Node` for the one exception
//! (genesis/startup failures).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("input rejected: {0}")]
    InputRejected(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("sequence gap for {src}: expected {expected}, got {got}")]
    SequenceGap {
        src: String,
        expected: u64,
        got: u64,
    },

    #[error("insufficient funds for {src}: balance {balance}, needed {needed}")]
    InsufficientFunds {
        src: String,
        balance: f64,
        needed: f64,
    },

    #[error("duplicate transaction hash {hash} (already at block index {index})")]
    DuplicateHash { hash: String, index: i64 },

    #[error("pending transaction quota exceeded for {src} (max {max})")]
    QuotaExceeded { src: String, max: usize },

    #[error("chain mismatch: {0}")]
    ChainMismatch(String),

    #[error("proof of work invalid: {0}")]
    PoWInvalid(String),

    #[error("timestamp out of window: {0}")]
    TimestampOutOfWindow(String),

    #[error("block audit failed at transaction {hash}: {reason}")]
    AuditFailed { hash: String, reason: String },

    #[error("peer {0} unreachable")]
    PeerUnreachable(String),

    #[error("peer {0} clock skewed")]
    PeerSkewed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
