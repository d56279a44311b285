//! C4: the pending-transaction pool. Tracks every transaction hash this
//! node has ever seen (`undef -> pending(-1) -> committed(N>=0)`) and holds
//! the still-pending queue, ordered by arrival, that `get_miner_sorted`
//! draws candidate blocks from.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::crypto;
use crate::transaction::{Transaction, TxMeta};
use crate::wallet::WalletStore;

#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction {0} is already known")]
    AlreadyKnown(String),
    #[error("pending transaction quota exceeded for {src} (max {max})")]
    QuotaExceeded { src: String, max: usize },
    #[error("invalid block-index transition for {hash}: {from:?} -> {to}")]
    InvalidTransition { hash: String, from: Option<i64>, to: i64 },
    #[error("unknown transaction hash: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy)]
struct HashEntry {
    /// -1 while only queued; >= 0 once committed to that block index.
    index: i64,
    created_at: i64,
}

struct Inner {
    hash_index: HashMap<String, HashEntry>,
    queue: Vec<Transaction>,
}

pub struct Mempool {
    inner: RwLock<Inner>,
    max_pending_per_user: usize,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Arguments to `get_miner_sorted`.
pub struct MinerBatchRequest<'a> {
    pub miner: &'a str,
    pub max_transactions: usize,
}

impl Mempool {
    pub fn new(max_pending_per_user: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                hash_index: HashMap::new(),
                queue: Vec::new(),
            }),
            max_pending_per_user,
        }
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.inner.read().hash_index.contains_key(hash)
    }

    pub fn find_block_index(&self, hash: &str) -> Option<i64> {
        self.inner.read().hash_index.get(hash).map(|e| e.index)
    }

    /// Applies the hash state machine's allowed transitions: `undef -> idx`,
    /// `-1 -> idx>=0`. Rejects `idx>=0 -> -1` and any change between two
    /// different non-negative indices.
    pub fn update_block_idx(&self, hash: &str, idx: i64) -> Result<(), MempoolError> {
        let mut inner = self.inner.write();
        match inner.hash_index.get_mut(hash) {
            None => {
                inner.hash_index.insert(
                    hash.to_string(),
                    HashEntry {
                        index: idx,
                        created_at: now(),
                    },
                );
                Ok(())
            }
            Some(entry) => {
                if entry.index == idx {
                    return Ok(());
                }
                if entry.index >= 0 {
                    return Err(MempoolError::InvalidTransition {
                        hash: hash.to_string(),
                        from: Some(entry.index),
                        to: idx,
                    });
                }
                if idx < 0 {
                    return Err(MempoolError::InvalidTransition {
                        hash: hash.to_string(),
                        from: Some(entry.index),
                        to: idx,
                    });
                }
                entry.index = idx;
                Ok(())
            }
        }
    }

    /// Admits `tx` into the queue: rejects a duplicate hash or a sender
    /// already at its pending quota, stamps `meta.queueTime`, and records
    /// the hash as `pending(-1)`.
    pub fn add(&self, mut tx: Transaction) -> Result<Transaction, MempoolError> {
        let mut inner = self.inner.write();
        if inner.hash_index.contains_key(&tx.hash) {
            return Err(MempoolError::AlreadyKnown(tx.hash.clone()));
        }
        if !crypto::is_system_name(&tx.src) {
            let pending = inner.queue.iter().filter(|q| q.src == tx.src).count();
            if pending >= self.max_pending_per_user {
                return Err(MempoolError::QuotaExceeded {
                    src: tx.src.clone(),
                    max: self.max_pending_per_user,
                });
            }
        }
        let mut meta: TxMeta = tx.meta.take().unwrap_or_default();
        meta.queue_time = Some(now());
        tx.meta = Some(meta);

        inner.hash_index.insert(
            tx.hash.clone(),
            HashEntry {
                index: -1,
                created_at: now(),
            },
        );
        inner.queue.push(tx.clone());
        Ok(tx)
    }

    /// Selects this miner's staked, sequence-ready candidates for the next
    /// block, up to `max_transactions`. Enforces per-sender sequentiality
    /// against `wallets`' confirmed `onChain.seq`: a transaction whose `seq`
    /// has already been passed is dropped (and its hash removed); one ahead
    /// of the next expected value is deferred to a later round.
    pub fn get_miner_sorted(&self, req: MinerBatchRequest<'_>, wallets: &WalletStore) -> Vec<Transaction> {
        let mut inner = self.inner.write();
        let mut candidates: Vec<Transaction> = inner
            .queue
            .iter()
            .filter(|tx| tx.meta.as_ref().and_then(|m| m.miner.as_deref()) == Some(req.miner))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            a.tx_type
                .sort_order()
                .cmp(&b.tx_type.sort_order())
                .then(a.timestamp.cmp(&b.timestamp))
                .then(a.src.cmp(&b.src))
                .then(a.seq.cmp(&b.seq))
        });

        let mut next_seq: HashMap<String, u64> = HashMap::new();
        let mut emitted = Vec::new();
        let mut to_drop = Vec::new();

        for tx in candidates {
            if emitted.len() >= req.max_transactions {
                break;
            }
            if crypto::is_system_name(&tx.src) {
                emitted.push(tx);
                continue;
            }
            let expected = *next_seq.entry(tx.src.clone()).or_insert_with(|| {
                wallets
                    .get_user(&tx.src, true)
                    .map(|w| w.seq.on_chain + 1)
                    .unwrap_or(1)
            });
            if tx.seq == expected {
                next_seq.insert(tx.src.clone(), expected + 1);
                emitted.push(tx);
            } else if tx.seq < expected {
                to_drop.push(tx.hash.clone());
            }
            // tx.seq > expected: deferred, stays in queue untouched.
        }

        for hash in &to_drop {
            inner.queue.retain(|q| &q.hash != hash);
            inner.hash_index.remove(hash);
        }

        emitted
    }

    /// Removes queue entries by hash. A hash still pending (`-1`) is fully
    /// forgotten; a committed hash (`>=0`) stays in the index as an
    /// immutable record even after its queue entry is gone.
    pub fn delete(&self, hashes: &[String]) {
        let mut inner = self.inner.write();
        inner.queue.retain(|tx| !hashes.contains(&tx.hash));
        for hash in hashes {
            let still_pending = inner
                .hash_index
                .get(hash)
                .map(|e| e.index < 0)
                .unwrap_or(false);
            if still_pending {
                inner.hash_index.remove(hash);
            }
        }
    }

    /// Evicts queue entries staked before `cutoff` (epoch seconds), and for
    /// any sender left with no pending entries, resyncs its `tx` view back
    /// to `onChain` (discarding speculative balance/amount that no
    /// transaction will ever settle).
    pub fn purge_stale(&self, cutoff: i64, wallets: &WalletStore) {
        let (stale_hashes, remaining_srcs): (Vec<String>, Vec<String>) = {
            let inner = self.inner.read();
            let stale: Vec<String> = inner
                .queue
                .iter()
                .filter(|tx| tx.meta.as_ref().and_then(|m| m.queue_time).unwrap_or(0) < cutoff)
                .map(|tx| tx.hash.clone())
                .collect();
            let remaining: Vec<String> = inner
                .queue
                .iter()
                .filter(|tx| !stale.contains(&tx.hash))
                .map(|tx| tx.src.clone())
                .collect();
            (stale, remaining)
        };
        if stale_hashes.is_empty() {
            return;
        }
        let affected_srcs: Vec<String> = {
            let inner = self.inner.read();
            stale_hashes
                .iter()
                .filter_map(|h| inner.queue.iter().find(|tx| &tx.hash == h).map(|tx| tx.src.clone()))
                .collect()
        };
        self.delete(&stale_hashes);
        for src in affected_srcs {
            if crypto::is_system_name(&src) || remaining_srcs.contains(&src) {
                continue;
            }
            if let Ok(pk) = wallets.get_public_key(&src) {
                let _ = wallets.update(&pk, |w| {
                    for (_, slot) in w.tokens.iter_mut() {
                        slot.tx.balance = slot.on_chain.balance;
                        slot.tx.amount = slot.on_chain.amount;
                    }
                    w.seq.tx = w.seq.on_chain;
                });
            }
        }
    }

    /// Unconditionally forgets `hashes`, regardless of their committed
    /// state. Used when a reorg drops the blocks that settled them, so the
    /// transactions can be re-staked and re-admitted under a fresh hash
    /// lookup instead of being rejected as already-committed forever.
    pub fn forget(&self, hashes: &[String]) {
        let mut inner = self.inner.write();
        for hash in hashes {
            inner.hash_index.remove(hash);
        }
    }

    /// Every transaction still queued, arrival order. Used by the
    /// `transaction/pending` wire call.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.read().queue.clone()
    }

    /// Pending-count for `src`, used by admission-warning logic: if another
    /// node already staked a pending transaction for this sender, the
    /// caller should attach `meta.warning`.
    pub fn pending_miners_for(&self, src: &str) -> Vec<String> {
        self.inner
            .read()
            .queue
            .iter()
            .filter(|tx| tx.src == src)
            .filter_map(|tx| tx.meta.as_ref().and_then(|m| m.miner.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use crate::transaction::TxType;
    use tempfile::tempdir;

    fn tx(src: &str, seq: u64, hash: &str, miner: &str) -> Transaction {
        Transaction {
            timestamp: 0,
            src: src.into(),
            dest: "bob".into(),
            amount: 1.0,
            token: crypto::BASE_TOKEN.into(),
            fee: 0.0,
            tx_type: TxType::Transfer,
            seq,
            tx_sig: None,
            hash: hash.into(),
            source: None,
            note: None,
            meta: Some(TxMeta {
                miner: Some(miner.into()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn add_rejects_duplicate_hash() {
        let pool = Mempool::new(16);
        pool.add(tx("alice", 1, "h1", "node0")).unwrap();
        assert!(pool.add(tx("alice", 2, "h1", "node0")).is_err());
    }

    #[test]
    fn add_rejects_over_quota() {
        let pool = Mempool::new(1);
        pool.add(tx("alice", 1, "h1", "node0")).unwrap();
        assert!(matches!(
            pool.add(tx("alice", 2, "h2", "node0")),
            Err(MempoolError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn update_block_idx_follows_state_machine() {
        let pool = Mempool::new(16);
        pool.add(tx("alice", 1, "h1", "node0")).unwrap();
        assert_eq!(pool.find_block_index("h1"), Some(-1));
        pool.update_block_idx("h1", 5).unwrap();
        assert_eq!(pool.find_block_index("h1"), Some(5));
        assert!(pool.update_block_idx("h1", -1).is_err());
        assert!(pool.update_block_idx("h1", 6).is_err());
    }

    #[test]
    fn get_miner_sorted_defers_out_of_order_seq() {
        let dir = tempdir().unwrap();
        let wallets = WalletStore::load(dir.path().join("wallet.json")).unwrap();
        wallets.generate("alice").unwrap();

        let pool = Mempool::new(16);
        pool.add(tx("alice", 2, "h2", "node0")).unwrap();
        pool.add(tx("alice", 1, "h1", "node0")).unwrap();

        let batch = pool.get_miner_sorted(
            MinerBatchRequest {
                miner: "node0",
                max_transactions: 10,
            },
            &wallets,
        );
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].hash, "h1");
    }
}
