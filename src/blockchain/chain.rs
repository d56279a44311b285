//! C6: the blockchain engine. Owns the in-memory chain array, the one-file-
//! per-block store on disk, and the reward/difficulty schedule. Every
//! mutation to wallet balances on the confirmed side of the ledger flows
//! through `add_block`'s audit-then-commit pipeline.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::blockchain::block::{hash_meets_difficulty, Block};
use crate::blockchain::reward;
use crate::crypto::{self, MINT_ACCOUNT};
use crate::error::LedgerError;
use crate::mempool::Mempool;
use crate::transaction::{round6, ApplyView, SequenceView, Transaction, TransactionHandler, TxType, GENESIS_ISSUE};
use crate::wallet::WalletStore;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct Blockchain {
    blocks_dir: PathBuf,
    node_name: String,
    protocol_version: u32,
    timestamp_tolerance: i64,
    chain: RwLock<Vec<Block>>,
    wallets: Arc<WalletStore>,
    mempool: Arc<Mempool>,
    handler: TransactionHandler,
}

impl Blockchain {
    /// Loads every block file starting at index 0 until one is missing or
    /// fails audit. If block 0 is absent, synthesizes and commits the
    /// genesis block (a single `mintIssue` of `GENESIS_ISSUE` to `_mint`).
    pub fn open(
        blocks_dir: PathBuf,
        wallets: Arc<WalletStore>,
        mempool: Arc<Mempool>,
        node_name: String,
        protocol_version: u32,
        timestamp_tolerance: i64,
    ) -> Result<Self, LedgerError> {
        let handler = TransactionHandler::new(wallets.clone());
        let chain = Self {
            blocks_dir,
            node_name,
            protocol_version,
            timestamp_tolerance,
            chain: RwLock::new(Vec::new()),
            wallets,
            mempool,
            handler,
        };

        let mut index = 0u64;
        loop {
            match Block::read(&chain.blocks_dir, index).map_err(LedgerError::Io)? {
                Some(block) => {
                    chain.add_block_inner(block, true)?;
                    index += 1;
                }
                None => break,
            }
        }

        if chain.height() == 0 {
            chain.commit_genesis()?;
        }

        Ok(chain)
    }

    fn commit_genesis(&self) -> Result<(), LedgerError> {
        let mut tx = Transaction {
            timestamp: now(),
            src: "_".to_string(),
            dest: MINT_ACCOUNT.to_string(),
            amount: GENESIS_ISSUE,
            token: crypto::BASE_TOKEN.to_string(),
            fee: 0.0,
            tx_type: TxType::MintIssue,
            seq: 0,
            tx_sig: None,
            hash: String::new(),
            source: None,
            note: Some("genesis issuance".to_string()),
            meta: None,
        };
        tx.hash = self.handler.compute_hash(&tx)?;
        let block = Block::new(
            0,
            String::new(),
            self.protocol_version,
            tx.timestamp,
            self.node_name.clone(),
            vec![tx],
        )
        .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        self.add_block_inner(block, true)
    }

    pub fn height(&self) -> u64 {
        self.chain.read().len() as u64
    }

    pub fn tip(&self) -> Option<Block> {
        self.chain.read().last().cloned()
    }

    /// Lower bound for a candidate block at `index`: the average timestamp
    /// of up to the three blocks immediately preceding it, minus the
    /// tolerance window.
    fn timestamp_floor(&self, index: u64) -> i64 {
        let chain = self.chain.read();
        let start = index.saturating_sub(3) as usize;
        let end = index as usize;
        let window = &chain[start..end];
        let avg = window.iter().map(|b| b.timestamp).sum::<i64>() / window.len() as i64;
        avg - self.timestamp_tolerance
    }

    pub fn block_hash_at(&self, index: u64) -> Option<String> {
        self.chain.read().get(index as usize).map(|b| b.hash.clone())
    }

    pub fn reward_schedule(&self, height: u64) -> (f64, u32) {
        (reward::reward_at_height(height), reward::difficulty_at_height(height))
    }

    /// Assembles an unmined candidate block over `transactions`, stamped
    /// with this node's name and the chain's current tip.
    pub fn prepare_block(&self, transactions: Vec<Transaction>) -> Result<Block, LedgerError> {
        let prev_hash = self.tip().map(|b| b.hash).unwrap_or_default();
        let index = self.height();
        Block::new(
            index,
            prev_hash,
            self.protocol_version,
            now(),
            self.node_name.clone(),
            transactions,
        )
        .map_err(|e| LedgerError::InputRejected(e.to_string()))
    }

    /// Audits and, on success, commits `block`: writes the file (unless
    /// present, as happens on startup replay), applies every transaction
    /// for real, appends to the in-memory chain, and reconciles the
    /// mempool's hash index.
    pub fn add_block(&self, block: Block) -> Result<(), LedgerError> {
        self.add_block_inner(block, false)
    }

    fn add_block_inner(&self, block: Block, replay: bool) -> Result<(), LedgerError> {
        let expected_index = self.height();
        if block.index != expected_index {
            return Err(LedgerError::ChainMismatch(format!(
                "expected block index {expected_index}, got {}",
                block.index
            )));
        }
        if !block.hash_is_consistent() {
            return Err(LedgerError::PoWInvalid(format!(
                "block {} hash does not match its fields",
                block.index
            )));
        }
        if block.index > 0 {
            let tip = self.tip().expect("non-genesis block requires a tip");
            if block.prev_hash != tip.hash {
                return Err(LedgerError::ChainMismatch(format!(
                    "block {} prevHash does not match tip",
                    block.index
                )));
            }
            if !replay {
                let floor = self.timestamp_floor(block.index);
                let ceiling = now() + self.timestamp_tolerance;
                if block.timestamp < floor || block.timestamp > ceiling {
                    return Err(LedgerError::TimestampOutOfWindow(format!(
                        "block {} timestamp {} outside [{floor}, {ceiling}]",
                        block.index, block.timestamp
                    )));
                }
            }
            let (_, difficulty) = self.reward_schedule(block.index);
            if !hash_meets_difficulty(&block.hash, difficulty) {
                return Err(LedgerError::PoWInvalid(format!(
                    "block {} hash does not meet difficulty {difficulty}",
                    block.index
                )));
            }
        }

        self.audit_transactions(&block)?;

        if Block::read(&self.blocks_dir, block.index)
            .map_err(LedgerError::Io)?
            .is_none()
        {
            block.write(&self.blocks_dir).map_err(LedgerError::Io)?;
        }

        for tx in &block.transactions {
            let also_update_tx = !self.mempool.exists(&tx.hash);
            self.handler.apply(
                tx,
                ApplyView::Block {
                    block_idx: block.index,
                    also_update_tx,
                },
            )?;
            let _ = self.mempool.update_block_idx(&tx.hash, block.index as i64);
        }
        let hashes: Vec<String> = block.transactions.iter().map(|t| t.hash.clone()).collect();
        self.mempool.delete(&hashes);

        self.chain.write().push(block);
        Ok(())
    }

    /// Dry-runs every transaction in `block` against a snapshot of the
    /// wallets it touches, checking sequence, balance and role rules
    /// without leaving any trace if the block is ultimately rejected.
    fn audit_transactions(&self, block: &Block) -> Result<(), LedgerError> {
        let mut names: HashSet<String> = HashSet::new();
        for tx in &block.transactions {
            names.insert(tx.src.clone());
            names.insert(tx.dest.clone());
        }
        names.insert(MINT_ACCOUNT.to_string());

        let mut pubkeys = Vec::new();
        for name in &names {
            let wallet = self
                .wallets
                .get_user(name, true)
                .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
            pubkeys.push(wallet.public_key);
        }
        let snapshot = self.wallets.user_snapshots(&pubkeys);

        let result = self.run_audit(block);

        self.wallets.user_restores(snapshot);
        result
    }

    fn run_audit(&self, block: &Block) -> Result<(), LedgerError> {
        let (expected_reward, _) = self.reward_schedule(block.index);
        let mut mining_reward_count = 0u32;
        let mut fee_sources: HashSet<String> = HashSet::new();

        for tx in &block.transactions {
            match &tx.tx_type {
                TxType::MiningReward => {
                    mining_reward_count += 1;
                    if mining_reward_count > 1 {
                        return Err(LedgerError::AuditFailed {
                            hash: tx.hash.clone(),
                            reason: "more than one miningReward in block".into(),
                        });
                    }
                    if tx.dest != block.miner_name || round6(tx.amount) != round6(expected_reward) {
                        return Err(LedgerError::AuditFailed {
                            hash: tx.hash.clone(),
                            reason: "miningReward destination or amount does not match schedule".into(),
                        });
                    }
                }
                TxType::MiningFees => {
                    let source = tx.source.clone().ok_or_else(|| LedgerError::AuditFailed {
                        hash: tx.hash.clone(),
                        reason: "miningFees missing source reference".into(),
                    })?;
                    let referenced: Vec<&Transaction> = block
                        .transactions
                        .iter()
                        .filter(|other| other.hash == source)
                        .collect();
                    if referenced.len() != 1 {
                        return Err(LedgerError::AuditFailed {
                            hash: tx.hash.clone(),
                            reason: "miningFees source does not match exactly one transaction".into(),
                        });
                    }
                    if round6(tx.amount) != round6(referenced[0].fee) {
                        return Err(LedgerError::AuditFailed {
                            hash: tx.hash.clone(),
                            reason: "miningFees amount does not match the referenced transaction's fee".into(),
                        });
                    }
                    if !fee_sources.insert(source) {
                        return Err(LedgerError::AuditFailed {
                            hash: tx.hash.clone(),
                            reason: "more than one miningFees claims the same source transaction".into(),
                        });
                    }
                }
                _ => {}
            }

            self.handler.check_sequence(tx, SequenceView::Block)?;
            self.handler.check_balance(tx, SequenceView::Block)?;
            self.handler.apply(
                tx,
                ApplyView::Block {
                    block_idx: block.index,
                    also_update_tx: false,
                },
            )?;
        }
        Ok(())
    }

    /// Replaces the tail of the chain from `blocks[0].index` onward with
    /// `blocks`. If `force_overwrite` and the local chain is already taller
    /// than that index, every locally-mined user/admin transaction about to
    /// be dropped is re-staked into the mempool (system-originated
    /// transactions are not, since they are regenerated by whichever chain
    /// wins). The local tail is then truncated, wallets reset, and the
    /// chain rebuilt by replaying the retained prefix before applying the
    /// incoming blocks in order.
    pub fn add_chain(&self, blocks: Vec<Block>, force_overwrite: bool) -> Result<(), LedgerError> {
        let Some(first) = blocks.first() else {
            return Ok(());
        };
        let from_index = first.index;

        if force_overwrite && self.height() > from_index {
            let dropped: Vec<Block> = {
                let chain = self.chain.read();
                chain[from_index as usize..].to_vec()
            };
            let mut to_restake = Vec::new();
            let mut dropped_hashes = Vec::new();
            for block in &dropped {
                for tx in &block.transactions {
                    dropped_hashes.push(tx.hash.clone());
                    if !tx.tx_type.is_system_originated() {
                        let mut fresh = tx.clone();
                        let mut meta = fresh.meta.take().unwrap_or_default();
                        meta.miner = Some(self.node_name.clone());
                        fresh.meta = Some(meta);
                        to_restake.push(fresh);
                    }
                }
            }

            self.rebuild_from_prefix(from_index)?;
            self.mempool.forget(&dropped_hashes);

            for tx in to_restake {
                let _ = self.mempool.add(tx);
            }
        }

        for block in blocks {
            self.add_block(block)?;
        }
        Ok(())
    }

    /// Truncates the local chain to `from_index`, resets every wallet's
    /// balance state to zero, and replays the retained prefix to rebuild
    /// `onChain` (and, since none of it is mempool-pending any more, `tx`)
    /// balances, history and sequence counters from scratch.
    fn rebuild_from_prefix(&self, from_index: u64) -> Result<(), LedgerError> {
        let retained: Vec<Block> = {
            let mut chain = self.chain.write();
            chain.truncate(from_index as usize);
            chain.clone()
        };

        self.wallets.reset_balances();

        for block in &retained {
            for tx in &block.transactions {
                self.handler.apply(
                    tx,
                    ApplyView::Block {
                        block_idx: block.index,
                        also_update_tx: true,
                    },
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine() -> (Blockchain, Arc<WalletStore>, Arc<Mempool>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wallets = Arc::new(WalletStore::load(dir.path().join("wallet.json")).unwrap());
        let mempool = Arc::new(Mempool::new(16));
        let chain = Blockchain::open(
            dir.path().join("blocks"),
            wallets.clone(),
            mempool.clone(),
            "node0".to_string(),
            1,
            7200,
        )
        .unwrap();
        (chain, wallets, mempool, dir)
    }

    #[test]
    fn opening_a_fresh_store_synthesizes_genesis() {
        let (chain, wallets, _mempool, _dir) = engine();
        assert_eq!(chain.height(), 1);
        let mint = wallets.get_user("_mint", false).unwrap();
        assert_eq!(mint.token_slot(crypto::BASE_TOKEN).on_chain.balance, GENESIS_ISSUE);
    }

    #[test]
    fn reopening_replays_the_existing_chain() {
        let dir = tempdir().unwrap();
        let wallets = Arc::new(WalletStore::load(dir.path().join("wallet.json")).unwrap());
        let mempool = Arc::new(Mempool::new(16));
        {
            Blockchain::open(dir.path().join("blocks"), wallets.clone(), mempool.clone(), "node0".into(), 1, 7200).unwrap();
        }
        let wallets2 = Arc::new(WalletStore::load(dir.path().join("wallet.json")).unwrap());
        let mempool2 = Arc::new(Mempool::new(16));
        let reopened = Blockchain::open(dir.path().join("blocks"), wallets2, mempool2, "node0".into(), 1, 7200).unwrap();
        assert_eq!(reopened.height(), 1);
    }

    #[test]
    fn reward_schedule_matches_formula() {
        let (chain, ..) = engine();
        assert_eq!(chain.reward_schedule(0), (100.0, 2));
        assert_eq!(chain.reward_schedule(10), (50.0, 3));
    }

    fn mined(prev_hash: String, index: u64, miner: &str, difficulty: u32, txs: Vec<Transaction>) -> Block {
        let mut block = Block::new(index, prev_hash, 1, now(), miner.to_string(), txs).unwrap();
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
    fn add_chain_restakes_dropped_transactions_under_a_fresh_hash_lookup() {
        let (chain, wallets, mempool, _dir) = engine();
        wallets.generate("alice").unwrap();

        let handler = TransactionHandler::new(wallets.clone());
        let mut dropped_tx = Transaction {
            timestamp: now(),
            src: MINT_ACCOUNT.to_string(),
            dest: "alice".to_string(),
            amount: 10.0,
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
        dropped_tx.hash = handler.compute_hash(&dropped_tx).unwrap();
        mempool.add(dropped_tx.clone()).unwrap();

        let (_, difficulty) = chain.reward_schedule(1);
        let genesis_hash = chain.block_hash_at(0).unwrap();
        let block1 = mined(genesis_hash, 1, "node0", difficulty, vec![dropped_tx]);
        chain.add_block(block1).unwrap();
        assert_eq!(chain.height(), 2);

        let genesis_hash = chain.block_hash_at(0).unwrap();
        let mut rival_tx = Transaction {
            timestamp: now(),
            src: MINT_ACCOUNT.to_string(),
            dest: "alice".to_string(),
            amount: 5.0,
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
        rival_tx.hash = handler.compute_hash(&rival_tx).unwrap();
        let rival_block1 = mined(genesis_hash, 1, "other", difficulty, vec![rival_tx]);
        chain.add_chain(vec![rival_block1], true).unwrap();

        let restaked = mempool.snapshot();
        assert_eq!(restaked.len(), 1);
        assert_eq!(restaked[0].amount, 10.0);
    }
}
