//! The node context: wires together the wallet store, mempool, blockchain
//! engine, miner orchestrator and peer table behind one explicit struct (no
//! hidden globals), plus `NodeApi`, the typed async functions a future HTTP
//! router would dispatch onto — see the wire table in the crate's top-level
//! documentation for the mapping from path to function.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::instrument;

use crate::blockchain::Blockchain;
use crate::config::Config;
use crate::crypto::{self, MerkleProof};
use crate::error::LedgerError;
use crate::mempool::Mempool;
use crate::miner::MinerOrchestrator;
use crate::network::{AnnouncePayload, PeerInfo, PeerTable};
use crate::network::protocol::{
    BlockHashEntry, BlocksResult, BlocksResultType, TokenAuthRequest, TokenAuthResponse,
    TransactionAdmissionResult, TransactionPrepareResponse, TransactionVerification, VerifiedBlockRef,
};
use crate::transaction::{SequenceView, Transaction, TransactionHandler, TxMeta, TxType};
use crate::wallet::{Wallet, WalletStore};

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A transaction as returned by `transaction?hash=...`: the persisted
/// envelope plus the block index it settled in, if any.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionWithBlockIdx {
    #[serde(flatten)]
    pub tx: Transaction,
    #[serde(rename = "blockIdx")]
    pub block_idx: Option<i64>,
}

pub struct Node {
    pub config: Config,
    pub wallets: Arc<WalletStore>,
    pub mempool: Arc<Mempool>,
    pub chain: Arc<Blockchain>,
    pub miner: Arc<MinerOrchestrator>,
    pub peers: Arc<PeerTable>,
    handler: TransactionHandler,
}

impl Node {
    pub fn open(config: Config) -> Result<Self, LedgerError> {
        let wallets = Arc::new(WalletStore::load(config.wallet_file()).map_err(|e| LedgerError::InputRejected(e.to_string()))?);
        let mempool = Arc::new(Mempool::new(config.mempool.max_pending_per_user));
        let chain = Arc::new(Blockchain::open(
            config.node_blocks_dir(),
            wallets.clone(),
            mempool.clone(),
            config.node_name.clone(),
            1,
            config.network.node_timestamp_tolerance as i64,
        )?);
        let miner = Arc::new(MinerOrchestrator::new(
            chain.clone(),
            mempool.clone(),
            wallets.clone(),
            config.node_name.clone(),
            config.mining.block_min_transactions,
            config.mining.block_max_transactions,
        ));
        let handler = TransactionHandler::new(wallets.clone());

        Ok(Self {
            config,
            wallets,
            mempool,
            chain,
            miner,
            peers: Arc::new(PeerTable::new()),
            handler,
        })
    }

    /// Runs the periodic housekeeping a node's event loop ties to its
    /// timers: mining attempts, staked-mempool eviction. Heartbeat/sync is
    /// driven separately by `SyncService`, which needs a `PeerClient`.
    pub fn purge_stale_mempool(&self) {
        let cutoff = now() - self.config.mempool.pending_transaction_stale as i64;
        self.mempool.purge_stale(cutoff, &self.wallets);
    }
}

/// §6 wire table, realized as plain functions rather than HTTP routes.
pub struct NodeApi<'a> {
    node: &'a Node,
}

impl<'a> NodeApi<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// `GET blocks?fromIndex=N[&type=hashes|meta]`
    pub fn get_blocks(&self, from_index: u64, result_type: BlocksResultType) -> BlocksResult {
        let height = self.node.chain.height();
        let to = (from_index + 100).min(height);
        match result_type {
            BlocksResultType::Full | BlocksResultType::Meta => {
                let blocks: Vec<_> = (from_index..to)
                    .filter_map(|i| crate::blockchain::Block::read(&self.node.config.node_blocks_dir(), i).ok().flatten())
                    .collect();
                BlocksResult::Full(blocks)
            }
            BlocksResultType::Hashes => {
                let hashes: Vec<_> = (from_index..to)
                    .filter_map(|i| self.node.chain.block_hash_at(i).map(|hash| BlockHashEntry { index: i, hash }))
                    .collect();
                BlocksResult::Hashes(hashes)
            }
        }
    }

    /// `GET node/wallets?addresses=a,b`
    pub fn get_wallets(&self, addresses: &[String]) -> Vec<Wallet> {
        self.node.wallets.balances(addresses)
    }

    /// `GET transaction/verify?hash=h1,h2`
    pub fn verify_transactions(&self, hashes: &[String]) -> Result<Vec<TransactionVerification>, LedgerError> {
        let mut out = Vec::new();
        for hash in hashes {
            let Some(index) = self.node.mempool.find_block_index(hash).filter(|i| *i >= 0) else {
                continue;
            };
            let Some(block) = crate::blockchain::Block::read(&self.node.config.node_blocks_dir(), index as u64)
                .map_err(LedgerError::Io)?
            else {
                continue;
            };
            let tx_hashes: Vec<String> = block.transactions.iter().map(|t| t.hash.clone()).collect();
            let proof: MerkleProof = crate::crypto::merkle_proof(&tx_hashes, hash)
                .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
            out.push(TransactionVerification {
                hash: hash.clone(),
                block: VerifiedBlockRef {
                    index: block.index,
                    timestamp: block.timestamp,
                },
                merkle_root: block.merkle_root.clone(),
                proof,
            });
        }
        Ok(out)
    }

    /// `GET transaction?hash=...`
    pub fn get_transactions(&self, hashes: &[String]) -> Vec<TransactionWithBlockIdx> {
        let mut out = Vec::new();
        for hash in hashes {
            let block_idx = self.node.mempool.find_block_index(hash);
            if let Some(idx) = block_idx.filter(|i| *i >= 0) {
                if let Ok(Some(block)) = crate::blockchain::Block::read(&self.node.config.node_blocks_dir(), idx as u64) {
                    if let Some(tx) = block.transactions.into_iter().find(|t| &t.hash == hash) {
                        out.push(TransactionWithBlockIdx { tx, block_idx: Some(idx) });
                    }
                }
            }
        }
        out
    }

    /// `GET transaction/pending`
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.node.mempool.snapshot()
    }

    /// `POST node/announce`
    pub fn announce(&self, incoming: AnnouncePayload) -> AnnouncePayload {
        self.node.peers.upsert(incoming.this_node.clone());
        for peer in incoming.peers {
            self.node.peers.upsert(peer);
        }
        AnnouncePayload {
            this_node: PeerInfo {
                hostname: self.node.config.node_name.clone(),
                node_name: Some(self.node.config.node_name.clone()),
                version: Some(crate::transaction::PROTOCOL_VERSION),
                node_state: Some("READY".to_string()),
                start_time: None,
                timestamp: Some(now()),
                blockchain_height: Some(self.node.chain.height()),
                block_at_height: self.node.chain.tip().map(|b| b.hash),
                pending_transactions_cnt: None,
                ping_error: 0,
                last_ping: Some(now()),
            },
            peers: self.node.peers.snapshot(),
        }
    }

    /// `POST block/announce`
    #[instrument(skip(self, block))]
    pub fn block_announce(&self, block: crate::blockchain::Block) -> Result<(), LedgerError> {
        if block.index == self.node.chain.height() {
            self.node.miner.abort();
        }
        self.node.chain.add_block(block)
    }

    /// `POST transaction` and `POST transaction/announce` share the same
    /// admission pipeline; the only difference is who is calling.
    pub fn admit_transaction(&self, tx: Transaction, staking_miner: &str) -> Result<TransactionAdmissionResult, LedgerError> {
        let mut tx = self.node.handler.sign(tx)?;

        if self.node.mempool.exists(&tx.hash) {
            let idx = self.node.mempool.find_block_index(&tx.hash).unwrap_or(-1);
            return Err(LedgerError::DuplicateHash {
                hash: tx.hash.clone(),
                index: idx,
            });
        }

        self.node.handler.check_sequence(&tx, SequenceView::Mempool)?;
        self.node.handler.check_balance(&tx, SequenceView::Mempool)?;

        let other_stakers = self.node.mempool.pending_miners_for(&tx.src);
        let mut meta = tx.meta.take().unwrap_or_default();
        meta.miner = Some(staking_miner.to_string());
        if let Some(other) = other_stakers.into_iter().find(|m| m != staking_miner) {
            meta.warning = Some(format!("pending on {other}"));
        }
        tx.meta = Some(meta);

        let accepted = self
            .node
            .mempool
            .add(tx)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        if let Err(e) = self.node.handler.apply(&accepted, crate::transaction::ApplyView::Mempool) {
            self.node.mempool.delete(std::slice::from_ref(&accepted.hash));
            return Err(e);
        }

        let wallet = self
            .node
            .wallets
            .get_user(&accepted.src, true)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        Ok(TransactionAdmissionResult {
            hash: accepted.hash,
            fee: accepted.fee,
            balance: wallet.token_slot(&accepted.token).tx.balance,
        })
    }

    /// `POST transaction/prepare`
    pub fn prepare_transaction(&self, src: &str, amount: f64) -> Result<TransactionPrepareResponse, LedgerError> {
        let wallet = self
            .node
            .wallets
            .get_user(src, true)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let fee = self.node.handler.compute_fee(src, amount, 0.0);
        Ok(TransactionPrepareResponse {
            fee,
            seq: wallet.seq.tx + 1,
            public_key: wallet.public_key,
        })
    }

    /// `POST token/auth` — builds (but does not admit) the system
    /// transaction(s) for an admin action. The caller submits the returned
    /// transactions through the normal admission path.
    pub fn token_auth(&self, req: TokenAuthRequest) -> Result<TokenAuthResponse, LedgerError> {
        let admin = req.admin.unwrap_or_else(|| "_".to_string());
        let tx_type = match req.action.as_str() {
            "airdrop" => TxType::MintAirDrop,
            "issue" => TxType::MintIssue,
            other => return Err(LedgerError::InputRejected(format!("unknown token/auth action: {other}"))),
        };
        let mut tx = Transaction {
            timestamp: now(),
            src: crypto::MINT_ACCOUNT.to_string(),
            dest: admin.clone(),
            amount: req.amount,
            token: req.token.clone(),
            fee: 0.0,
            tx_type,
            seq: 0,
            tx_sig: None,
            hash: String::new(),
            source: None,
            note: None,
            meta: None::<TxMeta>,
        };
        tx.hash = self.node.handler.compute_hash(&tx)?;
        Ok(TokenAuthResponse {
            action: req.action,
            fee: 0.0,
            admin,
            transactions: vec![tx],
        })
    }
}
