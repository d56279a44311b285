//! C8: the explicit mining state machine. Runs cooperatively with the
//! mempool, transaction handler and blockchain engine on the node's event
//! loop; only the worker thread itself runs in parallel.

use std::sync::mpsc::TryRecvError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::blockchain::Block;
use crate::blockchain::Blockchain;
use crate::crypto::MINT_ACCOUNT;
use crate::error::LedgerError;
use crate::mempool::{Mempool, MinerBatchRequest};
use crate::miner::worker::{spawn_worker, WorkerHandle, WorkerRequest, WorkerResponse};
use crate::transaction::{Transaction, TransactionHandler, TxType};
use crate::wallet::WalletStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerState {
    Ready,
    Mining,
    Commit,
    RollbackRewards,
}

/// Outcome of polling the active mining attempt, if any.
#[derive(Debug)]
pub enum MiningOutcome {
    Committed(Box<Block>),
    RejectedByAudit(LedgerError),
    Aborted,
}

struct ActiveMining {
    worker: WorkerHandle,
}

struct Inner {
    state: MinerState,
    active: Option<ActiveMining>,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct MinerOrchestrator {
    chain: Arc<Blockchain>,
    mempool: Arc<Mempool>,
    wallets: Arc<WalletStore>,
    handler: TransactionHandler,
    node_name: String,
    block_min_transactions: usize,
    block_max_transactions: usize,
    inner: Mutex<Inner>,
}

impl MinerOrchestrator {
    pub fn new(
        chain: Arc<Blockchain>,
        mempool: Arc<Mempool>,
        wallets: Arc<WalletStore>,
        node_name: String,
        block_min_transactions: usize,
        block_max_transactions: usize,
    ) -> Self {
        let handler = TransactionHandler::new(wallets.clone());
        Self {
            chain,
            mempool,
            wallets,
            handler,
            node_name,
            block_min_transactions,
            block_max_transactions,
            inner: Mutex::new(Inner {
                state: MinerState::Ready,
                active: None,
            }),
        }
    }

    pub fn state(&self) -> MinerState {
        self.inner.lock().state
    }

    /// READY: pulls a candidate batch, builds fee/reward transactions,
    /// prepares a block and dispatches it to the worker. No-op outside
    /// READY, or if fewer than `block_min_transactions` user transactions
    /// are available.
    pub fn tick(&self) -> Result<(), LedgerError> {
        {
            let inner = self.inner.lock();
            if inner.state != MinerState::Ready {
                return Ok(());
            }
        }

        let user_txs = self.mempool.get_miner_sorted(
            MinerBatchRequest {
                miner: &self.node_name,
                max_transactions: self.block_max_transactions,
            },
            &self.wallets,
        );
        let user_txs: Vec<Transaction> = user_txs
            .into_iter()
            .filter(|tx| !tx.tx_type.is_system_originated())
            .collect();

        if user_txs.len() < self.block_min_transactions {
            return Ok(());
        }

        let height = self.chain.height();
        let (reward_amount, difficulty) = self.chain.reward_schedule(height);

        let mut reward_txs = Vec::new();
        for tx in &user_txs {
            if tx.fee > 0.0 {
                reward_txs.push(self.build_system_tx(
                    MINT_ACCOUNT,
                    &self.node_name,
                    tx.fee,
                    &tx.token,
                    TxType::MiningFees,
                    Some(tx.hash.clone()),
                )?);
            }
        }
        reward_txs.push(self.build_system_tx(
            MINT_ACCOUNT,
            &self.node_name,
            reward_amount,
            crate::crypto::BASE_TOKEN,
            TxType::MiningReward,
            None,
        )?);

        let mut all_txs = user_txs;
        all_txs.extend(reward_txs);

        let candidate = self.chain.prepare_block(all_txs)?;
        let worker = spawn_worker();
        worker
            .requests
            .send(WorkerRequest::Mine {
                block: candidate,
                difficulty,
                start_nonce: 0,
                nonce_end: u64::MAX,
            })
            .map_err(|_| LedgerError::InputRejected("miner worker channel closed".into()))?;

        let mut inner = self.inner.lock();
        inner.state = MinerState::Mining;
        inner.active = Some(ActiveMining { worker });
        Ok(())
    }

    fn build_system_tx(
        &self,
        src: &str,
        dest: &str,
        amount: f64,
        token: &str,
        tx_type: TxType,
        source: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = Transaction {
            timestamp: now(),
            src: src.to_string(),
            dest: dest.to_string(),
            amount,
            token: token.to_string(),
            fee: 0.0,
            tx_type,
            seq: 0,
            tx_sig: None,
            hash: String::new(),
            source,
            note: None,
            meta: None,
        };
        tx.hash = self.handler.compute_hash(&tx)?;
        Ok(tx)
    }

    /// Sends `ABORT` to the active worker, e.g. because a peer's block for
    /// the same height audited successfully first.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        if let Some(active) = &inner.active {
            active.worker.abort();
        }
        if inner.state == MinerState::Mining {
            inner.state = MinerState::RollbackRewards;
        }
    }

    /// Non-blocking check for worker progress. Returns `Some` only when the
    /// mining attempt has concluded (committed, rejected, or aborted).
    pub fn poll(&self) -> Option<MiningOutcome> {
        let mut inner = self.inner.lock();
        let Some(active) = &inner.active else {
            return None;
        };

        match active.worker.responses.try_recv() {
            Ok(WorkerResponse::Update { .. }) => None,
            Ok(WorkerResponse::Solved { block, .. }) => {
                inner.state = MinerState::Commit;
                let outcome = match self.chain.add_block(block.clone()) {
                    Ok(()) => MiningOutcome::Committed(Box::new(block)),
                    Err(e) => MiningOutcome::RejectedByAudit(e),
                };
                inner.state = MinerState::Ready;
                inner.active = None;
                Some(outcome)
            }
            Ok(WorkerResponse::Aborted) => {
                inner.state = MinerState::Ready;
                inner.active = None;
                Some(MiningOutcome::Aborted)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                inner.state = MinerState::Ready;
                inner.active = None;
                Some(MiningOutcome::Aborted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use crate::transaction::TransactionHandler as Handler;
    use tempfile::tempdir;

    fn setup() -> (Arc<Blockchain>, Arc<Mempool>, Arc<WalletStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wallets = Arc::new(WalletStore::load(dir.path().join("wallet.json")).unwrap());
        let mempool = Arc::new(Mempool::new(16));
        let chain = Arc::new(
            Blockchain::open(
                dir.path().join("blocks"),
                wallets.clone(),
                mempool.clone(),
                "node0".to_string(),
                1,
                7200,
            )
            .unwrap(),
        );
        (chain, mempool, wallets, dir)
    }

    #[test]
    fn stays_ready_with_no_candidates() {
        let (chain, mempool, wallets, _dir) = setup();
        let orchestrator = MinerOrchestrator::new(chain, mempool, wallets, "node0".into(), 1, 10);
        orchestrator.tick().unwrap();
        assert_eq!(orchestrator.state(), MinerState::Ready);
    }

    fn stake_and_mine(
        chain: &Arc<Blockchain>,
        mempool: &Arc<Mempool>,
        wallets: &Arc<WalletStore>,
        tx: Transaction,
    ) -> MiningOutcome {
        let handler = Handler::new(wallets.clone());
        let mut tx = tx;
        tx.hash = handler.compute_hash(&tx).unwrap();
        mempool.add(tx).unwrap();

        let orchestrator = MinerOrchestrator::new(chain.clone(), mempool.clone(), wallets.clone(), "node0".into(), 1, 10);
        orchestrator.tick().unwrap();
        assert_eq!(orchestrator.state(), MinerState::Mining);

        loop {
            if let Some(outcome) = orchestrator.poll() {
                break outcome;
            }
        }
    }

    #[test]
    fn mines_and_commits_a_staked_transaction() {
        let (chain, mempool, wallets, _dir) = setup();

        wallets.generate("alice").unwrap();

        let airdrop = Transaction {
            timestamp: now(),
            src: MINT_ACCOUNT.into(),
            dest: "alice".into(),
            amount: 10.0,
            token: crypto::BASE_TOKEN.into(),
            fee: 0.0,
            tx_type: TxType::MintAirDrop,
            seq: 0,
            tx_sig: None,
            hash: String::new(),
            source: None,
            note: None,
            meta: Some(crate::transaction::TxMeta {
                miner: Some("node0".into()),
                ..Default::default()
            }),
        };
        match stake_and_mine(&chain, &mempool, &wallets, airdrop) {
            MiningOutcome::Committed(_) => {}
            other => panic!("expected airdrop to commit, got {other:?}"),
        }
        assert_eq!(chain.height(), 2);

        let tx = Transaction {
            timestamp: now(),
            src: "alice".into(),
            dest: "bob".into(),
            amount: 1.0,
            token: crypto::BASE_TOKEN.into(),
            fee: 0.01,
            tx_type: TxType::Transfer,
            seq: 1,
            tx_sig: None,
            hash: String::new(),
            source: None,
            note: None,
            meta: Some(crate::transaction::TxMeta {
                miner: Some("node0".into()),
                ..Default::default()
            }),
        };
        match stake_and_mine(&chain, &mempool, &wallets, tx) {
            MiningOutcome::Committed(_) => {}
            other => panic!("expected transfer to commit, got {other:?}"),
        }
        assert_eq!(chain.height(), 3);
    }
}
