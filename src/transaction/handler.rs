//! C5: signing, fee policy, sequence enforcement and dual-view ledger
//! mutation. Shared invariants are centralized here so the blockchain
//! engine's audit dry-run and the mempool's admission path call through the
//! same code, resolving the ledger/handler/blockchain cyclic dependency via
//! constructor-injected handles (an `Arc<WalletStore>`) rather than globals.

use std::sync::Arc;

use crate::crypto;
use crate::error::LedgerError;
use crate::transaction::{round6, Transaction, TxType, FEE_CAP, FEE_PERCENT};
use crate::wallet::WalletStore;

/// Which sequence counter and balance view a check/apply should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceView {
    /// Entering the mempool: checked/updated against `wallet.seq.tx`.
    Mempool,
    /// Being audited/committed to a block: checked/updated against `wallet.seq.onChain`.
    Block,
}

/// Which view(s) `apply` mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyView {
    /// Mempool admission: mutate `tx` view only.
    Mempool,
    /// Block commit: mutate `onChain` view. If `also_update_tx` (the
    /// transaction was never mempooled on this node), also mutate `tx` to
    /// preserve I8.
    Block { block_idx: u64, also_update_tx: bool },
}

pub type TransactionHandlerError = LedgerError;

pub struct TransactionHandler {
    wallets: Arc<WalletStore>,
}

impl TransactionHandler {
    pub fn new(wallets: Arc<WalletStore>) -> Self {
        Self { wallets }
    }

    /// `fee = min(FEE_CAP, max(offered_fee, amount * FEE_PERCENT / 100))`;
    /// system-account senders pay nothing.
    pub fn compute_fee(&self, src: &str, amount: f64, offered_fee: f64) -> f64 {
        if crypto::is_system_name(src) {
            return 0.0;
        }
        round6(FEE_CAP.min(offered_fee.max(amount * FEE_PERCENT / 100.0)))
    }

    /// Computes the canonical hash for `tx` (over every field except
    /// `meta`, `txSig`, `hash`).
    pub fn compute_hash(&self, tx: &Transaction) -> Result<String, LedgerError> {
        crypto::hash(&tx.body()).map_err(LedgerError::Serialization)
    }

    /// Finalizes `tx.hash` and, for non-system senders, `tx.txSig`.
    ///
    /// - If the caller already stamped `tx.hash`, it must match the
    ///   recomputed value or the transaction is rejected.
    /// - If the caller supplied `tx.txSig`, it is verified against the
    ///   sender's public key.
    /// - Otherwise, if this node holds the sender's private key, it signs.
    /// - Otherwise the transaction is rejected: no signing path available.
    pub fn sign(&self, mut tx: Transaction) -> Result<Transaction, LedgerError> {
        let computed = self.compute_hash(&tx)?;
        if !tx.hash.is_empty() && tx.hash != computed {
            return Err(LedgerError::InputRejected(format!(
                "supplied hash {} does not match computed hash {computed}",
                tx.hash
            )));
        }
        tx.hash = computed;

        if tx.is_system_src() {
            tx.tx_sig = None;
            return Ok(tx);
        }

        let public_key = self
            .wallets
            .get_public_key(&tx.src)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;

        if let Some(sig) = tx.tx_sig.clone() {
            let ok = crypto::verify(&public_key, &sig, tx.hash.as_bytes())
                .map_err(|e| LedgerError::SignatureInvalid(e.to_string()))?;
            if !ok {
                return Err(LedgerError::SignatureInvalid(format!(
                    "signature does not verify for {}",
                    tx.src
                )));
            }
            return Ok(tx);
        }

        let wallet = self
            .wallets
            .get_user(&tx.src, false)
            .map_err(|e| LedgerError::SignatureInvalid(e.to_string()))?;
        let private_key = wallet
            .private_key
            .as_ref()
            .ok_or_else(|| LedgerError::SignatureInvalid("cannot sign: no signing path available".into()))?;
        tx.tx_sig = Some(
            crypto::sign(private_key, tx.hash.as_bytes())
                .map_err(|e| LedgerError::SignatureInvalid(e.to_string()))?,
        );
        Ok(tx)
    }

    /// Enforces strictly-increasing per-sender `seq`, exempting system
    /// accounts entirely.
    pub fn check_sequence(&self, tx: &Transaction, view: SequenceView) -> Result<(), LedgerError> {
        if tx.is_system_src() {
            return Ok(());
        }
        let public_key = self
            .wallets
            .get_public_key(&tx.src)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let wallet = self
            .wallets
            .get_user(&tx.src, true)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let _ = public_key;
        let current = match view {
            SequenceView::Mempool => wallet.seq.tx,
            SequenceView::Block => wallet.seq.on_chain,
        };
        let expected = current + 1;
        if tx.seq != expected {
            return Err(LedgerError::SequenceGap {
                src: tx.src.clone(),
                expected,
                got: tx.seq,
            });
        }
        Ok(())
    }

    /// Requires `balance >= amount + fee` in the appropriate view; system
    /// senders (the coin pool) are balance-exempt.
    pub fn check_balance(&self, tx: &Transaction, view: SequenceView) -> Result<(), LedgerError> {
        if tx.is_system_src() {
            return Ok(());
        }
        let wallet = self
            .wallets
            .get_user(&tx.src, true)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let slot = wallet.token_slot(&tx.token);
        let balance = match view {
            SequenceView::Mempool => slot.tx.balance,
            SequenceView::Block => slot.on_chain.balance,
        };
        let needed = tx.amount + tx.fee;
        if balance < needed {
            return Err(LedgerError::InsufficientFunds {
                src: tx.src.clone(),
                balance,
                needed,
            });
        }
        Ok(())
    }

    /// Applies `tx`'s balance effects: debit `src` by `amount+fee`, credit
    /// `dest` by `amount`, credit `_mint` by `fee`. Updates the view(s)
    /// selected by `apply_view`, and advances `src`'s sequence counter for
    /// non-system senders.
    pub fn apply(&self, tx: &Transaction, apply_view: ApplyView) -> Result<(), LedgerError> {
        let src_pk = self
            .wallets
            .get_public_key(&tx.src)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let dest_pk = self
            .wallets
            .get_public_key(&tx.dest)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
        let mint_pk = self
            .wallets
            .get_public_key(crypto::MINT_ACCOUNT)
            .map_err(|e| LedgerError::InputRejected(e.to_string()))?;

        let is_system_src = tx.is_system_src();
        let token = tx.token.clone();
        let amount = tx.amount;
        let fee = tx.fee;
        let seq = tx.seq;

        match apply_view {
            ApplyView::Mempool => {
                self.wallets
                    .update(&src_pk, |w| {
                        let slot = w.token_slot_mut(&token);
                        slot.tx.balance = round6(slot.tx.balance - amount - fee);
                        slot.tx.amount = round6(slot.tx.amount + amount + fee);
                        if !is_system_src {
                            w.seq.tx = seq;
                        }
                    })
                    .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                self.wallets
                    .update(&dest_pk, |w| {
                        let slot = w.token_slot_mut(&token);
                        slot.tx.balance = round6(slot.tx.balance + amount);
                        slot.tx.amount = round6(slot.tx.amount + amount);
                    })
                    .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                if fee > 0.0 {
                    self.wallets
                        .update(&mint_pk, |w| {
                            let slot = w.token_slot_mut(&token);
                            slot.tx.balance = round6(slot.tx.balance + fee);
                            slot.tx.amount = round6(slot.tx.amount + fee);
                        })
                        .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                }
            }
            ApplyView::Block {
                block_idx,
                also_update_tx,
            } => {
                self.wallets
                    .update(&src_pk, |w| {
                        let slot = w.token_slot_mut(&token);
                        slot.on_chain.balance = round6(slot.on_chain.balance - amount - fee);
                        slot.on_chain.amount = round6(slot.on_chain.amount + amount + fee);
                        slot.on_chain.record_block(block_idx);
                        if !is_system_src {
                            w.seq.on_chain = seq;
                        }
                        if also_update_tx {
                            slot.tx.balance = slot.on_chain.balance;
                            slot.tx.amount = slot.on_chain.amount;
                            if !is_system_src {
                                w.seq.tx = seq;
                            }
                        }
                    })
                    .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                self.wallets
                    .update(&dest_pk, |w| {
                        let slot = w.token_slot_mut(&token);
                        slot.on_chain.balance = round6(slot.on_chain.balance + amount);
                        slot.on_chain.amount = round6(slot.on_chain.amount + amount);
                        slot.on_chain.record_block(block_idx);
                        if also_update_tx {
                            slot.tx.balance = slot.on_chain.balance;
                            slot.tx.amount = slot.on_chain.amount;
                        }
                    })
                    .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                if fee > 0.0 {
                    self.wallets
                        .update(&mint_pk, |w| {
                            let slot = w.token_slot_mut(&token);
                            slot.on_chain.balance = round6(slot.on_chain.balance + fee);
                            slot.on_chain.amount = round6(slot.on_chain.amount + fee);
                            slot.on_chain.record_block(block_idx);
                            if also_update_tx {
                                slot.tx.balance = slot.on_chain.balance;
                                slot.tx.amount = slot.on_chain.amount;
                            }
                        })
                        .map_err(|e| LedgerError::InputRejected(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// Builds (but does not apply) the inverse of `tx`: swapped src/dest so
    /// that running it through `apply` undoes the original's ledger effect,
    /// tagged `reversal:<origType>` with `source` pointing at the original
    /// hash. Reversal transactions are node-generated (never user-submitted)
    /// so they carry no signature, the same exemption system accounts get.
    pub fn reverse(&self, tx: &Transaction, at_timestamp: i64) -> Transaction {
        Transaction {
            timestamp: at_timestamp,
            src: tx.dest.clone(),
            dest: tx.src.clone(),
            amount: tx.amount,
            token: tx.token.clone(),
            fee: 0.0,
            tx_type: TxType::Reversal(tx.tx_type.to_string()),
            seq: 0,
            tx_sig: None,
            hash: String::new(),
            source: Some(tx.hash.clone()),
            note: None,
            meta: None,
        }
    }
}
