//! Address book storage: `{publicKey -> Wallet}` plus a `name -> publicKey`
//! index, atomically rewritten to a single JSON file on every update.
//! Shaped after this codebase's existing storage-manager pattern (a thin
//! manager guarding an in-memory map, persisted wholesale) rather than the
//! pluggable-backend trait used for UTXO storage, since the wallet file is
//! always a single JSON document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::wallet::Wallet;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet not found: {0}")]
    NotFound(String),
    #[error("wallet already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Address(#[from] crypto::AddressError),
    #[error("malformed address reference: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct AddressBook(HashMap<String, Wallet>);

struct Inner {
    /// public_key (45-char checksummed) -> wallet.
    wallets: HashMap<String, Wallet>,
    /// name -> public_key.
    names: HashMap<String, String>,
}

pub struct WalletStore {
    wallet_file: PathBuf,
    inner: RwLock<Inner>,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl WalletStore {
    /// Loads the address book from `wallet_file` if it exists, else starts empty.
    pub fn load(wallet_file: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let wallet_file = wallet_file.into();
        let wallets = if wallet_file.exists() {
            let content = std::fs::read_to_string(&wallet_file)?;
            let book: AddressBook = serde_json::from_str(&content)?;
            book.0
        } else {
            HashMap::new()
        };
        let names = wallets
            .iter()
            .map(|(pk, w)| (w.name.clone(), pk.clone()))
            .collect();
        Ok(Self {
            wallet_file,
            inner: RwLock::new(Inner { wallets, names }),
        })
    }

    /// Atomically rewrites the whole address book to disk.
    pub fn persist(&self) -> Result<(), WalletError> {
        let inner = self.inner.read();
        let book = AddressBook(inner.wallets.clone());
        let json = serde_json::to_string_pretty(&book)?;
        if let Some(parent) = self.wallet_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.wallet_file.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.wallet_file)?;
        Ok(())
    }

    /// Resolves a name, `name:publicKey`, bare 45-char public key, or
    /// `*`-prefixed admin name down to a checksummed public key.
    pub fn get_public_key(&self, reference: &str) -> Result<String, WalletError> {
        let reference = reference.strip_prefix('*').unwrap_or(reference);

        if let Some((_, pk)) = reference.split_once(':') {
            crypto::address::verify_checksum(pk)?;
            return Ok(pk.to_string());
        }

        if reference.chars().count() == 45 {
            crypto::address::verify_checksum(reference)?;
            return Ok(reference.to_string());
        }

        let inner = self.inner.read();
        inner
            .names
            .get(reference)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(reference.to_string()))
    }

    /// Resolves the wallet for `name`, creating it with a `BASE_TOKEN` slot
    /// if `auto_create` and no such wallet yet exists. System accounts are
    /// conjured on first reference with a deterministic placeholder key.
    pub fn get_user(&self, name: &str, auto_create: bool) -> Result<Wallet, WalletError> {
        {
            let inner = self.inner.read();
            if let Some(pk) = inner.names.get(name) {
                return Ok(inner.wallets[pk].clone());
            }
        }
        if !auto_create {
            return Err(WalletError::NotFound(name.to_string()));
        }
        if crypto::is_system_name(name) {
            return self.create_system_wallet(name);
        }
        self.generate(name)
    }

    fn create_system_wallet(&self, name: &str) -> Result<Wallet, WalletError> {
        let kp = crypto::gen_keypair();
        let public_key = crypto::address::append_checksum(&kp.public_key44)?;
        let wallet = Wallet::new(name, public_key.clone(), now());
        let mut inner = self.inner.write();
        inner.names.insert(name.to_string(), public_key.clone());
        inner.wallets.insert(public_key, wallet.clone());
        drop(inner);
        self.persist()?;
        Ok(wallet)
    }

    /// Creates a brand new keypair/wallet for `name`; rejects if it exists.
    pub fn generate(&self, name: &str) -> Result<Wallet, WalletError> {
        {
            let inner = self.inner.read();
            if inner.names.contains_key(name) {
                return Err(WalletError::AlreadyExists(name.to_string()));
            }
        }
        let kp = crypto::gen_keypair();
        let public_key = crypto::address::append_checksum(&kp.public_key44)?;
        let mut wallet = Wallet::new(name, public_key.clone(), now());
        wallet.private_key = Some(kp.private_key.to_string());

        let mut inner = self.inner.write();
        if inner.names.contains_key(name) {
            return Err(WalletError::AlreadyExists(name.to_string()));
        }
        inner.names.insert(name.to_string(), public_key.clone());
        inner.wallets.insert(public_key, wallet.clone());
        drop(inner);
        self.persist()?;
        wallet.private_key = None;
        Ok(wallet)
    }

    /// Applies `f` to the wallet identified by `public_key`, persists, and
    /// returns the updated (redacted) wallet. `f` sees the real record,
    /// including any locally held `privateKey`.
    pub fn update<F>(&self, public_key: &str, f: F) -> Result<Wallet, WalletError>
    where
        F: FnOnce(&mut Wallet),
    {
        let updated = {
            let mut inner = self.inner.write();
            let wallet = inner
                .wallets
                .get_mut(public_key)
                .ok_or_else(|| WalletError::NotFound(public_key.to_string()))?;
            f(wallet);
            wallet.clone()
        };
        self.persist()?;
        Ok(updated.redacted())
    }

    /// Deep-copies the wallets named by `public_keys`, for a dry-run audit
    /// that must be rolled back on failure.
    pub fn user_snapshots(&self, public_keys: &[String]) -> HashMap<String, Wallet> {
        let inner = self.inner.read();
        public_keys
            .iter()
            .filter_map(|pk| inner.wallets.get(pk).map(|w| (pk.clone(), w.clone())))
            .collect()
    }

    /// Restores wallets from a snapshot taken by `user_snapshots`, discarding
    /// any dry-run mutations.
    pub fn user_restores(&self, snapshot: HashMap<String, Wallet>) {
        {
            let mut inner = self.inner.write();
            for (pk, wallet) in snapshot {
                inner.wallets.insert(pk, wallet);
            }
        }
        let _ = self.persist();
    }

    /// Returns redacted wallet records (no `privateKey`) for `names`, or for
    /// every known wallet if `names` is empty.
    pub fn balances(&self, names: &[String]) -> Vec<Wallet> {
        let inner = self.inner.read();
        if names.is_empty() {
            return inner.wallets.values().map(Wallet::redacted).collect();
        }
        names
            .iter()
            .filter_map(|n| {
                inner
                    .names
                    .get(n)
                    .and_then(|pk| inner.wallets.get(pk))
                    .map(Wallet::redacted)
            })
            .collect()
    }

    pub fn wallet_file(&self) -> &Path {
        &self.wallet_file
    }

    /// Zeroes every wallet's token slots and sequence counters in place,
    /// keeping identities and keys intact. Used to rebuild balances from
    /// scratch before replaying a retained chain prefix during a reorg.
    pub fn reset_balances(&self) {
        let mut inner = self.inner.write();
        for wallet in inner.wallets.values_mut() {
            for slot in wallet.tokens.values_mut() {
                *slot = crate::wallet::TokenSlot::default();
            }
            wallet.seq = crate::wallet::SeqView::default();
        }
        drop(inner);
        let _ = self.persist();
    }
}
