//! C3: the on-disk block record. Each block is a self-contained JSON file
//! named by its zero-padded index, written once and never rewritten.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    pub version: u32,
    pub timestamp: i64,
    #[serde(rename = "minerName")]
    pub miner_name: String,
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    pub hash: String,
    /// Wall-clock seconds the miner spent finding `nonce`. Excluded from
    /// the hash so that two nodes mining the same candidate agree on its
    /// hash regardless of how long the search took; kept in the file for
    /// observability.
    #[serde(rename = "powTime", skip_serializing_if = "Option::is_none")]
    pub pow_time: Option<f64>,
}

/// The fields committed to by `hash`, in the order the hash is computed
/// over. `transactions` are hashed in their persisted (no `meta`) form.
#[derive(Serialize)]
struct HashableBlock<'a> {
    index: u64,
    prev_hash: &'a str,
    version: u32,
    timestamp: i64,
    miner_name: &'a str,
    merkle_root: &'a str,
    nonce: u64,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Assembles an unmined block (`nonce = 0`, `hash` filled in at the
    /// current nonce) ready for a miner worker to search over.
    pub fn new(
        index: u64,
        prev_hash: String,
        version: u32,
        timestamp: i64,
        miner_name: String,
        transactions: Vec<Transaction>,
    ) -> Result<Self, crypto::MerkleError> {
        let tx_hashes: Vec<String> = transactions.iter().map(|t| t.hash.clone()).collect();
        let merkle_root = crypto::merkle_root(&tx_hashes)?;
        let mut block = Block {
            index,
            prev_hash,
            version,
            timestamp,
            miner_name,
            merkle_root,
            nonce: 0,
            transactions,
            hash: String::new(),
            pow_time: None,
        };
        block.hash = block.calc_hash();
        Ok(block)
    }

    /// Recomputes `hash` from the block's committed fields at its current
    /// `nonce`. Does not mutate `self.hash`.
    pub fn calc_hash(&self) -> String {
        let persisted: Vec<Transaction> = self.transactions.iter().map(Transaction::to_persisted).collect();
        let hashable = HashableBlock {
            index: self.index,
            prev_hash: &self.prev_hash,
            version: self.version,
            timestamp: self.timestamp,
            miner_name: &self.miner_name,
            merkle_root: &self.merkle_root,
            nonce: self.nonce,
            transactions: persisted,
        };
        let json = crypto::canonical_json(&hashable).expect("block fields always serialize");
        crypto::hash_hex(json.as_bytes())
    }

    /// `hash` exactly reflects the block's current fields.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.calc_hash()
    }

    /// I2: the hash has *exactly* `difficulty` leading hex zeros, not more
    /// and not fewer.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    pub fn file_name(index: u64) -> String {
        format!("{index:06}.json")
    }

    pub fn write(&self, blocks_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(blocks_dir)?;
        let path = blocks_dir.join(Self::file_name(self.index));
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn read(blocks_dir: &Path, index: u64) -> std::io::Result<Option<Block>> {
        let path = blocks_dir.join(Self::file_name(index));
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let block: Block = serde_json::from_str(&content)?;
        Ok(Some(block))
    }
}

/// Exact leading-zero-count check used by both block audit and the miner
/// worker's own termination test, so both agree on what "solved" means.
pub fn hash_meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let leading_zeros = hash.chars().take_while(|c| *c == '0').count() as u32;
    leading_zeros == difficulty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxType, PROTOCOL_VERSION};

    fn sample_tx(hash: &str) -> Transaction {
        Transaction {
            timestamp: 0,
            src: "_mint".into(),
            dest: "alice".into(),
            amount: 10.0,
            token: crypto::BASE_TOKEN.into(),
            fee: 0.0,
            tx_type: TxType::MintIssue,
            seq: 0,
            tx_sig: None,
            hash: hash.into(),
            source: None,
            note: None,
            meta: None,
        }
    }

    #[test]
    fn new_block_hash_is_internally_consistent() {
        let block = Block::new(
            0,
            "genesis".into(),
            PROTOCOL_VERSION,
            0,
            "node0".into(),
            vec![sample_tx("h1")],
        )
        .unwrap();
        assert!(block.hash_is_consistent());
    }

    #[test]
    fn changing_nonce_changes_hash() {
        let mut block = Block::new(0, "genesis".into(), PROTOCOL_VERSION, 0, "node0".into(), vec![sample_tx("h1")]).unwrap();
        let original = block.hash.clone();
        block.nonce += 1;
        assert_ne!(block.calc_hash(), original);
    }

    #[test]
    fn difficulty_check_is_exact_not_minimum() {
        assert!(hash_meets_difficulty("00abc", 2));
        assert!(!hash_meets_difficulty("00abc", 1));
        assert!(!hash_meets_difficulty("000abc", 2));
    }

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(Block::file_name(7), "000007.json");
        assert_eq!(Block::file_name(123456), "123456.json");
    }
}
