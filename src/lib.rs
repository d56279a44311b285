//! A proof-of-work ledger with account balances (not UTXO), a mempool, and
//! gossip-based peer sync.
//!
//! Layout mirrors the component boundaries: `crypto` (hashing, addresses,
//! signatures, Merkle proofs), `wallet` (the address book and its dual
//! balance views), `blockchain` (block records and the chain engine),
//! `mempool` (pending-transaction admission and staking), `transaction`
//! (the envelope type and its handler), `miner` (the worker thread and the
//! orchestrating state machine), `network` (peer table, wire types, outbound
//! client, sync service) and `node`, which wires all of the above behind one
//! context struct plus `NodeApi`, the typed functions a wire router would
//! dispatch onto:
//!
//! | Path | Method | Response |
//! |---|---|---|
//! | `blocks?fromIndex=N[&type=hashes\|meta]` | GET | blocks, or `{index,hash}` pairs |
//! | `node/wallets?addresses=a,b` | GET | wallets, no `privateKey` |
//! | `transaction/verify?hash=h1,h2` | GET | Merkle inclusion proofs |
//! | `transaction?hash=…` | GET | full transaction + settling block index |
//! | `transaction/pending` | GET | queued transactions |
//! | `node/announce` | POST | responder's announce payload |
//! | `block/announce` | POST | audit outcome |
//! | `transaction`, `transaction/announce` | POST | admission outcome |
//! | `transaction/prepare` | POST | `{fee, seq, publicKey}` |
//! | `token/auth` | POST | constructed (unsubmitted) system transactions |
//!
//! No HTTP router is mounted; `NodeApi`'s functions are the contract one
//! would call into.

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod mempool;
pub mod miner;
pub mod network;
pub mod node;
pub mod transaction;
pub mod wallet;

pub use error::LedgerError;
pub use node::Node;
