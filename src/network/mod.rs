//! C9: peer table, wire protocol types, outbound client and the heartbeat/
//! longest-chain sync service built on top of them.

pub mod client;
pub mod peer;
pub mod protocol;
pub mod sync;

pub use client::{PeerClient, ReqwestPeerClient};
pub use peer::PeerTable;
pub use protocol::{AnnouncePayload, PeerInfo, ProtocolError};
pub use sync::SyncService;
