//! The known-peer table: tracks each peer's last-seen state and a
//! multiplicative ping back-off for unreachable peers.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::network::protocol::PeerInfo;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

const BASE_BACKOFF_SECS: i64 = 5;
const MAX_BACKOFF_SECS: i64 = 300;

pub struct PeerTable {
    peers: RwLock<HashMap<String, PeerInfo>>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn upsert(&self, info: PeerInfo) {
        let mut peers = self.peers.write();
        let entry = peers.entry(info.hostname.clone()).or_insert_with(|| info.clone());
        *entry = PeerInfo {
            ping_error: 0,
            last_ping: Some(now()),
            ..info
        };
    }

    pub fn record_ping_failure(&self, hostname: &str) {
        let mut peers = self.peers.write();
        if let Some(peer) = peers.get_mut(hostname) {
            peer.ping_error += 1;
            peer.last_ping = Some(now());
        }
    }

    /// Whether `hostname` is due for another heartbeat: its back-off
    /// (`BASE_BACKOFF_SECS * 2^pingError`, capped) must have elapsed since
    /// `lastPing`.
    pub fn due_for_ping(&self, hostname: &str) -> bool {
        let peers = self.peers.read();
        let Some(peer) = peers.get(hostname) else {
            return true;
        };
        let Some(last) = peer.last_ping else {
            return true;
        };
        let backoff = (BASE_BACKOFF_SECS * 2i64.pow(peer.ping_error.min(10))).min(MAX_BACKOFF_SECS);
        now() - last >= backoff
    }

    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers.read().values().cloned().collect()
    }

    pub fn hostnames(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    pub fn get(&self, hostname: &str) -> Option<PeerInfo> {
        self.peers.read().get(hostname).cloned()
    }

    /// De-peers a host that could not be reconciled with a common ancestor.
    pub fn remove(&self, hostname: &str) {
        self.peers.write().remove(hostname);
    }
}
