//! C9 gossip/sync: periodic heartbeat exchange and longest-chain rewind.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::blockchain::Blockchain;
use crate::error::LedgerError;
use crate::network::client::PeerClient;
use crate::network::peer::PeerTable;
use crate::network::protocol::{AnnouncePayload, PeerInfo, ProtocolError};

/// How far back a sync walk will look for a shared ancestor before giving
/// up and de-peering the host.
const MAX_LOOKBACK: u64 = 100;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct SyncService {
    peers: Arc<PeerTable>,
    client: Arc<dyn PeerClient>,
    chain: Arc<Blockchain>,
    node_name: String,
    hostname: String,
    start_time: i64,
}

impl SyncService {
    pub fn new(
        peers: Arc<PeerTable>,
        client: Arc<dyn PeerClient>,
        chain: Arc<Blockchain>,
        node_name: String,
        hostname: String,
    ) -> Self {
        Self {
            peers,
            client,
            chain,
            node_name,
            hostname,
            start_time: now(),
        }
    }

    fn local_info(&self) -> PeerInfo {
        PeerInfo {
            hostname: self.hostname.clone(),
            node_name: Some(self.node_name.clone()),
            version: Some(crate::transaction::PROTOCOL_VERSION),
            node_state: Some("READY".to_string()),
            start_time: Some(self.start_time),
            timestamp: Some(now()),
            blockchain_height: Some(self.chain.height()),
            block_at_height: self.chain.tip().map(|b| b.hash),
            pending_transactions_cnt: None,
            ping_error: 0,
            last_ping: Some(now()),
        }
    }

    /// Sends `announce` to every peer whose back-off has elapsed, and
    /// initiates a sync with any peer that is strictly ahead (or tied with
    /// an older tip timestamp, per the tie-break rule).
    pub async fn heartbeat_tick(&self) {
        let payload = AnnouncePayload {
            this_node: self.local_info(),
            peers: self.peers.snapshot(),
        };

        for hostname in self.peers.hostnames() {
            if !self.peers.due_for_ping(&hostname) {
                continue;
            }
            match self.client.announce(&hostname, &payload).await {
                Ok(response) => {
                    self.peers.upsert(response.this_node.clone());
                    for peer in response.peers {
                        if peer.hostname != self.hostname {
                            self.peers.upsert(peer);
                        }
                    }
                    if self.should_sync_with(&response.this_node) {
                        if let Err(e) = self.sync_with_peer(&hostname).await {
                            warn!(peer = %hostname, error = %e, "chain sync failed");
                        }
                    }
                }
                Err(e) => {
                    self.peers.record_ping_failure(&hostname);
                    warn!(peer = %hostname, error = %e, "heartbeat failed");
                }
            }
        }
    }

    /// Tie-break: a strictly taller peer always wins; at equal height, the
    /// peer whose tip is strictly older wins (local chain is otherwise kept).
    fn should_sync_with(&self, peer: &PeerInfo) -> bool {
        let Some(remote_height) = peer.blockchain_height else {
            return false;
        };
        let local_height = self.chain.height();
        if remote_height > local_height {
            return true;
        }
        if remote_height < local_height {
            return false;
        }
        match (peer.timestamp, self.chain.tip().map(|b| b.timestamp)) {
            (Some(remote_ts), Some(local_ts)) => remote_ts < local_ts,
            _ => false,
        }
    }

    async fn sync_with_peer(&self, hostname: &str) -> Result<(), LedgerError> {
        let local_height = self.chain.height();
        let lookback_from = local_height.saturating_sub(MAX_LOOKBACK);

        let remote_hashes = self
            .client
            .get_block_hashes(hostname, lookback_from)
            .await
            .map_err(protocol_to_ledger_error)?;

        let mut common_ancestor = None;
        for entry in remote_hashes.iter().rev() {
            if self.chain.block_hash_at(entry.index).as_deref() == Some(entry.hash.as_str()) {
                common_ancestor = Some(entry.index);
                break;
            }
        }

        let Some(match_index) = common_ancestor else {
            self.peers.remove(hostname);
            return Err(LedgerError::ChainMismatch(format!(
                "no common ancestor with {hostname} within the last {MAX_LOOKBACK} blocks"
            )));
        };

        let incoming = self
            .client
            .get_blocks(hostname, match_index + 1)
            .await
            .map_err(protocol_to_ledger_error)?;
        if incoming.is_empty() {
            return Ok(());
        }

        info!(peer = %hostname, from = match_index + 1, count = incoming.len(), "rewinding to peer's chain");
        self.chain.add_chain(incoming, true)
    }
}

fn protocol_to_ledger_error(e: ProtocolError) -> LedgerError {
    match e {
        ProtocolError::Unreachable(m) => LedgerError::PeerUnreachable(m),
        ProtocolError::Malformed(m) => LedgerError::ChainMismatch(m),
    }
}
