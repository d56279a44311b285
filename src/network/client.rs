//! The outbound side of the wire protocol: an async trait any transport can
//! implement, plus a `reqwest`-backed implementation for real HTTP+JSON
//! peers. `NodeToken` identifies the calling node on every request.

use async_trait::async_trait;

use crate::blockchain::Block;
use crate::network::protocol::{AnnouncePayload, BlockHashEntry, ProtocolError};

#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn announce(&self, peer_hostname: &str, payload: &AnnouncePayload) -> Result<AnnouncePayload, ProtocolError>;

    async fn get_block_hashes(&self, peer_hostname: &str, from_index: u64) -> Result<Vec<BlockHashEntry>, ProtocolError>;

    async fn get_blocks(&self, peer_hostname: &str, from_index: u64) -> Result<Vec<Block>, ProtocolError>;

    async fn push_block_announce(&self, peer_hostname: &str, block: &Block) -> Result<(), ProtocolError>;
}

pub struct ReqwestPeerClient {
    client: reqwest::Client,
    node_token: String,
}

impl ReqwestPeerClient {
    pub fn new(node_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("reqwest client builds with static config"),
            node_token: node_token.into(),
        }
    }

    fn url(peer_hostname: &str, path: &str) -> String {
        format!("http://{peer_hostname}/{path}")
    }
}

#[async_trait]
impl PeerClient for ReqwestPeerClient {
    async fn announce(&self, peer_hostname: &str, payload: &AnnouncePayload) -> Result<AnnouncePayload, ProtocolError> {
        let response = self
            .client
            .post(Self::url(peer_hostname, "node/announce"))
            .header("NodeToken", &self.node_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProtocolError::Unreachable(e.to_string()))?;
        response
            .json::<AnnouncePayload>()
            .await
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    async fn get_block_hashes(&self, peer_hostname: &str, from_index: u64) -> Result<Vec<BlockHashEntry>, ProtocolError> {
        let response = self
            .client
            .get(Self::url(peer_hostname, "blocks"))
            .header("NodeToken", &self.node_token)
            .query(&[
                ("fromIndex", from_index.to_string()),
                ("type", "hashes".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProtocolError::Unreachable(e.to_string()))?;
        #[derive(serde::Deserialize)]
        struct Envelope {
            result: Vec<BlockHashEntry>,
        }
        response
            .json::<Envelope>()
            .await
            .map(|e| e.result)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    async fn get_blocks(&self, peer_hostname: &str, from_index: u64) -> Result<Vec<Block>, ProtocolError> {
        let response = self
            .client
            .get(Self::url(peer_hostname, "blocks"))
            .header("NodeToken", &self.node_token)
            .query(&[("fromIndex", from_index.to_string())])
            .send()
            .await
            .map_err(|e| ProtocolError::Unreachable(e.to_string()))?;
        #[derive(serde::Deserialize)]
        struct Envelope {
            result: Vec<Block>,
        }
        response
            .json::<Envelope>()
            .await
            .map(|e| e.result)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    async fn push_block_announce(&self, peer_hostname: &str, block: &Block) -> Result<(), ProtocolError> {
        self.client
            .post(Self::url(peer_hostname, "block/announce"))
            .header("NodeToken", &self.node_token)
            .json(block)
            .send()
            .await
            .map_err(|e| ProtocolError::Unreachable(e.to_string()))?;
        Ok(())
    }
}
