//! JSON-RPC query client for `bitcoind`/`btcd`.

use crate::{BlockNotifier, BtcClientError, BtcConfig};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_transport_http::Http;
use async_trait::async_trait;
use base64::Engine as _;
use bitcoin::{Block, BlockHash, block::Header, consensus::encode};
use relayer_types::{BlockEvent, IndexedBlock};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The subset of a verbose `getblock`/`getblockheader` response the client
/// cares about.
#[derive(Debug, Deserialize)]
struct VerboseInfo {
    height: u32,
}

/// Read-only chain lookups the notifier needs, split out so the notifier can
/// be driven by a scripted chain in tests.
#[async_trait]
pub trait ChainQuery: Send + Sync + 'static {
    /// Hash and height of the node's best block.
    async fn best_block(&self) -> Result<(BlockHash, u32), BtcClientError>;
    /// Height and header of the block with the given hash.
    async fn block_header(&self, hash: BlockHash) -> Result<(u32, Header), BtcClientError>;
}

/// Query client for the Bitcoin source node.
///
/// All lookups go over plain HTTP JSON-RPC, which both supported backends
/// serve. The client is cheap to clone; clones share the underlying
/// transport.
#[derive(Debug, Clone)]
pub struct Client {
    rpc: RpcClient,
    event_buffer_size: usize,
    poll_interval: Duration,
}

impl Client {
    /// Connects to the node described by `cfg`.
    pub fn new(cfg: &BtcConfig) -> Result<Self, BtcClientError> {
        cfg.validate()?;

        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", cfg.username, cfg.password));
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Basic {token}"))
            .map_err(|e| BtcClientError::Config(e.to_string()))?;
        auth.set_sensitive(true);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BtcClientError::Config(e.to_string()))?;
        let transport = Http::with_client(http_client, cfg.endpoint.clone());
        let rpc = ClientBuilder::default().transport(transport, false);

        info!(target: "btc_client", endpoint = %cfg.endpoint, backend = ?cfg.btc_backend, "Created BTC client");

        Ok(Self {
            rpc,
            event_buffer_size: cfg.event_buffer_size,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        })
    }

    /// Returns the hash and height of the node's best block.
    pub async fn get_best_block(&self) -> Result<(BlockHash, u32), BtcClientError> {
        let hash: BlockHash = self.rpc.request_noparams("getbestblockhash").await?;
        let info: VerboseInfo = self.rpc.request("getblockheader", (hash, true)).await?;
        Ok((hash, info.height))
    }

    /// Fetches the full block with the given hash, indexed by its height on
    /// the node's chain.
    pub async fn get_block_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<IndexedBlock, BtcClientError> {
        let info: VerboseInfo = self.rpc.request("getblock", (*hash, 1u8)).await?;
        let raw: String = self.rpc.request("getblock", (*hash, 0u8)).await?;
        let block: Block =
            encode::deserialize_hex(&raw).map_err(|e| BtcClientError::Decode(e.to_string()))?;
        Ok(IndexedBlock::new(info.height, block.header, block.txdata))
    }

    /// Fetches the block at the given height on the node's best chain.
    pub async fn get_block_by_height(&self, height: u32) -> Result<IndexedBlock, BtcClientError> {
        let hash: BlockHash = self.rpc.request("getblockhash", (height,)).await?;
        self.get_block_by_hash(&hash).await
    }

    /// Fetches the height and header of the block with the given hash.
    pub async fn get_block_header(
        &self,
        hash: &BlockHash,
    ) -> Result<(u32, Header), BtcClientError> {
        let info: VerboseInfo = self.rpc.request("getblockheader", (*hash, true)).await?;
        let raw: String = self.rpc.request("getblockheader", (*hash, false)).await?;
        let header: Header =
            encode::deserialize_hex(&raw).map_err(|e| BtcClientError::Decode(e.to_string()))?;
        Ok((info.height, header))
    }

    /// Returns the run of blocks from `base_height` up to and including the
    /// node's best block, linked by `prev_blockhash`.
    pub async fn find_tail_blocks_by_height(
        &self,
        base_height: u32,
    ) -> Result<Vec<IndexedBlock>, BtcClientError> {
        let (tip_hash, tip_height) = self.get_best_block().await?;
        if base_height > tip_height {
            return Err(BtcClientError::InvalidRange { base: base_height, tip: tip_height });
        }
        let tip = self.get_block_by_hash(&tip_hash).await?;
        self.chain_blocks(base_height, tip).await
    }

    /// Returns the run of blocks from `start_height` through `end_height` on
    /// the node's best chain.
    pub async fn find_range_blocks_by_height(
        &self,
        start_height: u32,
        end_height: u32,
    ) -> Result<Vec<IndexedBlock>, BtcClientError> {
        if start_height > end_height {
            return Err(BtcClientError::InvalidRange { base: start_height, tip: end_height });
        }
        let end = self.get_block_by_height(end_height).await?;
        self.chain_blocks(start_height, end).await
    }

    /// Walks back from `tip` to `base_height` by parent hash. The returned
    /// run is ascending and includes both endpoints.
    async fn chain_blocks(
        &self,
        base_height: u32,
        tip: IndexedBlock,
    ) -> Result<Vec<IndexedBlock>, BtcClientError> {
        let mut blocks = Vec::with_capacity((tip.height - base_height + 1) as usize);
        let mut prev_hash = tip.header.prev_blockhash;
        let tip_height = tip.height;
        blocks.push(tip);
        for _ in base_height..tip_height {
            let block = self.get_block_by_hash(&prev_hash).await?;
            prev_hash = block.header.prev_blockhash;
            blocks.push(block);
        }
        blocks.reverse();
        Ok(blocks)
    }

    /// Starts the block notifier and returns the event stream it feeds.
    ///
    /// Call once per engine lifetime; a re-bootstrap reuses the stream so no
    /// queued events are lost.
    pub fn subscribe_blocks(
        &self,
        cancellation: CancellationToken,
    ) -> mpsc::Receiver<BlockEvent> {
        let (events_tx, events_rx) = mpsc::channel(self.event_buffer_size);
        let notifier =
            BlockNotifier::new(Arc::new(self.clone()), self.poll_interval, events_tx, cancellation);
        tokio::spawn(notifier.run());
        events_rx
    }
}

#[async_trait]
impl ChainQuery for Client {
    async fn best_block(&self) -> Result<(BlockHash, u32), BtcClientError> {
        self.get_best_block().await
    }

    async fn block_header(&self, hash: BlockHash) -> Result<(u32, Header), BtcClientError> {
        self.get_block_header(&hash).await
    }
}
