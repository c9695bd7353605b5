//! Client capabilities the engine consumes, abstracting the concrete RPC
//! clients so tests can drive the engine with mocks.

use async_trait::async_trait;
use bitcoin::BlockHash;
use relayer_btc_client::BtcClientError;
use relayer_lorenzo_client::{BtcChainInfo, LorenzoClientError, MsgInsertHeaders, TxResponse};
use relayer_types::{BlockEvent, IndexedBlock};
use std::fmt::Debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The Bitcoin source node capabilities used by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BtcClient: Debug + Send + Sync + 'static {
    /// Hash and height of the node's best block.
    async fn get_best_block(&self) -> Result<(BlockHash, u32), BtcClientError>;
    /// The full indexed block with the given hash.
    async fn get_block_by_hash(&self, hash: BlockHash) -> Result<IndexedBlock, BtcClientError>;
    /// The block at the given height on the node's best chain.
    async fn get_block_by_height(&self, height: u32) -> Result<IndexedBlock, BtcClientError>;
    /// The run of blocks from `base_height` through the node's best block.
    async fn find_tail_blocks_by_height(
        &self,
        base_height: u32,
    ) -> Result<Vec<IndexedBlock>, BtcClientError>;
    /// Starts block notifications and returns the event stream.
    async fn subscribe_blocks(
        &self,
        cancellation: CancellationToken,
    ) -> Result<mpsc::Receiver<BlockEvent>, BtcClientError>;
}

#[async_trait]
impl BtcClient for relayer_btc_client::Client {
    async fn get_best_block(&self) -> Result<(BlockHash, u32), BtcClientError> {
        Self::get_best_block(self).await
    }

    async fn get_block_by_hash(&self, hash: BlockHash) -> Result<IndexedBlock, BtcClientError> {
        Self::get_block_by_hash(self, &hash).await
    }

    async fn get_block_by_height(&self, height: u32) -> Result<IndexedBlock, BtcClientError> {
        Self::get_block_by_height(self, height).await
    }

    async fn find_tail_blocks_by_height(
        &self,
        base_height: u32,
    ) -> Result<Vec<IndexedBlock>, BtcClientError> {
        Self::find_tail_blocks_by_height(self, base_height).await
    }

    async fn subscribe_blocks(
        &self,
        cancellation: CancellationToken,
    ) -> Result<mpsc::Receiver<BlockEvent>, BtcClientError> {
        Ok(Self::subscribe_blocks(self, cancellation))
    }
}

/// The destination capabilities used by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LorenzoBtcClient: Debug + Send + Sync + 'static {
    /// The signer identity submissions are addressed by.
    fn signer(&self) -> String;
    /// Tip of the BTC light client header chain.
    async fn btc_header_chain_tip(&self) -> Result<BtcChainInfo, LorenzoClientError>;
    /// Base header of the BTC light client header chain.
    async fn btc_base_header(&self) -> Result<BtcChainInfo, LorenzoClientError>;
    /// Whether the BTC light client knows the block with the given hash.
    async fn contains_btc_block(&self, hash: BlockHash) -> Result<bool, LorenzoClientError>;
    /// Submits a batch of BTC headers.
    async fn insert_btc_headers(
        &self,
        msg: MsgInsertHeaders,
    ) -> Result<TxResponse, LorenzoClientError>;
}

#[async_trait]
impl LorenzoBtcClient for relayer_lorenzo_client::Client {
    fn signer(&self) -> String {
        Self::signer(self).to_owned()
    }

    async fn btc_header_chain_tip(&self) -> Result<BtcChainInfo, LorenzoClientError> {
        Self::btc_header_chain_tip(self).await
    }

    async fn btc_base_header(&self) -> Result<BtcChainInfo, LorenzoClientError> {
        Self::btc_base_header(self).await
    }

    async fn contains_btc_block(&self, hash: BlockHash) -> Result<bool, LorenzoClientError> {
        Self::contains_btc_block(self, &hash).await
    }

    async fn insert_btc_headers(
        &self,
        msg: MsgInsertHeaders,
    ) -> Result<TxResponse, LorenzoClientError> {
        Self::insert_btc_headers(self, msg).await
    }
}
