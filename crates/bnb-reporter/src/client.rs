//! Client capabilities the engine consumes, abstracting the concrete RPC
//! clients so tests can drive the engine with mocks.

use alloy_consensus::Header;
use async_trait::async_trait;
use relayer_bnb_client::BnbClientError;
use relayer_lorenzo_client::{BnbHeaderRecord, LorenzoClientError, MsgUploadHeaders, TxResponse};
use std::fmt::Debug;

/// The BNB source node capabilities used by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BnbClient: Debug + Send + Sync + 'static {
    /// The node's latest block number.
    async fn block_number(&self) -> Result<u64, BnbClientError>;
    /// The header at the node's latest block number.
    async fn latest_header(&self) -> Result<Header, BnbClientError>;
    /// The canonical header with the given number.
    async fn header_by_number(&self, number: u64) -> Result<Header, BnbClientError>;
    /// The canonical headers numbered `start..=end`, ascending and
    /// continuity-checked.
    async fn range_headers(&self, start: u64, end: u64) -> Result<Vec<Header>, BnbClientError>;
}

#[async_trait]
impl BnbClient for relayer_bnb_client::Client {
    async fn block_number(&self) -> Result<u64, BnbClientError> {
        Self::block_number(self).await
    }

    async fn latest_header(&self) -> Result<Header, BnbClientError> {
        Self::latest_header(self).await
    }

    async fn header_by_number(&self, number: u64) -> Result<Header, BnbClientError> {
        Self::header_by_number(self, number).await
    }

    async fn range_headers(&self, start: u64, end: u64) -> Result<Vec<Header>, BnbClientError> {
        Self::range_headers(self, start, end).await
    }
}

/// The destination capabilities used by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LorenzoBnbClient: Debug + Send + Sync + 'static {
    /// The signer identity submissions are addressed by.
    fn signer(&self) -> String;
    /// Latest header known to the BNB light client.
    async fn bnb_latest_header(&self) -> Result<BnbHeaderRecord, LorenzoClientError>;
    /// Uploads a batch of BNB header records.
    async fn bnb_upload_headers(
        &self,
        msg: MsgUploadHeaders,
    ) -> Result<TxResponse, LorenzoClientError>;
}

#[async_trait]
impl LorenzoBnbClient for relayer_lorenzo_client::Client {
    fn signer(&self) -> String {
        Self::signer(self).to_owned()
    }

    async fn bnb_latest_header(&self) -> Result<BnbHeaderRecord, LorenzoClientError> {
        Self::bnb_latest_header(self).await
    }

    async fn bnb_upload_headers(
        &self,
        msg: MsgUploadHeaders,
    ) -> Result<TxResponse, LorenzoClientError> {
        Self::bnb_upload_headers(self, msg).await
    }
}
