//! JSON-RPC client for the Lorenzo sidecar endpoint.

use crate::{
    BnbHeaderRecord, BtcChainInfo, LorenzoClientError, MsgInsertHeaders, MsgUploadHeaders,
    TxResponse,
};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_transport_http::Http;
use bitcoin::BlockHash;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Connection settings for the Lorenzo sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LorenzoConfig {
    /// Sidecar JSON-RPC endpoint.
    pub endpoint: Url,
    /// Signer identity submissions are addressed by.
    pub signer: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

const fn default_timeout() -> u64 {
    30
}

impl LorenzoConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), LorenzoClientError> {
        if self.signer.is_empty() {
            return Err(LorenzoClientError::Config("signer cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ContainsResponse {
    contains: bool,
}

/// Client for the Lorenzo destination chain.
///
/// Cheap to clone; clones share the underlying transport and signer.
#[derive(Debug, Clone)]
pub struct Client {
    rpc: RpcClient,
    signer: String,
}

impl Client {
    /// Connects to the sidecar described by `cfg`.
    pub fn new(cfg: &LorenzoConfig) -> Result<Self, LorenzoClientError> {
        cfg.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| LorenzoClientError::Config(e.to_string()))?;
        let transport = Http::with_client(http_client, cfg.endpoint.clone());
        let rpc = ClientBuilder::default().transport(transport, false);

        info!(target: "lorenzo_client", endpoint = %cfg.endpoint, signer = %cfg.signer, "Created Lorenzo client");

        Ok(Self { rpc, signer: cfg.signer.clone() })
    }

    /// The signer identity submissions are addressed by.
    pub fn signer(&self) -> &str {
        &self.signer
    }

    /// Tip of the BTC light client header chain.
    pub async fn btc_header_chain_tip(&self) -> Result<BtcChainInfo, LorenzoClientError> {
        Ok(self.rpc.request_noparams("lrz_btcHeaderChainTip").await?)
    }

    /// Base header of the BTC light client header chain.
    pub async fn btc_base_header(&self) -> Result<BtcChainInfo, LorenzoClientError> {
        Ok(self.rpc.request_noparams("lrz_btcBaseHeader").await?)
    }

    /// Whether the BTC light client knows the block with the given hash.
    pub async fn contains_btc_block(&self, hash: &BlockHash) -> Result<bool, LorenzoClientError> {
        let res: ContainsResponse = self.rpc.request("lrz_containsBtcBlock", (*hash,)).await?;
        Ok(res.contains)
    }

    /// Submits a batch of BTC headers.
    pub async fn insert_btc_headers(
        &self,
        msg: MsgInsertHeaders,
    ) -> Result<TxResponse, LorenzoClientError> {
        let count = msg.headers.len();
        let res: TxResponse = self.rpc.request("lrz_insertHeaders", (msg,)).await?;
        if res.code != 0 {
            return Err(LorenzoClientError::Rejected { code: res.code });
        }
        debug!(target: "lorenzo_client", count, code = res.code, "Submitted BTC headers");
        Ok(res)
    }

    /// Latest header known to the BNB light client.
    ///
    /// Maps the destination's header-not-found response onto
    /// [`LorenzoClientError::HeaderNotFound`].
    pub async fn bnb_latest_header(&self) -> Result<BnbHeaderRecord, LorenzoClientError> {
        match self.rpc.request_noparams::<BnbHeaderRecord>("lrz_bnbLatestHeader").await {
            Ok(record) => Ok(record),
            Err(err) if err.to_string().contains("header not found") => {
                Err(LorenzoClientError::HeaderNotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Uploads a batch of BNB header records.
    pub async fn bnb_upload_headers(
        &self,
        msg: MsgUploadHeaders,
    ) -> Result<TxResponse, LorenzoClientError> {
        let count = msg.headers.len();
        let res: TxResponse = self.rpc.request("lrz_bnbUploadHeaders", (msg,)).await?;
        if res.code != 0 {
            return Err(LorenzoClientError::Rejected { code: res.code });
        }
        debug!(target: "lorenzo_client", count, code = res.code, "Uploaded BNB headers");
        Ok(res)
    }
}
