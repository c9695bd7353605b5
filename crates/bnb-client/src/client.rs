//! Header lookups against the BNB node.

use crate::BnbClientError;
use alloy_consensus::Header;
use alloy_primitives::{B256, U64};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info};
use url::Url;

/// Ranges longer than this are fetched with one task per block number
/// instead of a sequential parent-hash walk.
const PARALLEL_FETCH_THRESHOLD: u64 = 10;

/// Attempts per block number in a parallel range fetch.
const PARALLEL_FETCH_MAX_TRIES: u32 = 5;

/// Header client for the BNB source chain.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Debug, Clone)]
pub struct Client {
    rpc: RpcClient,
}

impl Client {
    /// Connects to the node at `rpc_url`.
    pub fn new(rpc_url: Url) -> Self {
        info!(target: "bnb_client", endpoint = %rpc_url, "Created BNB client");
        Self { rpc: ClientBuilder::default().http(rpc_url) }
    }

    /// Returns the node's latest block number.
    pub async fn block_number(&self) -> Result<u64, BnbClientError> {
        let number: U64 = self.rpc.request_noparams("eth_blockNumber").await?;
        Ok(number.to::<u64>())
    }

    /// Returns the header at the node's latest block number.
    pub async fn latest_header(&self) -> Result<Header, BnbClientError> {
        let number = self.block_number().await?;
        self.header_by_number(number).await
    }

    /// Returns the header with the given number on the node's canonical
    /// chain.
    pub async fn header_by_number(&self, number: u64) -> Result<Header, BnbClientError> {
        let header: Option<alloy_rpc_types_eth::Header> =
            self.rpc.request("eth_getBlockByNumber", (U64::from(number), false)).await?;
        header.map(|h| h.inner).ok_or_else(|| BnbClientError::HeaderNotFound(number.to_string()))
    }

    /// Returns the header with the given hash.
    pub async fn header_by_hash(&self, hash: B256) -> Result<Header, BnbClientError> {
        let header: Option<alloy_rpc_types_eth::Header> =
            self.rpc.request("eth_getBlockByHash", (hash, false)).await?;
        header.map(|h| h.inner).ok_or_else(|| BnbClientError::HeaderNotFound(hash.to_string()))
    }

    /// Fetches the canonical headers numbered `start..=end`, ascending.
    ///
    /// Short ranges walk back from the end header by parent hash, which makes
    /// the run continuous by construction. Longer ranges fan out one fetch
    /// task per number and verify continuity afterwards.
    pub async fn range_headers(&self, start: u64, end: u64) -> Result<Vec<Header>, BnbClientError> {
        if start > end {
            return Err(BnbClientError::InvalidRange { start, end });
        }
        if end - start > PARALLEL_FETCH_THRESHOLD {
            return self.range_headers_parallel(start, end).await;
        }

        let mut headers = vec![Header::default(); (end - start + 1) as usize];
        let end_header = self.header_by_number(end).await?;
        let mut parent = end_header.parent_hash;
        let last = headers.len() - 1;
        headers[last] = end_header;
        for i in (0..last).rev() {
            let header = self.header_by_hash(parent).await?;
            parent = header.parent_hash;
            headers[i] = header;
        }
        Ok(headers)
    }

    async fn range_headers_parallel(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<Header>, BnbClientError> {
        let total = end - start + 1;
        debug!(target: "bnb_client", start, end, "Fetching header range in parallel");

        let mut tasks: JoinSet<Result<(u64, Header), BnbClientError>> = JoinSet::new();
        for i in 0..total {
            let client = self.clone();
            tasks.spawn(async move {
                let mut tries = 1;
                loop {
                    match client.header_by_number(start + i).await {
                        Ok(header) => return Ok((i, header)),
                        Err(err) if tries < PARALLEL_FETCH_MAX_TRIES => {
                            let backoff = Duration::from_millis(
                                100 * u64::from(tries) + rand::rng().random_range(0..100),
                            );
                            tokio::time::sleep(backoff).await;
                            tries += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            });
        }

        let mut slots: Vec<Option<Header>> = vec![None; total as usize];
        while let Some(joined) = tasks.join_next().await {
            let (i, header) = joined.map_err(|e| BnbClientError::Task(e.to_string()))??;
            slots[i as usize] = Some(header);
        }
        let mut headers = Vec::with_capacity(total as usize);
        for slot in slots {
            headers.push(slot.ok_or_else(|| BnbClientError::Task("missing range slot".into()))?);
        }

        verify_continuity(&headers)?;
        Ok(headers)
    }
}

/// Checks that every header references its predecessor by hash.
pub(crate) fn verify_continuity(headers: &[Header]) -> Result<(), BnbClientError> {
    for pair in headers.windows(2) {
        if pair[1].parent_hash != pair[0].hash_slow() {
            return Err(BnbClientError::NotContinuous(pair[1].number));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_headers(start: u64, len: usize) -> Vec<Header> {
        let mut out: Vec<Header> = Vec::with_capacity(len);
        for i in 0..len {
            let mut header = Header { number: start + i as u64, ..Default::default() };
            if let Some(prev) = out.last() {
                header.parent_hash = prev.hash_slow();
            }
            out.push(header);
        }
        out
    }

    #[test]
    fn continuity_accepts_linked_run() {
        let headers = linked_headers(300, 5);
        assert!(verify_continuity(&headers).is_ok());
    }

    #[test]
    fn continuity_rejects_severed_run() {
        let mut headers = linked_headers(300, 5);
        headers[3].parent_hash = B256::repeat_byte(0xab);
        assert!(matches!(verify_continuity(&headers), Err(BnbClientError::NotContinuous(303))));
    }
}
