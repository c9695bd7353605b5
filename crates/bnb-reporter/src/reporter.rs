//! The EVM sync engine actor.

use crate::{
    BnbClient, BnbReporterConfig, BnbReporterError, LorenzoBnbClient, Metrics,
    convert::{header_from_record, records_from_headers},
};
use alloy_consensus::Header;
use async_trait::async_trait;
use relayer_lorenzo_client::{LorenzoClientError, MsgUploadHeaders};
use relayer_types::{CancellableContext, RelayerActor};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info, warn};

/// Default maturity delay, in blocks.
const DEFAULT_BNB_DELAY_BLOCKS: u64 = 15;

/// Number of headers fetched per catch-up batch.
const FETCH_HEADER_BATCH_SIZE: u64 = 100;

/// Buffer depth of the catch-up batch channel.
const CATCH_UP_CHANNEL_CAPACITY: usize = 10;

/// Pause between catch-up batch fetches.
const CATCH_UP_FETCH_PAUSE: Duration = Duration::from_secs(1);

/// Wait after a transient node failure in the steady-state loop.
const NETWORK_ERROR_SLEEP: Duration = Duration::from_millis(100);

/// Wait when no mature blocks are available yet.
const BLOCK_SLEEP_TIME: Duration = Duration::from_secs(1);

/// The BNB header reporter.
///
/// State is the single header `lorenzo_tip`: the last header the destination
/// accepted. The actor's loop is its only mutator.
#[derive(Debug)]
pub struct BnbReporter<C, L>
where
    C: BnbClient,
    L: LorenzoBnbClient,
{
    cfg: BnbReporterConfig,
    client: Arc<C>,
    lorenzo_client: Arc<L>,
    delay_blocks: u64,
    lorenzo_tip: Option<Header>,
    cancellation: CancellationToken,
}

impl<C, L> BnbReporter<C, L>
where
    C: BnbClient,
    L: LorenzoBnbClient,
{
    /// Creates a new reporter. Fails if the configuration is invalid.
    pub fn new(
        cfg: BnbReporterConfig,
        client: Arc<C>,
        lorenzo_client: Arc<L>,
        cancellation: CancellationToken,
    ) -> Result<Self, BnbReporterError> {
        cfg.validate()?;
        let delay_blocks =
            if cfg.delay_blocks == 0 { DEFAULT_BNB_DELAY_BLOCKS } else { cfg.delay_blocks };
        Ok(Self { cfg, client, lorenzo_client, delay_blocks, lorenzo_tip: None, cancellation })
    }

    fn lorenzo_tip(&self) -> Result<&Header, BnbReporterError> {
        self.lorenzo_tip.as_ref().ok_or(BnbReporterError::NotBootstrapped)
    }

    /// Re-derives the engine position from the destination. On first run the
    /// light client holds nothing; seed it with the configured base header
    /// and read the position back.
    pub(crate) async fn bootstrap(&mut self) -> Result<(), BnbReporterError> {
        loop {
            match self.lorenzo_client.bnb_latest_header().await {
                Ok(record) => {
                    let tip = header_from_record(&record)?;
                    debug!(target: "bnb_reporter", number = tip.number, "Bootstrapped from Lorenzo tip");
                    self.lorenzo_tip = Some(tip);
                    return Ok(());
                }
                Err(LorenzoClientError::HeaderNotFound) => {
                    self.init_lorenzo_base_header().await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Uploads the configured base-height header as the light client anchor.
    async fn init_lorenzo_base_header(&self) -> Result<(), BnbReporterError> {
        let base = self.client.header_by_number(self.cfg.base_height).await?;
        let msg = MsgUploadHeaders {
            signer: self.lorenzo_client.signer(),
            headers: records_from_headers(std::slice::from_ref(&base)),
        };
        self.lorenzo_client.bnb_upload_headers(msg).await?;
        info!(
            target: "bnb_reporter",
            number = base.number,
            hash = %base.hash_slow(),
            "Uploaded base BNB header to Lorenzo"
        );
        Ok(())
    }

    /// Blocks until the BNB node is ahead of the destination tip.
    pub(crate) async fn wait_bnb_catch_up(&self) -> Result<(), BnbReporterError> {
        let tip_number = self.lorenzo_tip()?.number;
        if self.client.block_number().await? > tip_number {
            return Ok(());
        }
        info!(target: "bnb_reporter", tip_number, "Waiting for BNB to catch up to the Lorenzo tip");
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(BnbReporterError::Shutdown),
                _ = ticker.tick() => {
                    if self.client.block_number().await? > tip_number {
                        info!(
                            target: "bnb_reporter",
                            elapsed = ?started.elapsed(),
                            "BNB caught up to the Lorenzo tip"
                        );
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Batch-streams mature headers until the destination is within
    /// `delay_blocks` of the source tip.
    pub(crate) async fn wait_lorenzo_catch_up(&mut self) -> Result<(), BnbReporterError> {
        let tip_number = self.lorenzo_tip()?.number;
        let bnb_tip = self.client.latest_header().await?;
        if tip_number + self.delay_blocks >= bnb_tip.number {
            return Ok(());
        }
        let target = bnb_tip.number - self.delay_blocks;
        info!(
            target: "bnb_reporter",
            from = tip_number,
            to = target,
            bnb_tip = bnb_tip.number,
            "Waiting for Lorenzo to catch up to the mature BNB tip"
        );
        let started = Instant::now();

        let (batch_tx, mut batch_rx) = mpsc::channel::<Vec<Header>>(CATCH_UP_CHANNEL_CAPACITY);
        let fetcher = Arc::clone(&self.client);
        let fetcher_cancel = self.cancellation.clone();
        tokio::spawn(async move {
            let mut start = tip_number + 1;
            while start <= target {
                if fetcher_cancel.is_cancelled() {
                    return;
                }
                let end = (start + FETCH_HEADER_BATCH_SIZE - 1).min(target);
                match fetcher.range_headers(start, end).await {
                    Ok(headers) => {
                        if batch_tx.send(headers).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(target: "bnb_reporter", %err, start, end, "Failed to fetch BNB headers");
                        return;
                    }
                }
                start = end + 1;
                tokio::time::sleep(CATCH_UP_FETCH_PAUSE).await;
            }
        });

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(BnbReporterError::Shutdown),
                batch = batch_rx.recv() => match batch {
                    Some(headers) => self.handle_headers(&headers).await?,
                    None => break,
                }
            }
        }

        info!(
            target: "bnb_reporter",
            elapsed = ?started.elapsed(),
            "Lorenzo caught up to the mature BNB tip"
        );
        Ok(())
    }

    /// Uploads a batch and advances the tip. The batch must start right
    /// above the destination tip and extend it by parent hash; a parent
    /// mismatch means an EVM reorg crossed the delay boundary.
    pub(crate) async fn handle_headers(
        &mut self,
        headers: &[Header],
    ) -> Result<(), BnbReporterError> {
        let Some((first, last)) = headers.first().zip(headers.last()) else {
            return Ok(());
        };
        let started = Instant::now();

        let tip = self.lorenzo_tip()?;
        if first.number != tip.number + 1 {
            return Err(BnbReporterError::NotNextBlock { got: first.number, tip: tip.number });
        }
        if first.parent_hash != tip.hash_slow() {
            return Err(BnbReporterError::ParentMismatch {
                number: first.number,
                expected: tip.hash_slow(),
            });
        }

        let msg = MsgUploadHeaders {
            signer: self.lorenzo_client.signer(),
            headers: records_from_headers(headers),
        };
        let count = headers.len() as u64;
        if let Err(err) = self.lorenzo_client.bnb_upload_headers(msg).await {
            Metrics::record_failed(count);
            return Err(err.into());
        }
        Metrics::record_uploaded(count);

        info!(
            target: "bnb_reporter",
            from = first.number,
            to = last.number,
            elapsed = ?started.elapsed(),
            "Uploaded BNB headers to Lorenzo"
        );
        self.lorenzo_tip = Some(last.clone());
        Ok(())
    }

    /// The steady-state loop: fetch the next mature batch and upload it; a
    /// handling failure re-bootstraps from the destination.
    async fn main_loop(&mut self) -> Result<(), BnbReporterError> {
        info!(target: "bnb_reporter", "BNB reporter starts syncing headers");
        loop {
            if self.cancellation.is_cancelled() {
                return Ok(());
            }

            let bnb_tip = match self.client.latest_header().await {
                Ok(header) => header,
                Err(err) => {
                    error!(target: "bnb_reporter", %err, "Failed to get the BNB tip");
                    self.idle(NETWORK_ERROR_SLEEP).await?;
                    continue;
                }
            };

            let tip_number = self.lorenzo_tip()?.number;
            if self.delay_blocks + tip_number + 1 > bnb_tip.number {
                debug!(
                    target: "bnb_reporter",
                    delay = self.delay_blocks,
                    lorenzo_tip = tip_number,
                    bnb_tip = bnb_tip.number,
                    "No mature BNB blocks to relay"
                );
                self.idle(BLOCK_SLEEP_TIME).await?;
                continue;
            }

            let start = tip_number + 1;
            let end = (bnb_tip.number - self.delay_blocks).min(start + FETCH_HEADER_BATCH_SIZE - 1);
            let headers = match self.client.range_headers(start, end).await {
                Ok(headers) => headers,
                Err(err) => {
                    error!(target: "bnb_reporter", %err, start, end, "Failed to fetch BNB headers");
                    self.idle(NETWORK_ERROR_SLEEP).await?;
                    continue;
                }
            };

            if let Err(err) = self.handle_headers(&headers).await {
                warn!(target: "bnb_reporter", %err, "Failed to handle headers");
                if let Err(err) = self.bootstrap().await {
                    error!(target: "bnb_reporter", %err, "Failed to bootstrap");
                }
            }
        }
    }

    async fn idle(&self, wait: Duration) -> Result<(), BnbReporterError> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(BnbReporterError::Shutdown),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }

    async fn run(&mut self) -> Result<(), BnbReporterError> {
        self.bootstrap().await?;
        self.wait_bnb_catch_up().await?;
        self.wait_lorenzo_catch_up().await?;
        self.main_loop().await
    }
}

#[async_trait]
impl<C, L> RelayerActor for BnbReporter<C, L>
where
    C: BnbClient,
    L: LorenzoBnbClient,
{
    type Error = BnbReporterError;

    async fn start(mut self) -> Result<(), Self::Error> {
        Metrics::spawn_time_ticker(self.cancellation.clone());
        match self.run().await {
            Err(BnbReporterError::Shutdown) => {
                info!(target: "bnb_reporter", "Received shutdown signal. Exiting BNB reporter.");
                Ok(())
            }
            other => other,
        }
    }
}

impl<C, L> CancellableContext for BnbReporter<C, L>
where
    C: BnbClient,
    L: LorenzoBnbClient,
{
    fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBnbClient, MockLorenzoBnbClient};
    use relayer_lorenzo_client::TxResponse;

    fn linked_headers(start: u64, len: usize) -> Vec<Header> {
        let mut out: Vec<Header> = Vec::with_capacity(len);
        for i in 0..len {
            let mut header = Header {
                number: start + i as u64,
                timestamp: 1_700_000_000 + i as u64,
                gas_limit: 30_000_000,
                ..Default::default()
            };
            if let Some(prev) = out.last() {
                header.parent_hash = prev.hash_slow();
            }
            out.push(header);
        }
        out
    }

    fn test_config() -> BnbReporterConfig {
        BnbReporterConfig {
            rpc_url: "http://127.0.0.1:8545".parse().unwrap(),
            delay_blocks: 15,
            base_height: 100,
        }
    }

    fn test_reporter(
        client: MockBnbClient,
        lorenzo: MockLorenzoBnbClient,
    ) -> BnbReporter<MockBnbClient, MockLorenzoBnbClient> {
        BnbReporter::new(test_config(), Arc::new(client), Arc::new(lorenzo), CancellationToken::new())
            .expect("test config is valid")
    }

    #[tokio::test]
    async fn cold_start_seeds_base_then_catches_up() {
        // chain 100..=150, base height 100, delay 15: after seeding, catch-up
        // covers 101..=135
        let chain = linked_headers(100, 51);
        let base_record = records_from_headers(&chain[..1]).remove(0);

        let mut client = MockBnbClient::new();
        let base = chain[0].clone();
        client.expect_header_by_number().returning(move |n| {
            assert_eq!(n, 100);
            Ok(base.clone())
        });
        client.expect_block_number().returning(|| Ok(150));
        let latest = chain[50].clone();
        client.expect_latest_header().returning(move || Ok(latest.clone()));
        let range = chain.clone();
        client.expect_range_headers().returning(move |start, end| {
            Ok(range[(start - 100) as usize..=(end - 100) as usize].to_vec())
        });

        let mut lorenzo = MockLorenzoBnbClient::new();
        lorenzo.expect_signer().return_const("lrz1signer".to_string());
        let mut seq = mockall::Sequence::new();
        lorenzo
            .expect_bnb_latest_header()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(LorenzoClientError::HeaderNotFound));
        lorenzo
            .expect_bnb_latest_header()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(base_record.clone()));
        lorenzo
            .expect_bnb_upload_headers()
            .withf(|msg| msg.headers.len() == 1 && msg.headers[0].number == 100)
            .times(1)
            .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));
        lorenzo
            .expect_bnb_upload_headers()
            .withf(|msg| {
                msg.headers.len() == 35
                    && msg.headers[0].number == 101
                    && msg.headers[34].number == 135
            })
            .times(1)
            .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));

        let mut reporter = test_reporter(client, lorenzo);
        reporter.bootstrap().await.unwrap();
        assert_eq!(reporter.lorenzo_tip().unwrap().number, 100);

        reporter.wait_bnb_catch_up().await.unwrap();
        reporter.wait_lorenzo_catch_up().await.unwrap();
        assert_eq!(reporter.lorenzo_tip().unwrap().number, 135);
    }

    #[tokio::test]
    async fn fork_beyond_delay_errors_and_rebootstraps() {
        let chain = linked_headers(150, 51); // tip at 200
        let tip_record = records_from_headers(&chain[50..]).remove(0);

        let mut lorenzo = MockLorenzoBnbClient::new();
        let record = tip_record.clone();
        lorenzo.expect_bnb_latest_header().returning(move || Ok(record.clone()));

        let mut reporter = test_reporter(MockBnbClient::new(), lorenzo);
        reporter.bootstrap().await.unwrap();
        assert_eq!(reporter.lorenzo_tip().unwrap().number, 200);

        // a batch rooted elsewhere: parent hash of 201 does not match tip 200
        let forked = linked_headers(201, 15);
        let err = reporter.handle_headers(&forked).await.unwrap_err();
        assert!(matches!(err, BnbReporterError::ParentMismatch { number: 201, .. }));

        // the engine answers by re-reading its position from the destination
        reporter.bootstrap().await.unwrap();
        assert_eq!(reporter.lorenzo_tip().unwrap().number, 200);
    }

    #[tokio::test]
    async fn batch_not_adjacent_to_tip_is_rejected() {
        let chain = linked_headers(100, 10);
        let tip_record = records_from_headers(&chain[..1]).remove(0);

        let mut lorenzo = MockLorenzoBnbClient::new();
        lorenzo.expect_bnb_latest_header().returning(move || Ok(tip_record.clone()));

        let mut reporter = test_reporter(MockBnbClient::new(), lorenzo);
        reporter.bootstrap().await.unwrap();

        let err = reporter.handle_headers(&chain[2..]).await.unwrap_err();
        assert!(matches!(err, BnbReporterError::NotNextBlock { got: 102, tip: 100 }));
    }

    #[tokio::test]
    async fn single_header_batch_advances_tip() {
        let chain = linked_headers(100, 2);
        let tip_record = records_from_headers(&chain[..1]).remove(0);

        let mut lorenzo = MockLorenzoBnbClient::new();
        lorenzo.expect_bnb_latest_header().returning(move || Ok(tip_record.clone()));
        lorenzo.expect_signer().return_const("lrz1signer".to_string());
        lorenzo
            .expect_bnb_upload_headers()
            .withf(|msg| msg.headers.len() == 1 && msg.headers[0].number == 101)
            .times(1)
            .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));

        let mut reporter = test_reporter(MockBnbClient::new(), lorenzo);
        reporter.bootstrap().await.unwrap();

        reporter.handle_headers(&chain[1..]).await.unwrap();
        assert_eq!(reporter.lorenzo_tip().unwrap().number, 101);
    }
}
