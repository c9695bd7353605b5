//! The PoW sync engine actor.

use crate::{BtcClient, LorenzoBtcClient, Metrics, ReorgLedger, ReporterConfig, ReporterError};
use async_trait::async_trait;
use relayer_types::{BlockEvent, BtcCache, CancellableContext, RelayerActor};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

/// The BTC header reporter.
///
/// Owns all mutable sync state (cache, reorg ledger, event stream); the
/// single-threaded [`RelayerActor::start`] loop is the only mutator.
#[derive(Debug)]
pub struct Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    /// Engine configuration.
    pub(crate) cfg: ReporterConfig,
    /// Source node facade.
    pub(crate) btc_client: Arc<B>,
    /// Destination facade.
    pub(crate) lorenzo_client: Arc<L>,
    /// First backoff wait for transient RPC failures.
    pub(crate) retry_sleep: Duration,
    /// Backoff budget for transient RPC failures.
    pub(crate) max_retry_sleep: Duration,
    /// Rolling view of the canonical source chain.
    pub(crate) cache: BtcCache,
    /// Blocks rolled back during an in-progress reorg.
    pub(crate) reorg_ledger: ReorgLedger,
    /// Block event stream, installed by the first bootstrap.
    pub(crate) events_rx: Option<mpsc::Receiver<BlockEvent>>,
    /// The cancellation token, shared between all tasks.
    pub(crate) cancellation: CancellationToken,
}

impl<B, L> Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    /// Creates a new reporter. Fails if the configuration is invalid.
    pub fn new(
        cfg: ReporterConfig,
        btc_client: Arc<B>,
        lorenzo_client: Arc<L>,
        retry_sleep: Duration,
        max_retry_sleep: Duration,
        cancellation: CancellationToken,
    ) -> Result<Self, ReporterError> {
        cfg.validate()?;
        let cache =
            BtcCache::new(cfg.btc_cache_size).map_err(|e| ReporterError::Config(e.to_string()))?;
        Ok(Self {
            cfg,
            btc_client,
            lorenzo_client,
            retry_sleep,
            max_retry_sleep,
            cache,
            reorg_ledger: ReorgLedger::new(),
            events_rx: None,
            cancellation,
        })
    }

    async fn run(&mut self) -> Result<(), ReporterError> {
        self.wait_lorenzo_catch_up_close_to_btc_tip().await?;
        self.bootstrap_with_retries(false).await?;
        info!(target: "reporter", "Successfully started the reporter");
        self.block_event_loop().await
    }
}

#[async_trait]
impl<B, L> RelayerActor for Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    type Error = ReporterError;

    async fn start(mut self) -> Result<(), Self::Error> {
        Metrics::spawn_time_ticker(self.cancellation.clone());
        match self.run().await {
            Err(ReporterError::Shutdown) => {
                info!(target: "reporter", "Received shutdown signal. Exiting reporter.");
                Ok(())
            }
            other => other,
        }
    }
}

impl<B, L> CancellableContext for Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::client::{MockBtcClient, MockLorenzoBtcClient};

    pub(crate) fn test_config() -> ReporterConfig {
        ReporterConfig {
            net_params: "signet".into(),
            btc_cache_size: 1000,
            max_headers_in_msg: 100,
            delay_blocks: 3,
            confirmation_depth: 10,
            finalization_timeout: 100,
        }
    }

    pub(crate) fn test_reporter(
        btc: MockBtcClient,
        lorenzo: MockLorenzoBtcClient,
    ) -> Reporter<MockBtcClient, MockLorenzoBtcClient> {
        Reporter::new(
            test_config(),
            Arc::new(btc),
            Arc::new(lorenzo),
            Duration::from_millis(1),
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .expect("test config is valid")
    }
}
