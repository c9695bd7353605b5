//! Bootstrap: cache construction, destination consistency checking, and the
//! pre-bootstrap close-the-gap catch-up.

use crate::{BtcClient, LorenzoBtcClient, Reporter, ReporterError};
use relayer_btc_client::BtcClientError;
use relayer_types::IndexedBlock;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Maximum bootstrap attempts before the process gives up.
const BOOTSTRAP_ATTEMPTS: u32 = 60;

/// Fixed wait between bootstrap attempts.
const BOOTSTRAP_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Poll cadence while waiting for the BTC node to catch up to the
/// destination light client.
const BTC_SYNC_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Buffer depth of the close-the-gap fetch channel.
const CATCH_UP_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConsistencyCheckInfo {
    pub(crate) lorenzo_tip_height: u32,
    pub(crate) start_sync_height: u32,
}

impl<B, L> Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    /// Runs one bootstrap pass: rebuild the cache from the destination's
    /// view, verify the k-deep block matches, submit the mature suffix, and
    /// shrink the cache to its steady-state size.
    pub(crate) async fn bootstrap(
        &mut self,
        skip_block_subscription: bool,
    ) -> Result<(), ReporterError> {
        let started = Instant::now();

        // a bootstrap never runs concurrently with reorg handling
        self.reorg_ledger.clear();

        self.wait_until_btc_sync().await?;
        self.init_btc_cache().await?;
        debug!(target: "reporter", size = self.cache.size(), "BTC cache initialized");

        // Subscribe right after cache initialization so subscribed and cached
        // blocks do not overlap. A re-bootstrap from within the event loop
        // keeps the existing stream; replacing it would lose queued events.
        if !skip_block_subscription {
            let events_rx =
                self.btc_client.subscribe_blocks(self.cancellation.clone()).await?;
            self.events_rx = Some(events_rx);
        }

        let consistency = self.check_consistency().await?;

        let mut ibs = self
            .cache
            .get_last_blocks(consistency.start_sync_height)
            .map_err(ReporterError::CacheInvariant)?;
        // only headers buried under the maturity delay are submitted here
        let keep = ibs.len().saturating_sub(self.cfg.delay_blocks as usize);
        ibs.truncate(keep);

        info!(
            target: "reporter",
            lorenzo_height = consistency.lorenzo_tip_height,
            start_height = consistency.start_sync_height,
            "Start syncing headers to Lorenzo"
        );

        let signer = self.lorenzo_client.signer();
        self.process_headers(&signer, &ibs).await?;

        // keep only the k+w window that the destination also holds
        let max_entries = u64::from(self.cfg.confirmation_depth + self.cfg.finalization_timeout);
        self.cache.resize(max_entries).map_err(ReporterError::CacheInvariant)?;
        self.cache.trim();

        info!(
            target: "reporter",
            size = self.cache.size(),
            elapsed = ?started.elapsed(),
            "Successfully finished bootstrapping"
        );
        Ok(())
    }

    /// Retries [`Reporter::bootstrap`] on transient failures with a fixed
    /// backoff. Fatal errors and shutdown abort immediately.
    pub(crate) async fn bootstrap_with_retries(
        &mut self,
        skip_block_subscription: bool,
    ) -> Result<(), ReporterError> {
        let mut last = String::new();
        for attempt in 1..=BOOTSTRAP_ATTEMPTS {
            if self.cancellation.is_cancelled() {
                return Err(ReporterError::Shutdown);
            }
            match self.bootstrap(skip_block_subscription).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_fatal() || matches!(err, ReporterError::Shutdown) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        target: "reporter",
                        %err,
                        attempt,
                        max_attempts = BOOTSTRAP_ATTEMPTS,
                        "Failed to bootstrap reporter"
                    );
                    last = err.to_string();
                    tokio::select! {
                        _ = self.cancellation.cancelled() => return Err(ReporterError::Shutdown),
                        _ = tokio::time::sleep(BOOTSTRAP_RETRY_INTERVAL) => {}
                    }
                }
            }
        }
        Err(ReporterError::BootstrapExhausted { attempts: BOOTSTRAP_ATTEMPTS, last })
    }

    /// Blocks until the BTC node is no shorter than the destination's light
    /// client chain.
    async fn wait_until_btc_sync(&self) -> Result<(), ReporterError> {
        let (btc_hash, btc_height) = self.btc_client.get_best_block().await?;
        debug!(target: "reporter", hash = %btc_hash, height = btc_height, "BTC latest block");

        let lorenzo_tip = self.lorenzo_client.btc_header_chain_tip().await?;
        info!(
            target: "reporter",
            hash = %lorenzo_tip.hash,
            height = lorenzo_tip.height,
            "Lorenzo header chain latest block"
        );

        if btc_height > 0 && btc_height >= lorenzo_tip.height {
            return Ok(());
        }

        info!(
            target: "reporter",
            btc_height,
            lorenzo_height = lorenzo_tip.height,
            "BTC chain falls behind Lorenzo header chain, wait until BTC catches up"
        );
        let mut ticker = tokio::time::interval(BTC_SYNC_POLL_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(ReporterError::Shutdown),
                _ = ticker.tick() => {
                    let (_, btc_height) = self.btc_client.get_best_block().await?;
                    let lorenzo_height = self.lorenzo_client.btc_header_chain_tip().await?.height;
                    if btc_height > 0 && btc_height >= lorenzo_height {
                        info!(
                            target: "reporter",
                            btc_height,
                            lorenzo_height,
                            "BTC chain now catches up with Lorenzo header chain, continue bootstrapping"
                        );
                        return Ok(());
                    }
                    info!(
                        target: "reporter",
                        btc_height,
                        lorenzo_height,
                        "BTC chain still falls behind Lorenzo header chain, keep waiting"
                    );
                }
            }
        }
    }

    /// Rebuilds the cache with the blocks since `T - k - w` of the BTC
    /// canonical chain, where `T` is the destination tip height.
    async fn init_btc_cache(&mut self) -> Result<(), ReporterError> {
        self.cache = relayer_types::BtcCache::new(self.cfg.btc_cache_size)
            .map_err(|e| ReporterError::Config(e.to_string()))?;

        let tip = self.lorenzo_client.btc_header_chain_tip().await?;
        let base = self.lorenzo_client.btc_base_header().await?;

        let window = self.cfg.confirmation_depth + self.cfg.finalization_timeout;
        let base_height = if tip.height > base.height + window {
            tip.height - window + 1
        } else {
            base.height
        };

        let ibs = self.btc_client.find_tail_blocks_by_height(base_height).await?;
        self.cache.init(ibs)?;
        Ok(())
    }

    /// Verifies that the k-deep block of the destination's view is the same
    /// block the source chain holds at that height. A mismatch is fatal: the
    /// chains diverged beyond the confirmation window.
    pub(crate) async fn check_consistency(&self) -> Result<ConsistencyCheckInfo, ReporterError> {
        let tip = self.lorenzo_client.btc_header_chain_tip().await?;
        let base = self.lorenzo_client.btc_base_header().await?;

        let height = if tip.height >= base.height + self.cfg.confirmation_depth {
            tip.height - self.cfg.confirmation_depth
        } else {
            base.height
        };

        let hash = self
            .cache
            .find_block(height)
            .map(IndexedBlock::block_hash)
            .ok_or(ReporterError::MissingConsistencyBlock { height })?;
        debug!(target: "reporter", height, %hash, "Block for consistency check");

        // Two consecutive headers are chained by hash, so a header cannot sit
        // at two different positions in two header chains. As long as the
        // block exists on Lorenzo it is at the same height there.
        if !self.lorenzo_client.contains_btc_block(hash).await? {
            return Err(ReporterError::InconsistentChains { hash });
        }

        Ok(ConsistencyCheckInfo {
            lorenzo_tip_height: tip.height,
            start_sync_height: height + 1,
        })
    }

    /// Pre-bootstrap catch-up: while the destination is more than
    /// `2 * confirmation_depth` behind the source tip, stream blocks one at a
    /// time and submit them, asserting each extends the destination tip.
    pub(crate) async fn wait_lorenzo_catch_up_close_to_btc_tip(
        &self,
    ) -> Result<(), ReporterError> {
        let close_gap = 2 * self.cfg.confirmation_depth;
        let (_, btc_tip) = self.btc_client.get_best_block().await?;
        let lorenzo_tip = self.lorenzo_client.btc_header_chain_tip().await?;
        if lorenzo_tip.height + close_gap >= btc_tip {
            return Ok(());
        }

        let target = btc_tip - close_gap;
        info!(
            target: "reporter",
            from = lorenzo_tip.height,
            to = target,
            "Lorenzo begins catching up close to the BTC tip"
        );
        let started = Instant::now();

        let (blocks_tx, mut blocks_rx) =
            mpsc::channel::<Result<IndexedBlock, BtcClientError>>(CATCH_UP_CHANNEL_CAPACITY);
        let fetcher = Arc::clone(&self.btc_client);
        let fetcher_cancel = self.cancellation.clone();
        tokio::spawn(async move {
            for height in (lorenzo_tip.height + 1)..target {
                if fetcher_cancel.is_cancelled() {
                    return;
                }
                match fetcher.get_block_by_height(height).await {
                    Ok(block) => {
                        if blocks_tx.send(Ok(block)).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = blocks_tx.send(Err(err)).await;
                        return;
                    }
                }
            }
        });

        let signer = self.lorenzo_client.signer();
        let mut running_tip = lorenzo_tip.hash;
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(ReporterError::Shutdown),
                block = blocks_rx.recv() => match block {
                    Some(Ok(block)) => {
                        if block.header.prev_blockhash != running_tip {
                            return Err(ReporterError::BrokenCatchUpChain {
                                height: block.height,
                                expected: running_tip,
                            });
                        }
                        running_tip = block.block_hash();
                        self.process_headers(&signer, std::slice::from_ref(&block)).await?;
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }

        info!(
            target: "reporter",
            elapsed = ?started.elapsed(),
            "Lorenzo caught up close to the BTC tip"
        );
        Ok(())
    }
}
