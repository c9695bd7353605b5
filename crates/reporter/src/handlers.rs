//! Steady-state event loop: maturity gating, connect/disconnect handling,
//! and work-based reorg resolution.

use crate::{
    BtcClient, LorenzoBtcClient, Reporter, ReporterError, submit::calculate_branch_work,
};
use relayer_types::{BlockEvent, BlockEventKind, IndexedBlock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Re-check cadence while waiting for an event's block to mature.
const BLOCK_EVENT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Wait between best-block lookups that failed transiently.
const BEST_BLOCK_RETRY_SLEEP: Duration = Duration::from_secs(1);

impl<B, L> Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    /// Consumes block events until shutdown. Handler errors that are not
    /// fatal trigger a re-bootstrap that keeps the existing subscription.
    pub(crate) async fn block_event_loop(&mut self) -> Result<(), ReporterError> {
        let mut events_rx = self.events_rx.take().ok_or(ReporterError::EventChannelClosed)?;
        loop {
            let event = tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "reporter", "Received shutdown signal. Exiting block event loop.");
                    return Ok(());
                }
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        error!(target: "reporter", "Block event channel is closed");
                        return Err(ReporterError::EventChannelClosed);
                    }
                }
            };

            self.wait_block_maturity(&event).await?;

            let outcome = match event.kind {
                BlockEventKind::Connected => self.handle_connected(&event).await,
                BlockEventKind::Disconnected => self.handle_disconnected(&event),
            };
            if let Err(err) = outcome {
                if err.is_fatal() || matches!(err, ReporterError::Shutdown) {
                    return Err(err);
                }
                warn!(
                    target: "reporter",
                    %err,
                    "Due to error in event processing, bootstrap process needs to be restarted"
                );
                self.bootstrap_with_retries(true).await?;
            }
        }
    }

    /// Delays processing until the event's block is buried `delay_blocks`
    /// under the source tip.
    async fn wait_block_maturity(&self, event: &BlockEvent) -> Result<(), ReporterError> {
        loop {
            if self.cancellation.is_cancelled() {
                return Err(ReporterError::Shutdown);
            }
            let btc_tip = match self.btc_client.get_best_block().await {
                Ok((_, height)) => height,
                Err(err) => {
                    warn!(target: "reporter", %err, "Failed to get best block from BTC client");
                    tokio::time::sleep(BEST_BLOCK_RETRY_SLEEP).await;
                    continue;
                }
            };
            if btc_tip >= event.height + self.cfg.delay_blocks {
                return Ok(());
            }
            debug!(
                target: "reporter",
                delay = self.cfg.delay_blocks,
                height = event.height,
                btc_tip,
                "Delaying block processing until the block matures"
            );
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(ReporterError::Shutdown),
                _ = tokio::time::sleep(BLOCK_EVENT_CHECK_INTERVAL) => {}
            }
        }
    }

    /// Handles a connected block: fold it into the cache, then either extend
    /// the destination or, mid-reorg, submit the replacing branch once its
    /// work strictly exceeds the rolled-back work.
    pub(crate) async fn handle_connected(
        &mut self,
        event: &BlockEvent,
    ) -> Result<(), ReporterError> {
        let event_hash = event.header.block_hash();

        // After the maturity delay the connected block should be on the best
        // chain; anything else means the push stream diverged from the node.
        let canonical = self.btc_client.get_block_by_height(event.height).await?;
        if canonical.block_hash() != event_hash {
            return Err(ReporterError::NotOnBestChain { height: event.height, hash: event_hash });
        }

        let Some(first_height) = self.cache.first().map(|b| b.height) else {
            return Err(ReporterError::EmptyCache);
        };
        // pre-subscription block, the cache window starts above it
        if event.height < first_height {
            debug!(
                target: "reporter",
                height = event.height,
                hash = %event_hash,
                "The connecting block is too early, skipping"
            );
            return Ok(());
        }

        // an overlap with the cache is either a duplicate delivery or a
        // conflict that only a bootstrap can resolve
        if let Some(cached) = self.cache.find_block(event.height) {
            if cached.block_hash() == event_hash {
                debug!(
                    target: "reporter",
                    height = event.height,
                    hash = %event_hash,
                    "The connecting block is known to the cache, skipping"
                );
                return Ok(());
            }
            return Err(ReporterError::CacheConflict { height: event.height, hash: event_hash });
        }

        let block = self.btc_client.get_block_by_hash(event_hash).await?;
        let (tip_height, tip_hash) = self
            .cache
            .tip()
            .map(|b| (b.height, b.block_hash()))
            .ok_or(ReporterError::EmptyCache)?;
        if block.header.prev_blockhash != tip_hash {
            return Err(ReporterError::StaleCache { tip: tip_height, height: block.height });
        }

        let block_height = block.height;
        let latest = block.clone();
        self.cache.add(block)?;

        let headers_to_process: Vec<IndexedBlock> = if !self.reorg_ledger.is_empty() {
            // Mid-reorg: compare the work of the branch grown since the
            // deepest fork point against the rolled-back work. Nodes only
            // reorg onto strictly better chains, so wait until ours is.
            let Some((fork_height, _)) = self.reorg_ledger.deepest_removed() else {
                return Err(ReporterError::EmptyCache);
            };
            let current_branch = self
                .cache
                .get_last_blocks(fork_height)
                .map_err(ReporterError::CacheInvariant)?;
            let branch_work = calculate_branch_work(&current_branch);
            if branch_work > self.reorg_ledger.removed_work() {
                debug!(
                    target: "reporter",
                    len = current_branch.len(),
                    "Current branch is better than the reorg branch"
                );
                self.reorg_ledger.clear();
                current_branch
            } else {
                debug!(target: "reporter", "Current branch does not outweigh the reorg branch yet");
                Vec::new()
            }
        } else {
            let lorenzo_tip = self.lorenzo_client.btc_header_chain_tip().await?;
            // after bootstrap the cache tip stays ahead of the destination
            // tip; submit whatever run the destination is missing
            if lorenzo_tip.height + 1 < block_height {
                self.cache.get_last_blocks(lorenzo_tip.height + 1)?
            } else {
                vec![latest]
            }
        };

        if headers_to_process.is_empty() {
            debug!(target: "reporter", "No new headers to submit to Lorenzo");
            return Ok(());
        }

        let signer = self.lorenzo_client.signer();
        self.process_headers(&signer, &headers_to_process).await?;
        Ok(())
    }

    /// Handles a disconnected block: the cache tip moves onto the reorg
    /// ledger. Nothing is submitted; the destination rolls back only when
    /// the replacing branch is submitted.
    pub(crate) fn handle_disconnected(&mut self, event: &BlockEvent) -> Result<(), ReporterError> {
        let Some((tip_height, tip_header)) = self.cache.tip().map(|b| (b.height, b.header)) else {
            return Err(ReporterError::EmptyCache);
        };
        if event.header.block_hash() != tip_header.block_hash() {
            return Err(ReporterError::DisconnectMismatch { hash: event.header.block_hash() });
        }

        self.reorg_ledger.add_removed(tip_height, tip_header);
        self.cache.remove_last().map_err(ReporterError::CacheInvariant)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBtcClient, MockLorenzoBtcClient};
    use crate::reporter::test_support::test_reporter;
    use bitcoin::{BlockHash, hashes::Hash};
    use relayer_lorenzo_client::{BtcChainInfo, TxResponse};
    use relayer_types::test_utils::{header_chain, header_chain_from};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn block_map(blocks: &[IndexedBlock]) -> HashMap<BlockHash, IndexedBlock> {
        blocks.iter().map(|b| (b.block_hash(), b.clone())).collect()
    }

    #[tokio::test]
    async fn steady_append_submits_single_header() {
        let chain = header_chain(998, 4); // 998..=1001
        let next = chain[3].clone();
        let next_hash = next.block_hash();
        let tip_hash = chain[2].block_hash();

        let mut btc = MockBtcClient::new();
        let canonical = next.clone();
        btc.expect_get_block_by_height().returning(move |_| Ok(canonical.clone()));
        let fetched = next.clone();
        btc.expect_get_block_by_hash().returning(move |_| Ok(fetched.clone()));

        let mut lorenzo = MockLorenzoBtcClient::new();
        lorenzo
            .expect_btc_header_chain_tip()
            .returning(move || Ok(BtcChainInfo { height: 1000, hash: tip_hash }));
        lorenzo.expect_signer().return_const("lrz1signer".to_string());
        lorenzo.expect_contains_btc_block().returning(|_| Ok(false));
        lorenzo
            .expect_insert_btc_headers()
            .withf(|msg| msg.headers.len() == 1)
            .times(1)
            .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));

        let mut reporter = test_reporter(btc, lorenzo);
        reporter.cache.init(chain[..3].to_vec()).unwrap();

        reporter.handle_connected(&BlockEvent::connected(1001, next.header)).await.unwrap();
        assert_eq!(reporter.cache.tip().unwrap().block_hash(), next_hash);
        assert!(reporter.reorg_ledger.is_empty());
    }

    #[tokio::test]
    async fn duplicate_connect_is_ignored() {
        let chain = header_chain(998, 3);
        let dup = chain[2].clone();

        let mut btc = MockBtcClient::new();
        let canonical = dup.clone();
        btc.expect_get_block_by_height().returning(move |_| Ok(canonical.clone()));

        let mut reporter = test_reporter(btc, MockLorenzoBtcClient::new());
        reporter.cache.init(chain).unwrap();

        reporter.handle_connected(&BlockEvent::connected(1000, dup.header)).await.unwrap();
        assert_eq!(reporter.cache.size(), 3);
    }

    #[tokio::test]
    async fn conflicting_connect_requires_bootstrap() {
        let chain = header_chain(998, 3);
        let conflict = header_chain_from(chain[1].block_hash(), 1000, 1, 42).pop().unwrap();

        let mut btc = MockBtcClient::new();
        let canonical = conflict.clone();
        btc.expect_get_block_by_height().returning(move |_| Ok(canonical.clone()));

        let mut reporter = test_reporter(btc, MockLorenzoBtcClient::new());
        reporter.cache.init(chain).unwrap();

        let err = reporter
            .handle_connected(&BlockEvent::connected(1000, conflict.header))
            .await
            .unwrap_err();
        assert!(matches!(err, ReporterError::CacheConflict { height: 1000, .. }));
        assert!(!err.is_fatal());
    }

    /// Drives a two-block reorg through the handlers: disconnect 1000 and
    /// 999, then connect a replacing branch 999'..=1001'.
    async fn run_reorg(
        submitted_len: usize,
        branch_len: usize,
    ) -> crate::Reporter<MockBtcClient, MockLorenzoBtcClient> {
        let trunk = header_chain(997, 4); // 997(W) 998(X) 999(Y) 1000(Z)
        let branch = header_chain_from(trunk[1].block_hash(), 999, branch_len, 7);

        let mut btc = MockBtcClient::new();
        let by_hash = block_map(&branch);
        btc.expect_get_block_by_hash().returning(move |h| Ok(by_hash[&h].clone()));
        let by_height = branch.clone();
        btc.expect_get_block_by_height()
            .returning(move |h| Ok(by_height[(h - 999) as usize].clone()));

        let mut lorenzo = MockLorenzoBtcClient::new();
        lorenzo.expect_signer().return_const("lrz1signer".to_string());
        lorenzo.expect_contains_btc_block().returning(|_| Ok(false));
        if submitted_len > 0 {
            lorenzo
                .expect_insert_btc_headers()
                .withf(move |msg| msg.headers.len() == submitted_len)
                .times(1)
                .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));
        } else {
            lorenzo.expect_insert_btc_headers().times(0);
        }

        let mut reporter = test_reporter(btc, lorenzo);
        reporter.cache.init(trunk.clone()).unwrap();

        reporter
            .handle_disconnected(&BlockEvent::disconnected(1000, trunk[3].header))
            .unwrap();
        reporter
            .handle_disconnected(&BlockEvent::disconnected(999, trunk[2].header))
            .unwrap();
        assert_eq!(reporter.reorg_ledger.len(), 2);

        for block in &branch {
            reporter
                .handle_connected(&BlockEvent::connected(block.height, block.header))
                .await
                .unwrap();
        }
        reporter
    }

    #[tokio::test]
    async fn winning_reorg_branch_is_submitted() {
        // three replacing blocks outweigh the two removed ones
        let reporter = run_reorg(3, 3).await;
        assert!(reporter.reorg_ledger.is_empty());
        assert_eq!(reporter.cache.tip().unwrap().height, 1001);
    }

    #[tokio::test]
    async fn insufficient_reorg_branch_is_withheld() {
        // two replacing blocks tie the two removed ones; ties never win
        let reporter = run_reorg(0, 2).await;
        assert_eq!(reporter.reorg_ledger.len(), 2);
        assert_eq!(reporter.cache.tip().unwrap().height, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn maturity_wait_blocks_until_delay_satisfied() {
        let polls = std::sync::Arc::new(AtomicU32::new(0));
        let counter = std::sync::Arc::clone(&polls);
        let mut btc = MockBtcClient::new();
        btc.expect_get_best_block().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok((BlockHash::all_zeros(), 101 + n))
        });

        let reporter = test_reporter(btc, MockLorenzoBtcClient::new());
        let chain = header_chain(100, 1);
        let event = BlockEvent::connected(100, chain[0].header);
        reporter.wait_block_maturity(&event).await.unwrap();
        // tips 101, 102, then 103 satisfies 100 + delay_blocks(3)
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }
}
