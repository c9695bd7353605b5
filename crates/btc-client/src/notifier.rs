//! Derives the connect/disconnect block event stream from the node's RPC
//! surface.
//!
//! The notifier keeps a window of recently observed `(height, header)` pairs
//! and polls the node's best block. When the best block no longer extends the
//! window tip it walks the node's chain back by parent hash until it meets a
//! known entry, then emits disconnects for the abandoned window suffix
//! (tip-first) followed by connects for the replacing branch (ascending) —
//! the same burst shape a push-notifying node produces. A fork reaching below
//! the window is emitted as connects only; the engine notices the broken
//! parent linkage and re-bootstraps.

use crate::{BtcClientError, ChainQuery};
use bitcoin::{BlockHash, block::Header};
use relayer_types::BlockEvent;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of recent blocks the notifier remembers for reorg matching. Reorgs
/// deeper than this window force the engine into a re-bootstrap.
const NOTIFIER_WINDOW: usize = 256;

/// Produces the ordered [`BlockEvent`] stream for the PoW sync engine.
#[derive(Debug)]
pub struct BlockNotifier<Q> {
    query: Arc<Q>,
    poll_interval: Duration,
    events_tx: mpsc::Sender<BlockEvent>,
    cancellation: CancellationToken,
    window: VecDeque<(u32, Header)>,
}

impl<Q> BlockNotifier<Q>
where
    Q: ChainQuery,
{
    /// Creates a new notifier over the given chain query.
    pub fn new(
        query: Arc<Q>,
        poll_interval: Duration,
        events_tx: mpsc::Sender<BlockEvent>,
        cancellation: CancellationToken,
    ) -> Self {
        Self { query, poll_interval, events_tx, cancellation, window: VecDeque::new() }
    }

    /// Polls the node until cancelled or until the event consumer goes away.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(
            target: "btc_notifier",
            interval_secs = self.poll_interval.as_secs(),
            "Started block notifier"
        );
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "btc_notifier", "Received shutdown signal. Exiting block notifier.");
                    return;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(()) => {}
                        Err(BtcClientError::EventChannelClosed) => {
                            info!(target: "btc_notifier", "Event consumer dropped. Exiting block notifier.");
                            return;
                        }
                        Err(err) => {
                            warn!(target: "btc_notifier", %err, "Failed to poll node, will retry");
                        }
                    }
                }
            }
        }
    }

    /// Performs one poll step, emitting any connect/disconnect events the
    /// node's chain movement implies.
    pub(crate) async fn poll_once(&mut self) -> Result<(), BtcClientError> {
        let (best_hash, best_height) = self.query.best_block().await?;

        // first poll seeds the window without emitting anything
        if self.window.is_empty() {
            let (height, header) = self.query.block_header(best_hash).await?;
            debug!(target: "btc_notifier", height, hash = %best_hash, "Seeded notifier window");
            self.window.push_back((height, header));
            return Ok(());
        }

        if self.window_tip_hash() == Some(best_hash) {
            return Ok(());
        }

        // walk the node's chain back to a window entry to find the fork point
        let floor = self.window.front().map(|(h, _)| *h).unwrap_or_default();
        let mut branch: Vec<(u32, Header)> = Vec::new();
        let mut cursor = best_hash;
        let mut fork: Option<BlockHash> = None;
        let mut cursor_height = best_height;
        loop {
            if let Some((_, known)) = self.window.iter().find(|(_, h)| h.block_hash() == cursor) {
                fork = Some(known.block_hash());
                break;
            }
            if cursor_height < floor {
                break;
            }
            let (height, header) = self.query.block_header(cursor).await?;
            cursor = header.prev_blockhash;
            branch.push((height, header));
            match cursor_height.checked_sub(1) {
                Some(h) => cursor_height = h,
                None => break,
            }
        }

        // disconnect the abandoned window suffix, tip-first; a fork below the
        // window disconnects everything
        while let Some((height, header)) = self.window.back().copied() {
            if Some(header.block_hash()) == fork {
                break;
            }
            self.window.pop_back();
            debug!(target: "btc_notifier", height, hash = %header.block_hash(), "Block disconnected");
            self.send(BlockEvent::disconnected(height, header)).await?;
        }

        // connect the new branch, ascending
        for (height, header) in branch.into_iter().rev() {
            debug!(target: "btc_notifier", height, hash = %header.block_hash(), "Block connected");
            self.send(BlockEvent::connected(height, header)).await?;
            self.window.push_back((height, header));
            while self.window.len() > NOTIFIER_WINDOW {
                self.window.pop_front();
            }
        }

        Ok(())
    }

    async fn send(&self, event: BlockEvent) -> Result<(), BtcClientError> {
        self.events_tx.send(event).await.map_err(|_| BtcClientError::EventChannelClosed)
    }

    fn window_tip_hash(&self) -> Option<BlockHash> {
        self.window.back().map(|(_, h)| h.block_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relayer_types::{
        BlockEventKind, IndexedBlock,
        test_utils::{header_chain, header_chain_from},
    };
    use std::{collections::HashMap, sync::Mutex};

    /// A scripted chain the notifier can be pointed at.
    #[derive(Debug, Default)]
    struct FakeChain {
        blocks: Mutex<HashMap<BlockHash, (u32, Header)>>,
        best: Mutex<Option<(BlockHash, u32)>>,
    }

    impl FakeChain {
        fn extend(&self, run: &[IndexedBlock]) {
            let mut blocks = self.blocks.lock().unwrap();
            for ib in run {
                blocks.insert(ib.block_hash(), (ib.height, ib.header));
            }
            let tip = run.last().unwrap();
            *self.best.lock().unwrap() = Some((tip.block_hash(), tip.height));
        }
    }

    #[async_trait]
    impl ChainQuery for FakeChain {
        async fn best_block(&self) -> Result<(BlockHash, u32), BtcClientError> {
            Ok(self.best.lock().unwrap().expect("no best block scripted"))
        }

        async fn block_header(&self, hash: BlockHash) -> Result<(u32, Header), BtcClientError> {
            Ok(*self.blocks.lock().unwrap().get(&hash).expect("unknown block requested"))
        }
    }

    fn notifier(
        chain: Arc<FakeChain>,
    ) -> (BlockNotifier<FakeChain>, mpsc::Receiver<BlockEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (BlockNotifier::new(chain, Duration::from_secs(1), tx, CancellationToken::new()), rx)
    }

    #[tokio::test]
    async fn emits_connects_for_chain_extension() {
        let chain = Arc::new(FakeChain::default());
        let run = header_chain(100, 5);
        chain.extend(&run[..3]);

        let (mut notifier, mut rx) = notifier(Arc::clone(&chain));
        notifier.poll_once().await.unwrap();
        assert!(rx.try_recv().is_err(), "seeding must not emit events");

        chain.extend(&run);
        notifier.poll_once().await.unwrap();

        for expected in &run[3..] {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.kind, BlockEventKind::Connected);
            assert_eq!(event.height, expected.height);
            assert_eq!(event.header.block_hash(), expected.block_hash());
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emits_disconnect_burst_on_reorg() {
        let chain = Arc::new(FakeChain::default());
        let trunk = header_chain(100, 5);
        chain.extend(&trunk);

        let (mut notifier, mut rx) = notifier(Arc::clone(&chain));
        notifier.poll_once().await.unwrap(); // seed at 104
        chain.extend(&trunk); // no-op movement
        notifier.poll_once().await.unwrap();
        while rx.try_recv().is_ok() {}

        // walk the window past the seed so the fork point is covered
        let ext = header_chain_from(trunk.last().unwrap().block_hash(), 105, 2, 7);
        chain.extend(&ext);
        notifier.poll_once().await.unwrap();
        while rx.try_recv().is_ok() {}

        // replace 105..106 with a longer branch off 104
        let branch = header_chain_from(trunk.last().unwrap().block_hash(), 105, 3, 99);
        chain.extend(&branch);
        notifier.poll_once().await.unwrap();

        let expected = [
            (BlockEventKind::Disconnected, ext[1].block_hash(), 106),
            (BlockEventKind::Disconnected, ext[0].block_hash(), 105),
            (BlockEventKind::Connected, branch[0].block_hash(), 105),
            (BlockEventKind::Connected, branch[1].block_hash(), 106),
            (BlockEventKind::Connected, branch[2].block_hash(), 107),
        ];
        for (kind, hash, height) in expected {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.kind, kind);
            assert_eq!(event.header.block_hash(), hash);
            assert_eq!(event.height, height);
        }
        assert!(rx.try_recv().is_err());
    }
}
