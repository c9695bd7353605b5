use bitcoin::BlockHash;
use relayer_btc_client::BtcClientError;
use relayer_lorenzo_client::LorenzoClientError;
use relayer_types::CacheError;
use thiserror::Error;

/// Errors produced by the PoW sync engine.
///
/// Most variants are recoverable and answered with a re-bootstrap. The fatal
/// variants mean the invariants the relayer relies on no longer hold; they
/// must never be retried, and the process exits after logging them.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// A source node failure.
    #[error(transparent)]
    BtcClient(#[from] BtcClientError),
    /// A destination failure.
    #[error(transparent)]
    Lorenzo(#[from] LorenzoClientError),
    /// A recoverable cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The configuration was rejected at startup.
    #[error("invalid reporter configuration: {0}")]
    Config(String),
    /// The cache is empty where a populated cache was expected.
    #[error("cache is empty, restart bootstrap process")]
    EmptyCache,
    /// A pushed connect event is not on the node's best chain.
    #[error("connected block {hash} at height {height} is not on the best chain")]
    NotOnBestChain {
        /// Height of the pushed block.
        height: u32,
        /// Hash of the pushed block.
        hash: BlockHash,
    },
    /// A connect event conflicts with the cached block at its height.
    #[error("connecting block {hash} differs from the cached block at height {height}")]
    CacheConflict {
        /// Height of the conflict.
        height: u32,
        /// Hash of the pushed block.
        hash: BlockHash,
    },
    /// The cache tip is stale; connect events were missed.
    #[error("cache (tip {tip}) is not up-to-date while connecting block {height}, restart bootstrap process")]
    StaleCache {
        /// Height of the cache tip.
        tip: u32,
        /// Height of the connecting block.
        height: u32,
    },
    /// A disconnect event does not target the cache tip.
    #[error("cache is not up-to-date while disconnecting block {hash}, restart bootstrap process")]
    DisconnectMismatch {
        /// Hash of the disconnected block.
        hash: BlockHash,
    },
    /// The block event channel closed unexpectedly.
    #[error("block event channel is closed")]
    EventChannelClosed,
    /// Bootstrap failed repeatedly on transient errors.
    #[error("failed to bootstrap reporter after {attempts} attempts: {last}")]
    BootstrapExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The final error.
        last: String,
    },
    /// Shutdown was requested while waiting.
    #[error("shutdown requested")]
    Shutdown,

    // fatal conditions below
    /// The destination disagrees with the source beyond the k-deep window.
    #[error("BTC main chain is inconsistent with Lorenzo header chain: k-deep block in Lorenzo header chain: {hash}")]
    InconsistentChains {
        /// Hash of the block that failed the consistency check.
        hash: BlockHash,
    },
    /// The consistency-check height is missing from the cache.
    #[error("cannot find the {height}-th block of Lorenzo header chain in BTC cache for consistency check")]
    MissingConsistencyBlock {
        /// The height that could not be found.
        height: u32,
    },
    /// A pre-bootstrap catch-up header does not extend the destination tip.
    #[error("block {height} does not extend the Lorenzo tip {expected} during catch-up")]
    BrokenCatchUpChain {
        /// Height of the offending block.
        height: u32,
        /// The expected parent hash.
        expected: BlockHash,
    },
    /// A cache operation failed where the engine's own invariants guarantee
    /// it cannot.
    #[error("cache invariant violated: {0}")]
    CacheInvariant(CacheError),
}

impl ReporterError {
    /// Whether this error means the engine's invariants are broken and the
    /// process must terminate. Fatal errors are never retried.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InconsistentChains { .. }
                | Self::MissingConsistencyBlock { .. }
                | Self::BrokenCatchUpChain { .. }
                | Self::CacheInvariant(_)
        )
    }
}
