use thiserror::Error;

/// Errors produced by the Bitcoin query client and notifier.
#[derive(Debug, Error)]
pub enum BtcClientError {
    /// A transport-level RPC failure.
    #[error("btc rpc transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),
    /// The node returned data that could not be consensus-decoded.
    #[error("failed to decode node response: {0}")]
    Decode(String),
    /// A requested range was inverted or beyond the node tip.
    #[error("invalid block range: base {base} is above tip {tip}")]
    InvalidRange {
        /// Requested base height.
        base: u32,
        /// Current node tip height.
        tip: u32,
    },
    /// The event channel consumer went away.
    #[error("block event channel closed")]
    EventChannelClosed,
    /// The client was misconfigured.
    #[error("invalid btc client configuration: {0}")]
    Config(String),
}
