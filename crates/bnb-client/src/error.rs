use thiserror::Error;

/// Errors produced by the BNB header client.
#[derive(Debug, Error)]
pub enum BnbClientError {
    /// A transport-level RPC failure.
    #[error("bnb rpc transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),
    /// The node returned `null` for the requested block.
    #[error("header {0} not found")]
    HeaderNotFound(String),
    /// A requested range was inverted.
    #[error("invalid header range: start {start} is above end {end}")]
    InvalidRange {
        /// Requested start number.
        start: u64,
        /// Requested end number.
        end: u64,
    },
    /// A fetched run of headers is not linked by parent hash.
    #[error("chain headers are not continuous at number {0}")]
    NotContinuous(u64),
    /// A parallel fetch task failed to complete.
    #[error("range fetch task failed: {0}")]
    Task(String),
}
