use thiserror::Error;

/// Errors produced by the Lorenzo client.
#[derive(Debug, Error)]
pub enum LorenzoClientError {
    /// A transport-level RPC failure.
    #[error("lorenzo rpc transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),
    /// The BNB light client holds no header yet. Used by the EVM engine as
    /// the first-run signal that triggers base-height seeding.
    #[error("latest bnb header not found")]
    HeaderNotFound,
    /// The destination accepted the request but rejected the submission.
    #[error("destination rejected submission with code {code}")]
    Rejected {
        /// Response code returned by the destination.
        code: u32,
    },
    /// The client was misconfigured.
    #[error("invalid lorenzo client configuration: {0}")]
    Config(String),
}
