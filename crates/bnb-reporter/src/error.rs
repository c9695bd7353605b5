use alloy_primitives::B256;
use relayer_bnb_client::BnbClientError;
use relayer_lorenzo_client::LorenzoClientError;
use thiserror::Error;

/// Errors produced by the EVM sync engine.
#[derive(Debug, Error)]
pub enum BnbReporterError {
    /// A source node failure.
    #[error(transparent)]
    Client(#[from] BnbClientError),
    /// A destination failure.
    #[error(transparent)]
    Lorenzo(#[from] LorenzoClientError),
    /// A stored header could not be RLP-decoded.
    #[error("failed to decode header RLP: {0}")]
    Rlp(String),
    /// A batch does not start right above the destination tip.
    #[error("header {got} is not the next block of the Lorenzo tip {tip}")]
    NotNextBlock {
        /// Number of the first header in the batch.
        got: u64,
        /// Number of the destination tip.
        tip: u64,
    },
    /// A batch does not extend the destination tip by parent hash: an EVM
    /// reorg crossed the delay boundary.
    #[error("BNB chain is inconsistent with Lorenzo chain: header {number} does not extend tip {expected}")]
    ParentMismatch {
        /// Number of the offending header.
        number: u64,
        /// Hash the batch was expected to extend.
        expected: B256,
    },
    /// The engine was used before bootstrap populated its tip.
    #[error("engine is not bootstrapped")]
    NotBootstrapped,
    /// The configuration was rejected at startup.
    #[error("invalid bnb reporter configuration: {0}")]
    Config(String),
    /// Shutdown was requested while waiting.
    #[error("shutdown requested")]
    Shutdown,
}
