//! Client facade for the Lorenzo destination chain.
//!
//! Lorenzo hosts the on-chain light clients the relayer feeds. The chain is
//! an opaque submitter from the relayer's point of view: this crate exposes
//! its query/submit surface over the sidecar JSON-RPC endpoint and carries
//! the signer identity used to address submissions.

mod client;
pub use client::{Client, LorenzoConfig};

mod error;
pub use error::LorenzoClientError;

mod types;
pub use types::{BnbHeaderRecord, BtcChainInfo, MsgInsertHeaders, MsgUploadHeaders, TxResponse};
