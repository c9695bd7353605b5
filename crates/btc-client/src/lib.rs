//! Query client and block-event notifier for the Bitcoin source node.
//!
//! The query side talks plain JSON-RPC to `bitcoind` or `btcd`. The notifier
//! side produces the ordered connect/disconnect [`BlockEvent`] stream the PoW
//! sync engine consumes; see [`notifier`] for how the stream is derived.
//!
//! [`BlockEvent`]: relayer_types::BlockEvent

mod client;
pub use client::{ChainQuery, Client};

mod config;
pub use config::{BtcBackend, BtcConfig, DEFAULT_EVENT_BUFFER_SIZE, network_from_params};

mod error;
pub use error::BtcClientError;

mod notifier;
pub use notifier::BlockNotifier;
