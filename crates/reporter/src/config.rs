//! Configuration for the PoW sync engine.

use crate::ReporterError;
use relayer_btc_client::network_from_params;
use serde::{Deserialize, Serialize};

/// Smallest accepted block cache.
const MIN_BTC_CACHE_SIZE: u64 = 1000;

/// Smallest accepted headers-per-message bound; lower values fragment
/// submissions pathologically.
const MIN_HEADERS_IN_MSG: u32 = 100;

/// Default maturity delay, in blocks.
const DEFAULT_DELAY_BLOCKS: u32 = 3;

/// Default confirmation depth (`k`) of the destination light client.
const DEFAULT_CONFIRMATION_DEPTH: u32 = 10;

/// Default finalization timeout (`w`) kept in cache beyond `k`.
const DEFAULT_FINALIZATION_TIMEOUT: u32 = 100;

/// Configuration for the PoW sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    /// Network the source node is expected to be on. One of `mainnet`,
    /// `testnet`, `simnet`, `signet`.
    pub net_params: String,
    /// Size of the BTC block cache.
    pub btc_cache_size: u64,
    /// Maximum number of headers in one insert message.
    pub max_headers_in_msg: u32,
    /// Number of blocks a header must be buried under the source tip before
    /// it is relayed.
    #[serde(default = "default_delay_blocks")]
    pub delay_blocks: u32,
    /// Confirmation depth (`k`) of the destination light client.
    #[serde(default = "default_confirmation_depth")]
    pub confirmation_depth: u32,
    /// Finalization timeout (`w`) kept in cache beyond `k`.
    #[serde(default = "default_finalization_timeout")]
    pub finalization_timeout: u32,
}

const fn default_delay_blocks() -> u32 {
    DEFAULT_DELAY_BLOCKS
}

const fn default_confirmation_depth() -> u32 {
    DEFAULT_CONFIRMATION_DEPTH
}

const fn default_finalization_timeout() -> u32 {
    DEFAULT_FINALIZATION_TIMEOUT
}

impl ReporterConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ReporterError> {
        network_from_params(&self.net_params)
            .map_err(|e| ReporterError::Config(e.to_string()))?;
        if self.btc_cache_size < MIN_BTC_CACHE_SIZE {
            return Err(ReporterError::Config(format!(
                "BTC cache size has to be at least {MIN_BTC_CACHE_SIZE}"
            )));
        }
        if self.max_headers_in_msg < MIN_HEADERS_IN_MSG {
            return Err(ReporterError::Config(format!(
                "max_headers_in_msg has to be at least {MIN_HEADERS_IN_MSG}"
            )));
        }
        if self.confirmation_depth == 0 {
            return Err(ReporterError::Config("confirmation depth must be positive".into()));
        }
        Ok(())
    }
}
