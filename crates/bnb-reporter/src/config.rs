//! Configuration for the EVM sync engine.

use crate::BnbReporterError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the EVM sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BnbReporterConfig {
    /// JSON-RPC endpoint of the BNB node.
    pub rpc_url: Url,
    /// Number of blocks a header must be buried under the source tip before
    /// it is relayed. Zero selects the default of 15.
    #[serde(default)]
    pub delay_blocks: u64,
    /// Block number the light client is seeded at on first run.
    pub base_height: u64,
}

impl BnbReporterConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), BnbReporterError> {
        if self.rpc_url.host().is_none() {
            return Err(BnbReporterError::Config("rpc url cannot be empty".into()));
        }
        Ok(())
    }
}
