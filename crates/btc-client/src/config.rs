//! Configuration for the Bitcoin node connection.

use crate::BtcClientError;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default capacity of the block event channel. A full channel blocks the
/// notifier, which in turn stops polling the node until the engine drains.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 10_000;

/// Default node poll cadence of the notifier, in seconds.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// The kind of Bitcoin node the client is pointed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcBackend {
    /// Bitcoin Core.
    #[default]
    Bitcoind,
    /// btcd.
    Btcd,
}

/// Connection settings for the Bitcoin source node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BtcConfig {
    /// JSON-RPC endpoint of the node.
    pub endpoint: Url,
    /// RPC username.
    pub username: String,
    /// RPC password.
    pub password: String,
    /// Network the node is expected to be on. One of `mainnet`, `testnet`,
    /// `simnet`, `signet`.
    pub net_params: String,
    /// Node implementation behind the endpoint.
    #[serde(default)]
    pub btc_backend: BtcBackend,
    /// Capacity of the block event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Notifier poll cadence in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

const fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl BtcConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), BtcClientError> {
        self.network()?;
        if self.event_buffer_size == 0 {
            return Err(BtcClientError::Config("event buffer size must be positive".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(BtcClientError::Config("poll interval must be positive".into()));
        }
        Ok(())
    }

    /// Maps the configured `net_params` string onto a [`Network`].
    pub fn network(&self) -> Result<Network, BtcClientError> {
        network_from_params(&self.net_params)
    }
}

/// Maps a `net_params` config string onto a [`Network`].
pub fn network_from_params(params: &str) -> Result<Network, BtcClientError> {
    match params {
        "mainnet" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "simnet" => Ok(Network::Regtest),
        "signet" => Ok(Network::Signet),
        other => Err(BtcClientError::Config(format!("unknown net params `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> BtcConfig {
        BtcConfig {
            endpoint: "http://127.0.0.1:8332".parse().unwrap(),
            username: "user".into(),
            password: "pass".into(),
            net_params: "signet".into(),
            btc_backend: BtcBackend::Bitcoind,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            poll_interval_secs: 10,
        }
    }

    #[test]
    fn accepts_known_net_params() {
        for (params, network) in [
            ("mainnet", Network::Bitcoin),
            ("testnet", Network::Testnet),
            ("simnet", Network::Regtest),
            ("signet", Network::Signet),
        ] {
            let cfg = BtcConfig { net_params: params.into(), ..base_config() };
            assert_eq!(cfg.network().unwrap(), network);
        }
    }

    #[test]
    fn rejects_unknown_net_params() {
        let cfg = BtcConfig { net_params: "florinet".into(), ..base_config() };
        assert!(cfg.validate().is_err());
    }
}
