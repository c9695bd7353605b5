//! Top-level configuration file handling.

use anyhow::Context;
use relayer_bnb_reporter::BnbReporterConfig;
use relayer_btc_client::{BtcBackend, BtcConfig, DEFAULT_EVENT_BUFFER_SIZE};
use relayer_lorenzo_client::LorenzoConfig;
use relayer_reporter::ReporterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by both engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct CommonConfig {
    /// First backoff wait for transient RPC failures, in seconds.
    pub(crate) retry_sleep_time_secs: u64,
    /// Backoff budget for transient RPC failures, in seconds.
    pub(crate) max_retry_sleep_time_secs: u64,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self { retry_sleep_time_secs: 5, max_retry_sleep_time_secs: 300 }
    }
}

/// The relayer's top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Shared settings.
    #[serde(default)]
    pub(crate) common: CommonConfig,
    /// BTC source node connection.
    pub(crate) btc: BtcConfig,
    /// Lorenzo destination connection.
    pub(crate) lorenzo: LorenzoConfig,
    /// BTC sync engine settings.
    pub(crate) reporter: ReporterConfig,
    /// BNB sync engine settings.
    pub(crate) bnb_reporter: BnbReporterConfig,
}

impl Config {
    /// Loads and validates the configuration at `path`.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("no config file found at {}", path.display()))?;
        let cfg: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates every section.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        self.btc.validate().context("invalid config in [btc]")?;
        self.lorenzo.validate().context("invalid config in [lorenzo]")?;
        self.reporter.validate().context("invalid config in [reporter]")?;
        self.bnb_reporter.validate().context("invalid config in [bnb_reporter]")?;
        Ok(())
    }

    /// A sample configuration with placeholder endpoints.
    pub(crate) fn sample() -> anyhow::Result<Self> {
        Ok(Self {
            common: CommonConfig::default(),
            btc: BtcConfig {
                endpoint: "http://127.0.0.1:8332".parse()?,
                username: "rpcuser".into(),
                password: "rpcpass".into(),
                net_params: "signet".into(),
                btc_backend: BtcBackend::Bitcoind,
                event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
                poll_interval_secs: 10,
            },
            lorenzo: LorenzoConfig {
                endpoint: "http://127.0.0.1:26657".parse()?,
                signer: "lrz1...".into(),
                timeout_secs: 30,
            },
            reporter: ReporterConfig {
                net_params: "signet".into(),
                btc_cache_size: 1000,
                max_headers_in_msg: 100,
                delay_blocks: 3,
                confirmation_depth: 10,
                finalization_timeout: 100,
            },
            bnb_reporter: BnbReporterConfig {
                rpc_url: "http://127.0.0.1:8545".parse()?,
                delay_blocks: 15,
                base_height: 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_round_trips_and_validates() {
        let sample = Config::sample().unwrap();
        let raw = toml::to_string_pretty(&sample).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.common.retry_sleep_time_secs, 5);
    }

    #[test]
    fn rejects_unknown_sections() {
        let sample = Config::sample().unwrap();
        let mut raw = toml::to_string_pretty(&sample).unwrap();
        raw.push_str("\n[checkpointing]\nenabled = true\n");
        assert!(toml::from_str::<Config>(&raw).is_err());
    }
}
