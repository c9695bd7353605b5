//! Metrics for the PoW sync engine.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

/// Container for the engine's metric names.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Total number of BTC headers reported to Lorenzo.
    pub const REPORTED_HEADERS: &'static str = "lorenzo_relayer_reported_btc_headers_total";
    /// Total number of BTC headers that failed to submit.
    pub const FAILED_HEADERS: &'static str = "lorenzo_relayer_failed_btc_headers_total";
    /// Seconds since the last successfully reported BTC header.
    pub const SECONDS_SINCE_LAST_HEADER: &'static str =
        "lorenzo_relayer_btc_since_last_header_seconds";
    /// Unix time a given BTC header was reported, labeled by header id.
    pub const NEW_REPORTED_HEADER: &'static str = "lorenzo_relayer_new_btc_header";

    /// Describes and zeroes the engine's metrics.
    pub fn init() {
        metrics::describe_counter!(
            Self::REPORTED_HEADERS,
            metrics::Unit::Count,
            "Total number of BTC headers reported to Lorenzo",
        );
        metrics::describe_counter!(
            Self::FAILED_HEADERS,
            metrics::Unit::Count,
            "Total number of BTC headers that failed to submit to Lorenzo",
        );
        metrics::describe_gauge!(
            Self::SECONDS_SINCE_LAST_HEADER,
            metrics::Unit::Seconds,
            "Seconds since the last successfully reported BTC header",
        );
        metrics::describe_gauge!(
            Self::NEW_REPORTED_HEADER,
            "Unix time at which a BTC header was reported to Lorenzo, labeled by header id",
        );

        metrics::counter!(Self::REPORTED_HEADERS).increment(0);
        metrics::counter!(Self::FAILED_HEADERS).increment(0);
        metrics::gauge!(Self::SECONDS_SINCE_LAST_HEADER).set(0.0);
    }

    /// Spawns the ticker that advances the since-last-header gauge once per
    /// second until shutdown. Successful submissions reset it.
    pub fn spawn_time_ticker(cancellation: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    _ = ticker.tick() => {
                        metrics::gauge!(Self::SECONDS_SINCE_LAST_HEADER).increment(1.0);
                    }
                }
            }
        });
    }

    /// Records a successful submission of `count` headers.
    pub(crate) fn record_submitted(count: u64, ids: impl Iterator<Item = bitcoin::BlockHash>) {
        metrics::counter!(Self::REPORTED_HEADERS).increment(count);
        metrics::gauge!(Self::SECONDS_SINCE_LAST_HEADER).set(0.0);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
        for id in ids {
            metrics::gauge!(Self::NEW_REPORTED_HEADER, "id" => id.to_string()).set(now);
        }
    }

    /// Records a failed submission of `count` headers.
    pub(crate) fn record_failed(count: u64) {
        metrics::counter!(Self::FAILED_HEADERS).increment(count);
    }
}
