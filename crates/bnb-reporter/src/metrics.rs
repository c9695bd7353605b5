//! Metrics for the EVM sync engine.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Container for the engine's metric names.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Total number of BNB headers uploaded to Lorenzo.
    pub const UPLOADED_HEADERS: &'static str = "lorenzo_relayer_uploaded_bnb_headers_total";
    /// Total number of BNB headers that failed to upload.
    pub const FAILED_HEADERS: &'static str = "lorenzo_relayer_failed_bnb_headers_total";
    /// Seconds since the last successfully uploaded BNB header.
    pub const SECONDS_SINCE_LAST_HEADER: &'static str =
        "lorenzo_relayer_bnb_since_last_header_seconds";

    /// Describes and zeroes the engine's metrics.
    pub fn init() {
        metrics::describe_counter!(
            Self::UPLOADED_HEADERS,
            metrics::Unit::Count,
            "Total number of BNB headers uploaded to Lorenzo",
        );
        metrics::describe_counter!(
            Self::FAILED_HEADERS,
            metrics::Unit::Count,
            "Total number of BNB headers that failed to upload to Lorenzo",
        );
        metrics::describe_gauge!(
            Self::SECONDS_SINCE_LAST_HEADER,
            metrics::Unit::Seconds,
            "Seconds since the last successfully uploaded BNB header",
        );

        metrics::counter!(Self::UPLOADED_HEADERS).increment(0);
        metrics::counter!(Self::FAILED_HEADERS).increment(0);
        metrics::gauge!(Self::SECONDS_SINCE_LAST_HEADER).set(0.0);
    }

    /// Spawns the ticker that advances the since-last-header gauge once per
    /// second until shutdown. Successful uploads reset it.
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

    /// Records a successful upload of `count` headers.
    pub(crate) fn record_uploaded(count: u64) {
        metrics::counter!(Self::UPLOADED_HEADERS).increment(count);
        metrics::gauge!(Self::SECONDS_SINCE_LAST_HEADER).set(0.0);
    }

    /// Records a failed upload of `count` headers.
    pub(crate) fn record_failed(count: u64) {
        metrics::counter!(Self::FAILED_HEADERS).increment(count);
    }
}
