//! Tracing and metrics initialization.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber. `RUST_LOG` overrides the verbosity
/// flag when set.
pub(crate) fn init_tracing(verbosity: u8) -> anyhow::Result<()> {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

/// Starts the Prometheus metrics endpoint. Must be called from within a
/// tokio runtime.
pub(crate) fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(target: "telemetry", %addr, "Serving Prometheus metrics");
    Ok(())
}
