//! The `btc-reporter` subcommand.

use crate::{commands::spawn_ctrl_c_handler, config::Config, telemetry};
use relayer_reporter::{Metrics, Reporter};
use relayer_types::RelayerActor;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the BTC sync engine until shutdown or a fatal error.
pub(crate) async fn run_btc_reporter(
    config_path: PathBuf,
    metrics_port: u16,
) -> anyhow::Result<()> {
    let cfg = Config::load(&config_path)?;

    if metrics_port != 0 {
        telemetry::init_metrics(metrics_port)?;
    }
    Metrics::init();

    let cancellation = CancellationToken::new();
    spawn_ctrl_c_handler(cancellation.clone());

    let btc_client = Arc::new(relayer_btc_client::Client::new(&cfg.btc)?);
    let lorenzo_client = Arc::new(relayer_lorenzo_client::Client::new(&cfg.lorenzo)?);

    let reporter = Reporter::new(
        cfg.reporter,
        btc_client,
        lorenzo_client,
        Duration::from_secs(cfg.common.retry_sleep_time_secs),
        Duration::from_secs(cfg.common.max_retry_sleep_time_secs),
        cancellation,
    )?;

    info!(target: "lrzrelayer", "Starting the BTC reporter");
    reporter.start().await.map_err(|err| {
        error!(target: "lrzrelayer", %err, fatal = err.is_fatal(), "BTC reporter terminated");
        anyhow::anyhow!("BTC reporter terminated: {err}")
    })
}
