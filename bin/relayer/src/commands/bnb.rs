//! The `bnb-reporter` subcommand.

use crate::{commands::spawn_ctrl_c_handler, config::Config, telemetry};
use relayer_bnb_reporter::{BnbReporter, Metrics};
use relayer_types::RelayerActor;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the BNB sync engine until shutdown or a fatal error.
pub(crate) async fn run_bnb_reporter(
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

    let bnb_client = Arc::new(relayer_bnb_client::Client::new(cfg.bnb_reporter.rpc_url.clone()));
    let lorenzo_client = Arc::new(relayer_lorenzo_client::Client::new(&cfg.lorenzo)?);

    let reporter =
        BnbReporter::new(cfg.bnb_reporter, bnb_client, lorenzo_client, cancellation)?;

    info!(target: "lrzrelayer", "Starting the BNB reporter");
    reporter.start().await.map_err(|err| {
        error!(target: "lrzrelayer", %err, "BNB reporter terminated");
        anyhow::anyhow!("BNB reporter terminated: {err}")
    })
}
