//! Subcommand implementations.

mod bnb;
mod btc;
mod init;

pub(crate) use bnb::run_bnb_reporter;
pub(crate) use btc::run_btc_reporter;
pub(crate) use init::init_config;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancellation` when the process receives an interrupt.
pub(crate) fn spawn_ctrl_c_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "lrzrelayer", "Received interrupt, shutting down");
            cancellation.cancel();
        }
    });
}
