//! CLI framing for the relayer.

use crate::{commands, telemetry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The Lorenzo header relayer.
///
/// Runs one sync engine per invocation: the BTC reporter feeding the PoW
/// light client, or the BNB reporter feeding the EVM light client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbosity level (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub(crate) verbosity: u8,
    /// Port the Prometheus metrics server listens on. Zero disables metrics.
    #[arg(long, default_value = "2112", env = "LRZRELAYER_METRICS_PORT", global = true)]
    pub(crate) metrics_port: u16,
    /// The command to run.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Subcommands of the relayer.
#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the BTC header reporter.
    BtcReporter {
        /// Path to the TOML configuration file.
        #[arg(long, short = 'c', env = "LRZRELAYER_CONFIG")]
        config: PathBuf,
    },
    /// Run the BNB header reporter.
    BnbReporter {
        /// Path to the TOML configuration file.
        #[arg(long, short = 'c', env = "LRZRELAYER_CONFIG")]
        config: PathBuf,
    },
    /// Write a commented sample configuration file.
    InitConfig {
        /// Where to write the sample file.
        #[arg(long, default_value = "sample-lrzrelayer.toml")]
        path: PathBuf,
    },
}

impl Cli {
    /// Runs the selected command on a fresh multi-threaded runtime.
    pub(crate) fn run(self) -> anyhow::Result<()> {
        telemetry::init_tracing(self.verbosity)?;

        match self.command {
            Commands::InitConfig { path } => commands::init_config(&path),
            Commands::BtcReporter { config } => {
                Self::block_on(commands::run_btc_reporter(config, self.metrics_port))
            }
            Commands::BnbReporter { config } => {
                Self::block_on(commands::run_bnb_reporter(config, self.metrics_port))
            }
        }
    }

    fn block_on<F>(fut: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = anyhow::Result<()>>,
    {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(fut)
    }
}
