//! `lrzrelayer` entrypoint.

mod cli;
mod commands;
mod config;
mod telemetry;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
