//! The `init-config` subcommand.

use crate::config::Config;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Writes a sample configuration file to `path`.
pub(crate) fn init_config(path: &Path) -> anyhow::Result<()> {
    let sample = Config::sample()?;
    let raw = toml::to_string_pretty(&sample).context("failed to serialize sample config")?;
    std::fs::write(path, raw)
        .with_context(|| format!("failed to write sample config to {}", path.display()))?;
    info!(target: "lrzrelayer", path = %path.display(), "Wrote sample configuration");
    Ok(())
}
