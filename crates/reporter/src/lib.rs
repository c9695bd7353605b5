//! The PoW header sync engine.
//!
//! Watches the Bitcoin source chain through the [`BtcClient`] facade and
//! keeps the Lorenzo BTC light client following the source's best-work tip:
//! bootstrap rebuilds the rolling block cache and verifies consistency with
//! the destination, the steady-state loop folds connect/disconnect events
//! into the cache, and reorgs are resolved by comparing cumulative work
//! against the rolled-back branch before any replacement headers are
//! submitted.

mod client;
pub use client::{BtcClient, LorenzoBtcClient};

mod config;
pub use config::ReporterConfig;

mod error;
pub use error::ReporterError;

mod metrics;
pub use metrics::Metrics;

mod reorg;
pub use reorg::ReorgLedger;

mod reporter;
pub use reporter::Reporter;

mod bootstrap;
mod handlers;
mod submit;
