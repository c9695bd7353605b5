//! The EVM header sync engine.
//!
//! BNB provides a linear canonical chain addressed by number and no push
//! reorg feed, so this engine is a polled loop over a single piece of state:
//! the last header the destination accepted. Bootstrap seeds the light
//! client at a configured base height on first run; steady state fetches
//! mature header batches and uploads them under parent-hash continuity.

mod client;
pub use client::{BnbClient, LorenzoBnbClient};

mod config;
pub use config::BnbReporterConfig;

mod convert;
pub use convert::{header_from_record, records_from_headers};

mod error;
pub use error::BnbReporterError;

mod metrics;
pub use metrics::Metrics;

mod reporter;
pub use reporter::BnbReporter;
