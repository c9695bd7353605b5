//! Core data model for the Lorenzo relayer: indexed source blocks, block
//! events, the rolling block cache, and the small shared runtime traits the
//! engine actors are built on.

mod block;
pub use block::{BlockEvent, BlockEventKind, IndexedBlock};

mod cache;
pub use cache::{BtcCache, CacheError};

mod actor;
pub use actor::{CancellableContext, RelayerActor};

pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
