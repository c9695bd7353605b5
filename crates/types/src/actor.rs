//! [`RelayerActor`] trait.

use async_trait::async_trait;
use tokio_util::sync::WaitForCancellationFuture;

/// A context that can be cancelled by the process-wide shutdown token.
pub trait CancellableContext: Send {
    /// Returns a future that resolves when the actor is cancelled.
    fn cancelled(&self) -> WaitForCancellationFuture<'_>;
}

/// A long-running relayer sub-service.
///
/// Each sync engine is an actor with a single-threaded main loop that owns
/// all of its mutable state. The binary spawns every actor onto the runtime
/// and joins them; an actor returning an error is fatal for the process.
#[async_trait]
pub trait RelayerActor: Send + 'static {
    /// The error type for the actor.
    type Error: std::fmt::Debug;

    /// Runs the actor until shutdown or a fatal error.
    async fn start(self) -> Result<(), Self::Error>;
}
