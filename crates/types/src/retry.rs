//! Bounded exponential backoff for transient RPC failures.

use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::warn;

/// Retries `op` with exponential backoff.
///
/// The wait starts at `retry_sleep` and doubles after every failure, with a
/// small random jitter added to avoid thundering herds. Once the accumulated
/// wait exceeds `max_retry_sleep` the last error is returned. Callers must
/// only route transient failures through here; fatal conditions are to be
/// surfaced directly.
pub async fn with_backoff<T, E, F, Fut>(
    retry_sleep: Duration,
    max_retry_sleep: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut sleep = retry_sleep;
    let mut waited = Duration::ZERO;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if waited >= max_retry_sleep {
                    warn!(target: "retry", %err, "Retry budget exhausted");
                    return Err(err);
                }
                let jitter = Duration::from_millis(
                    rand::rng().random_range(0..=sleep.as_millis().max(1) as u64 / 2),
                );
                let wait = sleep + jitter;
                warn!(target: "retry", %err, wait_ms = wait.as_millis() as u64, "Retrying after error");
                tokio::time::sleep(wait).await;
                waited += wait;
                sleep = (sleep * 2).min(max_retry_sleep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let res: Result<u32, &str> =
            with_backoff(Duration::from_millis(10), Duration::from_secs(1), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("transient") } else { Ok(n) } }
            })
            .await;
        assert_eq!(res, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let res: Result<(), &str> =
            with_backoff(Duration::from_millis(100), Duration::from_millis(300), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;
        assert_eq!(res, Err("down"));
        // 100ms, then 200ms, then the budget is spent
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }
}
