//! Cancellable waiting primitives.
//!
//! Every wait in the workflow is a race between "interval elapsed" and
//! "caller cancelled"; nothing in the engine sleeps without watching the
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::Error;

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns [`Error::Cancelled`] naming `operation` when cancelled.
pub async fn sleep_or_cancel(
    cancel: &CancellationToken,
    duration: Duration,
    operation: &str,
) -> Result<(), Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled(operation)),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Fail fast with [`Error::Cancelled`] if the token has already fired.
pub fn ensure_not_cancelled(cancel: &CancellationToken, operation: &str) -> Result<(), Error> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled(operation));
    }
    Ok(())
}

/// Poll `check_fn` until it returns `Ok(true)`, the timeout passes, or the
/// caller cancels.
///
/// `Ok(false)` and `Err(_)` from the check both mean "not yet"; the last
/// error is reported in the timeout message so a permanently failing check
/// doesn't disappear behind a generic timeout.
pub async fn poll_until<F, Fut>(
    cancel: &CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
    operation: &str,
    mut check_fn: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    poll_for(cancel, timeout, poll_interval, operation, || {
        let check = check_fn();
        async move { Ok::<_, Error>(check.await?.then_some(())) }
    })
    .await
}

/// Like [`poll_until`], but the check hands back the value it settled on.
///
/// `Ok(None)` means "not yet".
pub async fn poll_for<T, F, Fut>(
    cancel: &CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
    operation: &str,
    mut check_fn: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    let start = Instant::now();
    let mut last_error: Option<String> = None;

    loop {
        ensure_not_cancelled(cancel, operation)?;

        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => trace!(operation, "condition not yet met"),
            Err(e) => {
                trace!(operation, error = %e, "check failed, will retry");
                last_error = Some(e.to_string());
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            let mut message = format!("gave up after {}s", elapsed.as_secs());
            if let Some(e) = last_error {
                message.push_str(&format!(" (last error: {e})"));
            }
            return Err(Error::timeout(operation, message));
        }

        let remaining = timeout - elapsed;
        sleep_or_cancel(cancel, poll_interval.min(remaining), operation).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancellation() {
        let cancel = CancellationToken::new();
        let result = sleep_or_cancel(&cancel, Duration::from_secs(5), "waiting").await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = sleep_or_cancel(&cancel, Duration::from_secs(3600), "waiting for pods")
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_returns_when_condition_met() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        poll_until(
            &cancel,
            Duration::from_secs(60),
            Duration::from_secs(5),
            "pods ready",
            || {
                let c = c.clone();
                async move { Ok(c.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_times_out_with_last_error() {
        let cancel = CancellationToken::new();
        let err = poll_until(
            &cancel,
            Duration::from_secs(20),
            Duration::from_secs(5),
            "waiting for gateway pods",
            || async { Err(Error::validation("no pods matched app=gw")) },
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("app=gw"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_for_returns_the_settled_value() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let seen = poll_for(
            &cancel,
            Duration::from_secs(60),
            Duration::from_secs(5),
            "listing mirrors",
            || {
                let c = c.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(Error::http_status("mirrors", 503, "unavailable")),
                        1 => Ok(None),
                        n => Ok(Some(n)),
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(seen, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poll_until(
            &cancel,
            Duration::from_secs(20),
            Duration::from_secs(5),
            "waiting",
            || async { Ok(false) },
        )
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
    }
}
