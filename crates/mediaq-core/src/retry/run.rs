//! Retry loop with a stop-aware backoff sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::classify::classify;
use super::error::FetchError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Longest uninterrupted sleep; stop requests are seen within this bound.
pub const STOP_POLL: Duration = Duration::from_millis(100);

/// Sleeps for `d` in increments of at most `STOP_POLL`. Returns `false` if
/// `stop` was raised before the full duration elapsed.
pub fn sleep_unless_stopped(d: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + d;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}

/// Runs `f` until it succeeds, the policy gives up, or `stop` is raised.
/// `on_retry` is called with each retryable error, its kind and the backoff
/// before sleeping.
pub fn run_with_retry<F, R>(
    policy: &RetryPolicy,
    stop: &AtomicBool,
    mut f: F,
    mut on_retry: R,
) -> Result<(), FetchError>
where
    F: FnMut() -> Result<(), FetchError>,
    R: FnMut(&FetchError, ErrorKind, Duration),
{
    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(FetchError::Stopped);
        }
        match f() {
            Ok(()) => return Ok(()),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        on_retry(&e, kind, d);
                        if !sleep_unless_stopped(d, stop) {
                            return Err(FetchError::Stopped);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn retries_until_success() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1));
        let stop = AtomicBool::new(false);
        let mut calls = 0;
        let mut retries = 0;
        let r = run_with_retry(
            &policy,
            &stop,
            || {
                calls += 1;
                if calls < 4 {
                    Err(FetchError::Http(503))
                } else {
                    Ok(())
                }
            },
            |_, _, _| retries += 1,
        );
        assert!(r.is_ok());
        assert_eq!(calls, 4);
        assert_eq!(retries, 3);
    }

    #[test]
    fn retry_callback_sees_kind_and_delay() {
        let policy = RetryPolicy::fixed(Duration::from_millis(2));
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        let mut calls = 0;
        let r = run_with_retry(
            &policy,
            &stop,
            || {
                calls += 1;
                match calls {
                    1 => Err(FetchError::Http(503)),
                    2 => Err(FetchError::Http(502)),
                    _ => Ok(()),
                }
            },
            |_, kind, d| seen.push((kind, d)),
        );
        assert!(r.is_ok());
        assert_eq!(
            seen,
            vec![
                (ErrorKind::Throttled, Duration::from_millis(4)),
                (ErrorKind::Http5xx(502), Duration::from_millis(2)),
            ]
        );
    }

    #[test]
    fn storage_error_is_returned() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1));
        let stop = AtomicBool::new(false);
        let r = run_with_retry(
            &policy,
            &stop,
            || Err(FetchError::Storage(std::io::Error::other("disk full"))),
            |_, _, _| panic!("storage errors must not retry"),
        );
        assert!(matches!(r, Err(FetchError::Storage(_))));
    }

    #[test]
    fn stop_interrupts_backoff() {
        let policy = RetryPolicy::fixed(Duration::from_secs(30));
        let stop = Arc::new(AtomicBool::new(false));
        let s2 = Arc::clone(&stop);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            s2.store(true, Ordering::Relaxed);
        });
        let started = Instant::now();
        let r = run_with_retry(&policy, &stop, || Err(FetchError::Http(500)), |_, _, _| {});
        assert!(matches!(r, Err(FetchError::Stopped)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn sleep_completes_without_stop() {
        let stop = AtomicBool::new(false);
        assert!(sleep_unless_stopped(Duration::from_millis(5), &stop));
        stop.store(true, Ordering::Relaxed);
        assert!(!sleep_unless_stopped(Duration::from_secs(5), &stop));
    }
}
