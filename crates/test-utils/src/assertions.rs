//! Test assertion helpers.
//!
//! Provides polling-based assertions for async test scenarios.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a condition until it returns true or the timeout expires.
///
/// Uses Tokio's clock, so it cooperates with paused time: each poll
/// sleeps, which lets spawned tasks (and auto-advanced timers) make progress.
///
/// Returns `true` if the condition held before the timeout, `false` otherwise.
///
/// # Example
///
/// ```no_run
/// use std::{
///     sync::{
///         Arc,
///         atomic::{AtomicBool, Ordering},
///     },
///     time::Duration,
/// };
///
/// use heliowatch_test_utils::assert_eventually;
///
/// # async fn example() {
/// let done = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&done);
/// tokio::spawn(async move {
///     tokio::time::sleep(Duration::from_millis(50)).await;
///     flag.store(true, Ordering::SeqCst);
/// });
///
/// assert!(assert_eventually(Duration::from_millis(500), || done.load(Ordering::SeqCst)).await);
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    condition()
}
