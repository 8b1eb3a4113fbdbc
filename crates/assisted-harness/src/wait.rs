//! Polling an eventually-consistent remote state.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

/// Timeout and poll interval of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Give up after this long.
    pub timeout: Duration,
    /// Sleep between probes.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// A wait of `timeout` polling every `poll_interval`.
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Same interval, different timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(5))
    }
}

/// Probe until `done` accepts the probed value or the timeout elapses.
///
/// `probe` runs at least once, even with a zero timeout. Between probes the
/// wait sleeps for the poll interval, clamped to the time left. Errors from
/// `probe` are returned immediately; only `done` returning `false` causes
/// another probe.
///
/// Returns the accepted value.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] carrying the last observed value, or the
/// first error `probe` returned.
pub async fn wait_until<T, P, Fut, D>(
    description: &str,
    config: &WaitConfig,
    mut probe: P,
    mut done: D,
) -> Result<T>
where
    T: Debug,
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    D: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let value = probe().await?;
        if done(&value) {
            debug!(description, attempts, elapsed = ?start.elapsed(), "wait condition met");
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(description, attempts, last = ?value, "wait timed out");
            return Err(HarnessError::Timeout {
                description: description.to_string(),
                waited: now - start,
                last_observed: format!("{value:?}"),
            });
        }

        tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
    }
}
