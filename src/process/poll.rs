//! Bounded, cancellable polling.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::UpdaterError;

/// How often and for how long to re-check a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between probes
    pub interval: Duration,
    /// Total time after which the wait fails with [`UpdaterError::Timeout`]
    pub timeout: Duration,
}

impl PollPolicy {
    /// A policy probing every `interval` for at most `timeout`.
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
        }
    }

    /// Probe until it yields a value.
    ///
    /// The probe runs at least once. Errors from the probe end the wait
    /// immediately. Cancelling `cancel` ends it with [`UpdaterError::Cancelled`].
    pub async fn until<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(value) = probe().await? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                return Err(UpdaterError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }
                .into());
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(UpdaterError::Cancelled {
                        operation: operation.to_string(),
                    }
                    .into());
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
