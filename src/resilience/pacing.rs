//! Fixed-interval pacing between successive upstream calls.
//!
//! The platform limits call frequency, so every loop that calls it more than
//! once waits one interval between calls. The first call is never delayed.

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled while waiting between upstream calls")]
pub struct Cancelled;

/// Spaces successive upstream calls of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep for one interval unless `cancel` fires first.
    pub async fn pause(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(self.interval) => Ok(()),
        }
    }
}
