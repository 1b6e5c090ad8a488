//! Reconnect policy with linear backoff.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hostlink_protocol::constants::{MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY};

/// Linear backoff bounded by a maximum number of consecutive attempts.
///
/// The attempt counter is owned by the session and resets to zero every
/// time a link opens, so a host that stayed up for an hour and a host that
/// dropped right after connecting get the same first delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit. Attempt `n` (1-based) waits `n * base_delay`.
    pub base_delay: Duration,
    /// Consecutive attempts allowed without a successful open.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: RECONNECT_BASE_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before the next attempt given the attempts already
    /// made since the last open, or `None` once the budget is spent.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(attempts + 1))
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `true` when the full delay elapsed.
pub(crate) async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => !cancel.is_cancelled(),
    }
}
