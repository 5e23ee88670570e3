//! Session parameters: greeting and reconnection policy.

use std::time::Duration;

/// Parameters for the session supervisor.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Chat line sent on every spawn.
    pub greeting: String,
    /// Reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Attempt `n` waits `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            greeting: "Hello! Bot connected successfully.".to_string(),
            max_reconnect_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl SessionParams {
    /// Delay before reconnection attempt `attempt` (1-based). Saturates
    /// at `Duration::MAX`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}
