//! Reconnect policy
//!
//! Exponential backoff with a hard attempt ceiling. The connection thread asks
//! the policy what to do after every failure; once it says stop, the failure
//! is terminal.

use std::time::Duration;

use super::constants::{
    CONNECT_TIMEOUT, INITIAL_CONNECT_DELAY, MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY,
    RECONNECT_MAX_DELAY,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Pause before the very first attempt
    pub initial_delay: Duration,
    /// Bound on a single connect + handshake
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: RECONNECT_BASE_DELAY,
            max_delay: RECONNECT_MAX_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            initial_delay: INITIAL_CONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)` for a 0-indexed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Delay before the next attempt, or `None` once the ceiling is reached
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.delay_for(attempt))
    }
}
