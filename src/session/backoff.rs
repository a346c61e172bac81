use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::utils::timeout::{RECONNECT_INITIAL_DELAY, RECONNECT_MAX_DELAY};

/// Doubling reconnect delay with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.initial_delay, config.max_delay)
    }

    /// `min(initial * 2^attempt, max)`; `attempt` counts failures so far.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial.as_millis().min(u128::from(u64::MAX)) as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(initial_ms.saturating_mul(factor));
        delay.min(self.max)
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(RECONNECT_INITIAL_DELAY, RECONNECT_MAX_DELAY)
    }
}
