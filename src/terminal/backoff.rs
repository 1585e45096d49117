// ABOUTME: Capped exponential reconnect backoff with jitter for terminal connections

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnect timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound of the delay before jitter.
    pub max_delay_ms: u64,
    /// Uniform jitter added on top, in `[0, max_jitter_ms]`.
    pub max_jitter_ms: u64,
    /// Upper bound on one WebSocket handshake before it counts as a failed attempt.
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            multiplier: 1.5,
            max_delay_ms: 30_000,
            max_jitter_ms: 1000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl ReconnectConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

/// Attempt counter plus delay computation for one connection.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of retries scheduled since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// `min(base * multiplier^attempt, max)`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.config.base_delay_ms as f64 * self.config.multiplier.powi(exponent);
        let capped = raw.min(self.config.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Delay for the retry about to be scheduled. The current attempt index is
    /// used and then advanced, so the first retry after a connect uses index 0.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base_delay(self.attempt) + self.jitter();
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    fn jitter(&self) -> Duration {
        if self.config.max_jitter_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(0..=self.config.max_jitter_ms);
        Duration::from_millis(ms)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
