//! Reconnect Backoff
//!
//! Exponential backoff with symmetric jitter between connection attempts.
//! The schedule restarts once a connection authenticates.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::ConnectionSettings;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the un-jittered delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Derive backoff parameters from connection settings.
    #[must_use]
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            max_attempts: settings.max_reconnect_attempts,
            ..Self::default()
        }
    }

    /// Same schedule without randomness.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// Stateful backoff schedule for one feed.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy at attempt zero.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted.
    ///
    /// Attempt `n` (1-based) waits `initial * multiplier^(n-1)`, capped at
    /// `max_delay`, then jittered.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let exponent = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        self.attempts = self.attempts.saturating_add(1);

        let growth = self.config.multiplier.max(1.0).powi(exponent);
        let base_secs = (self.config.initial_delay.as_secs_f64() * growth)
            .min(self.config.max_delay.as_secs_f64());
        let base = Duration::try_from_secs_f64(base_secs).unwrap_or(self.config.max_delay);

        Some(self.jitter(base))
    }

    /// Restart the schedule after a successful connection.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// True while another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    fn jitter(&self, base: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor <= 0.0 {
            return base;
        }

        let scale = rand::rng().random_range((1.0 - factor)..=(1.0 + factor));
        base.mul_f64(scale.max(0.0)).max(Duration::from_millis(1))
    }
}

/// Reconnection failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// All allowed attempts failed.
    #[error("gave up after {0} reconnection attempts")]
    MaxAttemptsExceeded(u32),
}
