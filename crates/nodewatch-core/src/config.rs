//! Watch loop configuration from environment variables.

use std::time::Duration;

use crate::error::WatchError;

const DEFAULT_WINDOW: u64 = 100;
const DEFAULT_METRICS_EVERY: u64 = 5;
const DEFAULT_CATCHUP_POLL_SECS: u64 = 10;
const DEFAULT_ERROR_BACKOFF_SECS: u64 = 3;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_KEY_POLL_SECS: u64 = 2;
const DEFAULT_KEY_TIMEOUT_SECS: u64 = 20 * 60;

/// Scheduling, sampling, and timeout knobs for the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Rounds averaged for block time and TPS (env: NODEWATCH_WINDOW, default: 100).
    pub window: u64,
    /// Run metrics sampling when `last_round % metrics_every == 0` (env: NODEWATCH_METRICS_EVERY, default: 5).
    pub metrics_every: u64,
    /// Sleep between status polls during fast-catchup (env: NODEWATCH_CATCHUP_POLL_SECS, default: 10).
    pub catchup_poll_interval: Duration,
    /// Delay after a failed progress wait (env: NODEWATCH_ERROR_BACKOFF_SECS, default: 3).
    pub error_backoff: Duration,
    /// Bound for prompt calls: status, metrics, accounts, blocks, keys (env: NODEWATCH_CALL_TIMEOUT_SECS, default: 5).
    pub call_timeout: Duration,
    /// Bound for the wait-for-block long-poll (env: NODEWATCH_WAIT_TIMEOUT_SECS, default: 90).
    pub wait_timeout: Duration,
    /// Interval between key listings while waiting for a generated key (env: NODEWATCH_KEY_POLL_SECS, default: 2).
    pub key_poll_interval: Duration,
    /// Deadline for a generated key to appear (env: NODEWATCH_KEY_TIMEOUT_SECS, default: 1200).
    pub key_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            metrics_every: DEFAULT_METRICS_EVERY,
            catchup_poll_interval: Duration::from_secs(DEFAULT_CATCHUP_POLL_SECS),
            error_backoff: Duration::from_secs(DEFAULT_ERROR_BACKOFF_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            key_poll_interval: Duration::from_secs(DEFAULT_KEY_POLL_SECS),
            key_timeout: Duration::from_secs(DEFAULT_KEY_TIMEOUT_SECS),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(name, default))
}

impl WatchConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, WatchError> {
        let config = Self {
            window: env_u64("NODEWATCH_WINDOW", DEFAULT_WINDOW),
            metrics_every: env_u64("NODEWATCH_METRICS_EVERY", DEFAULT_METRICS_EVERY),
            catchup_poll_interval: env_secs("NODEWATCH_CATCHUP_POLL_SECS", DEFAULT_CATCHUP_POLL_SECS),
            error_backoff: env_secs("NODEWATCH_ERROR_BACKOFF_SECS", DEFAULT_ERROR_BACKOFF_SECS),
            call_timeout: env_secs("NODEWATCH_CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS),
            wait_timeout: env_secs("NODEWATCH_WAIT_TIMEOUT_SECS", DEFAULT_WAIT_TIMEOUT_SECS),
            key_poll_interval: env_secs("NODEWATCH_KEY_POLL_SECS", DEFAULT_KEY_POLL_SECS),
            key_timeout: env_secs("NODEWATCH_KEY_TIMEOUT_SECS", DEFAULT_KEY_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or spin the loop.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.window == 0 {
            return Err(WatchError::Config("NODEWATCH_WINDOW must be > 0".into()));
        }
        if self.metrics_every == 0 {
            return Err(WatchError::Config("NODEWATCH_METRICS_EVERY must be > 0".into()));
        }
        if self.call_timeout.is_zero() || self.wait_timeout.is_zero() {
            return Err(WatchError::Config("call and wait timeouts must be > 0".into()));
        }
        if self.catchup_poll_interval.is_zero() || self.error_backoff.is_zero() {
            return Err(WatchError::Config(
                "catchup poll interval and error backoff must be > 0".into(),
            ));
        }
        if self.key_poll_interval.is_zero() {
            return Err(WatchError::Config("NODEWATCH_KEY_POLL_SECS must be > 0".into()));
        }
        Ok(())
    }
}
