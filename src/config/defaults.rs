// Default values and clamping rules for monitor configuration

use super::types::{Config, FallbackConfig, MonitorConfig, ReachabilityConfig};
use crate::core::proxy::reachability::config::{
    default_targets, BACKGROUND_TIMEOUT_MS, INTERACTIVE_TIMEOUT_MS,
};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 10_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 300_000;

pub const DEFAULT_TEST_INTERVAL_MS: u64 = 60_000;
pub const MIN_TEST_INTERVAL_MS: u64 = 30_000;
pub const MAX_TEST_INTERVAL_MS: u64 = 600_000;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_SECS: f64 = 1.0;

fn clamp_i64(value: i64, min: u64, max: u64) -> u64 {
    value.clamp(min as i64, max as i64) as u64
}

/// Poll interval lies in [10s, 300s]
pub fn clamp_poll_interval_ms(value: i64) -> u64 {
    clamp_i64(value, MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
}

/// Reachability test interval lies in [30s, 600s]
pub fn clamp_test_interval_ms(value: i64) -> u64 {
    clamp_i64(value, MIN_TEST_INTERVAL_MS, MAX_TEST_INTERVAL_MS)
}

/// Negative retry counts become 0
pub fn normalize_max_retries(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Non-positive (or non-finite) backoff bases become 1 second
pub fn normalize_backoff_secs(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        DEFAULT_RETRY_BACKOFF_SECS
    }
}

/// Negative debounce windows become 0
pub fn normalize_debounce_ms(value: i64) -> u64 {
    value.max(0) as u64
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS as i64,
            debounce_ms: DEFAULT_DEBOUNCE_MS as i64,
            max_retries: DEFAULT_MAX_RETRIES as i64,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            reachability_testing: true,
            reachability_interval_ms: DEFAULT_TEST_INTERVAL_MS as i64,
        }
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            background_timeout_ms: BACKGROUND_TIMEOUT_MS,
            interactive_timeout_ms: INTERACTIVE_TIMEOUT_MS,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            proxy_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            reachability: ReachabilityConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}
