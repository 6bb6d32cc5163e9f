use super::defaults::{
    clamp_poll_interval_ms, clamp_test_interval_ms, normalize_backoff_secs,
    normalize_debounce_ms, normalize_max_retries,
};
use crate::core::proxy::reachability::config::ProbeOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration file layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub reachability: ReachabilityConfig,
    pub fallback: FallbackConfig,
}

/// Detection monitor settings
///
/// Values are signed so out-of-range input from a file or a partial update
/// is clamped by [`MonitorConfig::normalize`] instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Periodic re-detection interval, clamped to [10_000, 300_000]
    pub poll_interval_ms: i64,
    /// Trailing-edge debounce window for triggered checks
    pub debounce_ms: i64,
    /// Additional attempts after the first one
    pub max_retries: i64,
    /// Wait before retry `n` is `retry_backoff_secs * 2^(n-1)`
    pub retry_backoff_secs: f64,
    /// Probe every successfully detected proxy
    pub reachability_testing: bool,
    /// Periodic reachability interval, clamped to [30_000, 600_000]
    pub reachability_interval_ms: i64,
}

/// Partial update merged into a live [`MonitorConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfigUpdate {
    pub poll_interval_ms: Option<i64>,
    pub debounce_ms: Option<i64>,
    pub max_retries: Option<i64>,
    pub retry_backoff_secs: Option<f64>,
    pub reachability_testing: Option<bool>,
    pub reachability_interval_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    pub targets: Vec<String>,
    pub background_timeout_ms: u64,
    pub interactive_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Manually configured proxy used when the system proxy is unusable
    pub proxy_url: Option<String>,
}

impl MonitorConfig {
    /// Clamp every field into its valid range
    pub fn normalize(&mut self) {
        self.poll_interval_ms = clamp_poll_interval_ms(self.poll_interval_ms) as i64;
        self.debounce_ms = normalize_debounce_ms(self.debounce_ms) as i64;
        self.max_retries = normalize_max_retries(self.max_retries) as i64;
        self.retry_backoff_secs = normalize_backoff_secs(self.retry_backoff_secs);
        self.reachability_interval_ms =
            clamp_test_interval_ms(self.reachability_interval_ms) as i64;
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Merge `update` and re-normalize
    pub fn apply(&mut self, update: &MonitorConfigUpdate) {
        if let Some(v) = update.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = update.debounce_ms {
            self.debounce_ms = v;
        }
        if let Some(v) = update.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = update.retry_backoff_secs {
            self.retry_backoff_secs = v;
        }
        if let Some(v) = update.reachability_testing {
            self.reachability_testing = v;
        }
        if let Some(v) = update.reachability_interval_ms {
            self.reachability_interval_ms = v;
        }
        self.normalize();
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(clamp_poll_interval_ms(self.poll_interval_ms))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(normalize_debounce_ms(self.debounce_ms))
    }

    pub fn retries(&self) -> u32 {
        normalize_max_retries(self.max_retries)
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = normalize_backoff_secs(self.retry_backoff_secs);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = base * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(u32::MAX as u64))
    }

    pub fn reachability_interval_ms(&self) -> u64 {
        clamp_test_interval_ms(self.reachability_interval_ms)
    }
}

impl ReachabilityConfig {
    pub fn background_options(&self) -> ProbeOptions {
        ProbeOptions::background()
            .with_targets(self.targets.clone())
            .with_timeout_ms(self.background_timeout_ms)
    }

    pub fn interactive_options(&self) -> ProbeOptions {
        ProbeOptions::interactive()
            .with_targets(self.targets.clone())
            .with_timeout_ms(self.interactive_timeout_ms)
    }
}
