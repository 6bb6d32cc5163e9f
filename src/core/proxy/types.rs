// Core types for proxy detection monitoring
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Where a detected proxy candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSourceKind {
    /// Process environment (`HTTPS_PROXY`, `HTTP_PROXY`, ...)
    Environment,
    /// Host editor settings
    Editor,
    /// Operating system proxy settings
    Platform,
}

impl std::fmt::Display for DetectionSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionSourceKind::Environment => write!(f, "environment"),
            DetectionSourceKind::Editor => write!(f, "editor"),
            DetectionSourceKind::Platform => write!(f, "platform"),
        }
    }
}

/// Raw output of a single detection source call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub proxy_url: Option<String>,
    pub source: Option<DetectionSourceKind>,
}

impl Detection {
    pub fn found(proxy_url: impl Into<String>, source: DetectionSourceKind) -> Self {
        Self {
            proxy_url: Some(proxy_url.into()),
            source: Some(source),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Run/health status of a detection monitor
///
/// Created empty when the monitor is constructed and mutated only by the
/// monitor's own check lifecycle. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStatus {
    pub is_active: bool,
    pub last_check_time: Option<DateTime<Local>>,
    pub last_success_time: Option<DateTime<Local>>,
    pub last_failure_time: Option<DateTime<Local>>,
    /// Reset to 0 exactly on a recorded success
    pub consecutive_failures: u32,
    pub current_proxy: Option<String>,
    pub detection_source: Option<String>,
}

/// Per-target failure inside a reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    pub target: String,
    pub message: String,
}

impl ProbeError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a reachability probe through a candidate proxy
///
/// Whenever `success` is false, `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityResult {
    pub success: bool,
    /// Targets an attempt was actually launched for
    pub probed_targets: Vec<String>,
    pub errors: Vec<ProbeError>,
    pub proxy_url: Option<String>,
    pub timestamp: DateTime<Local>,
    pub duration_ms: u64,
    /// Target whose tunnel succeeded first, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded_target: Option<String>,
}

/// Result of one completed detection check (after retries)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub proxy_url: Option<String>,
    pub source: Option<DetectionSourceKind>,
    pub timestamp: DateTime<Local>,
    pub success: bool,
    pub error: Option<String>,
    pub reachability_result: Option<ReachabilityResult>,
    pub reachable: Option<bool>,
    /// Number of detection attempts made, including the first one
    pub attempts: u32,
    /// Reason passed to the trigger that produced this check
    pub trigger: String,
}

/// Events published by a [`DetectionMonitor`](super::DetectionMonitor)
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Emitted once for every completed check, success or failure
    CheckComplete(DetectionResult),
    /// Detected proxy differs from the previously recorded one
    ProxyChanged {
        previous: Option<String>,
        current: Option<String>,
        source: Option<DetectionSourceKind>,
    },
    /// A reachability probe finished (inline or scheduled)
    ReachabilityTestComplete(ReachabilityResult),
    /// Reachability flipped between reachable and unreachable
    ReachabilityChanged {
        previous: bool,
        current: bool,
        proxy_url: Option<String>,
    },
    /// Every attempt of a check failed
    AllRetriesFailed { attempts: u32, last_error: String },
}

/// Which tier a [`ProxySelection`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxySource {
    System,
    Fallback,
    None,
}

impl std::fmt::Display for ProxySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxySource::System => write!(f, "system"),
            ProxySource::Fallback => write!(f, "fallback"),
            ProxySource::None => write!(f, "none"),
        }
    }
}

/// Decision produced by the fallback selector; never mutated after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySelection {
    pub proxy_url: Option<String>,
    pub source: ProxySource,
    pub reachability_result: Option<ReachabilityResult>,
    pub success: bool,
}

impl ProxySelection {
    pub fn none(reachability_result: Option<ReachabilityResult>) -> Self {
        Self {
            proxy_url: None,
            source: ProxySource::None,
            reachability_result,
            success: false,
        }
    }
}

/// Snapshot the fallback selector reads its manual candidate from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub manual_proxy_url: Option<String>,
    #[serde(default)]
    pub last_applied_proxy: Option<String>,
}

/// Detection source failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectionError {
    #[error("Detection source unavailable: {0}")]
    Unavailable(String),
    #[error("Detection failed: {0}")]
    Failed(String),
}

/// Persisted-state accessor failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("State unavailable: {0}")]
    Unavailable(String),
    #[error("State corrupt: {0}")]
    Corrupt(String),
}

/// Generate a local timezone timestamp for status and audit records
pub fn local_now() -> DateTime<Local> {
    Local::now()
}

/// Milliseconds since the Unix epoch, saturating at 0 for clocks before 1970
pub fn epoch_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Parse boolean environment variables
///
/// Accepts true/false, 1/0, yes/no, on/off (case insensitive). Anything else,
/// including an unset variable, is false.
pub fn parse_env_bool(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}
