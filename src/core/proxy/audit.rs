// Bounded audit history of detection, check and fallback-policy events

use crate::core::proxy::sanitize::{CredentialMasker, Sanitizer};
use crate::core::proxy::types::{local_now, DetectionSourceKind};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default number of entries retained per log
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Detected proxy flipped from one value to another
///
/// Both proxies are stored masked. When only the credentials changed the
/// masked values are equal; `credentials_changed` marks those entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: DateTime<Local>,
    pub previous_proxy: Option<String>,
    pub new_proxy: Option<String>,
    pub source: Option<DetectionSourceKind>,
    #[serde(default)]
    pub credentials_changed: bool,
}

/// One completed check, success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvent {
    pub timestamp: DateTime<Local>,
    pub trigger: String,
    pub success: bool,
    pub proxy_url: Option<String>,
    pub source: Option<DetectionSourceKind>,
    pub error: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEventKind {
    SwitchedToFallback,
    /// Neither tier produced a usable proxy
    EnteredDegraded,
    ReturnedToPrimary,
}

impl PolicyEventKind {
    pub fn message(&self) -> &'static str {
        match self {
            PolicyEventKind::SwitchedToFallback => "switched to fallback proxy",
            PolicyEventKind::EnteredDegraded => "no usable proxy, entered degraded state",
            PolicyEventKind::ReturnedToPrimary => "returned to system proxy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvent {
    pub timestamp: DateTime<Local>,
    pub kind: PolicyEventKind,
    pub proxy_url: Option<String>,
    pub message: String,
}

#[derive(Debug)]
struct Logs {
    changes: VecDeque<ChangeEvent>,
    checks: VecDeque<CheckEvent>,
    policies: VecDeque<PolicyEvent>,
}

/// Three independent bounded logs with FIFO eviction
///
/// Every proxy field is masked by the injected [`Sanitizer`] before it is
/// stored. Readers always receive copies.
pub struct ChangeAudit {
    logs: Mutex<Logs>,
    max_history: usize,
    sanitizer: Arc<dyn Sanitizer>,
}

impl Default for ChangeAudit {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeAudit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeAudit")
            .field("max_history", &self.max_history)
            .finish_non_exhaustive()
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, entry: T, max: usize) {
    log.push_back(entry);
    while log.len() > max {
        log.pop_front();
    }
}

fn tail<T: Clone>(log: &VecDeque<T>, limit: Option<usize>) -> Vec<T> {
    let skip = match limit {
        Some(limit) => log.len().saturating_sub(limit),
        None => 0,
    };
    log.iter().skip(skip).cloned().collect()
}

impl ChangeAudit {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_MAX_HISTORY, Arc::new(CredentialMasker))
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self::with_options(max_history, Arc::new(CredentialMasker))
    }

    pub fn with_options(max_history: usize, sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self {
            logs: Mutex::new(Logs {
                changes: VecDeque::new(),
                checks: VecDeque::new(),
                policies: VecDeque::new(),
            }),
            max_history: max_history.max(1),
            sanitizer,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    fn mask(&self, url: Option<&str>) -> Option<String> {
        url.map(|u| self.sanitizer.mask(u))
    }

    fn with_logs<R>(&self, f: impl FnOnce(&mut Logs) -> R) -> R {
        // A poisoned lock still holds consistent VecDeques
        let mut guard = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn log_change(
        &self,
        previous_proxy: Option<&str>,
        new_proxy: Option<&str>,
        source: Option<DetectionSourceKind>,
    ) {
        let previous_masked = self.mask(previous_proxy);
        let new_masked = self.mask(new_proxy);
        let credentials_changed = previous_proxy != new_proxy && previous_masked == new_masked;
        let event = ChangeEvent {
            timestamp: local_now(),
            previous_proxy: previous_masked,
            new_proxy: new_masked,
            source,
            credentials_changed,
        };
        let max = self.max_history;
        self.with_logs(|logs| push_bounded(&mut logs.changes, event, max));
    }

    pub fn log_check(
        &self,
        trigger: &str,
        success: bool,
        proxy_url: Option<&str>,
        source: Option<DetectionSourceKind>,
        error: Option<&str>,
        attempts: u32,
    ) {
        let event = CheckEvent {
            timestamp: local_now(),
            trigger: trigger.to_string(),
            success,
            proxy_url: self.mask(proxy_url),
            source,
            error: error.map(|e| crate::core::proxy::sanitize::mask_credentials_in_text(e)),
            attempts,
        };
        let max = self.max_history;
        self.with_logs(|logs| push_bounded(&mut logs.checks, event, max));
    }

    /// Record a policy event and return the stored (masked) copy
    pub fn log_policy(&self, kind: PolicyEventKind, proxy_url: Option<&str>) -> PolicyEvent {
        let event = PolicyEvent {
            timestamp: local_now(),
            kind,
            proxy_url: self.mask(proxy_url),
            message: kind.message().to_string(),
        };
        let max = self.max_history;
        let stored = event.clone();
        self.with_logs(|logs| push_bounded(&mut logs.policies, event, max));
        stored
    }

    /// Change history, most recent last, optionally only the last `limit`
    pub fn get_change_history(&self, limit: Option<usize>) -> Vec<ChangeEvent> {
        self.with_logs(|logs| tail(&logs.changes, limit))
    }

    pub fn get_check_history(&self, limit: Option<usize>) -> Vec<CheckEvent> {
        self.with_logs(|logs| tail(&logs.checks, limit))
    }

    pub fn get_policy_history(&self, limit: Option<usize>) -> Vec<PolicyEvent> {
        self.with_logs(|logs| tail(&logs.policies, limit))
    }

    pub fn clear_change_history(&self) {
        self.with_logs(|logs| logs.changes.clear());
    }

    pub fn clear_check_history(&self) {
        self.with_logs(|logs| logs.checks.clear());
    }

    pub fn clear_policy_history(&self) {
        self.with_logs(|logs| logs.policies.clear());
    }
}
