// Run/health status holder for the detection monitor

use crate::core::proxy::types::{local_now, MonitoringStatus};

/// Mutable holder for [`MonitoringStatus`]
///
/// Pure data: no I/O, no timers. The monitor wraps it in a mutex and is the
/// only writer.
#[derive(Debug, Default)]
pub struct StatusTracker {
    status: MonitoringStatus,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&mut self, active: bool) {
        self.status.is_active = active;
    }

    pub fn record_check_start(&mut self) {
        self.status.last_check_time = Some(local_now());
    }

    /// Stamp a success, store the proxy/source and zero the failure streak
    pub fn record_check_success(&mut self, proxy_url: Option<String>, source: Option<String>) {
        self.status.last_success_time = Some(local_now());
        self.status.current_proxy = proxy_url;
        self.status.detection_source = source;
        self.status.consecutive_failures = 0;
    }

    /// Stamp a failure and extend the streak; the recorded proxy is kept
    pub fn record_check_failure(&mut self) {
        self.status.last_failure_time = Some(local_now());
        self.status.consecutive_failures = self.status.consecutive_failures.saturating_add(1);
    }

    pub fn reset_failure_count(&mut self) {
        self.status.consecutive_failures = 0;
    }

    pub fn get_status(&self) -> MonitoringStatus {
        self.status.clone()
    }

    pub fn current_proxy(&self) -> Option<&str> {
        self.status.current_proxy.as_deref()
    }
}
