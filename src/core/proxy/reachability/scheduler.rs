//! Periodic reachability testing
//!
//! Runs the probe against the current candidate on its own timer,
//! independent of detection polling. The timer re-arms only after the
//! previous probe completed, and `trigger_now` shares a probe gate with the
//! timer, so at most one probe is in flight per scheduler.

use crate::config::defaults::clamp_test_interval_ms;
use crate::core::proxy::debug_logger::DebugLogger;
use crate::core::proxy::reachability::config::ProbeOptions;
use crate::core::proxy::reachability::probe::ReachabilityProbe;
use crate::core::proxy::types::ReachabilityResult;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Receives every scheduled or manually triggered probe result
pub type ReachabilityCallback = Arc<dyn Fn(ReachabilityResult) + Send + Sync>;

struct SchedulerState {
    interval_ms: u64,
    endpoint: Option<String>,
    callback: Option<ReachabilityCallback>,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    probe: Arc<ReachabilityProbe>,
    options: ProbeOptions,
    gate: tokio::sync::Mutex<()>,
    logger: DebugLogger,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// One gated probe against the current endpoint
    ///
    /// The callback is looked up after the probe so a `stop()` issued while
    /// the probe was running suppresses delivery.
    async fn run_once(&self) -> Option<ReachabilityResult> {
        let _gate = self.gate.lock().await;

        let endpoint = self.lock().endpoint.clone()?;
        let result = self.probe.probe_with(&endpoint, &self.options).await;

        let callback = self.lock().callback.clone();
        if let Some(callback) = callback {
            callback(result.clone());
        }
        Some(result)
    }
}

fn spawn_timer(shared: &Arc<Shared>, interval_ms: u64) -> JoinHandle<()> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    tokio::spawn(async move {
        let period = Duration::from_millis(interval_ms);
        loop {
            tokio::time::sleep(period).await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            if shared.run_once().await.is_none() {
                break;
            }
        }
    })
}

pub struct ReachabilityScheduler {
    shared: Arc<Shared>,
}

impl ReachabilityScheduler {
    /// Create a stopped scheduler; `interval_ms` is clamped to [30s, 600s]
    pub fn new(probe: Arc<ReachabilityProbe>, options: ProbeOptions, interval_ms: i64) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    interval_ms: clamp_test_interval_ms(interval_ms),
                    endpoint: None,
                    callback: None,
                    timer: None,
                }),
                probe,
                options,
                gate: tokio::sync::Mutex::new(()),
                logger: DebugLogger::new(),
            }),
        }
    }

    /// Begin probing `endpoint` every interval
    ///
    /// Calling `start` while running replaces endpoint and callback and
    /// restarts the timer. Must be called from within a tokio runtime.
    pub fn start(&self, endpoint: impl Into<String>, on_result: ReachabilityCallback) {
        let mut state = self.shared.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.endpoint = Some(endpoint.into());
        state.callback = Some(on_result);
        state.timer = Some(spawn_timer(&self.shared, state.interval_ms));
        self.shared.logger.scheduler_state("started", state.interval_ms);
    }

    /// Cancel the timer and forget endpoint and callback
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        let was_running = state.timer.is_some();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.endpoint = None;
        state.callback = None;
        if was_running {
            self.shared.logger.scheduler_state("stopped", state.interval_ms);
        }
    }

    /// Re-clamp the interval; a running timer restarts with the new period
    pub fn update_interval(&self, interval_ms: i64) {
        let mut state = self.shared.lock();
        let clamped = clamp_test_interval_ms(interval_ms);
        if clamped == state.interval_ms {
            return;
        }
        state.interval_ms = clamped;

        if let Some(timer) = state.timer.take() {
            timer.abort();
            state.timer = Some(spawn_timer(&self.shared, clamped));
            self.shared.logger.scheduler_state("restarted", clamped);
        }
    }

    /// Swap the endpoint used by the next scheduled probe
    ///
    /// Returns false (and changes nothing) when the scheduler is stopped.
    pub fn update_endpoint(&self, endpoint: impl Into<String>) -> bool {
        let mut state = self.shared.lock();
        if state.timer.is_none() {
            return false;
        }
        state.endpoint = Some(endpoint.into());
        true
    }

    /// Run one probe immediately; `None` when not started
    pub async fn trigger_now(&self) -> Option<ReachabilityResult> {
        if !self.is_running() {
            return None;
        }
        self.shared.run_once().await
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    pub fn interval_ms(&self) -> u64 {
        self.shared.lock().interval_ms
    }

    pub fn endpoint(&self) -> Option<String> {
        self.shared.lock().endpoint.clone()
    }
}

impl Drop for ReachabilityScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.lock().timer.take() {
            timer.abort();
        }
    }
}
