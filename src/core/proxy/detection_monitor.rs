/*!
Proxy detection monitoring with polling, debounce, retry and reachability chaining.

This module implements the DetectionMonitor component - the control loop that
decides which proxy the detection source currently reports and whether it is
usable.

## Core Responsibilities

- **Polling**: periodic re-detection on a clamped interval (10s..300s)
- **Debounce**: externally triggered re-checks coalesce on a trailing edge
- **Retry**: failed detections retry with exponential backoff
- **Change Detection**: proxy flips are published and audited
- **Reachability Chaining**: every detected proxy is probed; the periodic
  scheduler follows reachable proxies and stops for unreachable ones

## States

- **Stopped**: no timers armed, triggers are ignored
- **Active**: poll timer armed, triggers debounce into checks

## Concurrency

At most one check runs at a time (in-progress flag). Timers only ever spawn
checks; they never run them inline, so re-arming or cancelling a timer never
tears down a check halfway. A timer-driven check that outlives `stop()`
abandons itself at its next retry wait and starts no probe. `check_now` always
runs to completion.
*/

use crate::config::MonitorConfig;
use crate::config::MonitorConfigUpdate;
use crate::core::proxy::audit::ChangeAudit;
use crate::core::proxy::debug_logger::DebugLogger;
use crate::core::proxy::detector::DetectionSource;
use crate::core::proxy::notifier::{Notice, Notifier, NullNotifier};
use crate::core::proxy::reachability::{
    ProbeOptions, ReachabilityCallback, ReachabilityProbe, ReachabilityScheduler,
};
use crate::core::proxy::status::StatusTracker;
use crate::core::proxy::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Trigger reason used by the poll timer
pub const POLL_TRIGGER: &str = "poll";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default)]
struct Timers {
    poll: Option<JoinHandle<()>>,
    debounce: Option<JoinHandle<()>>,
}

/// Clears the in-progress flag when a check ends, including on cancellation
struct CheckGuard<'a>(&'a AtomicBool);

impl<'a> CheckGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    config: Mutex<MonitorConfig>,
    status: Mutex<StatusTracker>,
    detector: Arc<dyn DetectionSource>,
    probe: Arc<ReachabilityProbe>,
    probe_options: ProbeOptions,
    scheduler: ReachabilityScheduler,
    audit: Arc<ChangeAudit>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<MonitorEvent>,
    timers: Mutex<Timers>,
    check_in_progress: AtomicBool,
    reachable: AtomicBool,
    logger: DebugLogger,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let timers = lock(&self.timers);
        if let Some(poll) = &timers.poll {
            poll.abort();
        }
        if let Some(debounce) = &timers.debounce {
            debounce.abort();
        }
    }
}

/// Builder for [`DetectionMonitor`]
pub struct DetectionMonitorBuilder {
    config: MonitorConfig,
    detector: Arc<dyn DetectionSource>,
    probe: Arc<ReachabilityProbe>,
    probe_options: ProbeOptions,
    audit: Option<Arc<ChangeAudit>>,
    notifier: Arc<dyn Notifier>,
}

impl DetectionMonitorBuilder {
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Probe preset used for inline and scheduled probes (default: background)
    pub fn with_probe_options(mut self, options: ProbeOptions) -> Self {
        self.probe_options = options;
        self
    }

    /// Share an audit log with other components (e.g. the fallback selector)
    pub fn with_audit(mut self, audit: Arc<ChangeAudit>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> DetectionMonitor {
        let config = self.config.normalized();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let scheduler = ReachabilityScheduler::new(
            Arc::clone(&self.probe),
            self.probe_options.clone(),
            config.reachability_interval_ms,
        );

        DetectionMonitor {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                status: Mutex::new(StatusTracker::new()),
                detector: self.detector,
                probe: self.probe,
                probe_options: self.probe_options,
                scheduler,
                audit: self.audit.unwrap_or_else(|| Arc::new(ChangeAudit::new())),
                notifier: self.notifier,
                events,
                timers: Mutex::new(Timers::default()),
                check_in_progress: AtomicBool::new(false),
                reachable: AtomicBool::new(false),
                logger: DebugLogger::new(),
            }),
        }
    }
}

/// Detection control loop; cheap to clone, all clones share one monitor
#[derive(Clone)]
pub struct DetectionMonitor {
    inner: Arc<Inner>,
}

impl DetectionMonitor {
    pub fn builder(
        detector: Arc<dyn DetectionSource>,
        probe: Arc<ReachabilityProbe>,
    ) -> DetectionMonitorBuilder {
        DetectionMonitorBuilder {
            config: MonitorConfig::default(),
            detector,
            probe,
            probe_options: ProbeOptions::background(),
            audit: None,
            notifier: Arc::new(NullNotifier),
        }
    }

    /// `Stopped → Active`; idempotent. Must be called within a tokio runtime.
    pub fn start(&self) {
        {
            let mut status = lock(&self.inner.status);
            if status.get_status().is_active {
                return;
            }
            status.set_active(true);
        }

        Inner::arm_poll_timer(&self.inner);

        let reachability_testing = lock(&self.inner.config).reachability_testing;
        if reachability_testing {
            if let Some(proxy) = self.current_proxy() {
                self.inner
                    .scheduler
                    .start(proxy, Inner::scheduler_callback(&self.inner));
            }
        }
        self.inner.logger.debug("DetectionMonitor", "start", "Monitor started");
    }

    /// `Active → Stopped`; idempotent and safe from any state
    ///
    /// After return no timer fires and no new check, retry or probe starts.
    pub fn stop(&self) {
        let was_active = {
            let mut status = lock(&self.inner.status);
            let was_active = status.get_status().is_active;
            status.set_active(false);
            was_active
        };

        {
            let mut timers = lock(&self.inner.timers);
            if let Some(poll) = timers.poll.take() {
                poll.abort();
            }
            if let Some(debounce) = timers.debounce.take() {
                debounce.abort();
            }
        }
        self.inner.scheduler.stop();

        if was_active {
            self.inner.logger.debug("DetectionMonitor", "stop", "Monitor stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Request a check; coalesced with other triggers inside the debounce window
    ///
    /// No-op while stopped. Each call re-arms the single debounce timer, so
    /// only the last trigger of a burst produces a check.
    pub fn trigger_check(&self, reason: &str) {
        if !self.is_active() {
            return;
        }

        let debounce = lock(&self.inner.config).debounce();
        let weak = Arc::downgrade(&self.inner);
        let reason = reason.to_string();

        let mut timers = lock(&self.inner.timers);
        if let Some(previous) = timers.debounce.take() {
            previous.abort();
        }
        timers.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                Inner::spawn_check(&inner, reason);
            }
        }));
    }

    /// Run a check immediately, bypassing debounce
    ///
    /// Returns `None` when another check is already in progress.
    pub async fn check_now(&self, reason: &str) -> Option<DetectionResult> {
        Inner::run_check(&self.inner, reason, false).await
    }

    /// Merge a partial configuration update into the live configuration
    ///
    /// A changed poll interval re-arms the poll timer immediately while
    /// active; reachability changes propagate to the scheduler.
    pub fn update_config(&self, update: MonitorConfigUpdate) -> MonitorConfig {
        let (old, new) = {
            let mut config = lock(&self.inner.config);
            let old = config.clone();
            config.apply(&update);
            (old, config.clone())
        };

        let active = self.is_active();
        let rearm = active && old.poll_interval() != new.poll_interval();
        if rearm {
            Inner::arm_poll_timer(&self.inner);
        }

        if old.reachability_interval_ms() != new.reachability_interval_ms() {
            self.inner
                .scheduler
                .update_interval(new.reachability_interval_ms);
        }

        if old.reachability_testing && !new.reachability_testing {
            self.inner.scheduler.stop();
        } else if !old.reachability_testing && new.reachability_testing && active {
            if let Some(proxy) = self.current_proxy() {
                self.inner
                    .scheduler
                    .start(proxy, Inner::scheduler_callback(&self.inner));
            }
        }

        self.inner
            .logger
            .config_updated(new.poll_interval().as_millis() as u64, rearm);
        new
    }

    /// Subscribe to monitor events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> MonitoringStatus {
        lock(&self.inner.status).get_status()
    }

    pub fn config(&self) -> MonitorConfig {
        lock(&self.inner.config).clone()
    }

    pub fn audit(&self) -> Arc<ChangeAudit> {
        Arc::clone(&self.inner.audit)
    }

    /// Last known reachability of the current proxy
    pub fn is_reachable(&self) -> bool {
        self.inner.reachable.load(Ordering::Acquire)
    }

    pub fn is_check_in_progress(&self) -> bool {
        self.inner.check_in_progress.load(Ordering::Acquire)
    }

    pub fn is_reachability_scheduler_running(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    pub fn reachability_interval_ms(&self) -> u64 {
        self.inner.scheduler.interval_ms()
    }

    pub fn reachability_endpoint(&self) -> Option<String> {
        self.inner.scheduler.endpoint()
    }

    fn current_proxy(&self) -> Option<String> {
        lock(&self.inner.status).current_proxy().map(str::to_string)
    }
}

impl Inner {
    fn is_active(&self) -> bool {
        lock(&self.status).get_status().is_active
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Arm (or re-arm) the poll timer with the current interval
    fn arm_poll_timer(inner: &Arc<Inner>) {
        let period = lock(&inner.config).poll_interval();
        let weak = Arc::downgrade(inner);

        let mut timers = lock(&inner.timers);
        if let Some(previous) = timers.poll.take() {
            previous.abort();
        }
        timers.poll = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.is_active() {
                    break;
                }
                Inner::spawn_check(&inner, POLL_TRIGGER.to_string());
            }
        }));
    }

    fn spawn_check(inner: &Arc<Inner>, reason: String) {
        if !inner.is_active() {
            return;
        }
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            Inner::run_check(&inner, &reason, true).await;
        });
    }

    fn scheduler_callback(inner: &Arc<Inner>) -> ReachabilityCallback {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        Arc::new(move |result: ReachabilityResult| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_reachability(&result, false);
            }
        })
    }

    /// One full check: detection with retries, bookkeeping, optional probe
    ///
    /// `timer_driven` checks never start once the monitor is stopped, are
    /// abandoned if it stops while they wait for a retry, and never probe or
    /// touch the scheduler once stopped.
    async fn run_check(
        inner: &Arc<Inner>,
        reason: &str,
        timer_driven: bool,
    ) -> Option<DetectionResult> {
        let Some(_guard) = CheckGuard::try_acquire(&inner.check_in_progress) else {
            inner.logger.debug(
                "DetectionMonitor",
                "check_skipped",
                &format!("Check already in progress, skipping '{}'", reason),
            );
            return None;
        };

        // Spawned before stop() returned but scheduled after it
        if timer_driven && !inner.is_active() {
            return None;
        }

        let config = lock(&inner.config).clone();
        let max_retries = config.retries();
        let correlation_id = format!("check_{}", uuid::Uuid::new_v4());
        let started = Instant::now();

        lock(&inner.status).record_check_start();
        inner.logger.check_start(reason, max_retries, &correlation_id);

        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;
        let mut detection: Option<Detection> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = config.backoff_delay(attempt);
                inner
                    .logger
                    .retry_scheduled(attempt, delay.as_millis() as u64, &correlation_id);
                tokio::time::sleep(delay).await;

                if timer_driven && !inner.is_active() {
                    inner.logger.debug(
                        "DetectionMonitor",
                        "check_abandoned",
                        "Monitor stopped during retry backoff",
                    );
                    return None;
                }
            }

            attempts += 1;
            match inner.detector.detect().await {
                Ok(found) => {
                    detection = Some(found);
                    break;
                }
                Err(e) => {
                    let message = e.to_string();
                    inner
                        .logger
                        .check_attempt_failed(attempts, &message, &correlation_id);
                    last_error = Some(message);
                }
            }
        }

        let result = match detection {
            Some(found) => {
                inner
                    .complete_success(found, reason, attempts, &config, timer_driven)
                    .await
            }
            None => inner.complete_failure(
                reason,
                attempts,
                last_error.unwrap_or_else(|| "unknown detection error".to_string()),
            ),
        };

        inner.logger.check_end(
            result.success,
            result.proxy_url.as_deref(),
            attempts,
            started.elapsed().as_millis() as u64,
            &correlation_id,
        );
        inner.emit(MonitorEvent::CheckComplete(result.clone()));
        Some(result)
    }

    async fn complete_success(
        self: &Arc<Self>,
        found: Detection,
        reason: &str,
        attempts: u32,
        config: &MonitorConfig,
        timer_driven: bool,
    ) -> DetectionResult {
        let proxy_url = found.proxy_url.filter(|url| !url.trim().is_empty());
        let source = found.source;

        let previous = lock(&self.status).current_proxy().map(str::to_string);
        if previous != proxy_url {
            self.emit(MonitorEvent::ProxyChanged {
                previous: previous.clone(),
                current: proxy_url.clone(),
                source,
            });
            self.audit
                .log_change(previous.as_deref(), proxy_url.as_deref(), source);
        }

        lock(&self.status).record_check_success(proxy_url.clone(), source.map(|s| s.to_string()));
        self.audit
            .log_check(reason, true, proxy_url.as_deref(), source, None, attempts);

        let mut reachability_result = None;
        match &proxy_url {
            Some(url) if config.reachability_testing => {
                if !timer_driven || self.is_active() {
                    let probed = self.probe.probe_with(url, &self.probe_options).await;
                    self.apply_reachability(&probed, true);
                    reachability_result = Some(probed);
                }
            }
            Some(_) => {}
            None => {
                self.scheduler.stop();
                self.reachable.store(false, Ordering::Release);
            }
        }

        DetectionResult {
            reachable: reachability_result.as_ref().map(|r| r.success),
            reachability_result,
            proxy_url,
            source,
            timestamp: local_now(),
            success: true,
            error: None,
            attempts,
            trigger: reason.to_string(),
        }
    }

    fn complete_failure(&self, reason: &str, attempts: u32, last_error: String) -> DetectionResult {
        lock(&self.status).record_check_failure();
        self.audit
            .log_check(reason, false, None, None, Some(&last_error), attempts);

        self.emit(MonitorEvent::AllRetriesFailed {
            attempts,
            last_error: last_error.clone(),
        });
        self.notifier.notify(Notice::DetectionFailed {
            attempts,
            last_error: last_error.clone(),
        });

        DetectionResult {
            proxy_url: None,
            source: None,
            timestamp: local_now(),
            success: false,
            error: Some(last_error),
            reachability_result: None,
            reachable: None,
            attempts,
            trigger: reason.to_string(),
        }
    }

    /// Record a probe outcome, publish transitions, steer the scheduler
    ///
    /// Scheduled results pass `manage_scheduler = false`: the scheduler keeps
    /// probing an unreachable proxy so recovery is noticed.
    fn apply_reachability(self: &Arc<Self>, result: &ReachabilityResult, manage_scheduler: bool) {
        self.emit(MonitorEvent::ReachabilityTestComplete(result.clone()));

        let previous = self.reachable.swap(result.success, Ordering::AcqRel);
        if previous != result.success {
            self.logger
                .reachability_transition(previous, result.success, result.proxy_url.as_deref());
            self.emit(MonitorEvent::ReachabilityChanged {
                previous,
                current: result.success,
                proxy_url: result.proxy_url.clone(),
            });
        }

        if !manage_scheduler || !self.is_active() {
            return;
        }
        if !lock(&self.config).reachability_testing {
            return;
        }

        match (&result.proxy_url, result.success) {
            (Some(url), true) => {
                if !self.scheduler.update_endpoint(url.clone()) {
                    self.scheduler
                        .start(url.clone(), Inner::scheduler_callback(self));
                }
            }
            _ => self.scheduler.stop(),
        }
    }
}
