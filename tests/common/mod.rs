//! Common test utilities: mock collaborators for the monitoring core

#![allow(dead_code)]

use proxywatch::config::MonitorConfig;
use proxywatch::core::proxy::{
    Detection, DetectionError, DetectionMonitor, DetectionSource, DetectionSourceKind,
    MonitorEvent, Notice, Notifier, PersistedState, ReachabilityProbe, StateAccessor,
    StateError, TunnelClient,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::Instant;

pub const PROXY_A: &str = "http://proxy-a.test:8080";
pub const PROXY_B: &str = "http://proxy-b.test:3128";

/// Test helper to create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Detection source replaying a script, then repeating a fixed result
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Result<Detection, DetectionError>>>,
    fallback: Mutex<Result<Detection, DetectionError>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Result<Detection, DetectionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(Ok(Detection::none())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always report `proxy_url` from the environment
    pub fn always(proxy_url: &str) -> Self {
        let detector = Self::new(Vec::new());
        detector.set_fallback(Ok(found(proxy_url)));
        detector
    }

    pub fn always_failing(message: &str) -> Self {
        let detector = Self::new(Vec::new());
        detector.set_fallback(Err(DetectionError::Failed(message.to_string())));
        detector
    }

    pub fn set_fallback(&self, result: Result<Detection, DetectionError>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls
    pub fn call_gaps(&self) -> Vec<Duration> {
        self.call_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[async_trait::async_trait]
impl DetectionSource for ScriptedDetector {
    async fn detect(&self) -> Result<Detection, DetectionError> {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

pub fn found(proxy_url: &str) -> Detection {
    Detection::found(proxy_url, DetectionSourceKind::Environment)
}

#[derive(Clone)]
struct Behavior {
    delay: Duration,
    result: Result<(), String>,
}

/// Tunnel client with per-proxy and per-target scripted outcomes
///
/// Target keys are the normalized URLs the probe hands to the client
/// (e.g. `https://github.com/`).
pub struct MockTunnelClient {
    default: Mutex<Behavior>,
    proxies: Mutex<HashMap<String, Behavior>>,
    targets: Mutex<HashMap<String, Behavior>>,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl MockTunnelClient {
    /// Every tunnel succeeds after 10ms unless configured otherwise
    pub fn new() -> Self {
        Self {
            default: Mutex::new(Behavior {
                delay: Duration::from_millis(10),
                result: Ok(()),
            }),
            proxies: Mutex::new(HashMap::new()),
            targets: Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let client = Self::new();
        client.set_default(10, Err("connection refused".to_string()));
        client
    }

    pub fn set_default(&self, delay_ms: u64, result: Result<(), String>) {
        *self.default.lock().unwrap() = Behavior {
            delay: Duration::from_millis(delay_ms),
            result,
        };
    }

    pub fn set_proxy(&self, proxy_url: &str, delay_ms: u64, result: Result<(), String>) {
        self.proxies.lock().unwrap().insert(
            proxy_url.to_string(),
            Behavior {
                delay: Duration::from_millis(delay_ms),
                result,
            },
        );
    }

    pub fn set_target(&self, target_url: &str, delay_ms: u64, result: Result<(), String>) {
        self.targets.lock().unwrap().insert(
            target_url.to_string(),
            Behavior {
                delay: Duration::from_millis(delay_ms),
                result,
            },
        );
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Attempts that ran to completion (aborted attempts never count)
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, proxy_url: &str, target_url: &str) -> Behavior {
        if let Some(behavior) = self.targets.lock().unwrap().get(target_url) {
            return behavior.clone();
        }
        if let Some(behavior) = self.proxies.lock().unwrap().get(proxy_url) {
            return behavior.clone();
        }
        self.default.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TunnelClient for MockTunnelClient {
    async fn open_tunnel(
        &self,
        proxy_url: &str,
        target_url: &str,
        _timeout_ms: u32,
    ) -> Result<Duration, String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior_for(proxy_url, target_url);
        tokio::time::sleep(behavior.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        behavior.result.map(|_| behavior.delay)
    }
}

pub fn probe_with(client: &Arc<MockTunnelClient>) -> Arc<ReachabilityProbe> {
    let client: Arc<dyn TunnelClient> = client.clone();
    Arc::new(ReachabilityProbe::new(client))
}

/// Notifier remembering every notice
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// State accessor returning a fixed result and counting calls
pub struct MockStateAccessor {
    result: Result<PersistedState, StateError>,
    calls: AtomicUsize,
}

impl MockStateAccessor {
    pub fn with_manual_proxy(proxy_url: &str) -> Self {
        Self {
            result: Ok(PersistedState {
                manual_proxy_url: Some(proxy_url.to_string()),
                last_applied_proxy: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            result: Ok(PersistedState::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            result: Err(StateError::Unavailable("settings store offline".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StateAccessor for MockStateAccessor {
    async fn get_state(&self) -> Result<PersistedState, StateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Monitor config with reachability testing off and a quiet poll timer
pub fn quiet_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval_ms: 300_000,
        debounce_ms: 1_000,
        max_retries: 3,
        retry_backoff_secs: 1.0,
        reachability_testing: false,
        reachability_interval_ms: 60_000,
    }
}

pub fn build_monitor(
    detector: &Arc<ScriptedDetector>,
    client: &Arc<MockTunnelClient>,
    config: MonitorConfig,
) -> DetectionMonitor {
    let detector: Arc<dyn DetectionSource> = detector.clone();
    DetectionMonitor::builder(detector, probe_with(client))
        .with_config(config)
        .build()
}

/// Collect every event currently buffered on the receiver
pub fn drain_events(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
