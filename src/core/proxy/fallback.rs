// Tiered proxy selection: system candidate, then manual fallback, then none

use crate::core::proxy::audit::{ChangeAudit, PolicyEvent, PolicyEventKind};
use crate::core::proxy::debug_logger::DebugLogger;
use crate::core::proxy::notifier::{Notice, Notifier, NullNotifier};
use crate::core::proxy::reachability::{ProbeOptions, ReachabilityProbe};
use crate::core::proxy::types::{
    PersistedState, ProxySelection, ProxySource, ReachabilityResult, StateError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::time::Instant;

const POLICY_CHANNEL_CAPACITY: usize = 64;

/// Supplies the persisted state holding the manual fallback candidate
#[async_trait::async_trait]
pub trait StateAccessor: Send + Sync {
    async fn get_state(&self) -> Result<PersistedState, StateError>;
}

/// Fixed state, e.g. the `[fallback]` section of the config file
#[derive(Debug, Clone, Default)]
pub struct StaticStateAccessor {
    state: PersistedState,
}

impl StaticStateAccessor {
    pub fn new(manual_proxy_url: Option<String>) -> Self {
        Self {
            state: PersistedState {
                manual_proxy_url,
                last_applied_proxy: None,
            },
        }
    }
}

#[async_trait::async_trait]
impl StateAccessor for StaticStateAccessor {
    async fn get_state(&self) -> Result<PersistedState, StateError> {
        Ok(self.state.clone())
    }
}

pub struct FallbackSelector {
    probe: Arc<ReachabilityProbe>,
    state: Arc<dyn StateAccessor>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<ChangeAudit>,
    options: ProbeOptions,
    fallback_enabled: AtomicBool,
    last_source: Mutex<Option<ProxySource>>,
    events: broadcast::Sender<PolicyEvent>,
    logger: DebugLogger,
}

impl FallbackSelector {
    /// Fallback starts enabled; probes use the background preset
    pub fn new(probe: Arc<ReachabilityProbe>, state: Arc<dyn StateAccessor>) -> Self {
        let (events, _) = broadcast::channel(POLICY_CHANNEL_CAPACITY);
        Self {
            probe,
            state,
            notifier: Arc::new(NullNotifier),
            audit: Arc::new(ChangeAudit::new()),
            options: ProbeOptions::background(),
            fallback_enabled: AtomicBool::new(true),
            last_source: Mutex::new(None),
            events,
            logger: DebugLogger::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit(mut self, audit: Arc<ChangeAudit>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_probe_options(mut self, options: ProbeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_fallback_enabled(self, enabled: bool) -> Self {
        self.set_fallback_enabled(enabled);
        self
    }

    /// Takes effect on the next `select()`
    pub fn set_fallback_enabled(&self, enabled: bool) {
        self.fallback_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_fallback_enabled(&self) -> bool {
        self.fallback_enabled.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.events.subscribe()
    }

    pub fn audit(&self) -> Arc<ChangeAudit> {
        Arc::clone(&self.audit)
    }

    /// Source chosen by the most recent `select()`, if any
    pub fn last_source(&self) -> Option<ProxySource> {
        match self.last_source.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Pick the proxy to use, in strict priority order
    ///
    /// 1. A reachable system candidate wins; the fallback is not probed.
    /// 2. An enabled, configured and reachable fallback wins.
    /// 3. Otherwise no proxy.
    ///
    /// Never fails: accessor errors and unreachable probes fall through.
    pub async fn select(&self, system_candidate: Option<&str>) -> ProxySelection {
        let started = Instant::now();
        let selection = self.select_tiers(system_candidate).await;
        self.logger.performance(
            "FallbackSelector",
            &format!("select -> {}", selection.source),
            started.elapsed().as_millis() as u64,
        );
        selection
    }

    async fn select_tiers(&self, system_candidate: Option<&str>) -> ProxySelection {
        let mut last_result: Option<ReachabilityResult> = None;

        if let Some(system) = system_candidate.filter(|url| !url.trim().is_empty()) {
            let result = self.probe.probe_with(system, &self.options).await;
            if result.success {
                let previous = self.swap_source(ProxySource::System);
                if matches!(previous, Some(ProxySource::Fallback) | Some(ProxySource::None)) {
                    self.record_policy(PolicyEventKind::ReturnedToPrimary, Some(system));
                    self.notifier.notify(Notice::PrimaryRestored {
                        proxy_url: system.to_string(),
                    });
                }
                return ProxySelection {
                    proxy_url: Some(system.to_string()),
                    source: ProxySource::System,
                    reachability_result: Some(result),
                    success: true,
                };
            }
            last_result = Some(result);
        }

        let mut failed_fallback: Option<String> = None;
        if self.is_fallback_enabled() {
            if let Some(fallback) = self.fallback_candidate().await {
                let result = self.probe.probe_with(&fallback, &self.options).await;
                if result.success {
                    let previous = self.swap_source(ProxySource::Fallback);
                    self.record_policy(PolicyEventKind::SwitchedToFallback, Some(&fallback));
                    if previous != Some(ProxySource::Fallback) {
                        self.notifier.notify(Notice::FallbackActivated {
                            proxy_url: fallback.clone(),
                        });
                    }
                    return ProxySelection {
                        proxy_url: Some(fallback),
                        source: ProxySource::Fallback,
                        reachability_result: Some(result),
                        success: true,
                    };
                }
                last_result = Some(result);
                failed_fallback = Some(fallback);
            }
        }

        let previous = self.swap_source(ProxySource::None);
        self.record_policy(PolicyEventKind::EnteredDegraded, failed_fallback.as_deref());
        if previous != Some(ProxySource::None) {
            self.notifier.notify(match failed_fallback {
                Some(proxy_url) => Notice::FallbackFailed { proxy_url },
                None => Notice::NoProxyAvailable,
            });
        }
        ProxySelection::none(last_result)
    }

    async fn fallback_candidate(&self) -> Option<String> {
        match self.state.get_state().await {
            Ok(state) => state.manual_proxy_url.filter(|url| !url.trim().is_empty()),
            Err(e) => {
                self.logger
                    .error("FallbackSelector", "state_unavailable", &e.to_string());
                None
            }
        }
    }

    fn swap_source(&self, source: ProxySource) -> Option<ProxySource> {
        let mut guard = match self.last_source.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(source)
    }

    fn record_policy(&self, kind: PolicyEventKind, proxy_url: Option<&str>) {
        let event = self.audit.log_policy(kind, proxy_url);
        self.logger.policy_event(kind.message(), event.proxy_url.as_deref());
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}
