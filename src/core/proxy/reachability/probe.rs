//! Reachability Probe
//!
//! Races tunnel attempts to every target through one candidate proxy:
//! - First successful tunnel decides the outcome and aborts the rest
//! - A watchdog bounds total wall-clock time to `timeout + WATCHDOG_BUFFER_MS`
//! - Malformed endpoints and targets become failure results, never errors

use crate::core::proxy::debug_logger::DebugLogger;
use crate::core::proxy::reachability::client::TunnelClient;
use crate::core::proxy::reachability::config::{
    normalize_target, validate_endpoint, ProbeOptions, WATCHDOG_BUFFER_MS,
};
use crate::core::proxy::types::{local_now, ProbeError, ReachabilityResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Target label used for errors that are not tied to one target
pub const ENDPOINT_ERROR_TARGET: &str = "endpoint";
pub const OVERALL_ERROR_TARGET: &str = "*";

pub struct ReachabilityProbe {
    client: Arc<dyn TunnelClient>,
    logger: DebugLogger,
}

impl ReachabilityProbe {
    pub fn new(client: Arc<dyn TunnelClient>) -> Self {
        Self {
            client,
            logger: DebugLogger::new(),
        }
    }

    /// Probe `endpoint` with the background or interactive preset
    pub async fn probe_with(&self, endpoint: &str, options: &ProbeOptions) -> ReachabilityResult {
        self.run(endpoint, &options.targets, options.timeout_ms, options.verbose)
            .await
    }

    /// Probe `endpoint` against `targets` with a per-attempt timeout
    pub async fn probe(
        &self,
        endpoint: &str,
        targets: &[String],
        timeout_ms: u64,
    ) -> ReachabilityResult {
        self.run(endpoint, targets, timeout_ms, false).await
    }

    async fn run(
        &self,
        endpoint: &str,
        targets: &[String],
        timeout_ms: u64,
        verbose: bool,
    ) -> ReachabilityResult {
        let started = Instant::now();
        let mut errors = Vec::new();

        if let Err(e) = validate_endpoint(endpoint) {
            errors.push(ProbeError::new(
                ENDPOINT_ERROR_TARGET,
                format!("Invalid proxy endpoint: {}", e),
            ));
            return self.finish(endpoint, Vec::new(), errors, None, started);
        }

        let mut launch = Vec::with_capacity(targets.len());
        for target in targets {
            match normalize_target(target) {
                Ok(url) => launch.push((target.clone(), url)),
                Err(e) => errors.push(ProbeError::new(
                    target.clone(),
                    format!("Invalid target: {}", e),
                )),
            }
        }

        if launch.is_empty() {
            if errors.is_empty() {
                errors.push(ProbeError::new(OVERALL_ERROR_TARGET, "No probe targets configured"));
            }
            return self.finish(endpoint, Vec::new(), errors, None, started);
        }

        self.logger.probe_start(endpoint, launch.len(), timeout_ms);

        let probed_targets: Vec<String> = launch.iter().map(|(target, _)| target.clone()).collect();
        let attempt_timeout = u32::try_from(timeout_ms).unwrap_or(u32::MAX);

        let mut attempts = JoinSet::new();
        for (target, url) in launch {
            let client = Arc::clone(&self.client);
            let proxy = endpoint.to_string();
            attempts.spawn(async move {
                let attempt_start = Instant::now();
                let outcome = client.open_tunnel(&proxy, &url, attempt_timeout).await;
                (target, outcome, attempt_start.elapsed())
            });
        }

        let watchdog = Duration::from_millis(timeout_ms.saturating_add(WATCHDOG_BUFFER_MS));
        let race = async {
            while let Some(joined) = attempts.join_next().await {
                match joined {
                    Ok((target, Ok(_), elapsed)) => {
                        if verbose {
                            self.logger.probe_attempt(
                                &target,
                                "tunnel established",
                                elapsed.as_millis() as u64,
                            );
                        }
                        return Some(target);
                    }
                    Ok((target, Err(message), elapsed)) => {
                        if verbose {
                            self.logger
                                .probe_attempt(&target, &message, elapsed.as_millis() as u64);
                        }
                        errors.push(ProbeError::new(target, message));
                    }
                    Err(join_error) => {
                        errors.push(ProbeError::new(
                            OVERALL_ERROR_TARGET,
                            format!("Probe attempt aborted: {}", join_error),
                        ));
                    }
                }
            }
            None
        };

        let raced = tokio::time::timeout(watchdog, race).await;
        let winner = match raced {
            Ok(winner) => winner,
            Err(_) => {
                errors.push(ProbeError::new(
                    OVERALL_ERROR_TARGET,
                    format!("Overall timeout after {}ms", watchdog.as_millis()),
                ));
                None
            }
        };

        // Losers and stragglers are cancelled, not left running
        attempts.abort_all();

        self.finish(endpoint, probed_targets, errors, winner, started)
    }

    fn finish(
        &self,
        endpoint: &str,
        probed_targets: Vec<String>,
        errors: Vec<ProbeError>,
        winner: Option<String>,
        started: Instant,
    ) -> ReachabilityResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        let success = winner.is_some();
        self.logger.probe_end(success, errors.len(), duration_ms);

        ReachabilityResult {
            success,
            probed_targets,
            errors,
            proxy_url: Some(endpoint.to_string()),
            timestamp: local_now(),
            duration_ms,
            succeeded_target: winner,
        }
    }
}
