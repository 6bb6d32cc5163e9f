//! Reachability Testing Module
//!
//! This module answers "can a tunnel be established through this proxy?":
//! - Concurrent racing probe with loser cancellation and a watchdog
//! - Background (3s) and interactive (5s) presets
//! - Periodic scheduler with runtime-adjustable, clamped interval

pub mod client;
pub mod config;
pub mod probe;
pub mod report;
pub mod scheduler;

pub use client::{default_tunnel_client, TunnelClient};
pub use config::{
    default_targets, normalize_target, validate_endpoint, EndpointError, ProbeOptions,
    BACKGROUND_TIMEOUT_MS, INTERACTIVE_TIMEOUT_MS, WATCHDOG_BUFFER_MS,
};
pub use probe::ReachabilityProbe;
pub use report::render_report;
pub use scheduler::{ReachabilityCallback, ReachabilityScheduler};

#[cfg(feature = "network-monitoring")]
pub use client::IsahcTunnelClient;
