//! Proxy detection monitoring core
//!
//! - [`DetectionMonitor`]: polling, debounce, retry and reachability chaining
//! - [`ReachabilityProbe`] / [`ReachabilityScheduler`]: tunnel probing
//! - [`FallbackSelector`]: system → fallback → none selection
//! - [`ConflictResolver`]: multi-instance snapshot resolution
//! - [`ChangeAudit`]: bounded, credential-masked history

pub mod audit;
pub mod conflict;
pub mod debug_logger;
pub mod detection_monitor;
pub mod detector;
pub mod fallback;
pub mod notifier;
pub mod reachability;
pub mod sanitize;
pub mod status;
pub mod types;

// Re-export commonly used items
pub use audit::{ChangeAudit, ChangeEvent, CheckEvent, PolicyEvent, PolicyEventKind};
pub use conflict::{ConflictDetails, ConflictResolution, ConflictResolver, SyncableState, Winner};
pub use debug_logger::{get_debug_logger, DebugLogger};
pub use detection_monitor::{DetectionMonitor, DetectionMonitorBuilder};
pub use detector::{DetectionSource, EnvironmentDetector};
pub use fallback::{FallbackSelector, StateAccessor, StaticStateAccessor};
pub use notifier::{ConsoleNotifier, Notice, NoticeLevel, Notifier, NullNotifier};
pub use reachability::{
    ProbeOptions, ReachabilityCallback, ReachabilityProbe, ReachabilityScheduler, TunnelClient,
};
pub use sanitize::{CredentialMasker, Sanitizer};
pub use status::StatusTracker;
pub use types::*;
