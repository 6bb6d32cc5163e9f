// Notification seam toward the UI layer
//
// The core decides whether a message is warranted and which category it
// belongs to; rendering belongs to the consumer.

use crate::core::proxy::sanitize::mask_proxy_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// System candidate unusable, fallback candidate is now active
    FallbackActivated { proxy_url: String },
    /// System candidate is usable again after fallback/none
    PrimaryRestored { proxy_url: String },
    /// Fallback was tried and is unusable too
    FallbackFailed { proxy_url: String },
    /// No candidate in any tier
    NoProxyAvailable,
    /// Every detection attempt of a check failed
    DetectionFailed { attempts: u32, last_error: String },
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::FallbackActivated { .. } | Notice::PrimaryRestored { .. } => {
                NoticeLevel::Success
            }
            Notice::FallbackFailed { .. }
            | Notice::NoProxyAvailable
            | Notice::DetectionFailed { .. } => NoticeLevel::Warning,
        }
    }

    /// Plain English summary with credentials masked
    pub fn summary(&self) -> String {
        match self {
            Notice::FallbackActivated { proxy_url } => {
                format!("Using fallback proxy {}", mask_proxy_url(proxy_url))
            }
            Notice::PrimaryRestored { proxy_url } => {
                format!("System proxy {} is reachable again", mask_proxy_url(proxy_url))
            }
            Notice::FallbackFailed { proxy_url } => {
                format!("Fallback proxy {} is unreachable", mask_proxy_url(proxy_url))
            }
            Notice::NoProxyAvailable => "No usable proxy available".to_string(),
            Notice::DetectionFailed { attempts, last_error } => {
                format!("Proxy detection failed after {} attempt(s): {}", attempts, last_error)
            }
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: Notice) {}
}

/// Prints notices to stderr; used by the CLI
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let marker = match notice.level() {
            NoticeLevel::Success => "✓",
            NoticeLevel::Warning => "⚠",
        };
        eprintln!("{} {}", marker, notice.summary());
    }
}
