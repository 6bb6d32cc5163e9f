//! Reachability probe presets and endpoint/target validation

use url::Url;

/// Timeout for automatic/background probes
pub const BACKGROUND_TIMEOUT_MS: u64 = 3_000;
/// Timeout for user-initiated probes
pub const INTERACTIVE_TIMEOUT_MS: u64 = 5_000;
/// Slack added on top of the probe timeout before the watchdog fires
pub const WATCHDOG_BUFFER_MS: u64 = 1_000;

const SUPPORTED_PROXY_SCHEMES: &[&str] =
    &["http", "https", "socks4", "socks4a", "socks5", "socks5h"];

/// Well-known external targets tunnelled to by default
pub fn default_targets() -> Vec<String> {
    vec![
        "www.google.com:443".to_string(),
        "github.com:443".to_string(),
        "www.cloudflare.com:443".to_string(),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid URL format: {0}")]
    ParseError(#[from] url::ParseError),
    #[error("Missing host in URL")]
    MissingHost,
    #[error("Unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Empty value")]
    Empty,
}

/// Probe configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Per-attempt timeout; the watchdog allows `timeout_ms + WATCHDOG_BUFFER_MS`
    pub timeout_ms: u64,
    /// External targets ("host:port" or "https://host[:port]")
    pub targets: Vec<String>,
    /// Record per-attempt detail for a consumer-visible report
    pub verbose: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::background()
    }
}

impl ProbeOptions {
    /// Short timeout for automatic probing
    pub fn background() -> Self {
        Self {
            timeout_ms: BACKGROUND_TIMEOUT_MS,
            targets: default_targets(),
            verbose: false,
        }
    }

    /// Longer timeout and per-attempt detail for user-initiated probing
    pub fn interactive() -> Self {
        Self {
            timeout_ms: INTERACTIVE_TIMEOUT_MS,
            targets: default_targets(),
            verbose: true,
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        if !targets.is_empty() {
            self.targets = targets;
        }
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Validate a candidate proxy endpoint
///
/// Requires a supported proxy scheme and a host.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, EndpointError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let url = Url::parse(trimmed)?;
    if !SUPPORTED_PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::MissingHost);
    }
    Ok(url)
}

/// Normalize a probe target into an https URL the tunnel client can request
///
/// # Examples
/// - `github.com:443` → `https://github.com/`
/// - `example.org:8443` → `https://example.org:8443/`
/// - `https://www.google.com` → `https://www.google.com/`
pub fn normalize_target(target: &str) -> Result<String, EndpointError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let url = if trimmed.contains("://") {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("https://{}", trimmed))?
    };

    let host = url.host_str().ok_or(EndpointError::MissingHost)?;
    if host.is_empty() {
        return Err(EndpointError::MissingHost);
    }

    match url.port() {
        Some(port) => Ok(format!("{}://{}:{}/", url.scheme(), host, port)),
        None => Ok(format!("{}://{}/", url.scheme(), host)),
    }
}
