//! Tunnel Client Implementations
//!
//! Provides the network seam under the reachability probe: open a tunnel
//! through a candidate proxy to one external target and report how long it
//! took. Implementations must honor the per-attempt timeout and must be
//! cancel-safe, since losing attempts are aborted mid-flight.

use std::time::Duration;

#[cfg(feature = "network-monitoring")]
use isahc::config::{Configurable, RedirectPolicy};
#[cfg(feature = "network-monitoring")]
use isahc::{http::Uri, HttpClient, Request};
#[cfg(feature = "network-monitoring")]
use std::time::Instant;

/// Client able to tunnel through a proxy to an external target
#[async_trait::async_trait]
pub trait TunnelClient: Send + Sync {
    /// Establish a tunnel through `proxy_url` to `target_url`
    ///
    /// # Arguments
    /// * `proxy_url` - Validated proxy endpoint (e.g. "http://proxy.corp:3128")
    /// * `target_url` - Normalized target (e.g. "https://github.com:443/")
    /// * `timeout_ms` - Per-attempt timeout in milliseconds
    ///
    /// # Returns
    /// * `Ok(Duration)` - Tunnel established; time to first response
    /// * `Err(String)` - Connection, proxy or TLS failure description
    async fn open_tunnel(
        &self,
        proxy_url: &str,
        target_url: &str,
        timeout_ms: u32,
    ) -> Result<Duration, String>;
}

/// Production tunnel client using isahc with an explicit per-request proxy
///
/// Any HTTP response from the target counts as success: receiving one means
/// the proxy accepted the CONNECT and the TLS session completed.
#[cfg(feature = "network-monitoring")]
pub struct IsahcTunnelClient {
    client: HttpClient,
}

#[cfg(feature = "network-monitoring")]
impl IsahcTunnelClient {
    pub fn new() -> Result<Self, String> {
        let client = HttpClient::builder()
            .redirect_policy(RedirectPolicy::None)
            .build()
            .map_err(|e| format!("Failed to create tunnel client: {}", e))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "network-monitoring")]
#[async_trait::async_trait]
impl TunnelClient for IsahcTunnelClient {
    async fn open_tunnel(
        &self,
        proxy_url: &str,
        target_url: &str,
        timeout_ms: u32,
    ) -> Result<Duration, String> {
        let start = Instant::now();

        let proxy: Uri = proxy_url
            .parse()
            .map_err(|e| format!("Invalid proxy URI: {}", e))?;

        let request = Request::head(target_url)
            .proxy(Some(proxy))
            .timeout(Duration::from_millis(timeout_ms as u64))
            .redirect_policy(RedirectPolicy::None)
            .header("User-Agent", concat!("proxywatch/", env!("CARGO_PKG_VERSION")))
            .body(Vec::new())
            .map_err(|e| format!("Tunnel request creation failed: {}", e))?;

        let response = self
            .client
            .send_async(request)
            .await
            .map_err(|e| format!("Tunnel failed: {}", e))?;

        let _status = response.status();
        Ok(start.elapsed())
    }
}

/// Stand-in used when the crate is built without network support
#[cfg(not(feature = "network-monitoring"))]
#[derive(Default)]
pub struct UnavailableTunnelClient;

#[cfg(not(feature = "network-monitoring"))]
#[async_trait::async_trait]
impl TunnelClient for UnavailableTunnelClient {
    async fn open_tunnel(
        &self,
        _proxy_url: &str,
        _target_url: &str,
        _timeout_ms: u32,
    ) -> Result<Duration, String> {
        Err("network-monitoring feature disabled".to_string())
    }
}

/// Build the default tunnel client for this build configuration
pub fn default_tunnel_client() -> Result<std::sync::Arc<dyn TunnelClient>, String> {
    #[cfg(feature = "network-monitoring")]
    {
        Ok(std::sync::Arc::new(IsahcTunnelClient::new()?))
    }
    #[cfg(not(feature = "network-monitoring"))]
    {
        Ok(std::sync::Arc::new(UnavailableTunnelClient))
    }
}
