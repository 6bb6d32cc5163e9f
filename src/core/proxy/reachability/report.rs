// Human-readable probe report for the CLI

use crate::core::proxy::sanitize::mask_proxy_url;
use crate::core::proxy::types::ReachabilityResult;
use std::fmt::Write;

/// Render a probe result; `verbose` adds one line per failed target
pub fn render_report(result: &ReachabilityResult, verbose: bool) -> String {
    let mut out = String::new();
    let proxy = result
        .proxy_url
        .as_deref()
        .map(mask_proxy_url)
        .unwrap_or_else(|| "-".to_string());

    if result.success {
        let _ = writeln!(
            out,
            "✓ {} reachable via {} ({}ms)",
            proxy,
            result.succeeded_target.as_deref().unwrap_or("?"),
            result.duration_ms
        );
    } else {
        let _ = writeln!(out, "✗ {} unreachable ({}ms)", proxy, result.duration_ms);
    }

    if verbose {
        let _ = writeln!(out, "  targets: {}", result.probed_targets.join(", "));
        for error in &result.errors {
            let _ = writeln!(out, "  - {}: {}", error.target, error.message);
        }
    }

    out
}
