//! Pure helper functions for token acquisition
//!
//! HTTP client builders, scope/resource conversion and expiry parsing shared
//! by the credential sources.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime assumed for tokens whose response carries no expiry.
pub const FALLBACK_TOKEN_LIFETIME: Duration = Duration::from_secs(600);

// =============================================================================
// HTTP Client Builders
// =============================================================================

/// Create a reqwest client for token and API requests using config timeouts
pub fn create_http_client(
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none()) // Security: prevent SSRF
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .build()
}

/// Build a reqwest client for the managed identity endpoint.
///
/// IMDS only answers on Azure hosts, so the connect timeout is short to keep
/// the credential chain fast everywhere else.
pub fn build_probe_client(
    connect_timeout_ms: u64,
    request_timeout_ms: u64,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .connect_timeout(Duration::from_millis(connect_timeout_ms))
        .timeout(Duration::from_millis(request_timeout_ms))
        .build()
}

// =============================================================================
// Scopes
// =============================================================================

/// Formats a resource as an Entra ID v2.0 scope (`{resource}/.default`).
pub fn format_scope(resource: &str) -> String {
    let resource = resource.trim_end_matches('/');
    if resource.ends_with("/.default") {
        resource.to_string()
    } else {
        format!("{}/.default", resource)
    }
}

/// Strips `/.default` from a scope to get the v1 resource identifier that
/// managed identity endpoints and the Azure CLI expect.
pub fn resource_from_scope(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Build the Entra ID v2.0 token endpoint for a tenant
pub fn token_endpoint(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

// =============================================================================
// Expiry
// =============================================================================

/// Convert a Unix timestamp in seconds to a `SystemTime`.
///
/// Timestamps the platform cannot represent fall back to `fallback_expiry()`.
pub fn expires_at_epoch(secs: u64) -> SystemTime {
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .unwrap_or_else(fallback_expiry)
}

/// Expiry `lifetime` from now, or `fallback_expiry()` if that overflows
pub fn expires_after(lifetime: Duration) -> SystemTime {
    SystemTime::now()
        .checked_add(lifetime)
        .unwrap_or_else(fallback_expiry)
}

/// Parse an `expires_on` value given as a JSON number or numeric string
pub fn parse_expires_on(value: &serde_json::Value) -> Option<SystemTime> {
    let secs = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    Some(expires_at_epoch(secs))
}

/// Expiry to use when a token response carried none
pub fn fallback_expiry() -> SystemTime {
    SystemTime::now() + FALLBACK_TOKEN_LIFETIME
}
