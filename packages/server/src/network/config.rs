//! Listener settings for the tenantry HTTP surface.

use std::time::Duration;

/// HTTP listener configuration.
///
/// Tenant key transport (header name, query parameter) is tenancy policy and
/// lives in [`crate::tenancy::TenancyConfig`]; CORS picks the header name up
/// from there.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick.
    pub port: u16,
    /// Browser origins allowed to call the API; `"*"` allows any.
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Upper bound on waiting for in-flight requests after the shutdown signal.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// `host:port` as handed to the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
