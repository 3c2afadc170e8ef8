//! Tenant resolution and enforcement settings.

/// Controls where tenant keys are read from and which routes skip resolution.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Request header carrying the tenant key. Highest precedence.
    pub header_name: String,
    /// Query parameter carrying the tenant key.
    pub query_param: String,
    /// Path token whose following segment is the tenant key.
    pub path_token: String,
    /// Segments after `path_token` that name collection routes, not tenants.
    pub reserved_segments: Vec<String>,
    /// Route prefixes that bypass tenant resolution entirely.
    pub exempt_prefixes: Vec<String>,
    /// Treat suspended and expired tenants as unresolvable.
    pub reject_inactive: bool,
    /// Name of the owning-tenant column on tenant-owned tables.
    pub tenant_column: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Tenant-Key".to_string(),
            query_param: "tenantKey".to_string(),
            path_token: "tenants".to_string(),
            reserved_segments: ["active", "type", "trial", "expired", "count"]
                .into_iter()
                .map(String::from)
                .collect(),
            exempt_prefixes: ["/health", "/api/auth", "/api-docs", "/swagger-ui"]
                .into_iter()
                .map(String::from)
                .collect(),
            reject_inactive: false,
            tenant_column: "tenant_id".to_string(),
        }
    }
}

impl TenancyConfig {
    /// Whether `path` falls under an exempt prefix. A prefix matches only at a
    /// segment boundary, so `/healthz` is not covered by `/health`.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    #[must_use]
    pub fn is_reserved_segment(&self, segment: &str) -> bool {
        self.reserved_segments
            .iter()
            .any(|r| r.eq_ignore_ascii_case(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TenancyConfig::default();
        assert_eq!(config.header_name, "X-Tenant-Key");
        assert_eq!(config.query_param, "tenantKey");
        assert_eq!(config.path_token, "tenants");
        assert_eq!(config.reserved_segments.len(), 5);
        assert_eq!(config.tenant_column, "tenant_id");
        assert!(!config.reject_inactive);
    }

    #[test]
    fn exempt_prefix_matches_on_segment_boundary() {
        let config = TenancyConfig::default();
        assert!(config.is_exempt("/health"));
        assert!(config.is_exempt("/health/ready"));
        assert!(config.is_exempt("/api/auth/login"));
        assert!(config.is_exempt("/swagger-ui/index.html"));
        assert!(!config.is_exempt("/healthz"));
        assert!(!config.is_exempt("/api/tenants/acme"));
    }

    #[test]
    fn reserved_segments_ignore_case() {
        let config = TenancyConfig::default();
        assert!(config.is_reserved_segment("count"));
        assert!(config.is_reserved_segment("Active"));
        assert!(!config.is_reserved_segment("acme"));
    }
}
