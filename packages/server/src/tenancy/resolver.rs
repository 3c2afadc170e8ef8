//! Resolution of the active tenant from an inbound request.
//!
//! Key sources, in fixed precedence order:
//! 1. the tenant header (`X-Tenant-Key` by default)
//! 2. the tenant query parameter (`tenantKey`)
//! 3. the path segment right after the `tenants` token, unless that segment
//!    is a reserved collection route (`active`, `count`, ...)
//!
//! A blank value falls through to the next source. Failing to resolve a key is
//! soft: it is logged and the request continues without a tenant context.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use http::{HeaderMap, Uri};
use tenantry_core::{Tenant, TenantContext, TenantKey};
use tracing::{debug, error, warn};

use super::config::TenancyConfig;
use super::directory::TenantDirectory;
use super::error::TenantError;

/// Where a tenant key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Header,
    Query,
    Path,
}

/// Outcome of resolving one request.
#[derive(Debug)]
pub enum Resolution {
    /// The route is exempt from tenant resolution.
    Exempt,
    /// The request names no tenant.
    Absent,
    Resolved {
        tenant: Arc<Tenant>,
        source: KeySource,
    },
    /// A key was named but did not resolve. The request proceeds without
    /// context; the error is kept for logging.
    Failed(TenantError),
}

impl Resolution {
    /// Context to install for the request, if any.
    #[must_use]
    pub fn into_context(self) -> Option<TenantContext> {
        match self {
            Self::Resolved { tenant, .. } => Some(TenantContext::Resolved(tenant)),
            Self::Exempt | Self::Absent | Self::Failed(_) => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Exempt => "exempt",
            Self::Absent => "absent",
            Self::Resolved { .. } => "resolved",
            Self::Failed(_) => "failed",
        }
    }
}

/// Extracts tenant keys from requests and looks them up in a directory.
#[derive(Clone)]
pub struct TenantResolver {
    config: Arc<TenancyConfig>,
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    #[must_use]
    pub fn new(config: Arc<TenancyConfig>, directory: Arc<dyn TenantDirectory>) -> Self {
        Self { config, directory }
    }

    #[must_use]
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Finds the raw tenant key named by a request, honouring source
    /// precedence. Does not validate or look up the key.
    #[must_use]
    pub fn extract_key(&self, uri: &Uri, headers: &HeaderMap) -> Option<(String, KeySource)> {
        let from_header = headers
            .get(self.config.header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(non_blank);
        if let Some(key) = from_header {
            return Some((key, KeySource::Header));
        }

        let from_query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .ok()
            .and_then(|Query(params)| params.get(&self.config.query_param).cloned())
            .and_then(|v| non_blank(&v));
        if let Some(key) = from_query {
            return Some((key, KeySource::Query));
        }

        self.key_from_path(uri.path())
            .map(|key| (key, KeySource::Path))
    }

    fn key_from_path(&self, path: &str) -> Option<String> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        segments.find(|s| *s == self.config.path_token)?;
        let candidate = segments.next()?;
        if self.config.is_reserved_segment(candidate) {
            return None;
        }
        non_blank(candidate)
    }

    /// Resolves the tenant for a request.
    pub async fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> Resolution {
        let resolution = self.resolve_inner(uri, headers).await;
        metrics::counter!("tenantry_resolution_total", "outcome" => resolution.outcome())
            .increment(1);
        resolution
    }

    async fn resolve_inner(&self, uri: &Uri, headers: &HeaderMap) -> Resolution {
        let path = uri.path();
        if self.config.is_exempt(path) {
            debug!(path, "route exempt from tenant resolution");
            return Resolution::Exempt;
        }

        let Some((raw, source)) = self.extract_key(uri, headers) else {
            debug!(path, "no tenant key on request");
            return Resolution::Absent;
        };

        let key = match TenantKey::parse(&raw) {
            Ok(key) => key,
            Err(e) => {
                warn!(path, ?source, "rejecting malformed tenant key");
                return Resolution::Failed(e.into());
            }
        };

        match self.directory.find_by_key(&key).await {
            Ok(Some(tenant)) if self.config.reject_inactive && !tenant.status.is_operational() => {
                warn!(
                    tenant = %key,
                    status = tenant.status.as_str(),
                    "tenant is not operational; continuing without context"
                );
                Resolution::Failed(TenantError::ResolutionFailure {
                    key: key.to_string(),
                })
            }
            Ok(Some(tenant)) => {
                debug!(tenant = %key, ?source, "tenant resolved");
                Resolution::Resolved { tenant, source }
            }
            Ok(None) => {
                warn!(tenant = %key, ?source, "unknown tenant key; continuing without context");
                Resolution::Failed(TenantError::ResolutionFailure {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                error!(tenant = %key, error = %e, "tenant lookup failed; continuing without context");
                Resolution::Failed(TenantError::Internal(e))
            }
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
