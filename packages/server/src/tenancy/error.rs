//! Tenant isolation error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tenantry_core::{InvalidTenantKey, TenantId};

/// Errors raised by tenant resolution and tenant-scoped data access.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// A scoped operation ran with no active tenant context.
    #[error("no tenant context is active for this operation")]
    ContextMissing,

    /// A direct-entity mutation targeted an entity owned by another tenant.
    #[error("entity is not owned by active tenant {active}")]
    AccessDenied {
        active: TenantId,
        owner: Option<TenantId>,
    },

    /// A tenant key did not resolve to a known tenant. Soft: the resolver
    /// logs it and lets the request continue without context.
    #[error("tenant key {key:?} did not resolve to a known tenant")]
    ResolutionFailure { key: String },

    #[error(transparent)]
    InvalidKey(#[from] InvalidTenantKey),

    /// The context store was written outside any unit-of-work scope.
    #[error("tenant context cannot be installed outside a unit-of-work scope")]
    NoActiveScope,

    /// Unstructured data statement issued while a tenant context is active.
    #[error("unstructured {kind} statement cannot be scoped to the active tenant")]
    UnscopedStatement { kind: &'static str },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TenantError {
    /// Stable machine-readable code used in HTTP error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContextMissing => "TENANT_CONTEXT_MISSING",
            Self::AccessDenied { .. } => "TENANT_ACCESS_DENIED",
            Self::ResolutionFailure { .. } => "TENANT_NOT_FOUND",
            Self::InvalidKey(_) => "INVALID_TENANT_KEY",
            Self::NoActiveScope => "TENANT_SCOPE_MISSING",
            Self::UnscopedStatement { .. } => "UNSCOPED_STATEMENT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ContextMissing | Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::AccessDenied { .. } | Self::UnscopedStatement { .. } => StatusCode::FORBIDDEN,
            Self::ResolutionFailure { .. } => StatusCode::NOT_FOUND,
            Self::NoActiveScope | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "tenant isolation failure");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": self.code(), "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(TenantError::ContextMissing.status(), StatusCode::BAD_REQUEST);
        let denied = TenantError::AccessDenied {
            active: TenantId::random(),
            owner: None,
        };
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.code(), "TENANT_ACCESS_DENIED");
        assert_eq!(
            TenantError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn access_denied_message_does_not_name_the_owner() {
        let owner = TenantId::random();
        let err = TenantError::AccessDenied {
            active: TenantId::random(),
            owner: Some(owner),
        };
        assert!(!err.to_string().contains(&owner.to_string()));
    }

    #[tokio::test]
    async fn internal_errors_hide_details_from_clients() {
        let response = TenantError::Internal(anyhow::anyhow!("db password wrong")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "internal server error");
    }
}
