use std::sync::Arc;

use crate::tenant::{Tenant, TenantId, TenantKey};

/// Tenant identity active for one logical unit of work (a request or a task).
///
/// Normally carries the resolved [`Tenant`]. The degraded `Unresolved` form
/// holds only the key named by the caller; it identifies the tenant but
/// cannot scope data access, which requires the tenant's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantContext {
    Resolved(Arc<Tenant>),
    Unresolved(TenantKey),
}

impl TenantContext {
    #[must_use]
    pub fn resolved(tenant: Tenant) -> Self {
        Self::Resolved(Arc::new(tenant))
    }

    #[must_use]
    pub fn key(&self) -> &TenantKey {
        match self {
            Self::Resolved(tenant) => &tenant.tenant_key,
            Self::Unresolved(key) => key,
        }
    }

    #[must_use]
    pub fn tenant(&self) -> Option<&Arc<Tenant>> {
        match self {
            Self::Resolved(tenant) => Some(tenant),
            Self::Unresolved(_) => None,
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant().map(|t| t.id)
    }
}

impl From<Arc<Tenant>> for TenantContext {
    fn from(tenant: Arc<Tenant>) -> Self {
        Self::Resolved(tenant)
    }
}

impl From<TenantKey> for TenantContext {
    fn from(key: TenantKey) -> Self {
        Self::Unresolved(key)
    }
}
