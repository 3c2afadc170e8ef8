//! Tenant introspection endpoints.

use axum::extract::Path;
use axum::Json;
use tenantry_core::Tenant;

use crate::network::tenant::CurrentTenant;
use crate::tenancy::TenantError;

/// `GET /api/tenants/current`: the tenant resolved for this request.
pub async fn current_tenant_handler(CurrentTenant(tenant): CurrentTenant) -> Json<Tenant> {
    Json(Tenant::clone(&tenant))
}

/// `GET /api/tenants/{key}`: the named tenant, visible only to itself.
///
/// Asking for any other tenant answers exactly like asking for one that does
/// not exist.
pub async fn tenant_by_key_handler(
    CurrentTenant(tenant): CurrentTenant,
    Path(key): Path<String>,
) -> Result<Json<Tenant>, TenantError> {
    if tenant.tenant_key.as_str() != key.trim() {
        return Err(TenantError::ResolutionFailure { key });
    }
    Ok(Json(Tenant::clone(&tenant)))
}
