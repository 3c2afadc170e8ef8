//! Tenantry server: tenant resolution, tenant-scoped data access, statement
//! guarding and tenant context propagation for async work.

pub mod network;
pub mod repository;
pub mod service;
pub mod storage;
pub mod tenancy;

pub use repository::{TenantOwned, TenantScopedRepository};
pub use service::{ExecutionError, ServerConfig, WorkerPool};
pub use tenancy::{ContextPropagator, TenantContextStore, TenantError, TenantResolver};
