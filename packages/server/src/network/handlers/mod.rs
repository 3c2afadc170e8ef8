//! Route handlers and the state they share.

pub mod health;
pub mod tenants;

pub use health::health_handler;
pub use tenants::{current_tenant_handler, tenant_by_key_handler};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::WorkerPool;

/// Router state. Tenant identity is not here; handlers take it from
/// [`crate::network::CurrentTenant`].
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    /// Where handlers hand off background work. Jobs submitted from a
    /// handler run under that request's tenant.
    pub workers: Arc<WorkerPool>,
    /// Reported by the health endpoint.
    pub node_id: Arc<str>,
    pub start_time: Instant,
}
