//! HTTP surface: configuration, middleware, tenant resolution layer,
//! handlers, server lifecycle and shutdown control.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;
pub mod tenant;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::NetworkModule;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
pub use tenant::{CurrentTenant, TenantContextLayer};
