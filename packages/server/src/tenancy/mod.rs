//! Tenant context lifecycle: storage, resolution, and propagation.
//!
//! - [`store`]: task-local slot holding the active tenant for a unit of work
//! - [`resolver`]: tenant key extraction and lookup for inbound requests
//! - [`directory`]: tenant lookup sources
//! - [`propagator`]: carrying context into worker-pool tasks
//! - [`error`]: the isolation error taxonomy

pub mod config;
pub mod directory;
pub mod error;
pub mod propagator;
pub mod resolver;
pub mod store;

pub use config::TenancyConfig;
pub use directory::{CachingTenantDirectory, InMemoryTenantDirectory, TenantDirectory};
pub use error::TenantError;
pub use propagator::ContextPropagator;
pub use resolver::{KeySource, Resolution, TenantResolver};
pub use store::TenantContextStore;
