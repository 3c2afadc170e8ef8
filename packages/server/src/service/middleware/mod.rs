//! Tower middleware layers for the statement pipeline.
//!
//! - [`statement_guard`]: Tenant rewrite and rejection of statements
//! - [`metrics`]: Statement timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod statement_guard;

pub use metrics::MetricsLayer;
pub use pipeline::build_statement_pipeline;
pub use statement_guard::{GuardAction, StatementGuard, StatementGuardLayer};
