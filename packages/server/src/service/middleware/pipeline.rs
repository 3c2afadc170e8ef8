//! Pipeline composition: combines all middleware layers into a single statement stack.

use tenantry_core::Statement;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::statement_guard::StatementGuardLayer;
use crate::service::statement::{ExecutionError, QueryOutput};
use crate::tenancy::TenancyConfig;

/// Build the statement pipeline by wrapping an executing service with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- span, timing and outcome for every statement
/// 2. `StatementGuardLayer` -- tenant rewrite or rejection right before execution
///
/// The returned service implements `tower::Service<Statement>`.
#[must_use]
pub fn build_statement_pipeline<S>(
    executor: S,
    config: &TenancyConfig,
) -> impl tower::Service<Statement, Response = QueryOutput, Error = ExecutionError, Future: Send>
       + Clone
       + Send
where
    S: tower::Service<Statement, Response = QueryOutput, Error = ExecutionError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(StatementGuardLayer::new(&config.tenant_column))
        .service(executor)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
