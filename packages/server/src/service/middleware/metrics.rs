//! Metrics middleware for statements.
//!
//! Records statement duration and outcome in a `statement` tracing span. The
//! span is entered while the inner service's `call` runs, so layers beneath
//! (the guard) can record into it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tenantry_core::Statement;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::statement::{ExecutionError, QueryOutput};
use crate::tenancy::TenantContextStore;

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments statements with timing via `tracing` spans.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records statement duration and outcome in tracing spans.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Statement> for MetricsService<S>
where
    S: Service<Statement, Response = QueryOutput, Error = ExecutionError> + Send,
    S::Future: Send + 'static,
{
    type Response = QueryOutput;
    type Error = ExecutionError;
    type Future = Pin<Box<dyn Future<Output = Result<QueryOutput, ExecutionError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, statement: Statement) -> Self::Future {
        let kind = statement.kind().as_str();
        let tenant = TenantContextStore::current_key().map(|k| k.to_string());

        let span = info_span!(
            "statement",
            kind = kind,
            tenant = tenant.as_deref().unwrap_or("-"),
            rewritten = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = {
            let _entered = span.enter();
            self.inner.call(statement)
        };

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = start.elapsed().as_millis();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(ExecutionError::Rejected(_)) => "rejected",
                    Err(_) => "error",
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_u64 = duration_ms as u64;
                tracing::Span::current().record("duration_ms", duration_u64);
                tracing::Span::current().record("outcome", outcome);

                tracing::debug!(
                    kind = kind,
                    duration_ms = duration_u64,
                    outcome = outcome,
                    "statement complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service for metrics testing.
    struct ImmediateService;

    impl Service<Statement> for ImmediateService {
        type Response = QueryOutput;
        type Error = ExecutionError;
        type Future = Pin<Box<dyn Future<Output = Result<QueryOutput, ExecutionError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _statement: Statement) -> Self::Future {
            Box::pin(async move { Ok(QueryOutput::affected(7)) })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(ImmediateService);
        let resp = svc
            .oneshot(Statement::Raw("VACUUM".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.affected, 7);
    }
}
