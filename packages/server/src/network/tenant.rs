//! Per-request tenant resolution for the HTTP stack.
//!
//! [`TenantContextLayer`] resolves the tenant before the handler runs, stores
//! it in the request extensions and runs the rest of the request inside a
//! [`TenantContextStore`] scope. The scope ends with the response future, so
//! the context is gone on every completion path: response, error, panic or
//! client disconnect.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::Response;
use tenantry_core::{Tenant, TenantContext};
use tower::{Layer, Service};

use super::shutdown::ShutdownController;
use crate::tenancy::{TenantContextStore, TenantError, TenantResolver};

// ---------------------------------------------------------------------------
// TenantContextLayer
// ---------------------------------------------------------------------------

/// Tower layer installing the resolved tenant for each request.
///
/// Also counts the request as in flight for graceful shutdown.
#[derive(Clone)]
pub struct TenantContextLayer {
    resolver: TenantResolver,
    shutdown: Arc<ShutdownController>,
}

impl TenantContextLayer {
    #[must_use]
    pub fn new(resolver: TenantResolver, shutdown: Arc<ShutdownController>) -> Self {
        Self { resolver, shutdown }
    }
}

impl<S> Layer<S> for TenantContextLayer {
    type Service = TenantContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantContextService {
            inner,
            resolver: self.resolver.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

// ---------------------------------------------------------------------------
// TenantContextService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TenantContextService<S> {
    inner: S,
    resolver: TenantResolver,
    shutdown: Arc<ShutdownController>,
}

impl<S> Service<Request> for TenantContextService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // The clone is not ready; keep the service that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let resolver = self.resolver.clone();
        let in_flight = self.shutdown.in_flight_guard();

        Box::pin(async move {
            let _in_flight = in_flight;
            let context = resolver
                .resolve(req.uri(), req.headers())
                .await
                .into_context();
            if let Some(context) = &context {
                req.extensions_mut().insert(context.clone());
            }
            TenantContextStore::scope(context, async move { inner.call(req).await }).await
        })
    }
}

// ---------------------------------------------------------------------------
// CurrentTenant extractor
// ---------------------------------------------------------------------------

/// The tenant resolved for this request.
///
/// Rejects with [`TenantError::ContextMissing`] (400) when the request carries
/// no resolved tenant.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Arc<Tenant>);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = TenantError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .and_then(TenantContext::tenant)
            .map(|tenant| Self(Arc::clone(tenant)))
            .ok_or(TenantError::ContextMissing)
    }
}
