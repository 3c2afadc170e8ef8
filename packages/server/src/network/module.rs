//! HTTP server lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, `serve()`
//! accepts requests until the shutdown future resolves and then drains.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    current_tenant_handler, health_handler, tenant_by_key_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use super::tenant::TenantContextLayer;
use crate::service::WorkerPool;
use crate::tenancy::TenantResolver;

/// Owns the listener, the router inputs and the shutdown controller.
pub struct NetworkModule {
    config: NetworkConfig,
    node_id: Arc<str>,
    resolver: TenantResolver,
    workers: Arc<WorkerPool>,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port. `workers` is handed to
    /// handlers through [`AppState`] and stopped after the HTTP drain.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        node_id: &str,
        resolver: TenantResolver,
        workers: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            node_id: Arc::from(node_id),
            resolver,
            workers,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router.
    ///
    /// Routes:
    /// - `GET /health`
    /// - `GET /api/tenants/current`
    /// - `GET /api/tenants/{key}`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            workers: Arc::clone(&self.workers),
            node_id: Arc::clone(&self.node_id),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/tenants/current", get(current_tenant_handler))
            .route("/api/tenants/{key}", get(tenant_by_key_handler))
            .layer(TenantContextLayer::new(
                self.resolver.clone(),
                Arc::clone(&self.shutdown),
            ))
            .layer(build_http_layers(
                &self.config,
                &self.resolver.config().header_name,
            ))
            .with_state(state)
    }

    /// Binds the TCP listener and returns the bound port, which differs from
    /// the configured one when that is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, waits for in-flight requests, then
    /// lets the worker pool finish its queue.
    ///
    /// The health state moves to `Draining` as soon as the signal fires and
    /// to `Stopped` once the HTTP drain completes.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let controller = Arc::clone(&self.shutdown);

        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                shutdown.await;
                info!("shutdown signal received");
                controller.trigger_shutdown();
            }
        };

        controller.set_ready();
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests in flight"
            );
        }
        self.workers.stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tenantry_core::{Tenant, TenantKey};
    use tower::ServiceExt;

    use super::*;
    use crate::network::HealthState;
    use crate::service::WorkerPoolConfig;
    use crate::tenancy::{InMemoryTenantDirectory, TenancyConfig, TenantContextStore};

    fn module() -> NetworkModule {
        let directory = InMemoryTenantDirectory::new();
        for key in ["acme", "globex"] {
            directory.insert(Tenant::new(TenantKey::parse(key).unwrap(), key));
        }
        let resolver = TenantResolver::new(Arc::new(TenancyConfig::default()), Arc::new(directory));
        NetworkModule::new(NetworkConfig::default(), "node-test", resolver, pool())
    }

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::start(&WorkerPoolConfig {
            worker_count: 1,
            queue_capacity: 8,
        }))
    }

    async fn get(router: Router, uri: &str, tenant: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Key", tenant);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn current_tenant_from_header() {
        let router = module().build_router();
        let response = get(router, "/api/tenants/current", Some("acme")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = json(response).await;
        assert_eq!(body["tenantKey"], "acme");
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn current_tenant_without_context_is_400() {
        let router = module().build_router();
        let response = get(router, "/api/tenants/current", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "TENANT_CONTEXT_MISSING");
    }

    #[tokio::test]
    async fn tenant_by_path_key() {
        let router = module().build_router();
        let response = get(router, "/api/tenants/globex", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["tenantKey"], "globex");
    }

    #[tokio::test]
    async fn other_tenant_looks_missing() {
        let router = module().build_router();
        let response = get(router, "/api/tenants/globex", Some("acme")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"], "TENANT_NOT_FOUND");
    }

    #[tokio::test]
    async fn health_is_exempt_and_reports_state() {
        let module = module();
        let router = module.build_router();
        let response = get(router.clone(), "/health", Some("not a valid key!")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json(response).await;
        assert_eq!(body["state"], "starting");
        assert_eq!(body["node_id"], "node-test");

        module.shutdown_controller().set_ready();
        let response = get(router, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let result = module().serve(std::future::ready(())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn serves_and_drains_on_signal() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        let controller = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(controller.health_state(), HealthState::Ready);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn handlers_submit_background_work_under_the_request_tenant() {
        async fn queued_key(State(state): State<AppState>) -> String {
            let done = state
                .workers
                .submit(async { TenantContextStore::current_key().map(|k| k.to_string()) })
                .await
                .unwrap();
            done.await.unwrap().unwrap_or_default()
        }

        let module = module();
        let state = AppState {
            shutdown: module.shutdown_controller(),
            workers: Arc::clone(&module.workers),
            node_id: Arc::clone(&module.node_id),
            start_time: Instant::now(),
        };
        let router = Router::new()
            .route("/api/tenants/current/queued", axum::routing::get(queued_key))
            .layer(TenantContextLayer::new(
                module.resolver.clone(),
                module.shutdown_controller(),
            ))
            .with_state(state);

        for key in ["acme", "globex"] {
            let response = get(router.clone(), "/api/tenants/current/queued", Some(key)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], key.as_bytes());
        }

        module.workers.stop().await;
        assert_eq!(module.workers.worker_count(), 0);
    }
}
