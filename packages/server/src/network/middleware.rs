//! Transport-level HTTP layers.
//!
//! Tenant resolution is not part of this stack; it sits closer to the routes
//! (see [`super::tenant`]) so exempt routes never pay for it.

use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::config::NetworkConfig;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            CorsLayer,
            Stack<
                CompressionLayer,
                Stack<
                    TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                    Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP stack, outermost first: request id, trace, gzip, CORS,
/// timeout, request id echo.
///
/// `tenant_header` is the header clients send the tenant key in; browsers
/// may only send it cross-origin if CORS allows it.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig, tenant_header: &str) -> HttpLayers {
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins, tenant_header))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .into_inner()
}

fn build_cors_layer(origins: &[String], tenant_header: &str) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    let mut headers = vec![CONTENT_TYPE, REQUEST_ID];
    match HeaderName::try_from(tenant_header) {
        Ok(name) => headers.push(name),
        Err(_) => warn!(header = tenant_header, "tenant header is not a valid header name"),
    }

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(headers)
        .expose_headers([REQUEST_ID])
}
