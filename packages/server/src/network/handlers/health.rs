//! `GET /health`: exempt from tenant resolution, so probes never need a key.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// 200 while `Ready`, 503 otherwise; the body says which state and how much
/// work is still outstanding.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let health = state.shutdown.health_state();
    let status = if health == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "state": health.as_str(),
        "node_id": &*state.node_id,
        "in_flight": state.shutdown.in_flight_count(),
        "workers": state.workers.worker_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    });
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::network::ShutdownController;
    use crate::service::{WorkerPool, WorkerPoolConfig};

    fn state() -> AppState {
        AppState {
            shutdown: Arc::new(ShutdownController::new()),
            workers: Arc::new(WorkerPool::start(&WorkerPoolConfig {
                worker_count: 2,
                queue_capacity: 4,
            })),
            node_id: Arc::from("node-a"),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn ready_node_answers_200_with_details() {
        let state = state();
        state.shutdown.set_ready();

        let (status, Json(body)) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "ready");
        assert_eq!(body["node_id"], "node-a");
        assert_eq!(body["in_flight"], 0);
        assert_eq!(body["workers"], 2);
    }

    #[tokio::test]
    async fn starting_and_draining_answer_503() {
        let state = state();
        let (status, _) = health_handler(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let _guard = state.shutdown.in_flight_guard();
        state.shutdown.trigger_shutdown();
        let (status, Json(body)) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["state"], "draining");
        assert_eq!(body["in_flight"], 1);
    }
}
