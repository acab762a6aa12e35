//! Health probes and the API index.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// Detailed health. Always 200; `state` tells whether the server is ready.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": state.shutdown.state().as_str(),
        "in_flight": state.shutdown.in_flight(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: the process answers.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 503 unless the server is `Ready`.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// `GET /api/health`.
pub async fn api_health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "formgrid API running",
    }))
}

const BUSINESS_ROUTES: &str =
    "/api/businesses/{name}/{submit|preview|normalize|import|table|export|template}";

/// `GET /`: version and route overview.
pub async fn index_handler() -> Json<Value> {
    Json(json!({
        "message": "formgrid API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "schemas": "/api/schemas",
            "data": "/api/data?business={name}",
            "businesses": BUSINESS_ROUTES,
            "stats": "/api/stats",
            "health": "/api/health",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::tests::test_state;

    #[tokio::test]
    async fn health_reports_state_and_in_flight() {
        let state = test_state();
        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.0["state"], "starting");

        state.shutdown.set_ready();
        let _guard = state.shutdown.track();
        let response = health_handler(State(state)).await;
        assert_eq!(response.0["state"], "ready");
        assert_eq!(response.0["in_flight"], 1);
        assert!(response.0["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn readiness_follows_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);
        state.shutdown.begin_drain();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn api_health_and_index() {
        assert_eq!(api_health_handler().await.0["status"], "ok");
        let index = index_handler().await;
        assert_eq!(index.0["version"], env!("CARGO_PKG_VERSION"));
        assert!(index.0["endpoints"]["schemas"].is_string());
    }
}
