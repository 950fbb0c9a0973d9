use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use relay_common_utils::otel::initialiser::encode_metrics;
use tracing::error;

use crate::health::{HealthSnapshot, HealthStatus};

/// Everything the probe endpoints report on.
#[derive(Clone)]
pub struct ProbeState {
    clients: Arc<[Arc<HealthStatus>]>,
    registry: prometheus::Registry,
}

impl ProbeState {
    pub fn new(clients: Vec<Arc<HealthStatus>>, registry: prometheus::Registry) -> Self {
        Self {
            clients: clients.into(),
            registry,
        }
    }

    fn snapshots(&self) -> Vec<HealthSnapshot> {
        self.clients.iter().map(|c| c.snapshot()).collect()
    }
}

/// `/healthz`, `/readiness` and `/metrics`.
pub fn probe_routes(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readiness", get(readiness))
        .route("/metrics", get(metrics))
        .with_state(state)
}

fn status(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn healthz(State(state): State<ProbeState>) -> impl IntoResponse {
    let snapshots = state.snapshots();
    (status(snapshots.iter().all(|s| s.healthy)), Json(snapshots))
}

async fn readiness(State(state): State<ProbeState>) -> impl IntoResponse {
    let snapshots = state.snapshots();
    (status(snapshots.iter().all(|s| s.initialized)), Json(snapshots))
}

async fn metrics(State(state): State<ProbeState>) -> Response {
    match encode_metrics(&state.registry) {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!("{e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
