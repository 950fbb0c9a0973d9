use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use relay_messaging::errors::{BrokerError, BrokerErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::usecases::ScoreCalculator;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreQuery {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_banking_institution_id")]
    pub banking_institution_id: String,
}

fn default_user_id() -> String {
    "reus".to_string()
}

fn default_banking_institution_id() -> String {
    "userId".to_string()
}

#[derive(Debug, Serialize)]
struct ScoreResponse {
    score: f64,
}

/// `GET /score`, answered synchronously through the banking gateway.
pub fn score_routes(calculator: Arc<dyn ScoreCalculator>) -> Router {
    Router::new().route("/score", get(score)).with_state(calculator)
}

async fn score(State(calculator): State<Arc<dyn ScoreCalculator>>, Query(query): Query<ScoreQuery>) -> Response {
    match calculator.calculate(&query.user_id, &query.banking_institution_id).await {
        Ok(score) => Json(ScoreResponse { score }).into_response(),
        Err(e) => {
            error!("Couldn't calculate score for user {}: {e}", query.user_id);
            (error_status(&e), Json(json!({ "error": e.reason }))).into_response()
        }
    }
}

fn error_status(error: &BrokerError) -> StatusCode {
    match error.kind {
        BrokerErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}
