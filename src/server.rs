//! HTTP endpoint receiving worker heartbeats.

use crate::registry::{Worker, WorkerRegistry};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Heartbeat body sent by workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Address the worker can be claimed at.
    pub endpoint: String,
    /// Free-text description of what the worker is doing.
    #[serde(default)]
    pub detail: String,
}

/// Build the heartbeat router: `POST /report` and `GET /workers`.
pub fn router(registry: Arc<WorkerRegistry>) -> Router {
    Router::new()
        .route("/report", post(report))
        .route("/workers", get(list_workers))
        .with_state(registry)
}

/// Record a heartbeat.
async fn report(
    State(registry): State<Arc<WorkerRegistry>>,
    Json(body): Json<ReportRequest>,
) -> StatusCode {
    if body.endpoint.trim().is_empty() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    registry.report(body.endpoint.trim(), &body.detail);
    StatusCode::NO_CONTENT
}

/// List workers currently considered alive.
async fn list_workers(State(registry): State<Arc<WorkerRegistry>>) -> Json<Vec<Worker>> {
    Json(registry.available())
}
