use axum::Json;
use axum::extract::State;
use bastion_application::AuditMetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    storage: &'static str,
    audit: AuditMetricsSnapshot,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.storage_backend,
        audit: state.audit_pipeline.metrics(),
    })
}
