use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use bastion_application::ScopeDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::middleware::request_trace_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQueryRequest {
    #[serde(default)]
    filter: Map<String, Value>,
    #[serde(default)]
    rows: Vec<RecordRow>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    tenant_id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQueryResponse {
    filter: Map<String, Value>,
    rows: Vec<RecordRow>,
}

/// Returns the filter exactly as it would reach storage, and passes candidate
/// rows through the row-level scope check.
pub async fn query_records_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    scope: Option<Extension<Arc<ScopeDescriptor>>>,
    Json(payload): Json<RecordQueryRequest>,
) -> ApiResult<Json<RecordQueryResponse>> {
    let scope = scope.map(|Extension(scope)| scope);
    let trace_id = scope
        .as_ref()
        .map_or_else(|| request_trace_id(&headers), |scope| scope.trace_id().clone());

    let filter = state
        .scope_guard
        .enrich(scope.as_deref(), payload.filter, &trace_id)
        .map_err(|failure| ApiError::scope(failure, trace_id.clone()))?;

    if let Some(scope) = scope.as_deref() {
        for row in &payload.rows {
            state
                .scope_guard
                .ensure_row_in_scope(scope, &row.tenant_id)
                .map_err(|failure| ApiError::scope(failure, trace_id.clone()))?;
        }
    }

    Ok(Json(RecordQueryResponse {
        filter,
        rows: payload.rows,
    }))
}
