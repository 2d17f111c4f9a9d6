use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use bastion_application::{
    ActorDescriptor, AuditContext, AuditDescriptor, AuditReceipt, ChainVerification,
    ScopeDescriptor,
};
use bastion_core::AppError;
use bastion_domain::ChainScope;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReceiptResponse {
    audit_id: Uuid,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u64>,
}

impl From<AuditReceipt> for AuditReceiptResponse {
    fn from(receipt: AuditReceipt) -> Self {
        let (status, sequence) = match &receipt {
            AuditReceipt::Persisted { sequence, .. } => ("persisted", Some(*sequence)),
            AuditReceipt::Duplicate { .. } => ("duplicate", None),
            AuditReceipt::Fallback { .. } => ("fallback", None),
            AuditReceipt::Dropped { .. } => ("dropped", None),
        };

        Self {
            audit_id: receipt.audit_id(),
            status,
            sequence,
        }
    }
}

/// Records an audit descriptor from a call site on the scoped tenant's chain.
pub async fn record_audit_event_handler(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<ScopeDescriptor>>,
    Json(descriptor): Json<AuditDescriptor>,
) -> ApiResult<(StatusCode, Json<AuditReceiptResponse>)> {
    if descriptor.resource.trim().is_empty() || descriptor.action.trim().is_empty() {
        return Err(ApiError::app(
            AppError::Validation("audit resource and action are required".to_owned()),
            scope.trace_id().clone(),
        ));
    }

    let actor = ActorDescriptor {
        principal_id: Some(scope.principal_id().to_owned()),
        scoped_tenant_id: Some(scope.tenant_id().to_string()),
        scope_type: Some(scope.provenance().as_str().to_owned()),
        ..ActorDescriptor::default()
    };
    let receipt = state
        .audit_pipeline
        .emit_and_wait(
            descriptor,
            AuditContext::new(
                scope.trace_id().clone(),
                ChainScope::tenant(scope.tenant_id()),
                actor,
            ),
        )
        .await;

    Ok((StatusCode::ACCEPTED, Json(receipt.into())))
}

/// Replays the scoped tenant's audit chain.
pub async fn verify_audit_chain_handler(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<ScopeDescriptor>>,
) -> ApiResult<Json<ChainVerification>> {
    state
        .chain_verifier
        .verify(&ChainScope::tenant(scope.tenant_id()))
        .await
        .map(Json)
        .map_err(|error| ApiError::app(error, scope.trace_id().clone()))
}
