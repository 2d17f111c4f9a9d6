use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bastion_application::HEADER_TRACE_ID;
use bastion_core::{AppError, TraceId};
use bastion_domain::ScopeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

/// API error payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    success: bool,
    code: &'static str,
    message: String,
    trace_id: String,
    timestamp: DateTime<Utc>,
}

/// Failure returned to HTTP clients, always tagged with the request trace id.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    trace_id: TraceId,
    retryable: bool,
}

impl ApiError {
    /// Maps a scope decision failure to its stable code and status.
    pub fn scope(failure: ScopeError, trace_id: TraceId) -> Self {
        let status = match failure {
            ScopeError::Unauthenticated | ScopeError::InvalidIdentity { .. } => {
                StatusCode::UNAUTHORIZED
            }
            ScopeError::TenantUnbound
            | ScopeError::TenantInvalid { .. }
            | ScopeError::OverrideRejected { .. }
            | ScopeError::SovereigntyBreach => StatusCode::FORBIDDEN,
            ScopeError::MissingScope => StatusCode::INTERNAL_SERVER_ERROR,
            ScopeError::EngineFault => StatusCode::SERVICE_UNAVAILABLE,
        };

        Self {
            status,
            code: failure.code().as_str(),
            message: failure.to_string(),
            retryable: failure.is_retryable(),
            trace_id,
        }
    }

    /// Maps an application error. Internal detail is logged, never returned.
    pub fn app(failure: AppError, trace_id: TraceId) -> Self {
        let (status, code, message) = match failure {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, "CONFLICT", message),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
            AppError::Internal(detail) => {
                error!(trace_id = %trace_id, error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error".to_owned(),
                )
            }
        };

        Self {
            status,
            code,
            message,
            trace_id,
            retryable: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let trace_header = HeaderValue::from_str(self.trace_id.as_str()).ok();
        let payload = Json(ErrorResponse {
            success: false,
            code: self.code,
            message: self.message,
            trace_id: self.trace_id.to_string(),
            timestamp: Utc::now(),
        });

        let mut response = (self.status, payload).into_response();
        if let Some(value) = trace_header {
            response.headers_mut().insert(HEADER_TRACE_ID, value);
        }
        if self.retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
