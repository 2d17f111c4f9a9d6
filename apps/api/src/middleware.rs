use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bastion_application::{
    ActorDescriptor, AuditContext, AuditDescriptor, AuditPipeline, HEADER_TRACE_ID,
    OverrideMarkers, RequestDescriptor, ResponseDescriptor, ScopeDescriptor, ScopeRequest,
};
use bastion_core::{IdentityContext, TraceId};
use bastion_domain::{AuditAction, ChainScope, Severity};

use crate::error::ApiError;
use crate::state::AppState;

pub const HEADER_PRINCIPAL_ID: &str = "x-principal-id";
pub const HEADER_PRINCIPAL_ROLE: &str = "x-principal-role";
pub const HEADER_BOUND_TENANT_ID: &str = "x-bound-tenant-id";
pub const HEADER_OVERRIDE_TARGET: &str = "x-override-target-tenant";
pub const HEADER_OVERRIDE_REASON: &str = "x-override-reason";
pub const HEADER_OVERRIDE_JUSTIFICATION: &str = "x-override-justification";

/// Resolves the tenant scope before any scoped handler runs.
///
/// On success the descriptor is available to handlers as
/// `Extension<Arc<ScopeDescriptor>>` and the response carries the scope
/// headers. Every scoped request produces a completion audit record, also
/// when the client goes away before the handler finishes.
pub async fn enforce_tenant_scope(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope_request = scope_request(&request);
    let scope = match state.scope_enforcer.enforce(&scope_request).await {
        Ok(scope) => Arc::new(scope),
        Err(failure) => return ApiError::scope(failure, scope_request.trace_id).into_response(),
    };

    let mut completion = CompletionAudit::new(
        state.audit_pipeline.clone(),
        Arc::clone(&scope),
        &scope_request,
    );
    request.extensions_mut().insert(Arc::clone(&scope));

    let mut response = next.run(request).await;
    completion.finish(response.status().as_u16());

    for (name, value) in scope.observability_headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }

    response
}

/// Trace id for requests that never went through enforcement.
pub fn request_trace_id(headers: &HeaderMap) -> TraceId {
    TraceId::from_upstream(header_value(headers, HEADER_TRACE_ID))
}

fn scope_request(request: &Request) -> ScopeRequest {
    let headers = request.headers();
    let mut scope_request = ScopeRequest::new(
        request.method().as_str(),
        request.uri().path(),
        request_trace_id(headers),
    );

    if let Some(principal_id) = header_value(headers, HEADER_PRINCIPAL_ID) {
        scope_request = scope_request.with_identity(IdentityContext::new(
            principal_id,
            header_value(headers, HEADER_PRINCIPAL_ROLE).unwrap_or_default(),
            header_value(headers, HEADER_BOUND_TENANT_ID).map(str::to_owned),
        ));
    }

    scope_request = scope_request.with_override(OverrideMarkers {
        target_tenant_id: header_value(headers, HEADER_OVERRIDE_TARGET).map(str::to_owned),
        reason: header_value(headers, HEADER_OVERRIDE_REASON).map(str::to_owned),
        justification: header_value(headers, HEADER_OVERRIDE_JUSTIFICATION).map(str::to_owned),
    });

    scope_request.query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    scope_request.client_ip = client_ip(request);
    scope_request.user_agent =
        header_value(headers, header::USER_AGENT.as_str()).map(str::to_owned);

    scope_request
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn client_ip(request: &Request) -> Option<String> {
    header_value(request.headers(), "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(address)| address.ip().to_string())
        })
}

/// Emits the request completion record exactly once, from `finish` or, if
/// the handler future is dropped first, from `Drop`.
struct CompletionAudit {
    pipeline: AuditPipeline,
    scope: Arc<ScopeDescriptor>,
    actor: ActorDescriptor,
    request: RequestDescriptor,
    started: Instant,
    status: Option<u16>,
}

impl CompletionAudit {
    fn new(pipeline: AuditPipeline, scope: Arc<ScopeDescriptor>, request: &ScopeRequest) -> Self {
        let identity = request.identity.as_ref();
        let actor = ActorDescriptor {
            principal_id: Some(scope.principal_id().to_owned()),
            role: identity.map(|identity| identity.raw_role().to_owned()),
            bound_tenant_id: identity
                .and_then(IdentityContext::bound_tenant_id)
                .map(str::to_owned),
            scoped_tenant_id: Some(scope.tenant_id().to_string()),
            scope_type: Some(scope.provenance().as_str().to_owned()),
            ip_address: request.client_ip.clone(),
            user_agent: request.user_agent.clone(),
        };

        Self {
            pipeline,
            scope,
            actor,
            request: request.audit_request(),
            started: Instant::now(),
            status: None,
        }
    }

    fn finish(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for CompletionAudit {
    fn drop(&mut self) {
        let (action, outcome, severity) = match self.status {
            Some(status) if status >= 500 => {
                (AuditAction::RequestCompleted, "completed", Severity::Medium)
            }
            Some(_) => (AuditAction::RequestCompleted, "completed", Severity::Info),
            None => (AuditAction::RequestAborted, "aborted", Severity::Low),
        };
        let severity = if self.scope.is_override() {
            severity.max(Severity::High)
        } else {
            severity
        };
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.pipeline.emit(
            AuditDescriptor::new(
                "http_request",
                action.as_str(),
                severity,
                format!("{} {} {outcome}", self.request.method, self.request.path),
            ),
            AuditContext::new(
                self.scope.trace_id().clone(),
                ChainScope::tenant(self.scope.tenant_id()),
                std::mem::take(&mut self.actor),
            )
            .with_request(std::mem::take(&mut self.request))
            .with_response(ResponseDescriptor {
                status: self.status,
                outcome: outcome.to_owned(),
                duration_ms,
            }),
        );
    }
}
