//! Tenant scope enforcement.
//!
//! Every request touching tenant data passes through
//! [`TenantScopeEnforcer::enforce`], which either returns an immutable
//! [`ScopeDescriptor`] or fails closed. Each invocation produces exactly one
//! audit event; override decisions are awaited, routine grants are not.

use std::sync::Arc;

use bastion_core::{AppError, IdentityContext, TenantId, TraceId};
use bastion_domain::{AuditAction, ChainScope, Principal, ScopeError, Severity, Tenant};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::audit_event::{ActorDescriptor, AuditContext, AuditDescriptor, RequestDescriptor};
use crate::audit_pipeline::AuditPipeline;
use crate::override_policy::{
    OverrideMarkers, OverridePolicy, OverrideRequirements, validate_markers,
};
use crate::scope_descriptor::{OverrideMetadata, ScopeDescriptor};
use crate::tenant_ports::TenantRepository;

const AUDIT_RESOURCE: &str = "tenant_scope";

/// Enforcement settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEnforcementConfig {
    /// Minimum override reason length.
    pub reason_min_length: usize,
    /// Minimum override justification length on critical paths.
    pub justification_min_length: usize,
    /// Path prefixes that require an override justification.
    pub critical_path_prefixes: Vec<String>,
}

impl Default for ScopeEnforcementConfig {
    fn default() -> Self {
        Self {
            reason_min_length: 10,
            justification_min_length: 20,
            critical_path_prefixes: vec![
                "/api/documents".to_owned(),
                "/api/billing".to_owned(),
                "/api/exports".to_owned(),
            ],
        }
    }
}

impl ScopeEnforcementConfig {
    /// Whether `path` equals or lies beneath a critical prefix.
    #[must_use]
    pub fn is_critical_path(&self, path: &str) -> bool {
        self.critical_path_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn requirements(&self) -> OverrideRequirements {
        OverrideRequirements {
            reason_min_length: self.reason_min_length,
            justification_min_length: self.justification_min_length,
        }
    }
}

/// Everything the enforcer needs to know about one request.
#[derive(Debug, Clone)]
pub struct ScopeRequest {
    /// Verified identity, absent for anonymous requests.
    pub identity: Option<IdentityContext>,
    /// Override markers, possibly empty.
    pub override_markers: OverrideMarkers,
    /// Trace id for the request.
    pub trace_id: TraceId,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Decoded query parameters.
    pub query: Vec<(String, String)>,
    /// Client address.
    pub client_ip: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl ScopeRequest {
    /// Request for `method path` with no identity, markers or client details.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>, trace_id: TraceId) -> Self {
        Self {
            identity: None,
            override_markers: OverrideMarkers::default(),
            trace_id,
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            client_ip: None,
            user_agent: None,
        }
    }

    /// Attaches the verified identity.
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityContext) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches override markers.
    #[must_use]
    pub fn with_override(mut self, markers: OverrideMarkers) -> Self {
        self.override_markers = markers;
        self
    }

    /// Request details recorded with audit events.
    #[must_use]
    pub fn audit_request(&self) -> RequestDescriptor {
        RequestDescriptor {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            body: None,
        }
    }

    fn anonymous_actor(&self) -> ActorDescriptor {
        ActorDescriptor {
            ip_address: self.client_ip.clone(),
            user_agent: self.user_agent.clone(),
            ..ActorDescriptor::default()
        }
    }

    fn actor(&self, principal: &Principal) -> ActorDescriptor {
        ActorDescriptor {
            principal_id: Some(principal.principal_id().to_owned()),
            role: Some(principal.role().as_str().to_owned()),
            bound_tenant_id: principal.bound_tenant_id().map(ToString::to_string),
            ..self.anonymous_actor()
        }
    }
}

/// One enforcement outcome together with the single audit event it owes.
struct Decision {
    outcome: Result<ScopeDescriptor, ScopeError>,
    audit: AuditDescriptor,
    chain_scope: ChainScope,
    actor: ActorDescriptor,
    awaited: bool,
}

impl Decision {
    fn denied(
        error: ScopeError,
        action: AuditAction,
        severity: Severity,
        actor: ActorDescriptor,
        metadata: Value,
    ) -> Self {
        let mut metadata = match metadata {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        metadata.insert("code".to_owned(), json!(error.code().as_str()));
        metadata.insert("reason".to_owned(), json!(error.to_string()));

        Self {
            audit: AuditDescriptor::new(
                AUDIT_RESOURCE,
                action.as_str(),
                severity,
                format!("tenant scope denied: {error}"),
            )
            .with_metadata(Value::Object(metadata)),
            outcome: Err(error),
            chain_scope: ChainScope::platform(),
            actor,
            awaited: severity >= Severity::High,
        }
    }
}

/// Resolves identity context into a tenant scope, fail-closed.
#[derive(Clone)]
pub struct TenantScopeEnforcer {
    tenant_repository: Arc<dyn TenantRepository>,
    override_policy: Arc<dyn OverridePolicy>,
    audit_pipeline: AuditPipeline,
    config: Arc<ScopeEnforcementConfig>,
}

impl TenantScopeEnforcer {
    /// Creates an enforcer.
    #[must_use]
    pub fn new(
        tenant_repository: Arc<dyn TenantRepository>,
        override_policy: Arc<dyn OverridePolicy>,
        audit_pipeline: AuditPipeline,
        config: ScopeEnforcementConfig,
    ) -> Self {
        Self {
            tenant_repository,
            override_policy,
            audit_pipeline,
            config: Arc::new(config),
        }
    }

    /// Returns the enforcement settings.
    #[must_use]
    pub fn config(&self) -> &ScopeEnforcementConfig {
        &self.config
    }

    /// Resolves the request's tenant scope and records the decision.
    pub async fn enforce(&self, request: &ScopeRequest) -> Result<ScopeDescriptor, ScopeError> {
        let decision = self.decide(request).await;

        let context = AuditContext::new(
            request.trace_id.clone(),
            decision.chain_scope,
            decision.actor,
        )
        .with_request(request.audit_request());
        if decision.awaited {
            let receipt = self
                .audit_pipeline
                .emit_and_wait(decision.audit, context)
                .await;
            if !receipt.is_persisted() {
                warn!(
                    trace_id = %request.trace_id,
                    audit_id = %receipt.audit_id(),
                    "scope decision audit did not reach the primary store"
                );
            }
        } else {
            self.audit_pipeline.emit(decision.audit, context);
        }

        decision.outcome
    }

    async fn decide(&self, request: &ScopeRequest) -> Decision {
        let Some(identity) = request.identity.as_ref() else {
            warn!(trace_id = %request.trace_id, path = %request.path, "request without identity context");
            return Decision::denied(
                ScopeError::Unauthenticated,
                AuditAction::UnauthenticatedAccess,
                Severity::Critical,
                request.anonymous_actor(),
                Value::Null,
            );
        };

        let principal = match Principal::from_identity(identity, request.trace_id.clone()) {
            Ok(principal) => principal,
            Err(failure) => {
                let reason = match failure {
                    AppError::Validation(message) => message,
                    other => other.to_string(),
                };
                warn!(
                    trace_id = %request.trace_id,
                    principal_id = %identity.principal_id(),
                    raw_role = %identity.raw_role(),
                    reason = %reason,
                    "identity context rejected"
                );
                let actor = ActorDescriptor {
                    principal_id: Some(identity.principal_id().to_owned()),
                    role: Some(identity.raw_role().to_owned()),
                    bound_tenant_id: identity.bound_tenant_id().map(str::to_owned),
                    ..request.anonymous_actor()
                };
                return Decision::denied(
                    ScopeError::InvalidIdentity { reason },
                    AuditAction::UnauthenticatedAccess,
                    Severity::Critical,
                    actor,
                    Value::Null,
                );
            }
        };

        if request.override_markers.is_present() {
            self.decide_override(request, &principal).await
        } else {
            self.decide_standard(request, &principal).await
        }
    }

    async fn decide_standard(&self, request: &ScopeRequest, principal: &Principal) -> Decision {
        let actor = request.actor(principal);
        let Some(tenant_id) = principal.bound_tenant_id() else {
            return Decision::denied(
                ScopeError::TenantUnbound,
                AuditAction::ScopeDenied,
                Severity::Medium,
                actor,
                Value::Null,
            );
        };

        let tenant = match self.load_active_tenant(tenant_id).await {
            Ok(tenant) => tenant,
            Err(TenantLoadError::Invalid(error)) => {
                return Decision::denied(
                    error,
                    AuditAction::ScopeDenied,
                    Severity::Medium,
                    actor,
                    json!({ "tenantId": tenant_id }),
                );
            }
            Err(TenantLoadError::Fault(failure)) => {
                return self.engine_fault(request, actor, &failure);
            }
        };

        let descriptor = ScopeDescriptor::standard(
            tenant.id().clone(),
            principal.principal_id(),
            request.trace_id.clone(),
            Utc::now(),
        );
        debug!(
            trace_id = %request.trace_id,
            tenant_id = %descriptor.tenant_id(),
            principal_id = %principal.principal_id(),
            "tenant scope enforced"
        );

        Decision {
            audit: AuditDescriptor::new(
                AUDIT_RESOURCE,
                AuditAction::ScopeEnforced.as_str(),
                Severity::Info,
                "tenant scope enforced",
            )
            .with_metadata(json!({ "residencyRegion": tenant.residency_region() })),
            chain_scope: ChainScope::tenant(descriptor.tenant_id()),
            actor: scoped_actor(actor, &descriptor),
            outcome: Ok(descriptor),
            awaited: false,
        }
    }

    async fn decide_override(&self, request: &ScopeRequest, principal: &Principal) -> Decision {
        let actor = request.actor(principal);
        let markers = &request.override_markers;
        let critical_path = self.config.is_critical_path(&request.path);
        let attempt = json!({
            "targetTenantId": markers.target_tenant_id,
            "overrideReason": markers.reason,
            "overrideJustification": markers.justification,
            "criticalPath": critical_path,
        });

        match self.override_policy.may_override(principal).await {
            Ok(true) => {}
            Ok(false) => {
                return self.override_denied(
                    request,
                    ScopeError::OverrideRejected {
                        reason: "role is not permitted to override tenant scope".to_owned(),
                    },
                    actor,
                    attempt,
                );
            }
            Err(failure) => return self.engine_fault(request, actor, &failure),
        }

        let validated = match validate_markers(markers, critical_path, self.config.requirements()) {
            Ok(validated) => validated,
            Err(error) => return self.override_denied(request, error, actor, attempt),
        };

        let tenant = match self.load_active_tenant(&validated.target_tenant_id).await {
            Ok(tenant) => tenant,
            Err(TenantLoadError::Invalid(error)) => {
                return self.override_denied(request, error, actor, attempt);
            }
            Err(TenantLoadError::Fault(failure)) => {
                return self.engine_fault(request, actor, &failure);
            }
        };

        let descriptor = ScopeDescriptor::sovereign_override(
            tenant.id().clone(),
            request.trace_id.clone(),
            OverrideMetadata {
                actor: principal.principal_id().to_owned(),
                actor_role: principal.role(),
                reason: validated.reason,
                justification: validated.justification,
                granted_at: Utc::now(),
            },
        );
        warn!(
            trace_id = %request.trace_id,
            principal_id = %principal.principal_id(),
            role = %principal.role(),
            tenant_id = %descriptor.tenant_id(),
            critical_path,
            "sovereign override granted"
        );

        Decision {
            audit: AuditDescriptor::new(
                AUDIT_RESOURCE,
                AuditAction::SovereignOverrideGranted.as_str(),
                Severity::High,
                format!("sovereign override into tenant {}", descriptor.tenant_id()),
            )
            .with_metadata(attempt),
            chain_scope: ChainScope::tenant(descriptor.tenant_id()),
            actor: scoped_actor(actor, &descriptor),
            outcome: Ok(descriptor),
            awaited: true,
        }
    }

    fn override_denied(
        &self,
        request: &ScopeRequest,
        error: ScopeError,
        actor: ActorDescriptor,
        attempt: Value,
    ) -> Decision {
        warn!(
            trace_id = %request.trace_id,
            principal_id = actor.principal_id.as_deref().unwrap_or_default(),
            error = %error,
            "sovereign override denied"
        );
        Decision::denied(
            error,
            AuditAction::SovereignOverrideDenied,
            Severity::High,
            actor,
            attempt,
        )
    }

    fn engine_fault(
        &self,
        request: &ScopeRequest,
        actor: ActorDescriptor,
        failure: &AppError,
    ) -> Decision {
        error!(
            trace_id = %request.trace_id,
            path = %request.path,
            error = %failure,
            "tenant scope engine fault"
        );
        let mut decision = Decision::denied(
            ScopeError::EngineFault,
            AuditAction::EngineFault,
            Severity::Critical,
            actor,
            Value::Null,
        );
        // Fault audits are best-effort.
        decision.awaited = false;
        decision
    }

    async fn load_active_tenant(&self, tenant_id: &TenantId) -> Result<Tenant, TenantLoadError> {
        let tenant = self
            .tenant_repository
            .find_tenant(tenant_id)
            .await
            .map_err(TenantLoadError::Fault)?
            .ok_or_else(|| {
                TenantLoadError::Invalid(ScopeError::TenantInvalid {
                    reason: "tenant not found".to_owned(),
                })
            })?;

        tenant.ensure_accessible().map_err(TenantLoadError::Invalid)?;
        Ok(tenant)
    }
}

enum TenantLoadError {
    Invalid(ScopeError),
    Fault(AppError),
}

fn scoped_actor(actor: ActorDescriptor, descriptor: &ScopeDescriptor) -> ActorDescriptor {
    ActorDescriptor {
        scoped_tenant_id: Some(descriptor.tenant_id().to_string()),
        scope_type: Some(descriptor.provenance().as_str().to_owned()),
        ..actor
    }
}

#[cfg(test)]
mod tests;
