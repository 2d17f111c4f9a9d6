use std::sync::Arc;

use bastion_core::{IdentityContext, TraceId};
use bastion_domain::{ChainScope, ScopeError, ScopeErrorCode, Severity, TenantStatus};
use serde_json::json;

use crate::audit_ports::SealedAuditEvent;
use crate::override_policy::{OverrideMarkers, SovereignRolePolicy};
use crate::test_support::{FakeTenantRepository, PipelineHarness, pipeline_harness, tenant_id};

use super::{ScopeEnforcementConfig, ScopeRequest, TenantScopeEnforcer};

struct EnforcerHarness {
    enforcer: TenantScopeEnforcer,
    tenants: Arc<FakeTenantRepository>,
    audit: PipelineHarness,
}

impl EnforcerHarness {
    fn new() -> Self {
        let tenants = Arc::new(FakeTenantRepository::with_tenants(vec![
            ("T1", TenantStatus::Active, false),
            ("T2", TenantStatus::Active, false),
            ("T3", TenantStatus::Suspended, false),
            ("T4", TenantStatus::Active, true),
        ]));
        let audit = pipeline_harness(Vec::new());
        let enforcer = TenantScopeEnforcer::new(
            tenants.clone(),
            Arc::new(SovereignRolePolicy),
            audit.pipeline.clone(),
            ScopeEnforcementConfig::default(),
        );

        Self {
            enforcer,
            tenants,
            audit,
        }
    }

    async fn audit_events(&self) -> Vec<SealedAuditEvent> {
        self.audit.pipeline.flush().await;
        self.audit.store.all_events().await
    }
}

fn request(path: &str, role: &str, bound_tenant_id: Option<&str>) -> ScopeRequest {
    ScopeRequest::new("GET", path, TraceId::new()).with_identity(IdentityContext::new(
        "principal-1",
        role,
        bound_tenant_id.map(str::to_owned),
    ))
}

fn support_override(target: &str, justification: Option<&str>) -> OverrideMarkers {
    OverrideMarkers {
        target_tenant_id: Some(target.to_owned()),
        reason: Some("support ticket #4421 investigation".to_owned()),
        justification: justification.map(str::to_owned),
    }
}

fn single_event(events: &[SealedAuditEvent]) -> &SealedAuditEvent {
    assert_eq!(events.len(), 1, "expected exactly one audit event");
    &events[0]
}

#[tokio::test]
async fn bound_principal_receives_standard_scope() {
    let harness = EnforcerHarness::new();

    let Ok(descriptor) = harness
        .enforcer
        .enforce(&request("/api/matters", "ATTORNEY", Some("T1")))
        .await
    else {
        panic!("standard scope should be granted");
    };

    assert_eq!(descriptor.tenant_id().as_str(), "T1");
    assert!(!descriptor.is_override());
    assert!(descriptor.is_intact());

    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::Info);
    assert_eq!(event.chain_scope, ChainScope::tenant(&tenant_id("T1")));
    assert_eq!(event.payload["action"], json!("tenant_scope.enforced"));
    assert_eq!(event.payload["actor"]["scopedTenantId"], json!("T1"));
}

#[tokio::test]
async fn missing_identity_fails_closed_with_one_critical_event() {
    let harness = EnforcerHarness::new();

    let result = harness
        .enforcer
        .enforce(&ScopeRequest::new("GET", "/api/matters", TraceId::new()))
        .await;

    assert_eq!(result, Err(ScopeError::Unauthenticated));
    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::Critical);
    assert_eq!(event.chain_scope, ChainScope::platform());
    assert_eq!(harness.tenants.lookups(), 0);
}

#[tokio::test]
async fn unknown_role_is_rejected_as_invalid_identity() {
    let harness = EnforcerHarness::new();

    let result = harness
        .enforcer
        .enforce(&request("/api/matters", "JANITOR", Some("T1")))
        .await;

    let Err(error) = result else {
        panic!("unknown role must not be scoped");
    };
    assert_eq!(error.code(), ScopeErrorCode::SovereignContextError);
    let events = harness.audit_events().await;
    assert_eq!(single_event(&events).severity, Severity::Critical);
}

#[tokio::test]
async fn unbound_standard_principal_never_gets_a_descriptor() {
    let harness = EnforcerHarness::new();

    let result = harness
        .enforcer
        .enforce(&request("/api/matters", "PARALEGAL", None))
        .await;

    assert_eq!(result, Err(ScopeError::TenantUnbound));
    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::Medium);
    assert_eq!(event.payload["metadata"]["code"], json!("JURISDICTION_NOT_FOUND"));
}

#[tokio::test]
async fn inactive_or_deleted_tenant_fails_validation() {
    let harness = EnforcerHarness::new();

    for (tenant, reason) in [
        ("T3", "tenant is suspended"),
        ("T4", "tenant has been deleted"),
        ("T9", "tenant not found"),
    ] {
        let result = harness
            .enforcer
            .enforce(&request("/api/matters", "STAFF", Some(tenant)))
            .await;

        let Err(error) = result else {
            panic!("tenant {tenant} must not be scoped");
        };
        assert_eq!(error.code(), ScopeErrorCode::TenantValidationFailed);
        assert_eq!(
            error,
            ScopeError::TenantInvalid {
                reason: reason.to_owned()
            }
        );
    }
}

#[tokio::test]
async fn sovereign_override_on_regular_path_scopes_into_target() {
    let harness = EnforcerHarness::new();
    let request = request("/api/matters/77", "super_admin", None)
        .with_override(support_override("T2", None));

    let Ok(descriptor) = harness.enforcer.enforce(&request).await else {
        panic!("override should be granted");
    };

    assert_eq!(descriptor.tenant_id().as_str(), "T2");
    assert!(descriptor.is_override());
    let Some(meta) = descriptor.override_meta() else {
        panic!("override metadata expected");
    };
    assert_eq!(meta.reason, "support ticket #4421 investigation");

    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.chain_scope, ChainScope::tenant(&tenant_id("T2")));
    assert_eq!(event.payload["action"], json!("sovereign_override.granted"));
    assert_eq!(
        event.payload["metadata"]["overrideReason"],
        json!("support ticket #4421 investigation")
    );
}

#[tokio::test]
async fn critical_path_override_without_justification_is_rejected() {
    let harness = EnforcerHarness::new();
    let request = request("/api/documents/9", "SUPER_ADMIN", None)
        .with_override(support_override("T2", None));

    let result = harness.enforcer.enforce(&request).await;

    assert_eq!(
        result,
        Err(ScopeError::OverrideRejected {
            reason: "justification required, min 20 chars".to_owned()
        })
    );
    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.payload["action"], json!("sovereign_override.denied"));
    assert_eq!(harness.tenants.lookups(), 0);
}

#[tokio::test]
async fn critical_path_override_with_justification_is_granted() {
    let harness = EnforcerHarness::new();
    let request = request("/api/exports", "COMPLIANCE_AUDITOR", None).with_override(
        support_override("T2", Some("regulator inquiry 2026-114 requires export review")),
    );

    let Ok(descriptor) = harness.enforcer.enforce(&request).await else {
        panic!("justified override should be granted");
    };
    assert_eq!(descriptor.tenant_id().as_str(), "T2");
}

#[tokio::test]
async fn short_reason_is_rejected_before_any_tenant_lookup() {
    let harness = EnforcerHarness::new();
    let request = request("/api/matters", "SUPER_ADMIN", None).with_override(OverrideMarkers {
        target_tenant_id: Some("T2".to_owned()),
        reason: Some("because".to_owned()),
        justification: None,
    });

    let result = harness.enforcer.enforce(&request).await;

    assert_eq!(
        result,
        Err(ScopeError::OverrideRejected {
            reason: "reason required, min 10 chars".to_owned()
        })
    );
    assert_eq!(harness.tenants.lookups(), 0);
    assert_eq!(harness.audit_events().await.len(), 1);
}

#[tokio::test]
async fn non_sovereign_override_attempt_is_rejected_and_audited() {
    let harness = EnforcerHarness::new();
    let request = request("/api/matters", "TENANT_ADMIN", Some("T1"))
        .with_override(support_override("T2", None));

    let result = harness.enforcer.enforce(&request).await;

    assert_eq!(
        result,
        Err(ScopeError::OverrideRejected {
            reason: "role is not permitted to override tenant scope".to_owned()
        })
    );
    assert_eq!(harness.tenants.lookups(), 0);
    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.chain_scope, ChainScope::platform());
}

#[tokio::test]
async fn override_into_suspended_tenant_is_rejected() {
    let harness = EnforcerHarness::new();
    let request = request("/api/matters", "PLATFORM_SUPPORT", None)
        .with_override(support_override("T3", None));

    let result = harness.enforcer.enforce(&request).await;

    assert_eq!(
        result,
        Err(ScopeError::TenantInvalid {
            reason: "tenant is suspended".to_owned()
        })
    );
    let events = harness.audit_events().await;
    assert_eq!(single_event(&events).severity, Severity::High);
}

#[tokio::test]
async fn repository_failure_is_an_opaque_retryable_fault() {
    let harness = EnforcerHarness::new();
    harness.tenants.set_unavailable();

    let result = harness
        .enforcer
        .enforce(&request("/api/matters", "ATTORNEY", Some("T1")))
        .await;

    let Err(error) = result else {
        panic!("fault must fail closed");
    };
    assert_eq!(error, ScopeError::EngineFault);
    assert!(error.is_retryable());
    assert!(!error.to_string().contains("tenants-db"));

    let events = harness.audit_events().await;
    let event = single_event(&events);
    assert_eq!(event.severity, Severity::Critical);
    assert!(!event.payload.to_string().contains("tenants-db"));
}

#[tokio::test]
async fn concurrent_requests_never_cross_tenants() {
    let harness = EnforcerHarness::new();
    let mut tasks = Vec::new();
    for index in 0..40 {
        let enforcer = harness.enforcer.clone();
        let tenant = if index % 2 == 0 { "T1" } else { "T2" };
        tasks.push(tokio::spawn(async move {
            let result = enforcer
                .enforce(&request("/api/matters", "ATTORNEY", Some(tenant)))
                .await;
            (tenant, result)
        }));
    }

    for task in tasks {
        let Ok((tenant, result)) = task.await else {
            panic!("enforcement task panicked");
        };
        let Ok(descriptor) = result else {
            panic!("standard scope should be granted");
        };
        assert_eq!(descriptor.tenant_id().as_str(), tenant);
    }

    assert_eq!(harness.audit_events().await.len(), 40);
}
