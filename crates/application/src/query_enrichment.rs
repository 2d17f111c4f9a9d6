//! Single choke point between a scope and downstream data access.

use bastion_core::TraceId;
use bastion_domain::{AuditAction, ChainScope, ScopeError, Severity};
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::audit_event::{ActorDescriptor, AuditContext, AuditDescriptor};
use crate::audit_pipeline::AuditPipeline;
use crate::scope_descriptor::ScopeDescriptor;

/// Filter key carrying the tenant predicate.
pub const TENANT_FILTER_KEY: &str = "tenantId";

/// Scope internals that must never reach a storage query.
const STRIPPED_KEYS: &[&str] = &[
    "integrityHash",
    "isOverride",
    "overrideMeta",
    "scopeProvenance",
    "_scope",
];

/// Returns `filter` with scope internals removed and the tenant predicate set.
///
/// A caller-supplied tenant predicate is always replaced by the scoped one.
pub fn enrich_filter(
    scope: Option<&ScopeDescriptor>,
    mut filter: Map<String, Value>,
) -> Result<Map<String, Value>, ScopeError> {
    let scope = scope.ok_or(ScopeError::MissingScope)?;

    for key in STRIPPED_KEYS {
        filter.remove(*key);
    }

    let scoped = Value::String(scope.tenant_id().to_string());
    if let Some(previous) = filter.insert(TENANT_FILTER_KEY.to_owned(), scoped.clone())
        && previous != scoped
    {
        warn!(
            trace_id = %scope.trace_id(),
            tenant_id = %scope.tenant_id(),
            requested = %previous,
            "caller-supplied tenant predicate replaced by scope"
        );
    }

    Ok(filter)
}

/// Whether a row owned by `row_tenant_id` belongs to the active scope.
#[must_use]
pub fn row_in_scope(scope: &ScopeDescriptor, row_tenant_id: &str) -> bool {
    scope.tenant_id().as_str() == row_tenant_id
}

/// Enrichment and row checks that audit every violation.
#[derive(Clone)]
pub struct ScopeGuard {
    audit_pipeline: AuditPipeline,
}

impl ScopeGuard {
    /// Creates a guard emitting through `audit_pipeline`.
    #[must_use]
    pub fn new(audit_pipeline: AuditPipeline) -> Self {
        Self { audit_pipeline }
    }

    /// [`enrich_filter`], with a CRITICAL audit event when no scope is present.
    pub fn enrich(
        &self,
        scope: Option<&ScopeDescriptor>,
        filter: Map<String, Value>,
        trace_id: &TraceId,
    ) -> Result<Map<String, Value>, ScopeError> {
        enrich_filter(scope, filter).inspect_err(|failure| {
            error!(trace_id = %trace_id, "data access attempted without tenant scope");
            self.audit_pipeline.emit(
                AuditDescriptor::new(
                    "tenant_scope",
                    AuditAction::UnscopedDataAccess.as_str(),
                    Severity::Critical,
                    "data access attempted without tenant scope",
                )
                .with_metadata(json!({ "code": failure.code().as_str() })),
                AuditContext::new(
                    trace_id.clone(),
                    ChainScope::platform(),
                    ActorDescriptor::default(),
                ),
            );
        })
    }

    /// Fails with [`ScopeError::SovereigntyBreach`] and a CRITICAL audit event
    /// when a row from another tenant surfaces inside `scope`.
    pub fn ensure_row_in_scope(
        &self,
        scope: &ScopeDescriptor,
        row_tenant_id: &str,
    ) -> Result<(), ScopeError> {
        if row_in_scope(scope, row_tenant_id) {
            return Ok(());
        }

        error!(
            trace_id = %scope.trace_id(),
            tenant_id = %scope.tenant_id(),
            row_tenant_id,
            "row outside tenant scope reached the data layer boundary"
        );
        self.audit_pipeline.emit(
            AuditDescriptor::new(
                "tenant_scope",
                AuditAction::SovereigntyBreach.as_str(),
                Severity::Critical,
                "row outside tenant scope blocked",
            )
            .with_metadata(json!({
                "scopedTenantId": scope.tenant_id(),
                "rowTenantId": row_tenant_id,
                "scopeType": scope.provenance().as_str(),
            })),
            AuditContext::new(
                scope.trace_id().clone(),
                ChainScope::tenant(scope.tenant_id()),
                ActorDescriptor {
                    principal_id: Some(scope.principal_id().to_owned()),
                    scoped_tenant_id: Some(scope.tenant_id().to_string()),
                    scope_type: Some(scope.provenance().as_str().to_owned()),
                    ..ActorDescriptor::default()
                },
            ),
        );

        Err(ScopeError::SovereigntyBreach)
    }
}

#[cfg(test)]
mod tests {
    use bastion_core::TraceId;
    use bastion_domain::{ChainScope, ScopeError, Severity};
    use chrono::Utc;
    use serde_json::{Map, Value, json};

    use super::{ScopeGuard, enrich_filter, row_in_scope};
    use crate::scope_descriptor::ScopeDescriptor;
    use crate::test_support::{pipeline_harness, tenant_id};

    fn scope(tenant: &str) -> ScopeDescriptor {
        ScopeDescriptor::standard(tenant_id(tenant), "u-1", TraceId::new(), Utc::now())
    }

    fn filter(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("filter must be an object");
        };
        map
    }

    #[test]
    fn enrichment_sets_tenant_and_keeps_caller_predicates() {
        let scope = scope("T1");
        let Ok(enriched) = enrich_filter(
            Some(&scope),
            filter(json!({ "status": "open", "matterId": 12 })),
        ) else {
            panic!("enrichment should succeed");
        };

        assert_eq!(
            Value::Object(enriched),
            json!({ "status": "open", "matterId": 12, "tenantId": "T1" })
        );
    }

    #[test]
    fn enrichment_strips_scope_internals_and_overrides_tenant() {
        let scope = scope("T1");
        let Ok(enriched) = enrich_filter(
            Some(&scope),
            filter(json!({
                "tenantId": "T2",
                "integrityHash": "abc",
                "isOverride": true,
                "overrideMeta": { "reason": "x" },
                "_scope": {},
            })),
        ) else {
            panic!("enrichment should succeed");
        };

        assert_eq!(Value::Object(enriched), json!({ "tenantId": "T1" }));
    }

    #[test]
    fn enrichment_without_scope_fails_loudly() {
        assert_eq!(
            enrich_filter(None, Map::new()),
            Err(ScopeError::MissingScope)
        );
    }

    #[test]
    fn row_check_compares_exact_tenant() {
        let scope = scope("T1");
        assert!(row_in_scope(&scope, "T1"));
        assert!(!row_in_scope(&scope, "t1"));
        assert!(!row_in_scope(&scope, "T2"));
    }

    #[tokio::test]
    async fn guard_audits_unscoped_access() {
        let harness = pipeline_harness(Vec::new());
        let guard = ScopeGuard::new(harness.pipeline.clone());

        let result = guard.enrich(None, Map::new(), &TraceId::new());

        assert_eq!(result, Err(ScopeError::MissingScope));
        harness.pipeline.flush().await;
        let events = harness.store.events(&ChainScope::platform()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Critical);
        assert_eq!(
            events[0].payload["action"],
            json!("tenant_scope.unscoped_access")
        );
    }

    #[tokio::test]
    async fn guard_blocks_and_audits_foreign_rows() {
        let harness = pipeline_harness(Vec::new());
        let guard = ScopeGuard::new(harness.pipeline.clone());
        let scope = scope("T1");

        assert!(guard.ensure_row_in_scope(&scope, "T1").is_ok());
        assert_eq!(
            guard.ensure_row_in_scope(&scope, "T2"),
            Err(ScopeError::SovereigntyBreach)
        );

        harness.pipeline.flush().await;
        let events = harness
            .store
            .events(&ChainScope::tenant(&tenant_id("T1")))
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["metadata"]["rowTenantId"], json!("T2"));
    }
}
