//! Immutable, request-scoped tenant scope.
//!
//! Descriptors are only constructible inside this crate, by the enforcer.
//! Downstream code receives them by shared reference and cannot alter them.

use bastion_core::{TenantId, TraceId};
use bastion_domain::Role;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::digest::sha256_hex;

/// How the scope was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeProvenance {
    /// Principal's own bound tenant.
    Standard,
    /// Cross-tenant sovereign override.
    Override,
}

impl ScopeProvenance {
    /// Returns the wire value used in headers and audit records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Override => "override",
        }
    }
}

/// Who overrode, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideMetadata {
    /// Acting principal.
    pub actor: String,
    /// Acting principal's role.
    pub actor_role: Role,
    /// Reason, trimmed of surrounding whitespace.
    pub reason: String,
    /// Justification, trimmed of surrounding whitespace, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Time the override was granted.
    pub granted_at: DateTime<Utc>,
}

/// Externally visible projection of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeView {
    /// Scoped tenant.
    pub tenant_id: TenantId,
    /// Whether the scope came from an override.
    pub is_override: bool,
    /// Integrity hash binding tenant, principal and trace.
    pub integrity_hash: String,
    /// Time the scope was established.
    pub issued_at: DateTime<Utc>,
    /// Override details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_meta: Option<OverrideMetadata>,
}

/// Response headers describing the active scope.
pub const HEADER_TRACE_ID: &str = "x-trace-id";
/// Header carrying `standard` or `override`.
pub const HEADER_SCOPE_TYPE: &str = "x-scope-type";
/// Header carrying the scoped tenant id.
pub const HEADER_SCOPED_TENANT_ID: &str = "x-scoped-tenant-id";

/// Tenant scope attached to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDescriptor {
    tenant_id: TenantId,
    provenance: ScopeProvenance,
    principal_id: String,
    trace_id: TraceId,
    integrity_hash: String,
    override_meta: Option<OverrideMetadata>,
    issued_at: DateTime<Utc>,
}

impl ScopeDescriptor {
    pub(crate) fn standard(
        tenant_id: TenantId,
        principal_id: &str,
        trace_id: TraceId,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let integrity_hash = standard_integrity_hash(&tenant_id, principal_id, &trace_id);
        Self {
            tenant_id,
            provenance: ScopeProvenance::Standard,
            principal_id: principal_id.to_owned(),
            trace_id,
            integrity_hash,
            override_meta: None,
            issued_at,
        }
    }

    pub(crate) fn sovereign_override(
        tenant_id: TenantId,
        trace_id: TraceId,
        meta: OverrideMetadata,
    ) -> Self {
        let integrity_hash = override_integrity_hash(&tenant_id, &trace_id, &meta);
        Self {
            tenant_id,
            provenance: ScopeProvenance::Override,
            principal_id: meta.actor.clone(),
            trace_id,
            integrity_hash,
            issued_at: meta.granted_at,
            override_meta: Some(meta),
        }
    }

    /// Scoped tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// How the scope was obtained.
    #[must_use]
    pub fn provenance(&self) -> ScopeProvenance {
        self.provenance
    }

    /// Whether the scope came from a sovereign override.
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.provenance == ScopeProvenance::Override
    }

    /// Principal the scope was issued to.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        self.principal_id.as_str()
    }

    /// Trace id of the request.
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Integrity hash.
    #[must_use]
    pub fn integrity_hash(&self) -> &str {
        self.integrity_hash.as_str()
    }

    /// Override details, for override scopes.
    #[must_use]
    pub fn override_meta(&self) -> Option<&OverrideMetadata> {
        self.override_meta.as_ref()
    }

    /// Time the scope was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Recomputes the integrity hash and compares it to the stored one.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        let expected = match &self.override_meta {
            Some(meta) => override_integrity_hash(&self.tenant_id, &self.trace_id, meta),
            None => standard_integrity_hash(&self.tenant_id, &self.principal_id, &self.trace_id),
        };
        expected == self.integrity_hash
    }

    /// Projection returned to clients and attached to logs.
    #[must_use]
    pub fn public_view(&self) -> ScopeView {
        ScopeView {
            tenant_id: self.tenant_id.clone(),
            is_override: self.is_override(),
            integrity_hash: self.integrity_hash.clone(),
            issued_at: self.issued_at(),
            override_meta: self.override_meta.clone(),
        }
    }

    /// Header name/value pairs describing this scope.
    #[must_use]
    pub fn observability_headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_TRACE_ID, self.trace_id.to_string()),
            (HEADER_SCOPE_TYPE, self.provenance.as_str().to_owned()),
            (HEADER_SCOPED_TENANT_ID, self.tenant_id.to_string()),
        ]
    }
}

fn standard_integrity_hash(tenant_id: &TenantId, principal_id: &str, trace_id: &TraceId) -> String {
    sha256_hex(&[tenant_id.as_str(), principal_id, trace_id.as_str()])
}

fn override_integrity_hash(tenant_id: &TenantId, trace_id: &TraceId, meta: &OverrideMetadata) -> String {
    let granted_at = meta.granted_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    sha256_hex(&[
        tenant_id.as_str(),
        meta.actor.as_str(),
        trace_id.as_str(),
        meta.reason.as_str(),
        meta.justification.as_deref().unwrap_or_default(),
        granted_at.as_str(),
    ])
}

#[cfg(test)]
mod tests {
    use bastion_core::TraceId;
    use bastion_domain::Role;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::{OverrideMetadata, ScopeDescriptor, ScopeProvenance};
    use crate::test_support::tenant_id;

    #[test]
    fn standard_descriptor_binds_tenant_principal_and_trace() {
        let trace = TraceId::from_upstream(Some("trace-0001"));
        let first = ScopeDescriptor::standard(tenant_id("T1"), "u-1", trace.clone(), Utc::now());
        let second = ScopeDescriptor::standard(tenant_id("T1"), "u-1", trace, Utc::now());
        let other = ScopeDescriptor::standard(
            tenant_id("T1"),
            "u-2",
            TraceId::from_upstream(Some("trace-0001")),
            Utc::now(),
        );

        assert_eq!(first.integrity_hash(), second.integrity_hash());
        assert_ne!(first.integrity_hash(), other.integrity_hash());
        assert!(first.is_intact());
        assert_eq!(first.provenance(), ScopeProvenance::Standard);
    }

    #[test]
    fn public_view_matches_wire_shape() {
        let Some(issued_at) = DateTime::from_timestamp(1_700_000_000, 0) else {
            panic!("valid timestamp");
        };
        let descriptor = ScopeDescriptor::standard(
            tenant_id("T1"),
            "u-1",
            TraceId::from_upstream(Some("trace-0001")),
            issued_at,
        );

        let Ok(view) = serde_json::to_value(descriptor.public_view()) else {
            panic!("view should serialize");
        };
        assert_eq!(view["tenantId"], json!("T1"));
        assert_eq!(view["isOverride"], json!(false));
        assert_eq!(view["issuedAt"], json!("2023-11-14T22:13:20Z"));
        assert!(view.get("overrideMeta").is_none());
    }

    #[test]
    fn override_descriptor_carries_metadata_and_headers() {
        let descriptor = ScopeDescriptor::sovereign_override(
            tenant_id("T2"),
            TraceId::from_upstream(Some("trace-0002")),
            OverrideMetadata {
                actor: "admin-1".to_owned(),
                actor_role: Role::SuperAdmin,
                reason: "support ticket #4421 investigation".to_owned(),
                justification: None,
                granted_at: Utc::now(),
            },
        );

        assert!(descriptor.is_override());
        assert!(descriptor.is_intact());
        assert_eq!(descriptor.principal_id(), "admin-1");
        let headers = descriptor.observability_headers();
        assert_eq!(headers[1], ("x-scope-type", "override".to_owned()));
        assert_eq!(headers[2], ("x-scoped-tenant-id", "T2".to_owned()));
    }
}
