//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_chain_verifier;
mod audit_event;
mod audit_pipeline;
mod audit_ports;
mod classification;
mod digest;
mod hash_chain;
mod masking;
mod override_policy;
mod query_enrichment;
mod scope_descriptor;
mod scope_enforcer;
mod tenant_ports;
mod threat_detection;

#[cfg(test)]
mod test_support;

pub use audit_chain_verifier::AuditChainVerifier;
pub use audit_event::{
    ActorDescriptor, AuditComposer, AuditContext, AuditDescriptor, AuditEvent, MaskedRequest,
    RequestDescriptor, ResponseDescriptor,
};
pub use audit_pipeline::{
    AuditMetrics, AuditMetricsSnapshot, AuditPipeline, AuditPipelineConfig, AuditReceipt,
    DEFAULT_MAX_CHAIN_ATTEMPTS,
};
pub use audit_ports::{
    AppendOutcome, AuditAppendError, AuditSink, AuditStore, ChainHead, FallbackAuditSink,
    SealedAuditEvent,
};
pub use classification::{
    Classification, ClassificationInput, ComplianceClassifier, DEFAULT_RETENTION_YEARS,
};
pub use hash_chain::{
    ChainVerification, GENESIS_HASH, SealInput, canonicalize, link_hash, payload_hash, seal,
    verify_chain,
};
pub use masking::{
    MaskingSalt, NUL_REPLACEMENT, PayloadMasker, anonymize_ip, is_sensitive_key, mask_field,
    replace_nul, without_nul,
};
pub use override_policy::{
    OverrideMarkers, OverridePolicy, OverrideRequirements, SovereignRolePolicy, ValidatedOverride,
    validate_markers,
};
pub use query_enrichment::{ScopeGuard, TENANT_FILTER_KEY, enrich_filter, row_in_scope};
pub use scope_descriptor::{
    HEADER_SCOPE_TYPE, HEADER_SCOPED_TENANT_ID, HEADER_TRACE_ID, OverrideMetadata,
    ScopeDescriptor, ScopeProvenance, ScopeView,
};
pub use scope_enforcer::{ScopeEnforcementConfig, ScopeRequest, TenantScopeEnforcer};
pub use tenant_ports::TenantRepository;
pub use threat_detection::{ThreatDetector, ThreatScanInput, escalate_severity};
