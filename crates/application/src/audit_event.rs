//! Audit event body and its composition from raw call-site descriptors.
//!
//! Composition is where classification, masking, IP anonymization and
//! threat annotation happen. The resulting [`AuditEvent`] is what gets
//! hash-chained; nothing unmasked leaves this module.

use bastion_core::{AppResult, TraceId};
use bastion_domain::{ChainScope, ComplianceCategory, Severity, ThreatIndicator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::classification::{ClassificationInput, ComplianceClassifier};
use crate::masking::{MaskingSalt, PayloadMasker, anonymize_ip};
use crate::threat_detection::{ThreatDetector, ThreatScanInput, escalate_severity};

/// Raw audit descriptor supplied by a call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDescriptor {
    /// Logical resource, e.g. `tenant_scope` or `document`.
    pub resource: String,
    /// Action performed on the resource.
    pub action: String,
    /// Caller-assessed severity; threat findings may raise it.
    pub severity: Severity,
    /// Human-readable summary.
    pub summary: String,
    /// Free-form context; masked before persistence.
    #[serde(default)]
    pub metadata: Value,
}

impl AuditDescriptor {
    /// Creates a descriptor without metadata.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        severity: Severity,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            severity,
            summary: summary.into(),
            metadata: Value::Null,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Who acted, as far as the engine knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDescriptor {
    /// Principal identifier, if an identity was presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    /// Normalized role or, for rejected identities, the raw value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Tenant the principal is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_tenant_id: Option<String>,
    /// Tenant the request was scoped to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoped_tenant_id: Option<String>,
    /// `standard` or `override`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<String>,
    /// Client address; truncated during composition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Client user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Ambient request information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Decoded query parameters in arrival order.
    pub query: Vec<(String, String)>,
    /// Request body, when the call site chose to record it.
    pub body: Option<Value>,
}

/// Ambient response information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    /// HTTP status; absent when the request was abandoned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// `completed`, `aborted` or `denied`.
    pub outcome: String,
    /// Time from enforcement to completion.
    pub duration_ms: u64,
}

/// Ambient context accompanying a descriptor.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// Trace id of the originating request.
    pub correlation_id: TraceId,
    /// Chain the event is appended to.
    pub chain_scope: ChainScope,
    /// Acting principal.
    pub actor: ActorDescriptor,
    /// Originating request, if any.
    pub request: Option<RequestDescriptor>,
    /// Response, once known.
    pub response: Option<ResponseDescriptor>,
}

impl AuditContext {
    /// Context with only a correlation id, chain and actor.
    #[must_use]
    pub fn new(correlation_id: TraceId, chain_scope: ChainScope, actor: ActorDescriptor) -> Self {
        Self {
            correlation_id,
            chain_scope,
            actor,
            request: None,
            response: None,
        }
    }

    /// Attaches request information.
    #[must_use]
    pub fn with_request(mut self, request: RequestDescriptor) -> Self {
        self.request = Some(request);
        self
    }

    /// Attaches response information.
    #[must_use]
    pub fn with_response(mut self, response: ResponseDescriptor) -> Self {
        self.response = Some(response);
        self
    }
}

/// Request information after masking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path with free-text PII scrubbed.
    pub path: String,
    /// Masked query parameters as an object.
    pub query: Value,
    /// Masked body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Event body that is hash-chained and persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event id.
    pub audit_id: Uuid,
    /// Trace id of the originating request.
    pub correlation_id: TraceId,
    /// Time of composition.
    pub timestamp: DateTime<Utc>,
    /// Logical resource.
    pub resource: String,
    /// Logical action.
    pub action: String,
    /// Final severity after threat escalation.
    pub severity: Severity,
    /// Human-readable summary with free-text PII scrubbed.
    pub summary: String,
    /// Acting principal.
    pub actor: ActorDescriptor,
    /// Masked request information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<MaskedRequest>,
    /// Response information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseDescriptor>,
    /// Masked caller metadata.
    pub metadata: Value,
    /// Detection-only threat annotations.
    pub threats: Vec<ThreatIndicator>,
    /// Matched compliance categories.
    pub compliance_tags: Vec<ComplianceCategory>,
    /// Retention obligation in years.
    pub retention_years: u16,
}

/// Turns descriptors plus context into masked, classified event bodies.
pub struct AuditComposer {
    classifier: ComplianceClassifier,
    masker: PayloadMasker,
    detector: ThreatDetector,
    salt: MaskingSalt,
}

impl AuditComposer {
    /// Builds a composer with the given retention default and masking salt.
    pub fn new(default_retention_years: u16, salt: MaskingSalt) -> AppResult<Self> {
        Ok(Self {
            classifier: ComplianceClassifier::new(default_retention_years)?,
            masker: PayloadMasker::new()?,
            detector: ThreatDetector,
            salt,
        })
    }

    /// Composes one event. Pure apart from the supplied id and clock value.
    #[must_use]
    pub fn compose(
        &self,
        audit_id: Uuid,
        timestamp: DateTime<Utc>,
        descriptor: AuditDescriptor,
        context: &AuditContext,
    ) -> AuditEvent {
        let request = context.request.as_ref();
        let body = request
            .and_then(|request| request.body.as_ref())
            .unwrap_or(&Value::Null);

        let classification = self.classifier.classify(ClassificationInput {
            method: request.map(|request| request.method.as_str()),
            path: request.map(|request| request.path.as_str()),
            resource: descriptor.resource.as_str(),
            action: descriptor.action.as_str(),
            metadata: &descriptor.metadata,
        });

        let mut threats = self.detector.scan(ThreatScanInput {
            path: request.map(|request| request.path.as_str()),
            query: request
                .map(|request| request.query.as_slice())
                .unwrap_or_default(),
            body,
            user_agent: context.actor.user_agent.as_deref(),
        });
        threats.extend(
            self.detector
                .scan(ThreatScanInput {
                    path: None,
                    query: &[],
                    body: &descriptor.metadata,
                    user_agent: None,
                })
                .into_iter()
                .map(|mut finding| {
                    finding.location = finding.location.replacen("body", "metadata", 1);
                    finding
                }),
        );

        let mut actor = context.actor.clone();
        actor.ip_address = actor.ip_address.as_deref().and_then(anonymize_ip);

        AuditEvent {
            audit_id,
            correlation_id: context.correlation_id.clone(),
            timestamp,
            severity: escalate_severity(descriptor.severity, &threats),
            summary: self.masker.scrub_text(&descriptor.summary),
            metadata: self.masker.mask(&descriptor.metadata, &self.salt),
            resource: descriptor.resource,
            action: descriptor.action,
            actor,
            request: request.map(|request| self.mask_request(request)),
            response: context.response.clone(),
            threats,
            compliance_tags: classification.categories,
            retention_years: classification.retention_years,
        }
    }

    fn mask_request(&self, request: &RequestDescriptor) -> MaskedRequest {
        let query = request
            .query
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect::<Map<_, _>>();

        MaskedRequest {
            method: request.method.clone(),
            path: self.masker.scrub_text(&request.path),
            query: self.masker.mask(&Value::Object(query), &self.salt),
            body: request
                .body
                .as_ref()
                .map(|body| self.masker.mask(body, &self.salt)),
        }
    }
}
