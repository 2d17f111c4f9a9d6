use std::fmt::{Display, Formatter};

use bastion_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

/// Audit severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Routine activity.
    Info,
    /// Noteworthy but expected activity.
    Low,
    /// Denied or unusual activity.
    Medium,
    /// Privileged or suspicious activity requiring review.
    High,
    /// Security-relevant failure requiring immediate attention.
    Critical,
}

impl Severity {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parses a severity, ignoring case.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(AppError::Validation(format!("unknown severity '{value}'"))),
        }
    }
}

/// Stable audit actions emitted by the scope engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Standard tenant scope granted.
    ScopeEnforced,
    /// Standard tenant scope denied.
    ScopeDenied,
    /// Request arrived without identity.
    UnauthenticatedAccess,
    /// Cross-tenant override granted.
    SovereignOverrideGranted,
    /// Cross-tenant override denied.
    SovereignOverrideDenied,
    /// Scope engine failed internally.
    EngineFault,
    /// Scoped request finished.
    RequestCompleted,
    /// Scoped request was abandoned before completion.
    RequestAborted,
    /// Data access attempted without a scope.
    UnscopedDataAccess,
    /// Data from another tenant surfaced inside a scope.
    SovereigntyBreach,
}

impl AuditAction {
    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScopeEnforced => "tenant_scope.enforced",
            Self::ScopeDenied => "tenant_scope.denied",
            Self::UnauthenticatedAccess => "tenant_scope.unauthenticated",
            Self::SovereignOverrideGranted => "sovereign_override.granted",
            Self::SovereignOverrideDenied => "sovereign_override.denied",
            Self::EngineFault => "tenant_scope.engine_fault",
            Self::RequestCompleted => "request.completed",
            Self::RequestAborted => "request.aborted",
            Self::UnscopedDataAccess => "tenant_scope.unscoped_access",
            Self::SovereigntyBreach => "tenant_scope.sovereignty_breach",
        }
    }
}

const PLATFORM_CHAIN: &str = "platform";
const TENANT_CHAIN_PREFIX: &str = "tenant:";

/// Hash-chain partition key. Each scope is an independent append-only chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainScope(String);

impl ChainScope {
    /// Chain for events attributable to one tenant.
    #[must_use]
    pub fn tenant(tenant_id: &TenantId) -> Self {
        Self(format!("{TENANT_CHAIN_PREFIX}{tenant_id}"))
    }

    /// Chain for events with no trustworthy tenant attribution.
    #[must_use]
    pub fn platform() -> Self {
        Self(PLATFORM_CHAIN.to_owned())
    }

    /// Restores a chain scope from its storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        if value == PLATFORM_CHAIN {
            return Ok(Self::platform());
        }

        let tenant = value.strip_prefix(TENANT_CHAIN_PREFIX).ok_or_else(|| {
            AppError::Validation(format!("unknown audit chain scope '{value}'"))
        })?;
        Ok(Self::tenant(&TenantId::new(tenant)?))
    }

    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ChainScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Compliance categories and their retention obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceCategory {
    /// Billing, payments and trust-account movements.
    FinancialRecords,
    /// Privileged legal work product and case material.
    LegalPrivilege,
    /// Health-related personal information.
    HealthInformation,
    /// Personal data of users, contacts or clients.
    PersonalData,
    /// Access-control decisions, overrides and security events.
    AccessGovernance,
}

impl ComplianceCategory {
    /// Returns all categories.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ComplianceCategory] = &[
            ComplianceCategory::FinancialRecords,
            ComplianceCategory::LegalPrivilege,
            ComplianceCategory::HealthInformation,
            ComplianceCategory::PersonalData,
            ComplianceCategory::AccessGovernance,
        ];

        ALL
    }

    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialRecords => "FINANCIAL_RECORDS",
            Self::LegalPrivilege => "LEGAL_PRIVILEGE",
            Self::HealthInformation => "HEALTH_INFORMATION",
            Self::PersonalData => "PERSONAL_DATA",
            Self::AccessGovernance => "ACCESS_GOVERNANCE",
        }
    }

    /// Minimum number of years records in this category are retained.
    #[must_use]
    pub fn retention_years(&self) -> u16 {
        match self {
            Self::FinancialRecords => 7,
            Self::LegalPrivilege => 10,
            Self::HealthInformation => 6,
            Self::PersonalData => 3,
            Self::AccessGovernance => 7,
        }
    }
}

/// Kind of suspicious signature observed in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatKind {
    /// SQL-injection-like payload.
    SqlInjection,
    /// Script or markup injection.
    CrossSiteScripting,
    /// Directory traversal sequences.
    PathTraversal,
    /// Shell command chaining.
    CommandInjection,
    /// User agent of a known scanning or attack tool.
    MaliciousUserAgent,
}

/// Detection-only annotation attached to an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatIndicator {
    /// Signature family.
    pub kind: ThreatKind,
    /// Where in the request the signature matched, e.g. `query.q`.
    pub location: String,
}
