use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bastion_core::AppError;
use serde::{Deserialize, Serialize};

/// Closed set of principal roles recognized by the scope engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform operator with cross-tenant reach.
    SuperAdmin,
    /// Platform support engineer handling escalated tickets.
    PlatformSupport,
    /// Compliance reviewer performing regulatory audits.
    ComplianceAuditor,
    /// Administrator of a single tenant.
    TenantAdmin,
    /// Licensed attorney working inside a tenant.
    Attorney,
    /// Paralegal working inside a tenant.
    Paralegal,
    /// General tenant staff member.
    Staff,
    /// External client of a tenant.
    Client,
}

impl Role {
    /// Returns the canonical storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::PlatformSupport => "PLATFORM_SUPPORT",
            Self::ComplianceAuditor => "COMPLIANCE_AUDITOR",
            Self::TenantAdmin => "TENANT_ADMIN",
            Self::Attorney => "ATTORNEY",
            Self::Paralegal => "PARALEGAL",
            Self::Staff => "STAFF",
            Self::Client => "CLIENT",
        }
    }

    /// Returns whether the role belongs to the sovereign set that may request
    /// cross-tenant overrides.
    #[must_use]
    pub fn is_sovereign(&self) -> bool {
        matches!(
            self,
            Self::SuperAdmin | Self::PlatformSupport | Self::ComplianceAuditor
        )
    }

    /// Normalizes an arbitrary-case role string into a known role.
    ///
    /// Surrounding whitespace is ignored, separators (`-`, `.`, spaces) are
    /// folded into `_` and the result is matched case-insensitively.
    /// Unrecognized values are rejected.
    pub fn normalize(value: &str) -> Result<Self, AppError> {
        let folded = value
            .trim()
            .chars()
            .map(|character| match character {
                '-' | '.' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect::<String>();
        let canonical = folded
            .split('_')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        match canonical.as_str() {
            "SUPER_ADMIN" | "SUPERADMIN" => Ok(Self::SuperAdmin),
            "PLATFORM_SUPPORT" => Ok(Self::PlatformSupport),
            "COMPLIANCE_AUDITOR" => Ok(Self::ComplianceAuditor),
            "TENANT_ADMIN" => Ok(Self::TenantAdmin),
            "ATTORNEY" => Ok(Self::Attorney),
            "PARALEGAL" => Ok(Self::Paralegal),
            "STAFF" => Ok(Self::Staff),
            "CLIENT" => Ok(Self::Client),
            _ => Err(AppError::Validation(format!("unknown role '{}'", value.trim()))),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::normalize(value)
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
