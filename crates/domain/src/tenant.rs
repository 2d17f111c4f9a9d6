use bastion_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

use crate::ScopeError;

/// Lifecycle status of a tenant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Tenant is being created and holds no usable data yet.
    Provisioning,
    /// Tenant is live.
    Active,
    /// Tenant access is temporarily blocked.
    Suspended,
    /// Tenant has been retired.
    Archived,
    /// Tenant is frozen under a legal or compliance hold.
    Hold,
}

impl TenantStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Archived => "archived",
            Self::Hold => "hold",
        }
    }

    /// Parses a storage string into a tenant status.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "archived" => Ok(Self::Archived),
            "hold" => Ok(Self::Hold),
            _ => Err(AppError::Validation(format!(
                "unknown tenant status '{value}'"
            ))),
        }
    }
}

/// Tenant record as read by the scope engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    id: TenantId,
    status: TenantStatus,
    residency_region: String,
    is_deleted: bool,
}

impl Tenant {
    /// Creates a tenant record.
    #[must_use]
    pub fn new(
        id: TenantId,
        status: TenantStatus,
        residency_region: impl Into<String>,
        is_deleted: bool,
    ) -> Self {
        Self {
            id,
            status,
            residency_region: residency_region.into(),
            is_deleted,
        }
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub fn id(&self) -> &TenantId {
        &self.id
    }

    /// Returns the data residency region.
    #[must_use]
    pub fn residency_region(&self) -> &str {
        self.residency_region.as_str()
    }

    /// Returns whether the tenant has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Checks that the tenant may be scoped into: not deleted and active.
    pub fn ensure_accessible(&self) -> Result<(), ScopeError> {
        if self.is_deleted {
            return Err(ScopeError::TenantInvalid {
                reason: "tenant has been deleted".to_owned(),
            });
        }

        if self.status != TenantStatus::Active {
            return Err(ScopeError::TenantInvalid {
                reason: format!("tenant is {}", self.status.as_str()),
            });
        }

        Ok(())
    }
}
