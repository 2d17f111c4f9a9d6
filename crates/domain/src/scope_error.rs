use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Stable machine codes returned to callers for scope failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeErrorCode {
    /// Identity context missing or unusable.
    SovereignContextError,
    /// Principal has no tenant jurisdiction.
    JurisdictionNotFound,
    /// Internal failure inside the scope engine.
    TenantScopeEngineFault,
    /// Sovereign override attempt was rejected.
    IllegalOverrideAttempt,
    /// Tenant record missing, deleted or inactive.
    TenantValidationFailed,
    /// Data access outside of, or without, a tenant scope.
    DataSovereigntyBreach,
}

impl ScopeErrorCode {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SovereignContextError => "SOVEREIGN_CONTEXT_ERROR",
            Self::JurisdictionNotFound => "JURISDICTION_NOT_FOUND",
            Self::TenantScopeEngineFault => "TENANT_SCOPE_ENGINE_FAULT",
            Self::IllegalOverrideAttempt => "ILLEGAL_OVERRIDE_ATTEMPT",
            Self::TenantValidationFailed => "TENANT_VALIDATION_FAILED",
            Self::DataSovereigntyBreach => "DATA_SOVEREIGNTY_BREACH",
        }
    }
}

impl Display for ScopeErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Terminal outcome of a failed scope decision.
///
/// Messages are safe to return to clients: they name the failed
/// precondition and never carry internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// No identity context reached the engine.
    #[error("authenticated identity context is required")]
    Unauthenticated,

    /// Identity context was present but could not be normalized.
    #[error("identity context rejected: {reason}")]
    InvalidIdentity {
        /// Which part of the identity was unusable.
        reason: String,
    },

    /// Standard principal without a tenant binding.
    #[error("principal is not bound to a tenant")]
    TenantUnbound,

    /// Tenant record missing, deleted or not active.
    #[error("tenant validation failed: {reason}")]
    TenantInvalid {
        /// Which tenant check failed.
        reason: String,
    },

    /// Sovereign override rejected.
    #[error("override rejected: {reason}")]
    OverrideRejected {
        /// Which override precondition failed.
        reason: String,
    },

    /// Data access attempted without a scope descriptor.
    #[error("data access attempted without a tenant scope")]
    MissingScope,

    /// Data outside the active tenant scope reached the caller.
    #[error("record is outside the active tenant scope")]
    SovereigntyBreach,

    /// Unexpected internal failure.
    #[error("tenant scope engine fault")]
    EngineFault,
}

impl ScopeError {
    /// Returns the stable machine code.
    #[must_use]
    pub fn code(&self) -> ScopeErrorCode {
        match self {
            Self::Unauthenticated | Self::InvalidIdentity { .. } => {
                ScopeErrorCode::SovereignContextError
            }
            Self::TenantUnbound => ScopeErrorCode::JurisdictionNotFound,
            Self::TenantInvalid { .. } => ScopeErrorCode::TenantValidationFailed,
            Self::OverrideRejected { .. } => ScopeErrorCode::IllegalOverrideAttempt,
            Self::MissingScope | Self::SovereigntyBreach => ScopeErrorCode::DataSovereigntyBreach,
            Self::EngineFault => ScopeErrorCode::TenantScopeEngineFault,
        }
    }

    /// Returns whether the caller may retry the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EngineFault)
    }
}
