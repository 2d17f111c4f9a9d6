//! Shared primitives for all Rust crates in Bastion.

#![forbid(unsafe_code)]

/// Identity context handed over by the authentication collaborator.
pub mod auth;
/// Request trace identifiers.
pub mod trace;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::IdentityContext;
pub use trace::TraceId;

/// Result type used across Bastion crates.
pub type AppResult<T> = Result<T, AppError>;

/// Maximum accepted tenant identifier length.
pub const TENANT_ID_MAX_LENGTH: usize = 64;

/// Tenant identifier used as the partition key for every scoped resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a validated tenant identifier.
    ///
    /// Identifiers are trimmed and must consist of ASCII letters, digits, `-`,
    /// `_` or `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "tenant id must not be empty or whitespace".to_owned(),
            ));
        }

        if trimmed.len() > TENANT_ID_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "tenant id must be at most {TENANT_ID_MAX_LENGTH} characters"
            )));
        }

        if !trimmed
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || "-_.".contains(character))
        {
            return Err(AppError::Validation(
                "tenant id contains unsupported characters".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for TenantId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn tenant_id_rejects_whitespace() {
        assert!(TenantId::new("   ").is_err());
    }

    #[test]
    fn tenant_id_is_trimmed() {
        let tenant_id = TenantId::new("  T1 ");
        assert!(matches!(tenant_id, Ok(ref value) if value.as_str() == "T1"));
    }

    #[test]
    fn tenant_id_rejects_injection_characters() {
        assert!(TenantId::new("T1' OR '1'='1").is_err());
        assert!(TenantId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn tenant_id_deserialization_is_validated() {
        let parsed = serde_json::from_str::<TenantId>("\"bad id\"");
        assert!(parsed.is_err());
    }
}
