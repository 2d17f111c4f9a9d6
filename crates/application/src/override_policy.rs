//! Sovereign override authorization and marker validation.
//!
//! "May this principal override at all" is a policy question answered by an
//! [`OverridePolicy`]. Marker validation is the fixed friction every granted
//! override must pass regardless of policy.

use async_trait::async_trait;
use bastion_core::{AppResult, TenantId};
use bastion_domain::{Principal, ScopeError};

/// Raw override markers as supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMarkers {
    /// Tenant the principal wants to act inside.
    pub target_tenant_id: Option<String>,
    /// Why the override is needed.
    pub reason: Option<String>,
    /// Extended justification, mandatory on critical paths.
    pub justification: Option<String>,
}

impl OverrideMarkers {
    /// Whether any marker carries a non-blank value.
    #[must_use]
    pub fn is_present(&self) -> bool {
        [&self.target_tenant_id, &self.reason, &self.justification]
            .into_iter()
            .flatten()
            .any(|value| !value.trim().is_empty())
    }
}

/// Markers that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOverride {
    /// Target tenant.
    pub target_tenant_id: TenantId,
    /// Trimmed reason.
    pub reason: String,
    /// Trimmed justification, when supplied.
    pub justification: Option<String>,
}

/// Minimum lengths applied to override markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideRequirements {
    /// Minimum reason length in characters.
    pub reason_min_length: usize,
    /// Minimum justification length on critical paths.
    pub justification_min_length: usize,
}

/// Validates marker presence and length. Performs no I/O.
pub fn validate_markers(
    markers: &OverrideMarkers,
    critical_path: bool,
    requirements: OverrideRequirements,
) -> Result<ValidatedOverride, ScopeError> {
    let target = non_blank(markers.target_tenant_id.as_deref())
        .ok_or_else(|| rejected("override target tenant required".to_owned()))?;
    let target_tenant_id = TenantId::new(target)
        .map_err(|_| rejected("override target tenant is malformed".to_owned()))?;

    let reason = non_blank(markers.reason.as_deref())
        .filter(|reason| reason.chars().count() >= requirements.reason_min_length)
        .ok_or_else(|| {
            rejected(format!(
                "reason required, min {} chars",
                requirements.reason_min_length
            ))
        })?;

    let justification = non_blank(markers.justification.as_deref());
    if critical_path
        && justification.is_none_or(|value| {
            value.chars().count() < requirements.justification_min_length
        })
    {
        return Err(rejected(format!(
            "justification required, min {} chars",
            requirements.justification_min_length
        )));
    }

    Ok(ValidatedOverride {
        target_tenant_id,
        reason: reason.to_owned(),
        justification: justification.map(str::to_owned),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn rejected(reason: String) -> ScopeError {
    ScopeError::OverrideRejected { reason }
}

/// Decides whether a principal may request cross-tenant scope.
#[async_trait]
pub trait OverridePolicy: Send + Sync {
    /// Returns whether `principal` may request a sovereign override.
    async fn may_override(&self, principal: &Principal) -> AppResult<bool>;
}

/// Grants override capability to the closed sovereign role set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SovereignRolePolicy;

#[async_trait]
impl OverridePolicy for SovereignRolePolicy {
    async fn may_override(&self, principal: &Principal) -> AppResult<bool> {
        Ok(principal.role().is_sovereign())
    }
}
