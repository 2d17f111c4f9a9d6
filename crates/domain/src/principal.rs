use bastion_core::{AppError, AppResult, IdentityContext, TenantId, TraceId};
use serde::{Deserialize, Serialize};

use crate::Role;

/// Authenticated actor with a normalized role and optional tenant binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    principal_id: String,
    role: Role,
    bound_tenant_id: Option<TenantId>,
    trace_id: TraceId,
}

impl Principal {
    /// Creates a principal from already-validated parts.
    #[must_use]
    pub fn new(
        principal_id: impl Into<String>,
        role: Role,
        bound_tenant_id: Option<TenantId>,
        trace_id: TraceId,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            role,
            bound_tenant_id,
            trace_id,
        }
    }

    /// Resolves a raw identity context into a principal.
    ///
    /// Fails when the principal id is blank, the role is unknown or the bound
    /// tenant id is malformed.
    pub fn from_identity(identity: &IdentityContext, trace_id: TraceId) -> AppResult<Self> {
        let principal_id = identity.principal_id().trim();
        if principal_id.is_empty() {
            return Err(AppError::Validation(
                "principal id must not be empty".to_owned(),
            ));
        }

        let role = Role::normalize(identity.raw_role())?;
        let bound_tenant_id = identity
            .bound_tenant_id()
            .filter(|value| !value.trim().is_empty())
            .map(TenantId::new)
            .transpose()?;

        Ok(Self::new(principal_id, role, bound_tenant_id, trace_id))
    }

    /// Returns the stable principal identifier.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        self.principal_id.as_str()
    }

    /// Returns the normalized role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the tenant the principal is bound to, if any.
    #[must_use]
    pub fn bound_tenant_id(&self) -> Option<&TenantId> {
        self.bound_tenant_id.as_ref()
    }

    /// Returns the request trace identifier.
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }
}
