use serde::{Deserialize, Serialize};

/// Verified identity handed over by the authentication collaborator.
///
/// Values are raw: the role string has not been normalized and the bound
/// tenant has not been validated. Normalization happens once, when the
/// context is turned into a domain principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    principal_id: String,
    role: String,
    bound_tenant_id: Option<String>,
}

impl IdentityContext {
    /// Creates an identity context from verified authentication data.
    #[must_use]
    pub fn new(
        principal_id: impl Into<String>,
        role: impl Into<String>,
        bound_tenant_id: Option<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            role: role.into(),
            bound_tenant_id,
        }
    }

    /// Returns the stable principal identifier.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        self.principal_id.as_str()
    }

    /// Returns the role exactly as the identity provider reported it.
    #[must_use]
    pub fn raw_role(&self) -> &str {
        self.role.as_str()
    }

    /// Returns the tenant binding, if any.
    #[must_use]
    pub fn bound_tenant_id(&self) -> Option<&str> {
        self.bound_tenant_id.as_deref()
    }
}
