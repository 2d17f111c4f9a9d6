//! Domain entities and invariants for tenant scoping and auditing.

#![forbid(unsafe_code)]

mod audit;
mod principal;
mod role;
mod scope_error;
mod tenant;

pub use audit::{
    AuditAction, ChainScope, ComplianceCategory, Severity, ThreatIndicator, ThreatKind,
};
pub use principal::Principal;
pub use role::Role;
pub use scope_error::{ScopeError, ScopeErrorCode};
pub use tenant::{Tenant, TenantStatus};
