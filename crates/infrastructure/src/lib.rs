//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_audit_sink;
mod in_memory_audit_store;
mod in_memory_tenant_repository;
mod json_lines_fallback_sink;
mod postgres_audit_store;
mod postgres_tenant_repository;

pub use http_audit_sink::HttpAuditSink;
pub use in_memory_audit_store::InMemoryAuditStore;
pub use in_memory_tenant_repository::InMemoryTenantRepository;
pub use json_lines_fallback_sink::JsonLinesFallbackSink;
pub use postgres_audit_store::PostgresAuditStore;
pub use postgres_tenant_repository::PostgresTenantRepository;
