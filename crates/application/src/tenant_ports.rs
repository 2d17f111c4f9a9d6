use async_trait::async_trait;
use bastion_core::{AppResult, TenantId};
use bastion_domain::Tenant;

/// Read port for tenant records owned by the platform.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Finds a tenant record, including soft-deleted ones.
    async fn find_tenant(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>>;
}
