use std::collections::HashMap;

use async_trait::async_trait;
use bastion_application::TenantRepository;
use bastion_core::{AppResult, TenantId};
use bastion_domain::Tenant;
use tokio::sync::RwLock;

/// In-memory tenant registry for local development and tests.
#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `tenants`.
    #[must_use]
    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            tenants: RwLock::new(
                tenants
                    .into_iter()
                    .map(|tenant| (tenant.id().clone(), tenant))
                    .collect(),
            ),
        }
    }

    /// Inserts or replaces a tenant.
    pub async fn upsert(&self, tenant: Tenant) {
        self.tenants
            .write()
            .await
            .insert(tenant.id().clone(), tenant);
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_tenant(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use bastion_application::TenantRepository;
    use bastion_core::TenantId;
    use bastion_domain::{Tenant, TenantStatus};

    use super::InMemoryTenantRepository;

    #[tokio::test]
    async fn finds_upserted_tenants_only() {
        let Ok(known) = TenantId::new("T1") else {
            panic!("valid tenant id");
        };
        let Ok(unknown) = TenantId::new("T2") else {
            panic!("valid tenant id");
        };
        let tenant = Tenant::new(known.clone(), TenantStatus::Active, "eu-west", false);
        let repository = InMemoryTenantRepository::new();
        repository.upsert(tenant.clone()).await;

        let Ok(found) = repository.find_tenant(&known).await else {
            panic!("lookup should succeed");
        };
        assert_eq!(found, Some(tenant));
        assert!(matches!(repository.find_tenant(&unknown).await, Ok(None)));
    }
}
