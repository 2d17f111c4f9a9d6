use async_trait::async_trait;
use bastion_application::TenantRepository;
use bastion_core::{AppError, AppResult, TenantId};
use bastion_domain::{Tenant, TenantStatus};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed tenant registry reader.
#[derive(Clone)]
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TenantRow {
    id: String,
    status: String,
    residency_region: String,
    is_deleted: bool,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = AppError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant::new(
            TenantId::new(row.id)?,
            TenantStatus::parse(row.status.as_str())?,
            row.residency_region,
            row.is_deleted,
        ))
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn find_tenant(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, status, residency_region, deleted_at IS NOT NULL AS is_deleted
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load tenant: {error}")))?;

        row.map(Tenant::try_from).transpose()
    }
}
