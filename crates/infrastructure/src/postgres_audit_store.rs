use async_trait::async_trait;
use bastion_application::{
    AppendOutcome, AuditAppendError, AuditStore, ChainHead, SealedAuditEvent,
};
use bastion_core::{AppError, AppResult};
use bastion_domain::{ChainScope, Severity};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed append-only audit chain store.
///
/// Chain integrity is enforced by the `(chain_scope, sequence)` and
/// `(chain_scope, previous_hash)` unique constraints; a trigger rejects
/// updates and deletes.
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ChainHeadRow {
    sequence: i64,
    current_hash: String,
}

#[derive(Debug, FromRow)]
struct AuditEventRow {
    audit_id: Uuid,
    chain_scope: String,
    sequence: i64,
    previous_hash: String,
    current_hash: String,
    payload_hash: String,
    severity: String,
    retention_years: i16,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for SealedAuditEvent {
    type Error = AppError;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            audit_id: row.audit_id,
            chain_scope: ChainScope::parse(row.chain_scope.as_str())?,
            sequence: to_sequence(row.sequence)?,
            previous_hash: row.previous_hash,
            current_hash: row.current_hash,
            payload_hash: row.payload_hash,
            severity: Severity::parse(row.severity.as_str())?,
            retention_years: u16::try_from(row.retention_years).map_err(|_| {
                AppError::Internal(format!(
                    "audit event '{}' has invalid retention {}",
                    row.audit_id, row.retention_years
                ))
            })?,
            recorded_at: row.created_at,
            payload: row.payload,
        })
    }
}

fn to_sequence(value: i64) -> AppResult<u64> {
    u64::try_from(value)
        .map_err(|_| AppError::Internal(format!("invalid audit chain sequence {value}")))
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn chain_head(&self, chain_scope: &ChainScope) -> AppResult<Option<ChainHead>> {
        let row = sqlx::query_as::<_, ChainHeadRow>(
            r#"
            SELECT sequence, current_hash
            FROM audit_events
            WHERE chain_scope = $1
            ORDER BY sequence DESC
            LIMIT 1
            "#,
        )
        .bind(chain_scope.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load audit chain head: {error}")))?;

        row.map(|row| {
            Ok(ChainHead {
                sequence: to_sequence(row.sequence)?,
                current_hash: row.current_hash,
            })
        })
        .transpose()
    }

    async fn append(&self, event: &SealedAuditEvent) -> Result<AppendOutcome, AuditAppendError> {
        let sequence = i64::try_from(event.sequence).map_err(|_| {
            AppError::Internal(format!("audit sequence {} out of range", event.sequence))
        })?;

        // Lands only when the row at `sequence - 1` carries `previous_hash`.
        let result = sqlx::query(
            r#"
            INSERT INTO audit_events (
                audit_id,
                chain_scope,
                sequence,
                previous_hash,
                current_hash,
                payload_hash,
                severity,
                retention_years,
                payload,
                created_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            WHERE COALESCE(
                (SELECT current_hash
                 FROM audit_events
                 WHERE chain_scope = $2 AND sequence = $3 - 1),
                CASE WHEN $3 = 1 THEN $4 END
            ) = $4
            ON CONFLICT (audit_id) DO NOTHING
            "#,
        )
        .bind(event.audit_id)
        .bind(event.chain_scope.as_str())
        .bind(sequence)
        .bind(event.previous_hash.as_str())
        .bind(event.current_hash.as_str())
        .bind(event.payload_hash.as_str())
        .bind(event.severity.as_str())
        .bind(i16::try_from(event.retention_years).unwrap_or(i16::MAX))
        .bind(&event.payload)
        .bind(event.recorded_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(AppendOutcome::Appended),
            Ok(_) => self.classify_skipped_insert(event).await,
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AuditAppendError::ChainConflict {
                        chain_scope: event.chain_scope.clone(),
                        sequence: event.sequence,
                    });
                }

                Err(AppError::Internal(format!("failed to append audit event: {error}")).into())
            }
        }
    }

    async fn list_chain(&self, chain_scope: &ChainScope) -> AppResult<Vec<SealedAuditEvent>> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT
                audit_id,
                chain_scope,
                sequence,
                previous_hash,
                current_hash,
                payload_hash,
                severity,
                retention_years,
                payload,
                created_at
            FROM audit_events
            WHERE chain_scope = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(chain_scope.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit chain: {error}")))?;

        rows.into_iter().map(SealedAuditEvent::try_from).collect()
    }
}

impl PostgresAuditStore {
    /// Distinguishes a duplicate id from a stale chain position after an
    /// insert that affected no rows.
    async fn classify_skipped_insert(
        &self,
        event: &SealedAuditEvent,
    ) -> Result<AppendOutcome, AuditAppendError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM audit_events WHERE audit_id = $1)
            "#,
        )
        .bind(event.audit_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to inspect skipped audit append: {error}"))
        })?;

        if exists {
            Ok(AppendOutcome::Duplicate)
        } else {
            Err(AuditAppendError::ChainConflict {
                chain_scope: event.chain_scope.clone(),
                sequence: event.sequence,
            })
        }
    }
}
