use async_trait::async_trait;
use bastion_core::{AppError, AppResult};
use bastion_domain::{ChainScope, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Persisted, hash-chained audit event.
///
/// `payload` is the masked event body exactly as it was hashed. Records are
/// immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedAuditEvent {
    /// Unique event identifier.
    pub audit_id: Uuid,
    /// Chain this event belongs to.
    pub chain_scope: ChainScope,
    /// Position in the chain, starting at 1.
    pub sequence: u64,
    /// Hash of the preceding event, or the genesis hash.
    pub previous_hash: String,
    /// Hash over this event's payload, position and predecessor.
    pub current_hash: String,
    /// Hash over the canonical payload alone.
    pub payload_hash: String,
    /// Event severity, denormalized for querying.
    pub severity: Severity,
    /// Retention obligation in years, denormalized for querying.
    pub retention_years: u16,
    /// Time the event was sealed.
    pub recorded_at: DateTime<Utc>,
    /// Canonical event body.
    pub payload: Value,
}

/// Latest link of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    /// Sequence of the latest event.
    pub sequence: u64,
    /// Hash of the latest event.
    pub current_hash: String,
}

impl From<&SealedAuditEvent> for ChainHead {
    fn from(event: &SealedAuditEvent) -> Self {
        Self {
            sequence: event.sequence,
            current_hash: event.current_hash.clone(),
        }
    }
}

/// Result of an append that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Event was written.
    Appended,
    /// An event with the same id already exists; nothing was written.
    Duplicate,
}

/// Append failures distinguished by whether a re-seal can succeed.
#[derive(Debug, Error)]
pub enum AuditAppendError {
    /// Another writer already extended the chain at this position.
    #[error("audit chain '{chain_scope}' already has an event at sequence {sequence}")]
    ChainConflict {
        /// Conflicting chain.
        chain_scope: ChainScope,
        /// Sequence that was taken.
        sequence: u64,
    },

    /// Store unavailable or rejected the write.
    #[error(transparent)]
    Store(#[from] AppError),
}

/// Append-only primary audit store.
///
/// Implementations must reject an event whose `sequence` is not exactly one
/// past the chain head, or whose `previous_hash` differs from the head hash,
/// with [`AuditAppendError::ChainConflict`].
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Returns the latest link of a chain, if the chain has any events.
    async fn chain_head(&self, chain_scope: &ChainScope) -> AppResult<Option<ChainHead>>;

    /// Appends one sealed event.
    async fn append(&self, event: &SealedAuditEvent) -> Result<AppendOutcome, AuditAppendError>;

    /// Returns all events of a chain ordered by sequence.
    async fn list_chain(&self, chain_scope: &ChainScope) -> AppResult<Vec<SealedAuditEvent>>;
}

/// Local sink that receives events the primary store could not persist.
#[async_trait]
pub trait FallbackAuditSink: Send + Sync {
    /// Records one event that failed primary persistence.
    async fn record(&self, event: &SealedAuditEvent, failure: &str) -> AppResult<()>;
}

/// Best-effort external consumer of persisted audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one persisted event.
    async fn dispatch(&self, event: &SealedAuditEvent) -> AppResult<()>;
}
