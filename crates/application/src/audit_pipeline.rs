//! Audit emission pipeline.
//!
//! Call sites hand over a descriptor plus ambient context. Composition
//! (classification, masking, threat annotation) runs on the caller's task;
//! sealing, persistence, fallback and fan-out run on a single writer task
//! that owns the chain heads, so events on one chain are totally ordered.
//! Emission never fails from the caller's point of view.

use std::collections::HashMap;
use std::sync::Arc;

use bastion_core::AppResult;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::error;
use uuid::Uuid;

use crate::audit_event::{AuditComposer, AuditContext, AuditDescriptor};
use crate::audit_ports::{AuditSink, AuditStore, FallbackAuditSink};
use crate::classification::DEFAULT_RETENTION_YEARS;
use crate::masking::MaskingSalt;

mod metrics;
mod writer;

pub use metrics::{AuditMetrics, AuditMetricsSnapshot};

use writer::{AuditWriter, WriterCommand};

/// Default bound on re-seal attempts after chain conflicts.
pub const DEFAULT_MAX_CHAIN_ATTEMPTS: u32 = 8;

/// Audit pipeline settings.
#[derive(Debug, Clone)]
pub struct AuditPipelineConfig {
    /// Retention applied when no compliance category matches.
    pub default_retention_years: u16,
    /// Deployment-wide key for masking digests.
    pub masking_salt: MaskingSalt,
    /// Attempts per event before a contended chain gives up.
    pub max_chain_attempts: u32,
}

impl AuditPipelineConfig {
    /// Settings with default retention and retry bounds.
    #[must_use]
    pub fn new(masking_salt: MaskingSalt) -> Self {
        Self {
            default_retention_years: DEFAULT_RETENTION_YEARS,
            masking_salt,
            max_chain_attempts: DEFAULT_MAX_CHAIN_ATTEMPTS,
        }
    }
}

/// Where an emitted event ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditReceipt {
    /// Appended to the primary store.
    Persisted {
        /// Event id.
        audit_id: Uuid,
        /// Position in the chain.
        sequence: u64,
        /// Link hash of the event.
        current_hash: String,
    },
    /// Already present in the primary store.
    Duplicate {
        /// Event id.
        audit_id: Uuid,
    },
    /// Primary store failed; the fallback sink holds the event.
    Fallback {
        /// Event id.
        audit_id: Uuid,
    },
    /// The event could not be recorded anywhere.
    Dropped {
        /// Event id.
        audit_id: Uuid,
    },
}

impl AuditReceipt {
    /// Returns the event id.
    #[must_use]
    pub fn audit_id(&self) -> Uuid {
        match self {
            Self::Persisted { audit_id, .. }
            | Self::Duplicate { audit_id }
            | Self::Fallback { audit_id }
            | Self::Dropped { audit_id } => *audit_id,
        }
    }

    /// Whether the primary store holds the event.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. } | Self::Duplicate { .. })
    }
}

/// Cloneable handle to the audit writer.
#[derive(Clone)]
pub struct AuditPipeline {
    sender: mpsc::UnboundedSender<WriterCommand>,
    composer: Arc<AuditComposer>,
    metrics: Arc<AuditMetrics>,
}

impl AuditPipeline {
    /// Starts the writer task on the current Tokio runtime.
    pub fn spawn(
        store: Arc<dyn AuditStore>,
        fallback: Arc<dyn FallbackAuditSink>,
        sinks: Vec<Arc<dyn AuditSink>>,
        config: AuditPipelineConfig,
    ) -> AppResult<Self> {
        let composer = Arc::new(AuditComposer::new(
            config.default_retention_years,
            config.masking_salt,
        )?);
        let metrics = Arc::new(AuditMetrics::default());
        let (sender, receiver) = mpsc::unbounded_channel();

        let writer = AuditWriter {
            store,
            fallback,
            sinks,
            metrics: Arc::clone(&metrics),
            heads: HashMap::new(),
            max_chain_attempts: config.max_chain_attempts.max(1),
        };
        tokio::spawn(writer.run(receiver));

        Ok(Self {
            sender,
            composer,
            metrics,
        })
    }

    /// Queues an event without waiting for persistence. Safe to call from
    /// synchronous code, including `Drop` implementations.
    pub fn emit(&self, descriptor: AuditDescriptor, context: AuditContext) -> Uuid {
        self.submit(descriptor, context, None)
    }

    /// Queues an event and waits until the writer has handled it.
    pub async fn emit_and_wait(
        &self,
        descriptor: AuditDescriptor,
        context: AuditContext,
    ) -> AuditReceipt {
        let (ack, receipt) = oneshot::channel();
        let audit_id = self.submit(descriptor, context, Some(ack));
        receipt
            .await
            .unwrap_or(AuditReceipt::Dropped { audit_id })
    }

    /// Waits until every event queued before this call has been handled.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn metrics(&self) -> AuditMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn submit(
        &self,
        descriptor: AuditDescriptor,
        context: AuditContext,
        ack: Option<oneshot::Sender<AuditReceipt>>,
    ) -> Uuid {
        let audit_id = Uuid::new_v4();
        let event = self
            .composer
            .compose(audit_id, Utc::now(), descriptor, &context);

        let command = WriterCommand::Append {
            chain_scope: context.chain_scope,
            event: Box::new(event),
            ack,
        };
        if self.sender.send(command).is_err() {
            self.metrics.record_dropped();
            error!(audit_id = %audit_id, "audit writer is not running, event dropped");
        }

        audit_id
    }
}

#[cfg(test)]
mod tests;
