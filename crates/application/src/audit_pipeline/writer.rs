use std::collections::HashMap;
use std::sync::Arc;

use bastion_core::AppResult;
use bastion_domain::ChainScope;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::audit_event::AuditEvent;
use crate::audit_ports::{
    AppendOutcome, AuditAppendError, AuditSink, AuditStore, ChainHead, FallbackAuditSink,
    SealedAuditEvent,
};
use crate::hash_chain::{SealInput, seal};

use super::{AuditMetrics, AuditReceipt};

pub(super) enum WriterCommand {
    Append {
        chain_scope: ChainScope,
        event: Box<AuditEvent>,
        ack: Option<oneshot::Sender<AuditReceipt>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Sole owner of the per-chain head cache. Every read-previous-then-write
/// happens inside [`AuditWriter::append`], one command at a time.
pub(super) struct AuditWriter {
    pub(super) store: Arc<dyn AuditStore>,
    pub(super) fallback: Arc<dyn FallbackAuditSink>,
    pub(super) sinks: Vec<Arc<dyn AuditSink>>,
    pub(super) metrics: Arc<AuditMetrics>,
    pub(super) heads: HashMap<ChainScope, ChainHead>,
    pub(super) max_chain_attempts: u32,
}

impl AuditWriter {
    pub(super) async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<WriterCommand>) {
        debug!("audit writer started");

        while let Some(command) = receiver.recv().await {
            match command {
                WriterCommand::Append {
                    chain_scope,
                    event,
                    ack,
                } => {
                    let receipt = self.append(&chain_scope, &event).await;
                    if let Some(ack) = ack {
                        let _ = ack.send(receipt);
                    }
                }
                WriterCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!("audit writer stopped (channel closed)");
    }

    async fn append(&mut self, chain_scope: &ChainScope, event: &AuditEvent) -> AuditReceipt {
        let audit_id = event.audit_id;
        let mut attempt = 0_u32;

        loop {
            attempt = attempt.saturating_add(1);

            let head = match self.head(chain_scope).await {
                Ok(head) => head,
                Err(failure) => {
                    self.metrics.record_persist_failure();
                    error!(
                        audit_id = %audit_id,
                        chain_scope = %chain_scope,
                        error = %failure,
                        "failed to load audit chain head"
                    );
                    return match seal_event(chain_scope, None, event) {
                        Ok(sealed) => self.divert(sealed, &failure.to_string()).await,
                        Err(seal_failure) => self.drop_event(audit_id, &seal_failure.to_string()),
                    };
                }
            };

            let sealed = match seal_event(chain_scope, head.as_ref(), event) {
                Ok(sealed) => sealed,
                Err(failure) => return self.drop_event(audit_id, &failure.to_string()),
            };

            match self.store.append(&sealed).await {
                Ok(AppendOutcome::Appended) => {
                    self.heads
                        .insert(chain_scope.clone(), ChainHead::from(&sealed));
                    self.metrics.record_persisted();
                    let receipt = AuditReceipt::Persisted {
                        audit_id,
                        sequence: sealed.sequence,
                        current_hash: sealed.current_hash.clone(),
                    };
                    self.fan_out(sealed);
                    return receipt;
                }
                Ok(AppendOutcome::Duplicate) => {
                    self.heads.remove(chain_scope);
                    self.metrics.record_duplicate();
                    debug!(audit_id = %audit_id, "audit event already persisted");
                    return AuditReceipt::Duplicate { audit_id };
                }
                Err(AuditAppendError::ChainConflict { sequence, .. }) => {
                    self.heads.remove(chain_scope);
                    self.metrics.record_chain_conflict();
                    if attempt >= self.max_chain_attempts {
                        self.metrics.record_persist_failure();
                        error!(
                            audit_id = %audit_id,
                            chain_scope = %chain_scope,
                            attempts = attempt,
                            "audit chain contention did not resolve"
                        );
                        return self
                            .divert(sealed, "chain conflict retries exhausted")
                            .await;
                    }
                    warn!(
                        audit_id = %audit_id,
                        chain_scope = %chain_scope,
                        sequence,
                        attempt,
                        "audit chain position taken by another writer, resealing"
                    );
                }
                Err(AuditAppendError::Store(failure)) => {
                    self.heads.remove(chain_scope);
                    self.metrics.record_persist_failure();
                    error!(
                        audit_id = %audit_id,
                        chain_scope = %chain_scope,
                        error = %failure,
                        "audit persistence failed"
                    );
                    return self.divert(sealed, &failure.to_string()).await;
                }
            }
        }
    }

    async fn head(&mut self, chain_scope: &ChainScope) -> AppResult<Option<ChainHead>> {
        if let Some(head) = self.heads.get(chain_scope) {
            return Ok(Some(head.clone()));
        }

        let head = self.store.chain_head(chain_scope).await?;
        if let Some(head) = &head {
            self.heads.insert(chain_scope.clone(), head.clone());
        }
        Ok(head)
    }

    async fn divert(&self, sealed: SealedAuditEvent, failure: &str) -> AuditReceipt {
        let audit_id = sealed.audit_id;
        match self.fallback.record(&sealed, failure).await {
            Ok(()) => {
                self.metrics.record_fallback_write();
                AuditReceipt::Fallback { audit_id }
            }
            Err(fallback_failure) => {
                self.metrics.record_fallback_failure();
                error!(
                    audit_id = %audit_id,
                    error = %fallback_failure,
                    "audit fallback sink failed, event lost"
                );
                AuditReceipt::Dropped { audit_id }
            }
        }
    }

    fn drop_event(&self, audit_id: Uuid, failure: &str) -> AuditReceipt {
        self.metrics.record_dropped();
        error!(audit_id = %audit_id, error = %failure, "audit event could not be sealed");
        AuditReceipt::Dropped { audit_id }
    }

    fn fan_out(&self, sealed: SealedAuditEvent) {
        if self.sinks.is_empty() {
            return;
        }

        let sealed = Arc::new(sealed);
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let sealed = Arc::clone(&sealed);
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                if let Err(failure) = sink.dispatch(&sealed).await {
                    metrics.record_fanout_failure();
                    warn!(
                        sink = sink.name(),
                        audit_id = %sealed.audit_id,
                        error = %failure,
                        "audit fan-out failed"
                    );
                }
            });
        }
    }
}

fn seal_event(
    chain_scope: &ChainScope,
    head: Option<&ChainHead>,
    event: &AuditEvent,
) -> AppResult<SealedAuditEvent> {
    seal(SealInput {
        audit_id: event.audit_id,
        chain_scope,
        head,
        severity: event.severity,
        retention_years: event.retention_years,
        recorded_at: event.timestamp,
        body: event,
    })
}
