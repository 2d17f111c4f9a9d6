use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bastion_core::{AppError, AppResult, TenantId};
use bastion_domain::{ChainScope, Severity, Tenant, TenantStatus};
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::audit_pipeline::{AuditPipeline, AuditPipelineConfig};
use crate::audit_ports::{
    AppendOutcome, AuditAppendError, AuditSink, AuditStore, ChainHead, FallbackAuditSink,
    SealedAuditEvent,
};
use crate::hash_chain::{SealInput, seal};
use crate::masking::MaskingSalt;
use crate::tenant_ports::TenantRepository;

pub(crate) fn tenant_id(value: &str) -> TenantId {
    let Ok(tenant_id) = TenantId::new(value) else {
        panic!("valid tenant id '{value}'");
    };
    tenant_id
}

#[derive(Default)]
pub(crate) struct FakeTenantRepository {
    tenants: HashMap<TenantId, Tenant>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl FakeTenantRepository {
    pub(crate) fn with_tenants(tenants: Vec<(&str, TenantStatus, bool)>) -> Self {
        let tenants = tenants
            .into_iter()
            .map(|(id, status, is_deleted)| {
                let tenant_id = tenant_id(id);
                (
                    tenant_id.clone(),
                    Tenant::new(tenant_id, status, "eu-central", is_deleted),
                )
            })
            .collect();

        Self {
            tenants,
            ..Self::default()
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantRepository for FakeTenantRepository {
    async fn find_tenant(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "connection refused: tenants-db:5432".to_owned(),
            ));
        }

        Ok(self.tenants.get(tenant_id).cloned())
    }
}

/// Store enforcing the same chain invariants as the real adapters.
#[derive(Default)]
pub(crate) struct FakeAuditStore {
    chains: Mutex<HashMap<ChainScope, Vec<SealedAuditEvent>>>,
    audit_ids: Mutex<HashSet<Uuid>>,
    failing: AtomicBool,
}

impl FakeAuditStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) async fn events(&self, chain_scope: &ChainScope) -> Vec<SealedAuditEvent> {
        self.chains
            .lock()
            .await
            .get(chain_scope)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) async fn all_events(&self) -> Vec<SealedAuditEvent> {
        self.chains
            .lock()
            .await
            .values()
            .flat_map(|events| events.iter().cloned())
            .collect()
    }

    /// Appends an event as if another process had extended the chain.
    pub(crate) async fn append_foreign(&self, chain_scope: &ChainScope) {
        let head = self
            .events(chain_scope)
            .await
            .last()
            .map(ChainHead::from);
        let body = json!({ "action": "foreign.write" });
        let Ok(event) = seal(SealInput {
            audit_id: Uuid::new_v4(),
            chain_scope,
            head: head.as_ref(),
            severity: Severity::Info,
            retention_years: 3,
            recorded_at: Utc::now(),
            body: &body,
        }) else {
            panic!("foreign event should seal");
        };
        if self.append(&event).await.is_err() {
            panic!("foreign append should succeed");
        }
    }
}

#[async_trait]
impl AuditStore for FakeAuditStore {
    async fn chain_head(&self, chain_scope: &ChainScope) -> AppResult<Option<ChainHead>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit store offline".to_owned()));
        }

        Ok(self
            .chains
            .lock()
            .await
            .get(chain_scope)
            .and_then(|events| events.last())
            .map(ChainHead::from))
    }

    async fn append(&self, event: &SealedAuditEvent) -> Result<AppendOutcome, AuditAppendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit store offline".to_owned()).into());
        }

        let mut audit_ids = self.audit_ids.lock().await;
        if audit_ids.contains(&event.audit_id) {
            return Ok(AppendOutcome::Duplicate);
        }

        let mut chains = self.chains.lock().await;
        let chain = chains.entry(event.chain_scope.clone()).or_default();
        let expected_sequence = chain.len() as u64 + 1;
        let expected_previous = chain
            .last()
            .map_or(crate::hash_chain::GENESIS_HASH, |head| {
                head.current_hash.as_str()
            });
        if event.sequence != expected_sequence || event.previous_hash != expected_previous {
            return Err(AuditAppendError::ChainConflict {
                chain_scope: event.chain_scope.clone(),
                sequence: event.sequence,
            });
        }

        chain.push(event.clone());
        audit_ids.insert(event.audit_id);
        Ok(AppendOutcome::Appended)
    }

    async fn list_chain(&self, chain_scope: &ChainScope) -> AppResult<Vec<SealedAuditEvent>> {
        Ok(self.events(chain_scope).await)
    }
}

#[derive(Default)]
pub(crate) struct RecordingFallbackSink {
    records: Mutex<Vec<(SealedAuditEvent, String)>>,
}

impl RecordingFallbackSink {
    pub(crate) async fn records(&self) -> Vec<(SealedAuditEvent, String)> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl FallbackAuditSink for RecordingFallbackSink {
    async fn record(&self, event: &SealedAuditEvent, failure: &str) -> AppResult<()> {
        self.records
            .lock()
            .await
            .push((event.clone(), failure.to_owned()));
        Ok(())
    }
}

pub(crate) struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn dispatch(&self, _event: &SealedAuditEvent) -> AppResult<()> {
        Err(AppError::Internal("sink unreachable".to_owned()))
    }
}

pub(crate) fn masking_salt() -> MaskingSalt {
    let Ok(salt) = MaskingSalt::new("test-masking-salt-0001") else {
        panic!("valid salt");
    };
    salt
}

pub(crate) struct PipelineHarness {
    pub(crate) pipeline: AuditPipeline,
    pub(crate) store: Arc<FakeAuditStore>,
    pub(crate) fallback: Arc<RecordingFallbackSink>,
}

pub(crate) fn pipeline_harness(sinks: Vec<Arc<dyn AuditSink>>) -> PipelineHarness {
    let store = Arc::new(FakeAuditStore::default());
    let fallback = Arc::new(RecordingFallbackSink::default());
    let Ok(pipeline) = AuditPipeline::spawn(
        store.clone(),
        fallback.clone(),
        sinks,
        AuditPipelineConfig::new(masking_salt()),
    ) else {
        panic!("pipeline should start");
    };

    PipelineHarness {
        pipeline,
        store,
        fallback,
    }
}
