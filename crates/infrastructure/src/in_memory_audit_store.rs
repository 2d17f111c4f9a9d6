use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bastion_application::{
    AppendOutcome, AuditAppendError, AuditStore, ChainHead, GENESIS_HASH, SealedAuditEvent,
};
use bastion_core::AppResult;
use bastion_domain::ChainScope;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Chains {
    events: HashMap<ChainScope, Vec<SealedAuditEvent>>,
    audit_ids: HashSet<Uuid>,
}

/// In-memory append-only audit store enforcing the same chain constraints as
/// the PostgreSQL schema.
#[derive(Default)]
pub struct InMemoryAuditStore {
    chains: Mutex<Chains>,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events across all chains.
    pub async fn len(&self) -> usize {
        self.chains.lock().await.audit_ids.len()
    }

    /// Whether the store holds no events.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrites a stored payload in place, bypassing append-only rules.
    #[cfg(test)]
    pub(crate) async fn tamper_payload(
        &self,
        chain_scope: &ChainScope,
        sequence: u64,
        payload: serde_json::Value,
    ) -> bool {
        let mut chains = self.chains.lock().await;
        let Some(event) = chains
            .events
            .get_mut(chain_scope)
            .and_then(|events| events.iter_mut().find(|event| event.sequence == sequence))
        else {
            return false;
        };

        event.payload = payload;
        true
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn chain_head(&self, chain_scope: &ChainScope) -> AppResult<Option<ChainHead>> {
        Ok(self
            .chains
            .lock()
            .await
            .events
            .get(chain_scope)
            .and_then(|events| events.last())
            .map(ChainHead::from))
    }

    async fn append(&self, event: &SealedAuditEvent) -> Result<AppendOutcome, AuditAppendError> {
        let mut chains = self.chains.lock().await;
        if chains.audit_ids.contains(&event.audit_id) {
            return Ok(AppendOutcome::Duplicate);
        }

        let chain = chains.events.entry(event.chain_scope.clone()).or_default();
        let (head_sequence, head_hash) = chain
            .last()
            .map_or((0, GENESIS_HASH), |head| (head.sequence, head.current_hash.as_str()));
        if event.sequence != head_sequence + 1 || event.previous_hash != head_hash {
            return Err(AuditAppendError::ChainConflict {
                chain_scope: event.chain_scope.clone(),
                sequence: event.sequence,
            });
        }

        chain.push(event.clone());
        chains.audit_ids.insert(event.audit_id);
        Ok(AppendOutcome::Appended)
    }

    async fn list_chain(&self, chain_scope: &ChainScope) -> AppResult<Vec<SealedAuditEvent>> {
        Ok(self
            .chains
            .lock()
            .await
            .events
            .get(chain_scope)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use bastion_application::{
        AppendOutcome, AuditAppendError, AuditStore, ChainHead, SealInput, SealedAuditEvent,
        seal, verify_chain,
    };
    use bastion_domain::{ChainScope, Severity};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::InMemoryAuditStore;

    fn sealed(scope: &ChainScope, head: Option<&ChainHead>, index: u32) -> SealedAuditEvent {
        let body = json!({ "index": index, "action": "request.completed" });
        let Ok(event) = seal(SealInput {
            audit_id: Uuid::new_v4(),
            chain_scope: scope,
            head,
            severity: Severity::Info,
            retention_years: 3,
            recorded_at: Utc::now(),
            body: &body,
        }) else {
            panic!("seal should succeed");
        };
        event
    }

    async fn filled_store(scope: &ChainScope, length: u32) -> InMemoryAuditStore {
        let store = InMemoryAuditStore::new();
        for index in 0..length {
            let Ok(head) = store.chain_head(scope).await else {
                panic!("head should load");
            };
            let event = sealed(scope, head.as_ref(), index);
            assert!(matches!(store.append(&event).await, Ok(AppendOutcome::Appended)));
        }
        store
    }

    #[tokio::test]
    async fn rejects_forks_and_ignores_duplicates() {
        let scope = ChainScope::platform();
        let store = filled_store(&scope, 2).await;
        let Ok(events) = store.list_chain(&scope).await else {
            panic!("chain should load");
        };

        assert!(matches!(
            store.append(&events[1]).await,
            Ok(AppendOutcome::Duplicate)
        ));

        let fork = sealed(&scope, Some(&ChainHead::from(&events[0])), 9);
        assert!(matches!(
            store.append(&fork).await,
            Err(AuditAppendError::ChainConflict { sequence: 2, .. })
        ));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn tampering_breaks_replay_from_the_altered_event() {
        let scope = ChainScope::platform();
        let store = filled_store(&scope, 5).await;

        assert!(
            store
                .tamper_payload(&scope, 2, json!({ "index": 1, "action": "request.aborted" }))
                .await
        );

        let Ok(events) = store.list_chain(&scope).await else {
            panic!("chain should load");
        };
        let verification = verify_chain(&events);
        assert!(!verification.intact);
        assert_eq!(verification.broken_sequences, vec![2, 3, 4, 5]);
    }
}
