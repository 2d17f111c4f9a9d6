use std::sync::Arc;

use bastion_core::AppResult;
use bastion_domain::ChainScope;
use tracing::{info, warn};

use crate::audit_ports::AuditStore;
use crate::hash_chain::{ChainVerification, verify_chain};

/// Replays persisted chains to detect tampering or loss.
#[derive(Clone)]
pub struct AuditChainVerifier {
    store: Arc<dyn AuditStore>,
}

impl AuditChainVerifier {
    /// Creates a verifier over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Loads and replays one chain.
    pub async fn verify(&self, chain_scope: &ChainScope) -> AppResult<ChainVerification> {
        let events = self.store.list_chain(chain_scope).await?;
        let verification = verify_chain(&events);

        if verification.intact {
            info!(
                chain_scope = %chain_scope,
                total_events = verification.total_events,
                "audit chain verified"
            );
        } else {
            warn!(
                chain_scope = %chain_scope,
                first_break_at = ?verification.first_break_at,
                missing = verification.missing_sequences.len(),
                "audit chain verification failed"
            );
        }

        Ok(verification)
    }
}
