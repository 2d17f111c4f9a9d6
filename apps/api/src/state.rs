use std::sync::Arc;

use bastion_application::{
    AuditChainVerifier, AuditPipeline, AuditPipelineConfig, AuditSink, AuditStore,
    FallbackAuditSink, ScopeEnforcementConfig, ScopeGuard, SovereignRolePolicy,
    TenantRepository, TenantScopeEnforcer,
};
use bastion_core::AppResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub scope_enforcer: TenantScopeEnforcer,
    pub audit_pipeline: AuditPipeline,
    pub scope_guard: ScopeGuard,
    pub chain_verifier: AuditChainVerifier,
    pub storage_backend: &'static str,
}

/// Adapters the state is assembled from.
pub struct StateAdapters {
    pub tenant_repository: Arc<dyn TenantRepository>,
    pub audit_store: Arc<dyn AuditStore>,
    pub fallback_sink: Arc<dyn FallbackAuditSink>,
    pub audit_sinks: Vec<Arc<dyn AuditSink>>,
    pub storage_backend: &'static str,
}

impl AppState {
    /// Starts the audit writer and wires the services around it.
    pub fn build(
        adapters: StateAdapters,
        scope_config: ScopeEnforcementConfig,
        pipeline_config: AuditPipelineConfig,
    ) -> AppResult<Self> {
        let audit_pipeline = AuditPipeline::spawn(
            Arc::clone(&adapters.audit_store),
            adapters.fallback_sink,
            adapters.audit_sinks,
            pipeline_config,
        )?;

        Ok(Self {
            scope_enforcer: TenantScopeEnforcer::new(
                adapters.tenant_repository,
                Arc::new(SovereignRolePolicy),
                audit_pipeline.clone(),
                scope_config,
            ),
            scope_guard: ScopeGuard::new(audit_pipeline.clone()),
            chain_verifier: AuditChainVerifier::new(adapters.audit_store),
            audit_pipeline,
            storage_backend: adapters.storage_backend,
        })
    }
}
