//! Bastion API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bastion_application::{
    AuditPipelineConfig, AuditSink, AuditStore, MaskingSalt, TenantRepository,
};
use bastion_core::{AppError, AppResult};
use bastion_domain::{Tenant, TenantStatus};
use bastion_infrastructure::{
    HttpAuditSink, InMemoryAuditStore, InMemoryTenantRepository, JsonLinesFallbackSink,
    PostgresAuditStore, PostgresTenantRepository,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::{AppState, StateAdapters};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let Some(adapters) = storage_adapters(&config).await? else {
        info!("database migrations applied successfully");
        return Ok(());
    };

    let mut pipeline_config =
        AuditPipelineConfig::new(MaskingSalt::new(config.masking_salt.as_bytes())?);
    pipeline_config.default_retention_years = config.default_retention_years;

    let app_state = AppState::build(adapters, config.scope.clone(), pipeline_config)?;
    let app = api_router::build_router(app_state.clone());

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, storage = app_state.storage_backend, "bastion-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))?;

    app_state.audit_pipeline.flush().await;
    info!(metrics = ?app_state.audit_pipeline.metrics(), "audit pipeline drained");
    Ok(())
}

/// Returns `None` when only migrations were requested.
async fn storage_adapters(config: &ApiConfig) -> AppResult<Option<StateAdapters>> {
    let fallback_sink = Arc::new(JsonLinesFallbackSink::new(config.fallback_path.clone()));
    info!(path = %fallback_sink.path().display(), "audit fallback sink configured");
    let audit_sinks = audit_sinks(config)?;

    let Some(database_url) = config.database_url.as_deref() else {
        if config.migrate_only {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        warn!("DATABASE_URL is not set; using in-memory tenant and audit stores");
        let tenant_repository = InMemoryTenantRepository::with_tenants(
            config
                .dev_seed_tenants
                .iter()
                .cloned()
                .map(|tenant_id| Tenant::new(tenant_id, TenantStatus::Active, "local", false)),
        );
        return Ok(Some(StateAdapters {
            tenant_repository: Arc::new(tenant_repository),
            audit_store: Arc::new(InMemoryAuditStore::new()),
            fallback_sink,
            audit_sinks,
            storage_backend: "in-memory",
        }));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        return Ok(None);
    }

    let tenant_repository: Arc<dyn TenantRepository> =
        Arc::new(PostgresTenantRepository::new(pool.clone()));
    let audit_store: Arc<dyn AuditStore> = Arc::new(PostgresAuditStore::new(pool));

    Ok(Some(StateAdapters {
        tenant_repository,
        audit_store,
        fallback_sink,
        audit_sinks,
        storage_backend: "postgres",
    }))
}

fn audit_sinks(config: &ApiConfig) -> AppResult<Vec<Arc<dyn AuditSink>>> {
    if config.sinks.urls.is_empty() {
        return Ok(Vec::new());
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.sinks.timeout_ms))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    Ok(config
        .sinks
        .urls
        .iter()
        .map(|url| {
            Arc::new(HttpAuditSink::new(
                http_client.clone(),
                url.as_str(),
                config.sinks.max_attempts,
                config.sinks.retry_backoff_ms,
            )) as Arc<dyn AuditSink>
        })
        .collect())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
