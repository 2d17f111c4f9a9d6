use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let scoped_routes = Router::new()
        .route("/api/scope", get(handlers::scope::current_scope_handler))
        .route(
            "/api/audit/events",
            post(handlers::audit::record_audit_event_handler),
        )
        .route(
            "/api/audit/verify",
            get(handlers::audit::verify_audit_chain_handler),
        )
        .route(
            "/api/records/query",
            post(handlers::records::query_records_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::enforce_tenant_scope,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(scoped_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
