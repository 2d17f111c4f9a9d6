use std::sync::Arc;

use axum::{Extension, Json};
use bastion_application::{ScopeDescriptor, ScopeView};

pub async fn current_scope_handler(
    Extension(scope): Extension<Arc<ScopeDescriptor>>,
) -> Json<ScopeView> {
    Json(scope.public_view())
}
