//! Router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::handlers::{api, live};
use crate::state::AppState;

/// Build the application router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/v1/models", get(api::list_models))
        .route("/ws/live", get(live::live_handler))
}
