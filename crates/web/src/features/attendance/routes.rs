use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{sync_chunked, sync_contingent, sync_status};
use crate::middleware::auth::require_api_key;
use crate::state::AppState;

/// Mounted under `/api/events/:event_id/attendance`.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sync-chunked", post(sync_chunked))
        .route("/sync-contingent", post(sync_contingent))
        .route("/sync-status", get(sync_status))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}
