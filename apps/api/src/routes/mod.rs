pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};

use crate::assets::handlers as assets;
use crate::print::handlers as print;
use crate::state::AppState;

/// Headroom for multipart framing on top of the configured max file size.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes + MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/assets/upload",
            axum::routing::post(assets::handle_upload).layer(upload_body_limit),
        )
        .route(
            "/api/v1/assets",
            get(assets::handle_list).delete(assets::handle_delete),
        )
        .route("/api/v1/assets/view", get(assets::handle_view))
        // Trusted render worker only; guarded by the shared-secret token.
        .route("/internal/print-data", get(print::handle_print_data))
        .with_state(state)
}
