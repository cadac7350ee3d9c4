use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Allowance for multipart framing and the text fields around the video.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = (state.config.max_upload_size as usize).saturating_add(MULTIPART_OVERHEAD);

    let mut router = Router::new()
        // Videos
        .route(
            "/v",
            post(handlers::upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/v", get(handlers::list_videos))
        .route("/v/:file", get(handlers::get_video))
        .route("/thumbnails/:file", get(handlers::get_thumbnail))
        // Account preferences
        .route(
            "/account",
            get(handlers::get_account).put(handlers::update_account),
        )
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
