use crate::handlers::{self, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Session and prediction endpoints, without the health check.
///
/// Kept separate so the binary can wrap them in rate limiting while `/health`
/// stays reachable for health checks.
pub fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        // Single-page form
        .route("/api/v1/predict", post(handlers::quick_predict))
        // Wizard sessions
        .route("/api/v1/sessions", post(handlers::create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::get_session).delete(handlers::end_session),
        )
        .route("/api/v1/sessions/:id/step", put(handlers::set_step))
        .route(
            "/api/v1/sessions/:id/records",
            get(handlers::list_records)
                .post(handlers::add_record)
                .delete(handlers::clear_records),
        )
        .route("/api/v1/sessions/:id/upload", post(handlers::upload_batch))
        .route("/api/v1/sessions/:id/predict", post(handlers::predict))
        .route("/api/v1/sessions/:id/export", get(handlers::export))
        // Multipart uploads are capped by axum at 2MB unless raised
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Full application router without middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes(state.config.max_upload_bytes))
        .with_state(state)
}
