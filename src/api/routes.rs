//! API Routes
//!
//! Configures the Axum router with all cache admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, list_stores_handler,
    migrate_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stores", get(list_stores_handler))
        .route("/stores/:store/stats", get(stats_handler))
        .route("/stores/:store/set", put(set_handler))
        .route("/stores/:store/get/:key", get(get_handler))
        .route("/stores/:store/del/:key", delete(delete_handler))
        .route("/stores/:store/clear", post(clear_handler))
        .route("/stores/:store/migrate", post(migrate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
