use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Unauthenticated endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers and orchestrators.
        .route("/health", get(|| async { "ok" }))
}
