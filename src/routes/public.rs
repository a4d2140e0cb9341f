use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Reads of the listing stay public; everything
/// that creates, changes or removes a review lives in the authenticated module.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the orchestrator. Touches no dependency.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        .route("/register", post(handlers::register_user))
        // POST /login
        // Issues a fresh 24h session token on every successful call.
        .route("/login", post(handlers::login_user))
        // GET /reviews?category=...&tag=...&page=...
        .route("/reviews", get(handlers::list_reviews))
}
