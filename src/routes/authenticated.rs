use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here expects the `require_auth` route layer applied by `create_router`,
/// which attaches a `Principal` to the request. Update and delete additionally apply the
/// ownership gate inside the handler, after the review has been loaded.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/reviews
        .route("/api/reviews", post(handlers::create_review))
        // GET/PUT/DELETE /api/reviews/{id}
        .route(
            "/api/reviews/{id}",
            get(handlers::get_review)
                .put(handlers::update_review)
                .delete(handlers::delete_review),
        )
}
