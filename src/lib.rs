use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod models;
pub mod repository;
pub mod token;

// Route tables split by access policy (public / authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use credentials::CredentialManager;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenService;

/// Shared handle to the token service.
pub type TokenState = Arc<TokenService>;

/// ApiDoc
///
/// OpenAPI description of every route and wire schema, served as JSON at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::list_reviews,
        handlers::create_review, handlers::get_review, handlers::update_review,
        handlers::delete_review
    ),
    components(
        schemas(
            models::Review, models::ReviewDraft, models::AccountCredentials,
            models::LoginResponse, models::MessageResponse, models::OkResponse,
            listing::ReviewPage, error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "review-board", description = "Review Board API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, immutable container of process-wide resources, built once in `main` and
/// cloned cheaply into every request. Nothing in it is written after startup, so
/// handlers need no locking of their own.
#[derive(Clone)]
pub struct AppState {
    /// Storage collaborator (accounts and reviews).
    pub repo: RepositoryState,
    /// Session token issuing and verification, keyed once at startup.
    pub tokens: TokenState,
    /// Password hashing.
    pub credentials: CredentialManager,
    /// The loaded environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state from a loaded configuration and a storage handle.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Self {
        Self {
            repo,
            tokens: Arc::new(TokenService::new(config.jwt_secret.as_bytes())),
            credentials: CredentialManager::default(),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route tables, wraps the authenticated table in the authentication
/// gate and applies the observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(public::public_routes())
        // `route_layer` only runs for matched routes, so unknown paths stay 404
        // instead of turning into 401.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_auth,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of one request carries its
/// `x-request-id`. The query string is left out of the span since it is
/// user-controlled; the path is enough to correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
