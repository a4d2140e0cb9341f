use axum::{
    Json,
    extract::{FromRequest, Path, Query, Request, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::{
    AppState,
    auth::{Principal, ensure_owner},
    error::{ApiError, ErrorResponse, RepoError},
    listing::{ListQuery, ListingFilter, ReviewPage},
    models::{
        AccountCredentials, LoginResponse, MessageResponse, NewReview, OkResponse, RecordId,
        Review, ReviewDraft,
    },
};

// --- Extractors ---

/// JsonBody
///
/// `Json<T>` whose rejection is a `ValidationError` in the service's error format
/// instead of axum's plain-text 415/422 responses.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(format!(
                "Invalid JSON body: {}",
                rejection.body_text()
            ))),
        }
    }
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation("Invalid ID format"))
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates an account. The username must be unique; a collision reported
/// by the store's unique index becomes 409.
#[utoipa::path(
    post,
    path = "/register",
    request_body = AccountCredentials,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<AccountCredentials>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let password_hash = state
        .credentials
        .hash(&credentials.password)
        .map_err(|e| ApiError::Dependency(e.to_string()))?;

    match state
        .repo
        .create_account(&credentials.username, &password_hash)
        .await
    {
        Ok(account) => {
            tracing::info!(user = %account.id, "account registered");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse {
                    message: "User registered successfully".to_string(),
                }),
            ))
        }
        Err(RepoError::Conflict) => Err(ApiError::Conflict("Username already exists".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// login_user
///
/// [Public Route] Exchanges a username and password for a 24-hour session token.
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login",
    request_body = AccountCredentials,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<AccountCredentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let account = state
        .repo
        .find_account_by_username(&credentials.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !state
        .credentials
        .verify(&credentials.password, &account.password_hash)
    {
        tracing::info!(user = %account.id, "login refused: password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(account.id, &account.username)
        .map_err(|e| ApiError::Dependency(e.to_string()))?;

    Ok(Json(LoginResponse {
        token,
        user_id: account.id,
        username: account.username,
    }))
}

// --- Reviews ---

/// list_reviews
///
/// [Public Route] One page of reviews, newest first. Category filtering takes
/// precedence over tag filtering. The count and the page use the same predicate.
#[utoipa::path(
    get,
    path = "/reviews",
    params(ListQuery),
    responses((status = 200, description = "A page of reviews", body = ReviewPage))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReviewPage>, ApiError> {
    let listing = ListingFilter::from_query(&query);

    let total = state.repo.count_reviews(&listing.filter).await?;
    let reviews = state
        .repo
        .find_reviews(&listing.filter, listing.skip(), listing.limit())
        .await?;

    Ok(Json(ReviewPage::new(reviews, &listing, total)))
}

/// create_review
///
/// [Authenticated Route] Stores a new review owned by the caller. The author name is
/// copied from the token and never refreshed afterwards.
#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = ReviewDraft,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_review(
    principal: Principal,
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<ReviewDraft>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let content = draft.validate()?;

    let review = state
        .repo
        .insert_review(NewReview {
            author_id: principal.subject_id,
            author_name: principal.subject_name,
            content,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(review = %review.id, author = %review.author_id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

/// get_review
///
/// [Authenticated Route] Fetches one review by its hex id.
#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id (32 hex digits)")),
    responses(
        (status = 200, description = "Found", body = Review),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_review(
    _principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Review>, ApiError> {
    let id = parse_id(&id)?;
    state
        .repo
        .get_review(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Review"))
}

/// update_review
///
/// [Authenticated Route] Replaces the editable fields of a review.
///
/// Order matters: id and body are validated first, then existence (404), then
/// ownership (403), and only then is the write attempted.
#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id (32 hex digits)")),
    request_body = ReviewDraft,
    responses(
        (status = 200, description = "Updated", body = OkResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_review(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(draft): JsonBody<ReviewDraft>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = parse_id(&id)?;
    let content = draft.validate()?;

    let existing = state
        .repo
        .get_review(id)
        .await?
        .ok_or(ApiError::NotFound("Review"))?;
    ensure_owner(&existing, &principal)?;

    // Zero rows here means the review was deleted after it was loaded.
    if !state
        .repo
        .update_review(id, principal.subject_id, content, Utc::now())
        .await?
    {
        return Err(ApiError::NotFound("Review"));
    }

    Ok(Json(OkResponse { ok: true }))
}

/// delete_review
///
/// [Authenticated Route] Removes a review. Same check order as `update_review`.
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id (32 hex digits)")),
    responses(
        (status = 200, description = "Deleted", body = OkResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_review(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = parse_id(&id)?;

    let existing = state
        .repo
        .get_review(id)
        .await?
        .ok_or(ApiError::NotFound("Review"))?;
    ensure_owner(&existing, &principal)?;

    if !state.repo.delete_review(id, principal.subject_id).await? {
        return Err(ApiError::NotFound("Review"));
    }

    tracing::info!(review = %id, "review deleted");
    Ok(Json(OkResponse { ok: true }))
}
