use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use crate::{
    error::ApiError,
    models::{RecordId, Review},
    token::{TokenError, TokenService},
};

/// Principal
///
/// The verified identity of an authenticated request. The authentication gate attaches
/// it to the request extensions; protected handlers take it as an extractor argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: RecordId,
    pub subject_name: String,
}

/// AuthFailure
///
/// Why the authentication gate rejected a request. All variants produce a 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("authorization header is missing")]
    MissingHeader,
    #[error("authorization header is not a bearer token")]
    BadFormat,
    #[error("bearer token rejected: {0}")]
    Token(#[from] TokenError),
}

impl AuthFailure {
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingHeader => "Authorization header is required",
            Self::BadFormat => "Invalid token format",
            Self::Token(_) => "Invalid token",
        }
    }
}

/// authenticate
///
/// The authentication gate proper: `Authorization: Bearer <token>` → `Principal`.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Principal, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .ok_or(AuthFailure::BadFormat)?;

    let claims = tokens.verify(token)?;
    Ok(Principal {
        subject_id: claims.subject_id,
        subject_name: claims.subject_name,
    })
}

/// require_auth
///
/// Route layer for the protected router. On failure the request is answered with 401
/// and the handler is never invoked.
pub async fn require_auth(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(request.headers(), &tokens)?;
    tracing::debug!(subject = %principal.subject_id, "request authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Principal extractor
///
/// Reads the principal placed by `require_auth`. Finding none means a protected handler
/// was mounted outside the gate, which is a wiring bug and reported as a 500.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::MissingPrincipal)
    }
}

/// ensure_owner
///
/// The ownership gate. Callers load the review first so that a missing id is reported
/// as 404 before ownership is ever considered.
pub fn ensure_owner(review: &Review, principal: &Principal) -> Result<(), ApiError> {
    if review.author_id == principal.subject_id {
        Ok(())
    } else {
        tracing::info!(
            review = %review.id,
            subject = %principal.subject_id,
            "mutation refused: caller is not the author"
        );
        Err(ApiError::NotOwner)
    }
}
