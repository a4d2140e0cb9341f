use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::AuthFailure;

/// RepoError
///
/// Failures reported by the storage collaborator. A unique-index violation is kept
/// apart from every other backend failure so that callers can map it to a conflict.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    Conflict,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// ApiError
///
/// The error taxonomy of the HTTP boundary. Handlers and extractors return this type;
/// the mapping to a transport status code happens only in `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input. Resolved before storage is touched.
    #[error("{0}")]
    Validation(String),
    /// Unknown username or wrong password at login.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The authentication gate rejected the request.
    #[error(transparent)]
    Unauthenticated(#[from] AuthFailure),
    /// Authenticated, but not the author of the targeted review.
    #[error("Only the author can modify this review")]
    NotOwner,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    /// Storage, hashing or signing failure. The detail is logged, never returned.
    #[error("dependency failure: {0}")]
    Dependency(String),
    /// A protected handler ran without the principal the gate should have attached.
    #[error("authenticated principal missing from request context")]
    MissingPrincipal,
}

/// ErrorResponse
///
/// JSON body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotOwner => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Dependency(_) | Self::MissingPrincipal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message exposed to the client. Internal failures collapse to a generic text.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(failure) => failure.public_message().to_string(),
            Self::Dependency(_) | Self::MissingPrincipal => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict => Self::Conflict("Resource already exists".to_string()),
            RepoError::Backend(detail) => Self::Dependency(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Dependency(detail) => tracing::error!(%detail, "request failed on a dependency"),
            Self::MissingPrincipal => {
                tracing::error!("protected handler reached without an authenticated principal")
            }
            Self::Unauthenticated(failure) => {
                tracing::debug!(reason = %failure, "request rejected by authentication gate")
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
