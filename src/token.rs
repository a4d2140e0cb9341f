use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RecordId;

/// The only algorithm tokens are signed and accepted with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Validity window of a session token.
pub const SESSION_TTL_HOURS: i64 = 24;

/// SessionClaims
///
/// Identity and expiry payload embedded in a session token. Never persisted: it lives
/// only inside the opaque string held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub subject_id: RecordId,
    #[serde(rename = "username")]
    pub subject_name: String,
    /// Issued at, seconds since the epoch. Informational only, so it may be absent.
    #[serde(default)]
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// TokenError
///
/// Internal classification of token failures. Every verification variant collapses
/// to the same 401 at the HTTP boundary but stays distinguishable in logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed or its signature does not match")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token claims are missing or have the wrong shape")]
    MalformedClaims,
    #[error("token is signed with an unexpected algorithm")]
    WrongAlgorithm,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// TokenService
///
/// Issues and verifies HS256 session tokens with a process-wide key. The key is handed
/// in once at startup; the service itself is immutable and shared behind an `Arc`.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = true;
        // `exp` is authoritative: no grace period past it.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// issue
    ///
    /// Signs a fresh token for the subject, valid for 24 hours from now. Each call yields
    /// an independent token; earlier tokens stay valid until they expire.
    pub fn issue(&self, subject_id: RecordId, subject_name: &str) -> Result<String, TokenError> {
        self.issue_at(subject_id, subject_name, Utc::now())
    }

    /// Same as `issue`, with an explicit issue time.
    pub fn issue_at(
        &self,
        subject_id: RecordId,
        subject_name: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims {
            subject_id,
            subject_name: subject_name.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// verify
    ///
    /// Checks structure, algorithm, signature and expiry, then the claim shapes.
    /// Claims are decoded in two steps so that a correctly signed token with bad
    /// identity fields is reported as `MalformedClaims`, not `Invalid`.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        // `decode` rejects headers naming algorithms it does not know (e.g. `none`) as
        // plain JSON errors, so the declared algorithm is checked on the raw header first.
        if declared_algorithm(token).is_some_and(|alg| alg != "HS256") {
            return Err(TokenError::WrongAlgorithm);
        }

        let data = decode::<serde_json::Value>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidAlgorithm => TokenError::WrongAlgorithm,
                ErrorKind::MissingRequiredClaim(_) => TokenError::MalformedClaims,
                _ => TokenError::Invalid,
            })?;

        let claims: SessionClaims =
            serde_json::from_value(data.claims).map_err(|_| TokenError::MalformedClaims)?;
        if claims.subject_name.is_empty() {
            return Err(TokenError::MalformedClaims);
        }
        Ok(claims)
    }
}

/// Reads the `alg` field of the token header without verifying anything.
fn declared_algorithm(token: &str) -> Option<String> {
    let header = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(header).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("alg")?.as_str().map(str::to_string)
}
