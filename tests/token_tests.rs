use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use review_board::{
    models::RecordId,
    token::{SESSION_TTL_HOURS, TokenError, TokenService},
};
use serde_json::json;

const TEST_SECRET: &str = "token-test-secret-value-1234567890";

fn service() -> TokenService {
    TokenService::new(TEST_SECRET.as_bytes())
}

fn sign(header: Header, claims: serde_json::Value) -> String {
    encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
}

// Replaces one character in the given segment (0 = header, 1 = payload, 2 = signature).
fn mutate_segment(token: &str, segment: usize) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let target = &mut parts[segment];
    let index = target.len() / 2;
    let original = target.as_bytes()[index];
    let replacement = if original == b'A' { 'B' } else { 'A' };
    target.replace_range(index..index + 1, &replacement.to_string());
    parts.join(".")
}

#[test]
fn test_issue_then_verify_returns_identity() {
    let tokens = service();
    let id = RecordId::new();

    let token = tokens.issue(id, "kevin").unwrap();
    let claims = tokens.verify(&token).unwrap();

    assert_eq!(claims.subject_id, id);
    assert_eq!(claims.subject_name, "kevin");
    assert_eq!(claims.exp - claims.iat, SESSION_TTL_HOURS * 3600);
}

#[test]
fn test_multiple_tokens_for_same_user_are_all_valid() {
    let tokens = service();
    let id = RecordId::new();

    let first = tokens.issue_at(id, "kevin", Utc::now() - Duration::hours(2)).unwrap();
    let second = tokens.issue(id, "kevin").unwrap();

    assert_ne!(first, second);
    assert!(tokens.verify(&first).is_ok());
    assert!(tokens.verify(&second).is_ok());
}

#[test]
fn test_mutated_signature_is_invalid() {
    let tokens = service();
    let token = tokens.issue(RecordId::new(), "kevin").unwrap();

    let tampered = mutate_segment(&token, 2);
    assert_eq!(tokens.verify(&tampered), Err(TokenError::Invalid));
}

#[test]
fn test_mutated_payload_is_invalid() {
    let tokens = service();
    let token = tokens.issue(RecordId::new(), "kevin").unwrap();

    let tampered = mutate_segment(&token, 1);
    assert_eq!(tokens.verify(&tampered), Err(TokenError::Invalid));
}

#[test]
fn test_token_from_other_key_is_invalid() {
    let other = TokenService::new(b"a-completely-different-secret-key");
    let token = other.issue(RecordId::new(), "kevin").unwrap();

    assert_eq!(service().verify(&token), Err(TokenError::Invalid));
}

#[test]
fn test_garbage_is_invalid() {
    assert_eq!(service().verify("not.a.jwt"), Err(TokenError::Invalid));
    assert_eq!(service().verify(""), Err(TokenError::Invalid));
}

#[test]
fn test_expired_token_rejected_even_with_valid_signature() {
    let tokens = service();
    let issued = Utc::now() - Duration::hours(SESSION_TTL_HOURS + 1);
    let token = tokens.issue_at(RecordId::new(), "kevin", issued).unwrap();

    assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
}

#[test]
fn test_token_near_end_of_window_still_valid() {
    let tokens = service();
    let issued = Utc::now() - Duration::hours(SESSION_TTL_HOURS - 1);
    let token = tokens.issue_at(RecordId::new(), "kevin", issued).unwrap();

    assert!(tokens.verify(&token).is_ok());
}

#[test]
fn test_other_hmac_algorithm_is_rejected() {
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let token = sign(
        Header::new(Algorithm::HS512),
        json!({
            "userId": RecordId::new().to_string(),
            "username": "kevin",
            "iat": Utc::now().timestamp(),
            "exp": exp,
        }),
    );

    assert_eq!(service().verify(&token), Err(TokenError::WrongAlgorithm));
}

#[test]
fn test_missing_identity_claim_is_malformed() {
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let token = sign(
        Header::new(Algorithm::HS256),
        json!({ "username": "kevin", "iat": 0, "exp": exp }),
    );

    assert_eq!(service().verify(&token), Err(TokenError::MalformedClaims));
}

#[test]
fn test_wrongly_typed_identity_claim_is_malformed() {
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let numeric_id = sign(
        Header::new(Algorithm::HS256),
        json!({ "userId": 42, "username": "kevin", "iat": 0, "exp": exp }),
    );
    let non_hex_id = sign(
        Header::new(Algorithm::HS256),
        json!({ "userId": "not-a-hex-id", "username": "kevin", "iat": 0, "exp": exp }),
    );
    let empty_name = sign(
        Header::new(Algorithm::HS256),
        json!({ "userId": RecordId::new().to_string(), "username": "", "iat": 0, "exp": exp }),
    );

    assert_eq!(service().verify(&numeric_id), Err(TokenError::MalformedClaims));
    assert_eq!(service().verify(&non_hex_id), Err(TokenError::MalformedClaims));
    assert_eq!(service().verify(&empty_name), Err(TokenError::MalformedClaims));
}

#[test]
fn test_missing_expiry_is_malformed() {
    let token = sign(
        Header::new(Algorithm::HS256),
        json!({ "userId": RecordId::new().to_string(), "username": "kevin", "iat": 0 }),
    );

    assert_eq!(service().verify(&token), Err(TokenError::MalformedClaims));
}

#[test]
fn test_unsigned_token_is_wrong_algorithm() {
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "userId": RecordId::new().to_string(), "username": "kevin", "exp": exp })
            .to_string(),
    );

    let token = format!("{header}.{payload}.");
    assert_eq!(service().verify(&token), Err(TokenError::WrongAlgorithm));
}

#[test]
fn test_missing_issued_at_is_accepted() {
    let id = RecordId::new();
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let token = sign(
        Header::new(Algorithm::HS256),
        json!({ "userId": id.to_string(), "username": "kevin", "exp": exp }),
    );

    let claims = service().verify(&token).unwrap();
    assert_eq!(claims.subject_id, id);
    assert_eq!(claims.iat, 0);
}
