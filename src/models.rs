use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Identifiers ---

/// RecordId
///
/// Store-assigned identifier for accounts and reviews. Internally a UUIDv4; on the wire
/// it is rendered as 32 lowercase hex digits and must round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct RecordId(Uuid);

/// Returned when a wire identifier is not 32 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record id: {0:?}")]
pub struct InvalidRecordId(pub String);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    // Only the simple 32-digit form is accepted; hyphenated, braced or URN forms
    // would not round-trip.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.len() != 32 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidRecordId(raw.to_string()));
        }
        Uuid::try_parse(raw)
            .map(Self)
            .map_err(|_| InvalidRecordId(raw.to_string()))
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// --- Stored Records ---

/// Account
///
/// A registered identity. Created on registration and never mutated afterwards.
/// Not `Serialize`: the password hash must never reach a response body.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: RecordId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Review
///
/// An owned content item. `author_id` is fixed at creation and `author_name` is a
/// snapshot of the author's username at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Review {
    #[serde(rename = "_id")]
    #[schema(value_type = String, example = "6f1c2f0e9b7d4a8c9e2b3a4d5c6e7f80")]
    #[ts(type = "string")]
    pub id: RecordId,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub author_id: RecordId,
    pub author_name: String,
    pub name: String,
    pub store: String,
    pub category: String,
    pub menu: String,
    pub taste: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub memo: Option<String>,
    #[serde(rename = "recommend")]
    pub recommendation: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// ReviewDraft
///
/// Body of `POST /api/reviews` and `PUT /api/reviews/{id}`. Every field defaults so that
/// a missing field surfaces as a validation error naming it, rather than a JSON error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(default)]
#[ts(export)]
pub struct ReviewDraft {
    pub name: String,
    pub store: String,
    pub category: String,
    pub menu: String,
    pub taste: String,
    pub tags: Vec<String>,
    #[ts(optional)]
    pub memo: Option<String>,
    #[serde(rename = "recommend")]
    pub recommendation: String,
}

/// ReviewContent
///
/// The author-editable part of a review, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewContent {
    pub name: String,
    pub store: String,
    pub category: String,
    pub menu: String,
    pub taste: String,
    pub tags: Vec<String>,
    pub memo: Option<String>,
    pub recommendation: String,
}

impl ReviewDraft {
    /// validate
    ///
    /// All text fields except `memo` must be non-blank and `tags` must contain at least
    /// one non-blank entry. Tags form a set: repeats are dropped, first occurrence wins.
    /// Values are otherwise kept byte-for-byte; nothing is trimmed.
    pub fn validate(self) -> Result<ReviewContent, ApiError> {
        let required = [
            ("name", &self.name),
            ("store", &self.store),
            ("category", &self.category),
            ("menu", &self.menu),
            ("taste", &self.taste),
            ("recommend", &self.recommendation),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        if self.tags.is_empty() {
            return Err(ApiError::validation("At least one tag is required"));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ApiError::validation("Tags must not be blank"));
        }
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(ReviewContent {
            name: self.name,
            store: self.store,
            category: self.category,
            menu: self.menu,
            taste: self.taste,
            tags,
            memo: self.memo,
            recommendation: self.recommendation,
        })
    }
}

/// NewReview
///
/// Everything the repository needs to insert a review. Ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub author_id: RecordId,
    pub author_name: String,
    pub content: ReviewContent,
    pub created_at: DateTime<Utc>,
}

/// AccountCredentials
///
/// Body of `POST /register` and `POST /login`. No `Debug` derive so the password can
/// never end up in a log line.
#[derive(Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(default)]
#[ts(export)]
pub struct AccountCredentials {
    #[schema(example = "kevin")]
    pub username: String,
    #[schema(example = "correct horse battery staple")]
    pub password: String,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub user_id: RecordId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Acknowledgement returned by update and delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}
