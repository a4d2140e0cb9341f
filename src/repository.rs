use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};

use crate::{
    error::RepoError,
    listing::ReviewFilter,
    models::{Account, NewReview, RecordId, Review, ReviewContent},
};

/// Repository Trait
///
/// The storage collaborator behind the handlers: account lookup with a unique username
/// index, and single-document review operations. All consistency guarantees (username
/// uniqueness, atomic owner-checked updates) are delegated to the implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    /// Fails with `RepoError::Conflict` when the username is taken.
    async fn create_account(&self, username: &str, password_hash: &str)
    -> Result<Account, RepoError>;
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, RepoError>;

    // --- Reviews ---
    async fn insert_review(&self, review: NewReview) -> Result<Review, RepoError>;
    async fn get_review(&self, id: RecordId) -> Result<Option<Review>, RepoError>;
    /// Applies `content` only if the review exists and is still owned by `author_id`.
    /// Returns whether a review was updated.
    async fn update_review(
        &self,
        id: RecordId,
        author_id: RecordId,
        content: ReviewContent,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
    /// Same ownership condition as `update_review`.
    async fn delete_review(&self, id: RecordId, author_id: RecordId) -> Result<bool, RepoError>;

    // --- Listing ---
    async fn count_reviews(&self, filter: &ReviewFilter) -> Result<u64, RepoError>;
    /// Newest first, ties broken by id descending.
    async fn find_reviews(
        &self,
        filter: &ReviewFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Review>, RepoError>;
}

/// RepositoryState
///
/// The shared handle to the storage collaborator stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS accounts_username_key ON accounts (username)",
    r#"CREATE TABLE IF NOT EXISTS reviews (
        id UUID PRIMARY KEY,
        author_id UUID NOT NULL,
        author_name TEXT NOT NULL,
        name TEXT NOT NULL,
        store TEXT NOT NULL,
        category TEXT NOT NULL,
        menu TEXT NOT NULL,
        taste TEXT NOT NULL,
        tags TEXT[] NOT NULL,
        memo TEXT,
        recommendation TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS reviews_recent_idx ON reviews (created_at DESC, id DESC)",
];

const REVIEW_COLUMNS: &str = "id, author_id, author_name, name, store, category, menu, taste, \
                              tags, memo, recommendation, created_at, updated_at";

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ensure_schema
    ///
    /// Creates tables and indexes if they do not exist yet, including the unique index
    /// on `accounts.username`. Idempotent; run once at startup.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Renders the listing predicate. Used by both the count and the page query so the two
/// numbers can never drift apart.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter) {
    match filter {
        ReviewFilter::All => {}
        ReviewFilter::Category(category) => {
            builder.push(" WHERE category = ");
            builder.push_bind(category.clone());
        }
        ReviewFilter::Tag(tag) => {
            builder.push(" WHERE ");
            builder.push_bind(tag.clone());
            builder.push(" = ANY(tags)");
        }
    }
}

fn backend(operation: &'static str, err: sqlx::Error) -> RepoError {
    tracing::error!(operation, error = ?err, "postgres query failed");
    RepoError::Backend(format!("{operation}: {err}"))
}

// Postgres BIGINT bounds for OFFSET/LIMIT.
fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Account, RepoError> {
        let result = sqlx::query_as::<_, Account>(
            r#"INSERT INTO accounts (id, username, password_hash, created_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, username, password_hash, created_at"#,
        )
        .bind(RecordId::new())
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepoError::Conflict)
            }
            Err(e) => Err(backend("create_account", e)),
        }
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, RepoError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, username, password_hash, created_at FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("find_account_by_username", e))
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, RepoError> {
        let NewReview {
            author_id,
            author_name,
            content,
            created_at,
        } = review;

        sqlx::query_as::<_, Review>(&format!(
            r#"INSERT INTO reviews ({REVIEW_COLUMNS})
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
               RETURNING {REVIEW_COLUMNS}"#
        ))
        .bind(RecordId::new())
        .bind(author_id)
        .bind(author_name)
        .bind(content.name)
        .bind(content.store)
        .bind(content.category)
        .bind(content.menu)
        .bind(content.taste)
        .bind(content.tags)
        .bind(content.memo)
        .bind(content.recommendation)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| backend("insert_review", e))
    }

    async fn get_review(&self, id: RecordId) -> Result<Option<Review>, RepoError> {
        sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("get_review", e))
    }

    /// update_review
    ///
    /// One statement, so the ownership condition and the write are atomic. A review that
    /// vanished or changed hands in between simply matches zero rows.
    async fn update_review(
        &self,
        id: RecordId,
        author_id: RecordId,
        content: ReviewContent,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE reviews
               SET name = $3, store = $4, category = $5, menu = $6, taste = $7,
                   tags = $8, memo = $9, recommendation = $10, updated_at = $11
               WHERE id = $1 AND author_id = $2"#,
        )
        .bind(id)
        .bind(author_id)
        .bind(content.name)
        .bind(content.store)
        .bind(content.category)
        .bind(content.menu)
        .bind(content.taste)
        .bind(content.tags)
        .bind(content.memo)
        .bind(content.recommendation)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend("update_review", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_review(&self, id: RecordId, author_id: RecordId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend("delete_review", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_reviews(&self, filter: &ReviewFilter) -> Result<u64, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM reviews");
        push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(?filter, "count under listing filter failed");
                backend("count_reviews", e)
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_reviews(
        &self,
        filter: &ReviewFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Review>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {REVIEW_COLUMNS} FROM reviews"));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(to_bigint(limit));
        builder.push(" OFFSET ");
        builder.push_bind(to_bigint(skip));

        builder
            .build_query_as::<Review>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(?filter, skip, limit, "page fetch under listing filter failed");
                backend("find_reviews", e)
            })
    }
}

// --- In-Memory ---

#[derive(Default)]
struct MemoryStore {
    accounts: Vec<Account>,
    reviews: Vec<Review>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It enforces the same unique
/// username index, ordering and filter semantics as Postgres. Used by the test suite.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed review as-is. Lets tests control timestamps.
    pub fn seed_review(&self, review: Review) -> Result<(), RepoError> {
        self.write()?.reviews.push(review);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStore>, RepoError> {
        self.store
            .read()
            .map_err(|_| RepoError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStore>, RepoError> {
        self.store
            .write()
            .map_err(|_| RepoError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Account, RepoError> {
        let mut store = self.write()?;
        if store.accounts.iter().any(|a| a.username == username) {
            return Err(RepoError::Conflict);
        }
        let account = Account {
            id: RecordId::new(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        store.accounts.push(account.clone());
        Ok(account)
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, RepoError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, RepoError> {
        let NewReview {
            author_id,
            author_name,
            content,
            created_at,
        } = review;
        let stored = Review {
            id: RecordId::new(),
            author_id,
            author_name,
            name: content.name,
            store: content.store,
            category: content.category,
            menu: content.menu,
            taste: content.taste,
            tags: content.tags,
            memo: content.memo,
            recommendation: content.recommendation,
            created_at,
            updated_at: created_at,
        };
        self.write()?.reviews.push(stored.clone());
        Ok(stored)
    }

    async fn get_review(&self, id: RecordId) -> Result<Option<Review>, RepoError> {
        Ok(self.read()?.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn update_review(
        &self,
        id: RecordId,
        author_id: RecordId,
        content: ReviewContent,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut store = self.write()?;
        let Some(review) = store
            .reviews
            .iter_mut()
            .find(|r| r.id == id && r.author_id == author_id)
        else {
            return Ok(false);
        };
        review.name = content.name;
        review.store = content.store;
        review.category = content.category;
        review.menu = content.menu;
        review.taste = content.taste;
        review.tags = content.tags;
        review.memo = content.memo;
        review.recommendation = content.recommendation;
        review.updated_at = updated_at;
        Ok(true)
    }

    async fn delete_review(&self, id: RecordId, author_id: RecordId) -> Result<bool, RepoError> {
        let mut store = self.write()?;
        let before = store.reviews.len();
        store
            .reviews
            .retain(|r| !(r.id == id && r.author_id == author_id));
        Ok(store.reviews.len() < before)
    }

    async fn count_reviews(&self, filter: &ReviewFilter) -> Result<u64, RepoError> {
        let count = self.read()?.reviews.iter().filter(|r| filter.matches(r)).count();
        Ok(count as u64)
    }

    async fn find_reviews(
        &self,
        filter: &ReviewFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Review>, RepoError> {
        let store = self.read()?;
        let mut matching: Vec<&Review> = store.reviews.iter().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(skip).take(limit).cloned().collect())
    }
}
