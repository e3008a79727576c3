//! Persistence ports.
//!
//! The services only see the [`UserStore`] and [`PostStore`] traits. The
//! PostgreSQL implementations back the running server; the in-memory ones
//! back the test suites and local experiments.

mod memory;
mod postgres;

pub use memory::{InMemoryPostStore, InMemoryUserStore};
pub use postgres::{PgPostStore, PgUserStore};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PageRequest, Post, ProfileUpdate, Role, User, UserStatus};

/// Storage failures, as seen by the services
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage operation timed out")]
    Timeout,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store: user accounts and their single refresh-token slot
///
/// Lookups never return logically deleted accounts. Mutations of a missing
/// or deleted account fail with [`StoreError::NotFound`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// `email` must already be normalised to lower case
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;

    async fn create(&self, user: &User) -> StoreResult<()>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User>;

    /// Overwrite the stored refresh-token fingerprint; `None` clears it
    async fn update_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> StoreResult<()>;

    /// Replace the stored fingerprint only if it still equals `expected`
    ///
    /// Returns `false` when the slot no longer holds `expected`, i.e. another
    /// rotation, a logout or a password change got there first.
    async fn rotate_refresh_token(&self, id: Uuid, expected: &str, replacement: &str)
        -> StoreResult<bool>;

    async fn update_status(&self, id: Uuid, status: UserStatus) -> StoreResult<()>;

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()>;

    /// Set a new password hash and clear the refresh-token slot in one write
    async fn replace_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    async fn touch_last_login(&self, id: Uuid) -> StoreResult<()>;

    /// Newest first, optionally filtered by a case-insensitive substring of
    /// name or email. Returns the page and the total match count.
    async fn list(&self, search: Option<&str>, page: &PageRequest) -> StoreResult<(Vec<User>, i64)>;

    /// Logical delete; also clears the refresh-token slot
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: &Post) -> StoreResult<()>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Post>>;

    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Post>>;

    /// Every post regardless of status, newest first
    async fn list_all(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)>;

    async fn list_published(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)>;

    async fn list_by_author(&self, author_id: Uuid, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)>;

    /// Published posts whose title or content contains `query`, ignoring case
    async fn search(&self, query: &str, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)>;

    async fn update(&self, post: &Post) -> StoreResult<()>;

    async fn increment_views(&self, id: Uuid) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}
