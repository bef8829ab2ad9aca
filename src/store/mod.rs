//! User persistence.
//!
//! A [`UserStore`] holds one row per registered user, keyed by the exact
//! (case-sensitive) username. Two backends are provided: [`PgUserStore`] for
//! the running service and [`MemoryUserStore`] for tests and local runs.
//!
//! Uniqueness of usernames is enforced by the backend itself. Callers still
//! look the username up first to answer with a friendly message, but an insert
//! that loses a race reports [`StoreError::Conflict`].

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// A registered user as read back from the store.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string, never the plaintext password.
    pub password_hash: String,
    /// Creation time rendered in the configured timezone.
    pub created_at: DateTime<FixedOffset>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password_hash", &"***")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Fields required to insert a user.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The username is already taken (unique constraint).
    #[error("username already exists")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact-match lookup by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user, failing with [`StoreError::Conflict`] when the
    /// username exists.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// SQLSTATE 23505: `unique_violation`.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
