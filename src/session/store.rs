use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::Instrument;

use super::SessionError;
use crate::store::is_unique_violation;

/// Server-held data behind one session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// `None` means the session only ends on logout.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Token table keyed by the SHA-256 of the session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new record. A key that already exists yields
    /// [`SessionError::Collision`].
    async fn insert(&self, key: &[u8], record: SessionRecord) -> Result<(), SessionError>;

    /// Fetch a live record; expired records read as `None`.
    async fn get(&self, key: &[u8]) -> Result<Option<SessionRecord>, SessionError>;

    /// Remove a record. Removing a missing key is not an error.
    async fn delete(&self, key: &[u8]) -> Result<(), SessionError>;

    /// Drop expired records, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<Vec<u8>, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, key: &[u8], record: SessionRecord) -> Result<(), SessionError> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Err(SessionError::Collision);
        }
        records.insert(key.to_vec(), record);
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<SessionRecord>, SessionError> {
        let now = Utc::now();
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), SessionError> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }
}

/// Sessions in the `user_sessions` table, sharing the user store's pool.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, key: &[u8], record: SessionRecord) -> Result<(), SessionError> {
        let query = r"
            INSERT INTO user_sessions (session_hash, username, first_name, last_name, expires_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(key)
            .bind(&record.username)
            .bind(&record.first_name)
            .bind(&record.last_name)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(SessionError::Collision),
            Err(err) => Err(SessionError::Store(err)),
        }
    }

    async fn get(&self, key: &[u8]) -> Result<Option<SessionRecord>, SessionError> {
        let query = r"
            SELECT username, first_name, last_name, expires_at
            FROM user_sessions
            WHERE session_hash = $1
              AND (expires_at IS NULL OR expires_at > NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| SessionRecord {
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn delete(&self, key: &[u8]) -> Result<(), SessionError> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let query = "DELETE FROM user_sessions WHERE expires_at IS NOT NULL AND expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected())
    }
}
