use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{NewUser, StoreError, User, UserStore};

/// In-process user table. Lookup and insert share one lock, so the
/// uniqueness check and the write happen atomically.
#[derive(Debug)]
pub struct MemoryUserStore {
    timezone: Tz,
    inner: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: HashMap<String, User>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            inner: RwLock::new(Table::default()),
        }
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.rows.get(username).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = self.inner.write().await;
        if table.rows.contains_key(&user.username) {
            return Err(StoreError::Conflict);
        }

        table.next_id += 1;
        let row = User {
            id: table.next_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            created_at: Utc::now().with_timezone(&self.timezone).fixed_offset(),
        };
        table.rows.insert(row.username.clone(), row.clone());

        Ok(row)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
