use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::DbError;
use crate::users::{
    repo::UserStore,
    repo_types::{InsertOutcome, User},
};

/// In-process [`UserStore`] with the same uniqueness rule as the SQL schema.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    rows: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row as-is, e.g. an admin account for tests.
    pub async fn seed(&self, user: User) {
        self.rows.write().await.push(user);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|u| u.username == username).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, DbError> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by_key(|u| u.id);
        Ok(rows)
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<InsertOutcome, DbError> {
        // check and push under one write lock, like the unique index
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.username == username) {
            return Ok(InsertOutcome::Duplicate);
        }
        let id = rows.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: None,
        };
        rows.push(user.clone());
        Ok(InsertOutcome::Inserted(user))
    }
}
