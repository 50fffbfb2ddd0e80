use async_trait::async_trait;

use crate::db::{ConnectionManager, DbError};
use crate::users::repo_types::{InsertOutcome, User};

/// Storage operations the directory needs.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError>;
    async fn list_all(&self) -> Result<Vec<User>, DbError>;
    /// Inserts a row with no role. A clash on `username` is `Duplicate`, not an error.
    async fn insert(&self, username: &str, password_hash: &str) -> Result<InsertOutcome, DbError>;
}

#[async_trait]
impl UserStore for ConnectionManager {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let users = self
            .query::<User>(
                r#"
                SELECT id, username, password_hash, role
                FROM users
                WHERE username = $1
                "#,
                &[username.into()],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn list_all(&self) -> Result<Vec<User>, DbError> {
        self.query::<User>(
            r#"
            SELECT id, username, password_hash, role
            FROM users
            ORDER BY id
            "#,
            &[],
        )
        .await
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<InsertOutcome, DbError> {
        let inserted = self
            .query::<User>(
                r#"
                INSERT INTO users (username, password_hash)
                VALUES ($1, $2)
                RETURNING id, username, password_hash, role
                "#,
                &[username.into(), password_hash.into()],
            )
            .await;

        match inserted {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(InsertOutcome::Inserted)
                .ok_or(DbError::Query(sqlx::Error::RowNotFound)),
            Err(e) if e.is_unique_violation() => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }
}
