use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ADMIN_ROLE: &str = "admin";

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,                // assigned by storage
    pub username: String,       // identifier hash of the email
    #[serde(skip_serializing)]
    pub password_hash: String,  // Argon2 PHC string, not exposed in JSON
    pub role: Option<String>,   // free-text label, e.g. "admin"
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Result of an insert against the unique `username` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(User),
    Duplicate,
}
