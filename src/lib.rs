//! Minimal user-account store.
//!
//! [`db::ConnectionManager`] owns the Postgres pool; [`users::UserDirectory`]
//! registers accounts under a keyed digest of the email, stores an Argon2 hash
//! of the password and authenticates logins against it.

pub mod auth;
pub mod config;
pub mod db;
pub mod users;

pub use config::AppConfig;
pub use db::{ConnectionManager, DbError};
pub use users::{LoginStatus, RegisterStatus, RoleStatus, User, UserDirectory};
