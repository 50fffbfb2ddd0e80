use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of [`UserDirectory::register`](crate::users::UserDirectory::register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterStatus {
    Registered,
    AlreadyExists,
    InvalidEmail,
    /// Storage or hashing failed; details are only in the logs.
    Failed,
}

/// Outcome of a login. Unknown email and wrong password are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    LoginSuccessful,
    InvalidCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    /// The role was set on the in-memory `User` only; nothing was written.
    AssignedInMemory,
    NoPermission,
}

impl RegisterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterStatus::Registered => "registered",
            RegisterStatus::AlreadyExists => "already_exists",
            RegisterStatus::InvalidEmail => "invalid_email",
            RegisterStatus::Failed => "failed",
        }
    }
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStatus::LoginSuccessful => "login_successful",
            LoginStatus::InvalidCredentials => "invalid_credentials",
        }
    }
}

impl RoleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleStatus::AssignedInMemory => "assigned_in_memory",
            RoleStatus::NoPermission => "no_permission",
        }
    }
}

impl fmt::Display for RegisterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RoleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
