use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Concurrent connections held by the pool.
pub const POOL_SIZE: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            database: "postgres".into(),
            max_connections: POOL_SIZE,
            acquire_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

/// Argon2 work factor for stored password hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            lanes: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub identifier_key: String,
    pub hashing: HashingConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("identifier_key", &"<redacted>")
            .field("hashing", &self.hashing)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            host: required(&get, "DATABASE_IP")?,
            port: parsed_or(&get, "DATABASE_PORT", defaults.port)?,
            user: required(&get, "DATABASE_USER")?,
            // an empty password is legal for trust-authenticated servers
            password: get("DATABASE_PASSWORD").ok_or(ConfigError::Missing("DATABASE_PASSWORD"))?,
            database: required(&get, "DATABASE_NAME")?,
            max_connections: POOL_SIZE,
            acquire_timeout_secs: parsed_or(
                &get,
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            )?,
        };

        let hash_defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: parsed_or(&get, "PASSWORD_HASH_MEMORY_KIB", hash_defaults.memory_kib)?,
            iterations: parsed_or(&get, "PASSWORD_HASH_ITERATIONS", hash_defaults.iterations)?,
            lanes: parsed_or(&get, "PASSWORD_HASH_LANES", hash_defaults.lanes)?,
        };

        Ok(Self {
            database,
            identifier_key: required(&get, "IDENTIFIER_KEY")?,
            hashing,
        })
    }
}

fn required<F>(get: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(var)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parsed_or<F, T>(get: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
