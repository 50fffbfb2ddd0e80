use std::time::Duration;

use sqlx::{
    pool::PoolConnection,
    postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow},
    Arguments, FromRow, PgPool, Postgres,
};
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection manager is closed")]
    Closed,
    #[error("failed to acquire a pooled connection: {0}")]
    Acquire(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Query(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Positional statement parameter, bound as `$1`, `$2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    BigInt(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::BigInt(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
}

/// Pooled access to the user database.
///
/// Cloning is cheap and shares the same pool. Construct one at startup and
/// call [`ConnectionManager::shutdown`] on exit.
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    pool: PgPool,
}

impl ConnectionManager {
    /// Opens the pool and verifies the database answers.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "creating connection pool"
        );
        let pool = pool_options(config)
            .connect_with(connect_options(config))
            .await
            .map_err(|e| {
                error!(error = %e, "failed to open connection pool");
                DbError::Acquire(e)
            })?;

        let manager = Self { pool };
        manager.health_check().await?;
        info!("connection pool ready");
        Ok(manager)
    }

    /// Builds the pool without opening any connection; the first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        Self {
            pool: pool_options(config).connect_lazy_with(connect_options(config)),
        }
    }

    /// Checks out one connection. It goes back to the pool when dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, DbError> {
        if self.pool.is_closed() {
            warn!("acquire on closed connection manager");
            return Err(DbError::Closed);
        }
        self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolClosed => {
                warn!("pool closed while waiting for a connection");
                DbError::Closed
            }
            other => {
                error!(error = %other, "failed to acquire pooled connection");
                DbError::Acquire(other)
            }
        })
    }

    /// Runs a parameterized statement and decodes every row into `T`.
    pub async fn query<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, DbError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut conn = self.acquire().await?;
        debug!(sql, params = params.len(), "query");
        sqlx::query_as_with::<_, T, _>(sql, arguments(params))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!(error = %e, sql, "query failed");
                DbError::Query(e)
            })
    }

    /// Runs a statement with no result set and returns the rows affected.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        let mut conn = self.acquire().await?;
        debug!(sql, params = params.len(), "execute");
        let done = sqlx::query_with(sql, arguments(params))
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                error!(error = %e, sql, "statement failed");
                DbError::Query(e)
            })?;
        Ok(done.rows_affected())
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        let rows: Vec<(i32,)> = self.query("SELECT 1", &[]).await?;
        match rows.first() {
            Some((1,)) => {
                debug!("database health check passed");
                Ok(())
            }
            other => {
                warn!(result = ?other, "database health check returned unexpected value");
                Err(DbError::Query(sqlx::Error::Protocol(
                    "health check returned unexpected value".into(),
                )))
            }
        }
    }

    /// Applies the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        if self.pool.is_closed() {
            return Err(DbError::Closed);
        }
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "migration failed");
                DbError::Migrate(e)
            })?;
        info!("schema migrations applied");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        PoolStats {
            active_connections: size.saturating_sub(idle) as usize,
            idle_connections: idle as usize,
            total_connections: size as usize,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Closes the pool. Later calls fail with [`DbError::Closed`].
    pub async fn shutdown(&self) {
        info!("closing connection pool");
        self.pool.close().await;
        info!("connection pool closed");
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
}

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}

fn arguments(params: &[SqlParam]) -> PgArguments {
    let mut args = PgArguments::default();
    for param in params {
        match param {
            SqlParam::BigInt(v) => args.add(*v),
            SqlParam::Text(v) => args.add(v.clone()),
            SqlParam::Null => args.add(None::<String>),
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 1,
            acquire_timeout_secs: 1,
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn sql_param_conversions() {
        assert_eq!(SqlParam::from(7i64), SqlParam::BigInt(7));
        assert_eq!(SqlParam::from("abc"), SqlParam::Text("abc".into()));
        assert_eq!(SqlParam::from(None::<&str>), SqlParam::Null);
        assert_eq!(SqlParam::from(Some("admin")), SqlParam::Text("admin".into()));
    }

    #[tokio::test]
    async fn lazy_manager_starts_empty() {
        let manager = ConnectionManager::connect_lazy(&unreachable_config());
        assert!(!manager.is_closed());
        assert_eq!(manager.stats().total_connections, 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn calls_after_shutdown_fail_with_closed() {
        let manager = ConnectionManager::connect_lazy(&unreachable_config());
        manager.shutdown().await;
        assert!(manager.is_closed());

        assert!(matches!(manager.acquire().await, Err(DbError::Closed)));

        let err = manager
            .query::<(i32,)>("SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Closed));

        let err = manager.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Closed));
    }

    #[tokio::test]
    async fn shutdown_is_visible_through_clones() {
        let manager = ConnectionManager::connect_lazy(&unreachable_config());
        let clone = manager.clone();
        manager.shutdown().await;
        assert!(matches!(clone.acquire().await, Err(DbError::Closed)));
    }

    #[tokio::test]
    async fn unreachable_database_fails_within_timeout() {
        let manager = ConnectionManager::connect_lazy(&unreachable_config());
        let res = tokio::time::timeout(Duration::from_secs(10), manager.acquire())
            .await
            .expect("acquire must not hang");
        assert!(matches!(res, Err(DbError::Acquire(_))));
        manager.shutdown().await;
    }

    #[test]
    fn only_database_errors_count_as_unique_violations() {
        assert!(!DbError::Closed.is_unique_violation());
        assert!(!DbError::Query(sqlx::Error::RowNotFound).is_unique_violation());
    }
}
