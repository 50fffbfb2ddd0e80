use anyhow::Context;
use userstore::{AppConfig, ConnectionManager, UserDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userstore=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    let manager = ConnectionManager::connect(&config.database)
        .await
        .context("connect to database")?;

    let result = bootstrap(&manager, &config).await;
    manager.shutdown().await;
    result
}

/// Applies the schema and reports what the store holds.
async fn bootstrap(manager: &ConnectionManager, config: &AppConfig) -> anyhow::Result<()> {
    manager.run_migrations().await.context("apply migrations")?;

    let directory = UserDirectory::from_config(manager.clone(), config)
        .context("configure password hashing")?;
    let users = directory.list_all().await.context("list users")?;
    let admins = users.iter().filter(|u| u.is_admin()).count();
    let stats = manager.stats();

    tracing::info!(
        users = users.len(),
        admins,
        active_connections = stats.active_connections,
        idle_connections = stats.idle_connections,
        "user store ready"
    );
    Ok(())
}
