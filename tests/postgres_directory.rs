//! Tests against a live Postgres.
//!
//! Configure through the same variables as the binary (`DATABASE_IP`,
//! `DATABASE_USER`, `DATABASE_PASSWORD`, `DATABASE_NAME`, `IDENTIFIER_KEY`)
//! and run with: `cargo test --test postgres_directory -- --ignored --test-threads=1`

use std::time::{Duration, Instant};

use rand::Rng;
use userstore::{
    config::{HashingConfig, POOL_SIZE},
    db::{ConnectionManager, DbError, SqlParam},
    users::{InsertOutcome, UserStore},
    AppConfig, LoginStatus, RegisterStatus, UserDirectory,
};

async fn setup() -> (ConnectionManager, UserDirectory) {
    setup_with(|_| {}).await
}

async fn setup_with(tweak: impl FnOnce(&mut AppConfig)) -> (ConnectionManager, UserDirectory) {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::from_env().expect("database environment must be set");
    tweak(&mut config);
    config.hashing = HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        lanes: 1,
    };
    let manager = ConnectionManager::connect(&config.database)
        .await
        .expect("connect to test database");
    manager.run_migrations().await.expect("apply migrations");
    let directory = UserDirectory::from_config(manager.clone(), &config).expect("directory");
    (manager, directory)
}

fn unique_email() -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("user-{n:016x}@example.com")
}

#[tokio::test]
#[ignore]
async fn test_register_and_login_roundtrip() {
    let (manager, dir) = setup().await;
    let email = unique_email();

    assert_eq!(dir.register(&email, "pw1").await, RegisterStatus::Registered);
    assert_eq!(dir.register(&email, "pw2").await, RegisterStatus::AlreadyExists);
    assert_eq!(dir.login(&email, "pw1").await.unwrap(), LoginStatus::LoginSuccessful);
    assert_eq!(dir.login(&email, "wrong").await.unwrap(), LoginStatus::InvalidCredentials);

    let id_hash = dir.hash_identifier(&email);
    let user = dir.find_by_identifier_hash(&id_hash).await.unwrap().unwrap();
    assert!(user.id > 0);
    assert_eq!(user.role, None);

    manager.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_unique_index_rejects_duplicate_insert() {
    let (manager, dir) = setup().await;
    let id_hash = dir.hash_identifier(&unique_email());

    let first = manager.insert(&id_hash, "$argon2id$placeholder").await.unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(_)));
    let second = manager.insert(&id_hash, "$argon2id$placeholder").await.unwrap();
    assert_eq!(second, InsertOutcome::Duplicate);

    manager.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_registrations_admit_one() {
    let (manager, dir) = setup().await;
    let email = unique_email();

    // more tasks than pooled connections to exercise queueing
    let handles: Vec<_> = (0..12)
        .map(|_| {
            let dir = dir.clone();
            let email = email.clone();
            tokio::spawn(async move { dir.register(&email, "pw").await })
        })
        .collect();

    let mut registered = 0;
    for h in handles {
        match h.await.unwrap() {
            RegisterStatus::Registered => registered += 1,
            RegisterStatus::AlreadyExists => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(registered, 1);

    manager.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_query_after_shutdown_fails_cleanly() {
    let (manager, dir) = setup().await;
    manager.health_check().await.expect("healthy before shutdown");
    manager.shutdown().await;

    let err = manager.query::<(i32,)>("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Closed));
    assert_eq!(dir.register(&unique_email(), "pw").await, RegisterStatus::Failed);
}

#[tokio::test]
#[ignore]
async fn test_execute_reports_rows_affected() {
    let (manager, dir) = setup().await;
    let email = unique_email();
    dir.register(&email, "pw").await;
    let user = dir
        .find_by_identifier_hash(&dir.hash_identifier(&email))
        .await
        .unwrap()
        .unwrap();

    let affected = manager
        .execute(
            "UPDATE users SET role = $1 WHERE id = $2",
            &[SqlParam::Null, user.id.into()],
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let missing = manager
        .execute("UPDATE users SET role = $1 WHERE id = $2", &[None::<&str>.into(), (-1i64).into()])
        .await
        .unwrap();
    assert_eq!(missing, 0);

    manager.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_exhausted_pool_times_out_and_failed_queries_release() {
    let (manager, _dir) = setup_with(|cfg| cfg.database.acquire_timeout_secs = 1).await;

    let mut held = Vec::new();
    for _ in 0..POOL_SIZE {
        held.push(manager.acquire().await.expect("pool has room"));
    }

    let started = Instant::now();
    let res = tokio::time::timeout(Duration::from_secs(5), manager.acquire())
        .await
        .expect("acquire must give up on its own");
    assert!(matches!(res, Err(DbError::Acquire(_))));
    assert!(started.elapsed() < Duration::from_secs(3));

    drop(held);

    for _ in 0..(POOL_SIZE * 2) {
        let err = manager
            .query::<(i32,)>("SELECT * FROM no_such_table", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
    }
    manager
        .health_check()
        .await
        .expect("failed queries must hand their connections back");

    manager.shutdown().await;
}
