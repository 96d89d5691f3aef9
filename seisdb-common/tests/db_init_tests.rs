//! End-to-end database bootstrap tests
//!
//! Exercise the file-backed path: automatic creation with the built-in
//! schema, reopening an existing database, the no-schema connect used by
//! reporting, and DDL-file bootstrap feeding the CSV loader.

use seisdb_common::db::loader::load_directory;
use seisdb_common::db::schema::apply_schema_file;
use seisdb_common::db::{connect, init_database, Store};

#[tokio::test]
async fn test_database_created_with_schema_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("seisdb.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "database file was not created");

    let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(journal.to_lowercase(), "wal");

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 6);
}

#[tokio::test]
async fn test_reopening_existing_database_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("seisdb.db");

    let first = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO Dispatchers (script_path) VALUES ('/scripts/dispatcher_daily')")
        .execute(&first)
        .await
        .unwrap();
    drop(first);

    let second = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Dispatchers")
        .fetch_one(&second)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_connect_leaves_schema_alone() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("seisdb.db");

    let pool = connect(&db_path).await.unwrap();
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 0);
}

#[tokio::test]
async fn test_ddl_file_bootstrap_feeds_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("seisdb.db");
    let ddl = dir.path().join("table_schema.txt");
    std::fs::write(
        &ddl,
        r#"CREATE TABLE Dispatchers (
    dispatcher_id INTEGER PRIMARY KEY,
    script_path TEXT NOT NULL UNIQUE,
    config_file_name TEXT,
    waiting_period INTEGER
);
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("Dispatchers.csv"),
        "1,/scripts/dispatcher_daily,dispatcher.init,31\n",
    )
    .unwrap();

    let store = Store::new(connect(&db_path).await.unwrap());
    let applied = apply_schema_file(&store, &ddl).await.unwrap();
    assert_eq!(applied, 1);

    let summary = load_directory(&store, dir.path()).await.unwrap();
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.rows_inserted, 1);

    store.checkpoint().await.unwrap();
}
