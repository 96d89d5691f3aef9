//! Database initialization
//!
//! Opens (creating if absent) the SQLite database and brings the schema to
//! the shape the rest of the system assumes. Table creation is idempotent,
//! so startup against an existing database is a no-op.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use crate::Result;

/// Open the database at `db_path` without touching the schema
///
/// The parent directory is created if needed. Foreign keys are enforced and
/// the journal runs in WAL mode; a single connection keeps writers serial.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    configure_connection(&pool).await?;
    Ok(pool)
}

/// Open the database at `db_path` and initialize the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let pool = connect(db_path).await?;
    create_tables(&pool).await?;

    info!("Database initialized at {}", db_path.display());
    Ok(pool)
}

/// Open an in-memory database with the full schema; used by tests
pub async fn init_memory() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    configure_connection(&pool).await?;
    create_tables(&pool).await?;
    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;
    Ok(())
}

/// Create all tables and indexes if they do not exist
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_dispatchers_table(pool).await?;
    create_forecast_groups_table(pool).await?;
    create_dispatchers_forecast_groups_table(pool).await?;
    create_scheduled_dates_table(pool).await?;
    create_forecasts_table(pool).await?;
    create_evaluations_table(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

async fn create_dispatchers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Dispatchers (
            dispatcher_id INTEGER PRIMARY KEY,
            script_path TEXT NOT NULL UNIQUE,
            config_file_name TEXT,
            waiting_period INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_forecast_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ForecastGroups (
            group_id INTEGER PRIMARY KEY,
            group_path TEXT NOT NULL UNIQUE,
            group_name TEXT,
            description TEXT,
            config_filepath TEXT,
            forecast_dir TEXT,
            result_dir TEXT,
            observation_dir TEXT,
            entry_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_dispatchers_forecast_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Dispatchers_ForecastGroups (
            dispatcher_id INTEGER NOT NULL REFERENCES Dispatchers(dispatcher_id),
            group_id INTEGER NOT NULL REFERENCES ForecastGroups(group_id),
            PRIMARY KEY (dispatcher_id, group_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_scheduled_dates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ScheduledDates (
            schedule_id INTEGER PRIMARY KEY,
            date_time TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('forecast', 'evaluation')),
            UNIQUE (date_time, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_forecasts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Forecasts (
            forecast_id INTEGER PRIMARY KEY,
            schedule_id INTEGER NOT NULL REFERENCES ScheduledDates(schedule_id),
            group_id INTEGER NOT NULL REFERENCES ForecastGroups(group_id),
            name TEXT NOT NULL,
            filepath TEXT UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('Missing', 'Scheduled', 'Complete')),
            waiting_period INTEGER,
            runtime_testdate TEXT,
            logfile TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_evaluations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Evaluations (
            evaluation_id INTEGER PRIMARY KEY,
            schedule_id INTEGER NOT NULL REFERENCES ScheduledDates(schedule_id),
            forecast_id INTEGER NOT NULL REFERENCES Forecasts(forecast_id),
            name TEXT NOT NULL,
            filepath TEXT,
            status TEXT NOT NULL CHECK (status IN ('Missing', 'Scheduled', 'Complete')),
            creation_datetime TEXT,
            runtime_dir TEXT,
            catalog_result_filepath TEXT,
            catalog_status TEXT CHECK (catalog_status IN ('Missing', 'Scheduled', 'Present')),
            catalog_creation_datetime TEXT,
            UNIQUE (forecast_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_forecasts_group ON Forecasts(group_id)",
        "CREATE INDEX IF NOT EXISTS idx_forecasts_status ON Forecasts(status)",
        "CREATE INDEX IF NOT EXISTS idx_evaluations_forecast ON Evaluations(forecast_id)",
        "CREATE INDEX IF NOT EXISTS idx_evaluations_status ON Evaluations(status)",
        "CREATE INDEX IF NOT EXISTS idx_scheduled_dates_date ON ScheduledDates(date_time)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}
