//! Bulk CSV seeding
//!
//! Loads per-table CSV exports into an initialized database. Files are
//! headerless and the first CSV column is the source row index, always
//! skipped. Ordinary tables regenerate their surrogate ids, so loading
//! assumes an empty database where regenerated ids line up with the source
//! ids referenced by child rows. Join tables load every column.

use std::path::Path;

use csv::ReaderBuilder;
use sqlx::Row;
use tracing::{info, warn};

use crate::db::store::{SqlParam, Store};
use crate::{Error, Result};

/// Table shape from the loader's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// First column is a generated surrogate id and is not loaded
    Standard,
    /// Composite-key join table; every column is loaded
    Join,
}

/// Known tables in foreign-key dependency order
pub const LOAD_ORDER: &[(&str, TableKind)] = &[
    ("Dispatchers", TableKind::Standard),
    ("ForecastGroups", TableKind::Standard),
    ("Dispatchers_ForecastGroups", TableKind::Join),
    ("ScheduledDates", TableKind::Standard),
    ("Forecasts", TableKind::Standard),
    ("Evaluations", TableKind::Standard),
];

/// Counters for one load run
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadSummary {
    pub files_loaded: usize,
    pub rows_inserted: u64,
    pub conflicts_ignored: u64,
    pub rows_skipped: u64,
}

/// Load every `<Table>.csv` found in `dir`, in dependency order
///
/// Absent files are fine; a table with no export is simply not seeded.
pub async fn load_directory(store: &Store, dir: &Path) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    for (table, kind) in LOAD_ORDER {
        let path = dir.join(format!("{table}.csv"));
        if !path.is_file() {
            continue;
        }
        info!("Loading {} from {}", table, path.display());
        load_table(store, table, *kind, &path, &mut summary).await?;
        summary.files_loaded += 1;
    }
    info!(
        "Seed load finished: {} files, {} rows inserted, {} conflicts ignored, {} rows skipped",
        summary.files_loaded,
        summary.rows_inserted,
        summary.conflicts_ignored,
        summary.rows_skipped
    );
    Ok(summary)
}

/// Load one CSV file into `table`
pub async fn load_table(
    store: &Store,
    table: &str,
    kind: TableKind,
    path: &Path,
    summary: &mut LoadSummary,
) -> Result<()> {
    let mut columns = table_columns(store, table).await?;
    if columns.is_empty() {
        return Err(Error::Config(format!(
            "table {table} does not exist in database"
        )));
    }
    if kind == TableKind::Standard {
        columns.remove(0);
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    for record in reader.records() {
        let record = record?;
        let params: Vec<SqlParam> = record
            .iter()
            .skip(1)
            .map(|field| {
                if field.is_empty() {
                    SqlParam::Null
                } else {
                    SqlParam::Text(field.to_string())
                }
            })
            .collect();

        if params.len() != columns.len() {
            warn!(
                "Skipping row with {} values (expected {}) in {}",
                params.len(),
                columns.len(),
                path.display()
            );
            summary.rows_skipped += 1;
            continue;
        }

        match store.execute(&sql, &params).await {
            Ok(outcome) => summary.rows_inserted += outcome.rows_affected,
            Err(err) if err.is_unique_violation() => {
                warn!("Unique constraint conflict for table {table}; row skipped");
                summary.conflicts_ignored += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Column names of `table` in declaration order; empty if the table is absent
async fn table_columns(store: &Store, table: &str) -> Result<Vec<String>> {
    let rows = store
        .fetch_all(&format!("PRAGMA table_info({table})"), &[])
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory;
    use std::io::Write;

    async fn test_store() -> Store {
        Store::new(init_memory().await.unwrap())
    }

    fn write_csv(dir: &Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_load_directory_reassigns_surrogate_ids() {
        let store = test_store().await;
        let dir = tempfile::tempdir().unwrap();

        write_csv(
            dir.path(),
            "Dispatchers.csv",
            "7,/scripts/dispatcher_daily,dispatcher.init,31\n\
             9,/scripts/dispatcher_monthly,dispatcher.init,62\n",
        );

        let summary = load_directory(&store, dir.path()).await.unwrap();
        assert_eq!(summary.files_loaded, 1);
        assert_eq!(summary.rows_inserted, 2);

        let rows = store
            .fetch_all(
                "SELECT dispatcher_id, script_path FROM Dispatchers ORDER BY dispatcher_id",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        // Source ids 7 and 9 are dropped; the database numbers rows afresh
        assert_eq!(rows[0].try_get::<i64, _>(0).unwrap(), 1);
        assert_eq!(
            rows[0].try_get::<String, _>(1).unwrap(),
            "/scripts/dispatcher_daily"
        );
        assert_eq!(rows[1].try_get::<i64, _>(0).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_join_table_keeps_all_columns() {
        let store = test_store().await;
        let dir = tempfile::tempdir().unwrap();

        write_csv(
            dir.path(),
            "Dispatchers.csv",
            "1,/scripts/dispatcher_daily,dispatcher.init,31\n",
        );
        write_csv(
            dir.path(),
            "ForecastGroups.csv",
            "1,/forecasts/one-day,one-day-models,,,,,,\n",
        );
        write_csv(dir.path(), "Dispatchers_ForecastGroups.csv", "1,1,1\n");

        let summary = load_directory(&store, dir.path()).await.unwrap();
        assert_eq!(summary.files_loaded, 3);

        let row = store
            .fetch_optional(
                "SELECT dispatcher_id, group_id FROM Dispatchers_ForecastGroups",
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.try_get::<i64, _>(0).unwrap(), 1);
        assert_eq!(row.try_get::<i64, _>(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reload_warns_and_continues_on_conflicts() {
        let store = test_store().await;
        let dir = tempfile::tempdir().unwrap();

        write_csv(
            dir.path(),
            "Dispatchers.csv",
            "1,/scripts/dispatcher_daily,dispatcher.init,31\n",
        );

        load_directory(&store, dir.path()).await.unwrap();
        let second = load_directory(&store, dir.path()).await.unwrap();

        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.conflicts_ignored, 1);

        let row = store
            .fetch_optional("SELECT COUNT(*) FROM Dispatchers", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.try_get::<i64, _>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_fields_become_null() {
        let store = test_store().await;
        let dir = tempfile::tempdir().unwrap();

        write_csv(
            dir.path(),
            "Dispatchers.csv",
            "1,/scripts/dispatcher_daily,,\n",
        );

        load_directory(&store, dir.path()).await.unwrap();
        let row = store
            .fetch_optional(
                "SELECT config_file_name IS NULL, waiting_period IS NULL FROM Dispatchers",
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.try_get::<i64, _>(0).unwrap(), 1);
        assert_eq!(row.try_get::<i64, _>(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_short_rows_skipped() {
        let store = test_store().await;
        let dir = tempfile::tempdir().unwrap();

        write_csv(
            dir.path(),
            "Dispatchers.csv",
            "1,/scripts/dispatcher_daily\n2,/scripts/dispatcher_monthly,dispatcher.init,62\n",
        );

        let summary = load_directory(&store, dir.path()).await.unwrap();
        assert_eq!(summary.rows_inserted, 1);
        assert_eq!(summary.rows_skipped, 1);
    }
}
