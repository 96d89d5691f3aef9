//! Ad-hoc SQL reports
//!
//! Runs a statements file against the database and writes each result set
//! to the given sink. Statements are separated by blank lines, the same
//! layout the schema bootstrap reads. Reports are expected to be SELECTs,
//! though anything the database accepts will run.

use std::io::Write;
use std::path::Path;

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::info;

use seisdb_common::db::schema::split_statements;
use seisdb_common::db::Store;
use seisdb_common::Result;

/// Counters for one report run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub statements: usize,
    pub rows: usize,
}

/// Run every statement in the file at `path`, writing result sets to `out`
///
/// A statement the database rejects is fatal for the report.
pub async fn run_report_file(
    store: &Store,
    path: &Path,
    out: &mut impl Write,
) -> Result<ReportSummary> {
    let script = std::fs::read_to_string(path)?;
    let mut summary = ReportSummary::default();
    for statement in split_statements(&script) {
        let rows = store.fetch_all(&statement, &[]).await?;
        render(&statement, &rows, out)?;
        summary.statements += 1;
        summary.rows += rows.len();
    }
    info!(
        "Report finished: {} statements, {} rows from {}",
        summary.statements,
        summary.rows,
        path.display()
    );
    Ok(summary)
}

/// Write one result set: statement head, column names, then the rows
fn render(statement: &str, rows: &[SqliteRow], out: &mut impl Write) -> Result<()> {
    let head = statement.lines().next().unwrap_or_default();
    writeln!(out, "== {head}")?;
    if let Some(first) = rows.first() {
        let names: Vec<&str> = first.columns().iter().map(|column| column.name()).collect();
        writeln!(out, "{}", names.join("|"))?;
    }
    for row in rows {
        let mut fields = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            fields.push(render_value(row, index)?);
        }
        writeln!(out, "{}", fields.join("|"))?;
    }
    writeln!(out, "({} rows)", rows.len())?;
    writeln!(out)?;
    Ok(())
}

/// One column value as display text; NULL renders empty
fn render_value(row: &SqliteRow, index: usize) -> Result<String> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let rendered = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index)?.to_string(),
        "REAL" => row.try_get::<f64, _>(index)?.to_string(),
        _ => row.try_get::<String, _>(index)?,
    };
    Ok(rendered)
}
