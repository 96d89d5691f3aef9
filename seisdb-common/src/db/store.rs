//! Store adapter over the SQLite connection
//!
//! All components share one store handle and issue one statement at a time;
//! there is no concurrent writer. Every statement is its own unit of work
//! (SQLite autocommit); `checkpoint` flushes the WAL at run scope.

use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::SqlitePool;

use crate::Result;

/// A parameter bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Null,
}

impl SqlParam {
    pub fn opt_text(value: Option<String>) -> Self {
        match value {
            Some(text) => SqlParam::Text(text),
            None => SqlParam::Null,
        }
    }
}

/// Outcome of a write statement
#[derive(Debug, Clone, Copy)]
pub struct StatementOutcome {
    pub rows_affected: u64,
    /// Rowid generated by the statement's connection; only meaningful after
    /// a successful INSERT
    pub last_insert_id: i64,
}

impl From<SqliteQueryResult> for StatementOutcome {
    fn from(result: SqliteQueryResult) -> Self {
        Self {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        }
    }
}

/// Serial access to the relational store
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        params: &[SqlParam],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        for param in params {
            query = match param {
                SqlParam::Text(text) => query.bind(text.clone()),
                SqlParam::Integer(value) => query.bind(*value),
                SqlParam::Null => query.bind(None::<String>),
            };
        }
        query
    }

    /// Execute a parameterized write statement
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<StatementOutcome> {
        let result = Self::bind(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        Ok(result.into())
    }

    /// Fetch at most one row
    pub async fn fetch_optional(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<SqliteRow>> {
        let row = Self::bind(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Fetch all rows of a query
    pub async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqliteRow>> {
        let rows = Self::bind(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Fold committed WAL frames back into the database file
    ///
    /// Run-scope durability flush; individual statements are already
    /// committed when it runs.
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
