//! Entity-graph persistence
//!
//! A reconciliation pass builds a graph of records (dispatchers, groups,
//! scheduled dates, forecasts, evaluations) whose foreign keys point at
//! other records in the same graph rather than at row ids. The engine
//! persists a record by first resolving every such reference, probing the
//! store for an already-existing row before inserting a new one, so a pass
//! over unchanged inputs writes nothing.
//!
//! Duplicate handling is per-record: lookup-style entities ignore the
//! conflict and rebind the existing row, evaluations merge by status
//! precedence so a completed result is never downgraded.

use std::future::Future;
use std::pin::Pin;

use sqlx::Row;
use tracing::debug;

use crate::db::store::{SqlParam, Store};
use crate::status::{CatalogStatus, Status};
use crate::{Error, Result};

/// Column consulted for merge precedence
const STATUS_COLUMN: &str = "status";
const CATALOG_STATUS_COLUMN: &str = "catalog_status";

/// Handle to a record within one engine's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A column value destined for the store
///
/// Foreign keys are explicit `Ref`s to other records in the same graph;
/// they become integer row ids during persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Null,
    Ref(NodeId),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn opt_text(value: Option<String>) -> Self {
        match value {
            Some(text) => Value::Text(text),
            None => Value::Null,
        }
    }

    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    pub fn opt_integer(value: Option<i64>) -> Self {
        match value {
            Some(n) => Value::Integer(n),
            None => Value::Null,
        }
    }
}

/// How a record reacts to a unique-constraint conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// `INSERT OR IGNORE`; a swallowed conflict rebinds the existing row
    /// found through the unique columns
    IgnoreOnConflict,
    /// Plain `INSERT`; a conflict merges into the existing row by status
    /// precedence
    UpdateOnConflict {
        /// Columns rewritten when the incoming record is Complete
        full: &'static [&'static str],
        /// Columns backfilled when the incoming record carries a Present
        /// catalog and the stored row is still Missing
        catalog: &'static [&'static str],
    },
}

/// One row-producing entity: target table, ordered fields, the unique
/// columns that identify its logical row, and its conflict policy
#[derive(Debug, Clone)]
pub struct Record {
    pub table: &'static str,
    pub fields: Vec<(&'static str, Value)>,
    pub unique: Vec<&'static str>,
    pub merge: MergePolicy,
}

impl Record {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            fields: Vec::new(),
            unique: Vec::new(),
            merge: MergePolicy::IgnoreOnConflict,
        }
    }

    pub fn field(mut self, column: &'static str, value: Value) -> Self {
        self.fields.push((column, value));
        self
    }

    pub fn unique(mut self, columns: &[&'static str]) -> Self {
        self.unique = columns.to_vec();
        self
    }

    pub fn merge(mut self, policy: MergePolicy) -> Self {
        self.merge = policy;
        self
    }

    pub fn value_of(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    fn text_of(&self, column: &str) -> Option<&str> {
        match self.value_of(column) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    fn missing_column(&self, column: &str) -> Error {
        Error::DependencyUnresolved {
            table: self.table.to_string(),
            reason: format!("column {column} absent from record"),
        }
    }
}

/// Persists one pass's entity graph
///
/// Records are added as the pass discovers entities; `insert` walks the
/// dependency chain bottom-up and memoizes the bound row id per node, so a
/// shared parent (one group under hundreds of forecasts) is persisted once.
pub struct PersistenceEngine<'a> {
    store: &'a Store,
    records: Vec<Record>,
    ids: Vec<Option<i64>>,
}

impl<'a> PersistenceEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            records: Vec::new(),
            ids: Vec::new(),
        }
    }

    /// Add a record to the graph without persisting it
    pub fn add(&mut self, record: Record) -> NodeId {
        self.records.push(record);
        self.ids.push(None);
        NodeId(self.records.len() - 1)
    }

    /// Row id bound for `node`, if it has been persisted in this pass
    pub fn bound_id(&self, node: NodeId) -> Option<i64> {
        self.ids[node.0]
    }

    /// Persist `node` and every record it depends on; returns the row id
    /// bound for `node` (freshly generated or pre-existing)
    pub async fn insert(&mut self, node: NodeId) -> Result<i64> {
        self.insert_node(node).await
    }

    fn insert_node(
        &mut self,
        node: NodeId,
    ) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + '_>> {
        Box::pin(async move {
            if let Some(id) = self.ids[node.0] {
                return Ok(id);
            }
            let record = self.records[node.0].clone();

            // An existing logical row short-circuits ignore-policy records.
            // Merge-policy records always attempt the INSERT so a conflict
            // reaches merge_existing.
            if matches!(record.merge, MergePolicy::IgnoreOnConflict) && !record.unique.is_empty() {
                if let Some(existing) = self.probe(&record).await? {
                    debug!(table = record.table, id = existing, "bound existing row");
                    self.ids[node.0] = Some(existing);
                    return Ok(existing);
                }
            }

            let mut params = Vec::with_capacity(record.fields.len());
            for (_, value) in &record.fields {
                params.push(self.resolve(value).await?);
            }

            let columns: Vec<&str> = record.fields.iter().map(|(name, _)| *name).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let verb = match record.merge {
                MergePolicy::IgnoreOnConflict => "INSERT OR IGNORE INTO",
                MergePolicy::UpdateOnConflict { .. } => "INSERT INTO",
            };
            let sql = format!(
                "{verb} {} ({}) VALUES ({placeholders})",
                record.table,
                columns.join(", ")
            );

            let id = match self.store.execute(&sql, &params).await {
                Ok(outcome) if outcome.rows_affected > 0 => outcome.last_insert_id,
                Ok(_) => {
                    // OR IGNORE swallowed a conflict; recover the winner
                    self.probe(&record).await?.ok_or_else(|| {
                        Error::DependencyUnresolved {
                            table: record.table.to_string(),
                            reason: "conflicting row not found through unique columns"
                                .to_string(),
                        }
                    })?
                }
                Err(err) if err.is_unique_violation() => match record.merge {
                    MergePolicy::UpdateOnConflict { full, catalog } => {
                        self.merge_existing(&record, full, catalog).await?
                    }
                    MergePolicy::IgnoreOnConflict => return Err(err),
                },
                Err(err) => return Err(err),
            };

            self.ids[node.0] = Some(id);
            Ok(id)
        })
    }

    /// Look up the row matching the record's unique columns
    ///
    /// Reference-valued unique columns are persisted first; their row ids
    /// form part of the lookup key.
    async fn probe(&mut self, record: &Record) -> Result<Option<i64>> {
        let (filter, params) = self.unique_filter(record).await?;
        let sql = format!("SELECT rowid FROM {} WHERE {filter}", record.table);
        match self.store.fetch_optional(&sql, &params).await? {
            Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
            None => Ok(None),
        }
    }

    async fn unique_filter(&mut self, record: &Record) -> Result<(String, Vec<SqlParam>)> {
        if record.unique.is_empty() {
            return Err(Error::DependencyUnresolved {
                table: record.table.to_string(),
                reason: "record declares no unique columns to identify its row".to_string(),
            });
        }
        let mut clauses = Vec::with_capacity(record.unique.len());
        let mut params = Vec::new();
        for column in &record.unique {
            let value = record
                .value_of(column)
                .ok_or_else(|| record.missing_column(column))?
                .clone();
            match self.resolve(&value).await? {
                SqlParam::Null => clauses.push(format!("{column} IS NULL")),
                param => {
                    clauses.push(format!("{column} = ?"));
                    params.push(param);
                }
            }
        }
        Ok((clauses.join(" AND "), params))
    }

    async fn resolve(&mut self, value: &Value) -> Result<SqlParam> {
        Ok(match value {
            Value::Text(text) => SqlParam::Text(text.clone()),
            Value::Integer(n) => SqlParam::Integer(*n),
            Value::Null => SqlParam::Null,
            Value::Ref(node) => SqlParam::Integer(self.insert_node(*node).await?),
        })
    }

    /// Merge a conflicting record into its existing row by precedence
    ///
    /// A Complete incoming record rewrites the artifact and catalog
    /// columns. Failing that, a Present incoming catalog backfills the
    /// catalog columns of a row whose status is still Missing. Any other
    /// combination leaves the row untouched; in particular a Complete row
    /// is never downgraded.
    async fn merge_existing(
        &mut self,
        record: &Record,
        full: &'static [&'static str],
        catalog: &'static [&'static str],
    ) -> Result<i64> {
        let (existing_id, existing_status) = self.fetch_conflicting(record).await?;

        if record.text_of(STATUS_COLUMN) == Some(Status::Complete.as_str()) {
            self.update_columns(record, full, existing_id).await?;
            debug!(
                table = record.table,
                id = existing_id,
                "conflict resolved: completed record replaced stored row"
            );
        } else if record.text_of(CATALOG_STATUS_COLUMN) == Some(CatalogStatus::Present.as_str())
            && existing_status == Status::Missing.as_str()
        {
            self.update_columns(record, catalog, existing_id).await?;
            debug!(
                table = record.table,
                id = existing_id,
                "conflict resolved: catalog columns backfilled"
            );
        } else {
            debug!(
                table = record.table,
                id = existing_id,
                "conflict resolved: stored row takes precedence"
            );
        }
        Ok(existing_id)
    }

    async fn fetch_conflicting(&mut self, record: &Record) -> Result<(i64, String)> {
        let (filter, params) = self.unique_filter(record).await?;
        let sql = format!(
            "SELECT rowid, {STATUS_COLUMN} FROM {} WHERE {filter}",
            record.table
        );
        let row = self
            .store
            .fetch_optional(&sql, &params)
            .await?
            .ok_or_else(|| Error::DependencyUnresolved {
                table: record.table.to_string(),
                reason: "conflicting row not found through unique columns".to_string(),
            })?;
        Ok((row.try_get(0)?, row.try_get(1)?))
    }

    async fn update_columns(
        &mut self,
        record: &Record,
        columns: &'static [&'static str],
        id: i64,
    ) -> Result<()> {
        let mut assignments = Vec::with_capacity(columns.len());
        let mut params = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            let value = record
                .value_of(column)
                .ok_or_else(|| record.missing_column(column))?
                .clone();
            assignments.push(format!("{column} = ?"));
            params.push(self.resolve(&value).await?);
        }
        params.push(SqlParam::Integer(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE rowid = ?",
            record.table,
            assignments.join(", ")
        );
        self.store.execute(&sql, &params).await?;
        Ok(())
    }
}
