//! Schema bootstrap from a DDL text file
//!
//! The built-in schema (`init::create_tables`) covers normal operation;
//! deployments that maintain their own DDL can apply a text file of CREATE
//! statements instead. Statements are separated by blank lines and may span
//! multiple lines. Unix newlines only.

use std::path::Path;

use tracing::{debug, info};

use crate::db::store::Store;
use crate::Result;

/// Split a DDL script into statements on blank lines
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Execute every statement in the DDL file at `path`
///
/// Returns the number of statements applied. Any statement failure is
/// fatal; the database may be left partially bootstrapped.
pub async fn apply_schema_file(store: &Store, path: &Path) -> Result<usize> {
    let script = std::fs::read_to_string(path)?;
    let statements = split_statements(&script);
    for statement in &statements {
        let head = statement.lines().next().unwrap_or_default();
        debug!("Applying: {head}");
        store.execute(statement, &[]).await?;
    }
    info!(
        "Applied {} schema statements from {}",
        statements.len(),
        path.display()
    );
    Ok(statements.len())
}
