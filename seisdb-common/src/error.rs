//! Common error types for seisdb

use thiserror::Error;

/// Common result type for seisdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the seisdb crates
///
/// Absence of an artifact on disk is never an error: locators return
/// `Option` for that. These variants cover the genuinely exceptional
/// conditions.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    ///
    /// A missing table or schema mismatch surfaces here and is fatal for
    /// the whole run.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or resolution error
    ///
    /// A dispatcher script or group config that cannot be resolved. Callers
    /// log these and skip the affected artifact or group; siblings continue.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text that should parse as a date/number did not
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed CSV input during bulk loading
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A foreign-key dependency could neither be found nor inserted
    ///
    /// Fatal for the entity graph being persisted; the graph is skipped.
    #[error("Unresolved dependency for table {table}: {reason}")]
    DependencyUnresolved { table: String, reason: String },
}

impl Error {
    /// True when the underlying failure is a unique-constraint violation
    ///
    /// Merge policies treat this case as a signal, not a failure.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    }
}
