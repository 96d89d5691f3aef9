//! # seisdb Common Library
//!
//! Shared code for the seisdb tooling:
//! - Error taxonomy and result alias
//! - Date/text conversion helpers
//! - Artifact status classification
//! - Expectation schedule generation
//! - Database bootstrap, store adapter and the entity-graph insert engine
//! - Bulk CSV loading

pub mod db;
pub mod error;
pub mod schedule;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use status::{CatalogStatus, Status};
