//! Entities resolved by a reconciliation pass
//!
//! Each entity pairs a table row with the configuration and filesystem
//! state needed to resolve it: dispatchers come from run scripts, groups
//! from their configuration files, forecasts/evaluations/catalogs from
//! the artifact archive. Every entity knows how to render itself as a
//! persistence record; the walk wires those records into one graph per
//! group.

pub mod catalog;
pub mod dispatcher;
pub mod evaluation;
pub mod forecast;
pub mod group;

pub use catalog::{Catalog, CatalogResolver};
pub use dispatcher::Dispatcher;
pub use evaluation::Evaluation;
pub use forecast::Forecast;
pub use group::ForecastGroup;

use chrono::NaiveDateTime;
use seisdb_common::status::{self, Status};
use seisdb_common::{Error, Result};

/// Classification that insists on a resolved waiting period
///
/// A located artifact is Complete without consulting the deadline. An
/// absent one cannot be classified without a waiting period; that case is
/// a configuration error, never a silent default.
pub(crate) fn classify_required(
    found: bool,
    expected: NaiveDateTime,
    waiting_period: Option<i64>,
    now: NaiveDateTime,
    day_offset: i64,
    subject: &str,
) -> Result<Status> {
    if found {
        return Ok(Status::Complete);
    }
    let waiting = waiting_period
        .ok_or_else(|| Error::Config(format!("waiting period unresolved for {subject}")))?;
    status::classify(false, expected, waiting, now, day_offset)
}
