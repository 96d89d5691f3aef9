//! Artifact lifecycle status classification
//!
//! An expected artifact is classified against a waiting-period deadline:
//! present on disk means Complete, absent means Scheduled until the waiting
//! period has elapsed, Missing afterwards. Evaluations and catalogs carry a
//! day offset that shortens the waiting period relative to their forecast.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Day offset for forecast classification (due on the scheduled date)
pub const FORECAST_DAY_OFFSET: i64 = 0;

/// Default day offset for evaluations and catalogs (subtracted from the
/// waiting period; overridable through run configuration)
pub const DEFAULT_EVALUATION_DAY_OFFSET: i64 = 1;

/// Lifecycle status of an expected forecast or evaluation artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The waiting period elapsed and the artifact never appeared
    Missing,
    /// Not yet due; absence is normal
    Scheduled,
    /// The artifact exists on disk
    Complete,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Missing => "Missing",
            Status::Scheduled => "Scheduled",
            Status::Complete => "Complete",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.as_str();
        f.write_str(text)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Missing" => Ok(Status::Missing),
            "Scheduled" => Ok(Status::Scheduled),
            "Complete" => Ok(Status::Complete),
            other => Err(Error::Parse(format!("unknown status {:?}", other))),
        }
    }
}

/// Lifecycle status of the input-data catalog behind an evaluation
///
/// Catalogs record presence as `Present` rather than `Complete`; the
/// persistence precedence rules compare against that literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogStatus {
    Missing,
    Scheduled,
    Present,
}

impl From<Status> for CatalogStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Missing => CatalogStatus::Missing,
            Status::Scheduled => CatalogStatus::Scheduled,
            Status::Complete => CatalogStatus::Present,
        }
    }
}

impl CatalogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogStatus::Missing => "Missing",
            CatalogStatus::Scheduled => "Scheduled",
            CatalogStatus::Present => "Present",
        }
    }
}

impl fmt::Display for CatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.as_str();
        f.write_str(text)
    }
}

impl FromStr for CatalogStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Missing" => Ok(CatalogStatus::Missing),
            "Scheduled" => Ok(CatalogStatus::Scheduled),
            "Present" => Ok(CatalogStatus::Present),
            other => Err(Error::Parse(format!("unknown catalog status {:?}", other))),
        }
    }
}

/// Classify an expected artifact against the waiting-period deadline
///
/// `found` wins unconditionally. Otherwise the artifact is Scheduled while
/// `expected > now - (waiting_days - day_offset)` and Missing once that
/// cutoff has passed.
///
/// The waiting period must already be resolved; callers treat an
/// unresolvable waiting period as a configuration error and skip the
/// artifact rather than defaulting here. A waiting period that parses but
/// cannot express a deadline (out of calendar range) is rejected the same
/// way instead of aborting the run.
pub fn classify(
    found: bool,
    expected: NaiveDateTime,
    waiting_days: i64,
    now: NaiveDateTime,
    day_offset: i64,
) -> Result<Status> {
    if found {
        return Ok(Status::Complete);
    }
    let cutoff = waiting_days
        .checked_sub(day_offset)
        .and_then(Duration::try_days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| Error::Config(format!("waiting period {waiting_days} out of range")))?;
    Ok(if expected > cutoff {
        Status::Scheduled
    } else {
        Status::Missing
    })
}
