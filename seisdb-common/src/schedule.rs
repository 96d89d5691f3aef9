//! Expectation schedule generation
//!
//! A schedule turns a group's entry date into the ordered sequence of dates
//! on which a forecast (and its evaluations) is expected. Sequences are
//! capped at a fixed horizon rather than running unbounded.

use chrono::{Days, Months, NaiveDate, NaiveDateTime};

/// Hard end of every generated schedule
///
/// Compiled in, not a per-run parameter: reconciliation never expects
/// artifacts at or beyond this instant.
pub fn horizon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .expect("valid horizon date")
        .and_hms_opt(0, 0, 0)
        .expect("valid horizon time")
}

/// Calendar step between consecutive expected dates
///
/// Months and years advance calendar-aware (Jan 31 + 1 month = Feb 28/29),
/// then days are added. A step of zero total ends the sequence after its
/// first date instead of looping on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub days: u32,
    pub months: u32,
    pub years: u32,
}

impl Step {
    /// Step of whole days
    pub fn days(days: u32) -> Self {
        Self { days, months: 0, years: 0 }
    }

    /// Step of whole calendar months
    pub fn months(months: u32) -> Self {
        Self { days: 0, months, years: 0 }
    }

    /// Advance a date by this step; `None` on overflow or a zero step
    pub fn advance(&self, date: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.days == 0 && self.months == 0 && self.years == 0 {
            return None;
        }
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        date.checked_add_months(Months::new(months))?
            .checked_add_days(Days::new(u64::from(self.days)))
    }
}

impl Default for Step {
    fn default() -> Self {
        Step::days(1)
    }
}

/// Expected-date generator for one forecast group
///
/// Holds the group's entry date (absent means no expectations) and the
/// horizon. Each `dates` call produces a fresh, finite iterator.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    start: Option<NaiveDateTime>,
    horizon: NaiveDateTime,
}

impl Schedule {
    /// Schedule from an optional entry date, capped at the compiled horizon
    pub fn new(start: Option<NaiveDateTime>) -> Self {
        Self { start, horizon: horizon() }
    }

    /// Schedule with an explicit horizon (tests and future per-group caps)
    pub fn with_horizon(start: Option<NaiveDateTime>, horizon: NaiveDateTime) -> Self {
        Self { start, horizon }
    }

    /// Ordered expected dates from the entry date, strictly before the horizon
    pub fn dates(&self, step: Step) -> impl Iterator<Item = NaiveDateTime> {
        let horizon = self.horizon;
        std::iter::successors(self.start, move |date| step.advance(*date))
            .take_while(move |date| *date < horizon)
    }
}
