//! Timestamp utilities and the text formats used in the database
//!
//! All date/time columns are stored as TEXT: full instants as
//! `YYYY-MM-DD HH:MM:SS`, creation dates as `YYYY-MM-DD`.

use crate::{Error, Result};
use chrono::NaiveDateTime;

/// Storage format for schedule instants and entry dates
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for creation dates (date precision only)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata sidecar format for `CreationDateTime` values
pub const META_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Get current UTC wall-clock time, naive (the store keeps no zone)
pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Parse database text in `YYYY-MM-DD HH:MM:SS` format
pub fn text_to_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .map_err(|e| Error::Parse(format!("bad datetime {:?}: {}", text, e)))
}

/// Render a datetime into database text form
pub fn datetime_to_text(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Render the date component only (`YYYY-MM-DD`)
pub fn date_to_text(value: NaiveDateTime) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Parse an `YYYY-MM-DDTHH:MM:SS` sidecar timestamp, normalized to its date
pub fn meta_datetime_to_date(text: &str) -> Result<String> {
    let parsed = NaiveDateTime::parse_from_str(text, META_DATETIME_FORMAT)
        .map_err(|e| Error::Parse(format!("bad CreationDateTime {:?}: {}", text, e)))?;
    Ok(date_to_text(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_roundtrip_datetime_text() {
        let value = dt(2018, 6, 10, 12, 30, 5);
        let text = datetime_to_text(value);
        assert_eq!(text, "2018-06-10 12:30:05");
        assert_eq!(text_to_datetime(&text).unwrap(), value);
    }

    #[test]
    fn test_date_to_text_drops_time() {
        assert_eq!(date_to_text(dt(2018, 1, 2, 23, 59, 59)), "2018-01-02");
    }

    #[test]
    fn test_meta_datetime_normalizes_to_date() {
        let date = meta_datetime_to_date("2018-06-10T04:15:00").unwrap();
        assert_eq!(date, "2018-06-10");
    }

    #[test]
    fn test_meta_datetime_rejects_garbage() {
        assert!(meta_datetime_to_date("June 10th").is_err());
        assert!(text_to_datetime("2018-06-10").is_err());
    }

    #[test]
    fn test_now_is_recent() {
        let stamp = now();
        assert!(stamp.and_utc().timestamp() > 946_684_800); // after 2000-01-01
    }
}
