//! Artifact location in the forecast archive
//!
//! Forecast artifacts live under `archive/{YYYY}_{M}/` inside a group's
//! forecast directory and are probed by building each historical filename
//! variant in turn. Evaluation artifacts are found by listing the
//! `{YYYY-MM-DD}` result directory and matching names against a pattern;
//! several naming generations can coexist, so the newest match wins.
//! Absence of a directory or artifact is a normal outcome, never an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use seisdb_common::{time, Error, Result};

/// Known forecast filename suffixes, probed in order
pub const FORECAST_SUFFIXES: &[&str] =
    &[".xml", "-fromXML.xml", ".dat", "-fromXML.dat", "-fromXML.dat.targz"];

/// Reserved suffix of metadata side-files
pub const META_SUFFIX: &str = ".meta";

static WAITING_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--waitingPeriod=(\S*)'").expect("valid waitingPeriod pattern"));
static RUNTIME_TESTDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--runtimeTestDate=(\S*)'").expect("valid runtimeTestDate pattern"));
static LOGFILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--logFile=(\S*)'").expect("valid logFile pattern"));
static RUNTIME_DIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"runtimeDirectory=(\S*)'").expect("valid runtimeDirectory pattern"));
static CREATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CreationDateTime = (\S*)").expect("valid CreationDateTime pattern"));

/// Archive subdirectory for a date: `YYYY_M`, month unpadded
pub fn archive_subdir(date: NaiveDateTime) -> String {
    date.format("%Y_%-m").to_string()
}

/// Forecast filename for one suffix variant: `{name}_{M}_{D}_{YYYY}{suffix}`
fn forecast_filename(name: &str, date: NaiveDateTime, suffix: &str) -> String {
    format!("{name}_{}{suffix}", date.format("%-m_%-d_%Y"))
}

/// Every candidate path for a forecast artifact, in probe order
pub fn forecast_candidates(forecast_dir: &Path, name: &str, date: NaiveDateTime) -> Vec<PathBuf> {
    let subdir = forecast_dir.join("archive").join(archive_subdir(date));
    FORECAST_SUFFIXES
        .iter()
        .map(|suffix| subdir.join(forecast_filename(name, date, suffix)))
        .collect()
}

/// First forecast candidate that exists on disk
pub fn locate_forecast(forecast_dir: &Path, name: &str, date: NaiveDateTime) -> Option<PathBuf> {
    forecast_candidates(forecast_dir, name, date)
        .into_iter()
        .find(|path| path.is_file())
}

/// Day-scoped result directory for a date: `{result_dir}/{YYYY-MM-DD}`
pub fn result_day_dir(result_dir: &Path, date: NaiveDateTime) -> PathBuf {
    result_dir.join(time::date_to_text(date))
}

fn evaluation_regex(test: &str, forecast: &str, date: NaiveDateTime) -> Result<Regex> {
    let pattern = format!(
        r"^\S*{}-Test_{}_{}\S*.xml",
        regex::escape(test),
        regex::escape(forecast),
        date.format("%-m_%-d_%Y")
    );
    Regex::new(&pattern).map_err(|e| Error::Parse(format!("evaluation pattern: {}", e)))
}

/// Locate the evaluation artifact for (test, forecast, date)
///
/// When `candidates` is given it is matched as-is (entries are full
/// paths); otherwise the day directory is listed. Matches never include
/// metadata side-files; among several matches the most recently created
/// file wins.
pub fn locate_evaluation(
    result_dir: &Path,
    test: &str,
    forecast: &str,
    date: NaiveDateTime,
    candidates: Option<&[String]>,
) -> Result<Option<PathBuf>> {
    let pattern = evaluation_regex(test, forecast, date)?;
    let matches: Vec<PathBuf> = match candidates {
        Some(listed) => listed
            .iter()
            .filter(|name| pattern.is_match(name) && !name.ends_with(META_SUFFIX))
            .map(PathBuf::from)
            .collect(),
        None => {
            let day_dir = result_day_dir(result_dir, date);
            let Some(names) = list_dir(&day_dir)? else {
                return Ok(None);
            };
            names
                .iter()
                .filter(|name| pattern.is_match(name) && !name.ends_with(META_SUFFIX))
                .map(|name| day_dir.join(name))
                .collect()
        }
    };
    Ok(pick_newest(&matches))
}

/// File names in `dir`; `None` when the directory does not exist
fn list_dir(dir: &Path) -> Result<Option<Vec<String>>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(Some(names))
}

/// Most recently created of `paths`
///
/// Creation time falls back to modification time on filesystems that do
/// not record it.
pub fn pick_newest(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().max_by_key(|path| file_birth(path)).cloned()
}

fn file_birth(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|meta| meta.created().or_else(|_| meta.modified()))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Filesystem creation date of `path` as `YYYY-MM-DD` text
pub fn file_creation_date(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    let stamp = meta.created().or_else(|_| meta.modified()).ok()?;
    let datetime = chrono::DateTime::<chrono::Utc>::from(stamp);
    Some(datetime.format(time::DATE_FORMAT).to_string())
}

/// Metadata side-file accompanying a primary artifact
///
/// Holds the free-text command record written next to each artifact;
/// individual fields are extracted by pattern, and any of them may be
/// absent.
#[derive(Debug, Clone)]
pub struct Sidecar {
    text: String,
}

impl Sidecar {
    /// Side-file path for an artifact (`{artifact}.meta`)
    pub fn path_for(artifact: &Path) -> PathBuf {
        let mut os = artifact.as_os_str().to_os_string();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }

    /// Side-file over already-loaded text
    pub fn parse(text: impl Into<String>) -> Sidecar {
        Sidecar { text: text.into() }
    }

    /// Read a side-file directly; `None` when it does not exist
    pub fn read(meta_path: &Path) -> Result<Option<Sidecar>> {
        match std::fs::read_to_string(meta_path) {
            Ok(text) => Ok(Some(Sidecar::parse(text))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the side-file next to `artifact`; `None` when it does not exist
    pub fn read_for(artifact: &Path) -> Result<Option<Sidecar>> {
        Self::read(&Self::path_for(artifact))
    }

    fn capture(&self, pattern: &Regex) -> Option<String> {
        pattern
            .captures(&self.text)
            .map(|captures| captures[1].to_string())
    }

    pub fn waiting_period(&self) -> Option<i64> {
        let token = self.capture(&WAITING_PERIOD_RE)?;
        match token.parse::<i64>() {
            Ok(days) => Some(days),
            Err(_) => {
                warn!("Could not parse waiting period {:?} from sidecar", token);
                None
            }
        }
    }

    pub fn runtime_testdate(&self) -> Option<String> {
        self.capture(&RUNTIME_TESTDATE_RE)
    }

    pub fn logfile(&self) -> Option<String> {
        self.capture(&LOGFILE_RE)
    }

    pub fn runtime_dir(&self) -> Option<String> {
        self.capture(&RUNTIME_DIR_RE)
    }

    /// `CreationDateTime` normalized to date precision
    pub fn creation_date(&self) -> Option<String> {
        let token = self.capture(&CREATION_RE)?;
        match time::meta_datetime_to_date(&token) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("Bad CreationDateTime in sidecar: {}", e);
                None
            }
        }
    }
}
