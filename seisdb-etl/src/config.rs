//! Run configuration and pipeline configuration resolution
//!
//! Two layers live here. `EtlConfig` is this tool's own TOML run
//! configuration (database path, dispatcher scripts, evaluation offset).
//! `ConfigReader` resolves the pipeline's configuration files, which this
//! tool consumes but does not own: dispatcher run scripts carry
//! `--configFile=` and `waitingPeriod=` tokens, and dispatcher/group
//! configuration files are TOML documents looked up by tag.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use seisdb_common::status::DEFAULT_EVALUATION_DAY_OFFSET;
use seisdb_common::{Error, Result};

static CONFIG_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--configFile=(\S+)").expect("valid configFile pattern"));
static WAITING_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"waitingPeriod=(\S+)").expect("valid waitingPeriod pattern"));

fn default_evaluation_day_offset() -> i64 {
    DEFAULT_EVALUATION_DAY_OFFSET
}

fn default_database() -> PathBuf {
    PathBuf::from("seisdb.db")
}

/// Tool-level run configuration, loaded from a TOML file
///
/// The database path can be overridden by the CLI flag or the
/// `SEISDB_DATABASE` environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Dispatcher run scripts reconciled by `run`
    #[serde(default)]
    pub dispatchers: Vec<PathBuf>,

    /// Day offset subtracted from the waiting period when classifying
    /// evaluations and catalogs
    #[serde(default = "default_evaluation_day_offset")]
    pub evaluation_day_offset: i64,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            dispatchers: Vec::new(),
            evaluation_day_offset: DEFAULT_EVALUATION_DAY_OFFSET,
        }
    }
}

impl EtlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Resolves dispatcher scripts and group configuration files
///
/// The walk consumes this interface; tests substitute their own fixtures.
pub trait ConfigReader {
    /// Configuration file named by a dispatcher run script
    fn config_file_path(&self, dispatcher_script: &Path) -> Result<Option<PathBuf>>;

    /// Waiting period (days) declared by a dispatcher run script
    fn waiting_period(&self, dispatcher_script: &Path) -> Result<Option<i64>>;

    /// Forecast-group paths listed in a dispatcher configuration file
    fn forecast_group_paths(&self, config_file: &Path) -> Result<Vec<PathBuf>>;

    /// Scalar value of `tag` in a group configuration file
    fn element_value(&self, group_config: &Path, tag: &str) -> Result<Option<String>>;

    /// Repeated values of `tag` in a group configuration file
    fn repeated_elements(&self, group_config: &Path, tag: &str) -> Result<Vec<String>>;
}

/// `ConfigReader` over the real filesystem
#[derive(Debug, Default, Clone)]
pub struct FileConfigReader;

impl FileConfigReader {
    pub fn new() -> Self {
        Self
    }

    fn script_capture(&self, script: &Path, pattern: &Regex) -> Result<Option<String>> {
        let text = std::fs::read_to_string(script)?;
        Ok(pattern
            .captures(&text)
            .map(|captures| captures[1].to_string()))
    }

    fn document(&self, path: &Path) -> Result<toml::Table> {
        let text = std::fs::read_to_string(path)?;
        text.parse::<toml::Table>()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

impl ConfigReader for FileConfigReader {
    fn config_file_path(&self, dispatcher_script: &Path) -> Result<Option<PathBuf>> {
        Ok(self
            .script_capture(dispatcher_script, &CONFIG_FILE_RE)?
            .map(PathBuf::from))
    }

    fn waiting_period(&self, dispatcher_script: &Path) -> Result<Option<i64>> {
        match self.script_capture(dispatcher_script, &WAITING_PERIOD_RE)? {
            Some(token) => match token.parse::<i64>() {
                Ok(days) => Ok(Some(days)),
                Err(_) => {
                    warn!(
                        "Could not parse waiting period {:?} in {}",
                        token,
                        dispatcher_script.display()
                    );
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn forecast_group_paths(&self, config_file: &Path) -> Result<Vec<PathBuf>> {
        let document = self.document(config_file)?;
        let Some(value) = document.get("forecast_groups") else {
            return Ok(Vec::new());
        };
        let Some(items) = value.as_array() else {
            return Err(Error::Config(format!(
                "{}: forecast_groups is not an array",
                config_file.display()
            )));
        };
        Ok(items
            .iter()
            .filter_map(|item| item.as_str().map(PathBuf::from))
            .collect())
    }

    fn element_value(&self, group_config: &Path, tag: &str) -> Result<Option<String>> {
        let document = self.document(group_config)?;
        Ok(document.get(tag).and_then(|value| match value {
            toml::Value::String(text) => Some(text.clone()),
            toml::Value::Integer(number) => Some(number.to_string()),
            _ => None,
        }))
    }

    fn repeated_elements(&self, group_config: &Path, tag: &str) -> Result<Vec<String>> {
        let document = self.document(group_config)?;
        let Some(value) = document.get(tag) else {
            return Ok(Vec::new());
        };
        let Some(items) = value.as_array() else {
            return Err(Error::Config(format!(
                "{}: {} is not an array",
                group_config.display(),
                tag
            )));
        };
        Ok(items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect())
    }
}
