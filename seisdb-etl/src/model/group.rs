//! Forecast-group resolution
//!
//! A group directory carries a `forecast.init.toml` describing the models
//! it runs, its evaluation tests, its entry date and the directories its
//! artifacts land in. Forecast names do not map 1:1 to models (one model
//! can emit several named forecasts), so the expected-forecast list is
//! recovered from the archive itself and attributed back to the
//! configured models.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use seisdb_common::db::{Record, Value};
use seisdb_common::schedule::Schedule;
use seisdb_common::{time, Result};

use crate::config::ConfigReader;

/// Group configuration file name inside the group directory
pub const GROUP_CONFIG_NAME: &str = "forecast.init.toml";

/// Internal pipeline artifacts, never expected forecasts
const INTERNAL_PREFIX: &str = "scec.csep";

static FORECAST_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S*)_\d+_\d+_\d+\S*").expect("valid forecast name pattern"));

/// One forecast group, resolved from its configuration file and archive
#[derive(Debug, Clone)]
pub struct ForecastGroup {
    pub group_path: PathBuf,
    pub group_name: String,
    pub description: Option<String>,
    pub config_filepath: PathBuf,
    pub models: Vec<String>,
    pub forecast_dir: Option<PathBuf>,
    pub result_dir: Option<PathBuf>,
    pub observation_dir: Option<PathBuf>,
    pub entry_date: Option<NaiveDateTime>,
    pub evaluation_tests: Vec<String>,
    pub expected_forecasts: Vec<String>,
}

impl ForecastGroup {
    /// Resolve a group from its directory
    ///
    /// A missing entry date is normal (the group produces no expectations);
    /// an unparseable one is an error and the caller skips the group.
    pub fn resolve(reader: &impl ConfigReader, group_path: &Path) -> Result<Self> {
        let config_filepath = group_path.join(GROUP_CONFIG_NAME);
        let description = reader.element_value(&config_filepath, "name")?;
        let group_name = group_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let models = resolve_models(reader, &config_filepath)?;
        let forecast_dir = resolve_dir(reader, &config_filepath, group_path, "forecastDir")?;
        let result_dir = resolve_dir(reader, &config_filepath, group_path, "resultDir")?;
        let observation_dir = resolve_dir(reader, &config_filepath, group_path, "catalogDir")?;

        let entry_date = match reader.element_value(&config_filepath, "entryDate")? {
            Some(text) => Some(time::text_to_datetime(&text)?),
            None => None,
        };

        let evaluation_tests = reader
            .repeated_elements(&config_filepath, "evaluationTests")?
            .iter()
            .flat_map(|entry| entry.split_whitespace())
            .map(str::to_string)
            .collect();

        let expected_forecasts = expected_forecasts(forecast_dir.as_deref(), &models);

        Ok(Self {
            group_path: group_path.to_path_buf(),
            group_name,
            description,
            config_filepath,
            models,
            forecast_dir,
            result_dir,
            observation_dir,
            entry_date,
            evaluation_tests,
            expected_forecasts,
        })
    }

    /// Expectation schedule rooted at this group's entry date
    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.entry_date)
    }

    /// Persistence record for the `ForecastGroups` row
    pub fn record(&self) -> Record {
        Record::new("ForecastGroups")
            .field("group_path", Value::text(self.group_path.to_string_lossy()))
            .field("group_name", Value::text(self.group_name.clone()))
            .field("description", Value::opt_text(self.description.clone()))
            .field(
                "config_filepath",
                Value::text(self.config_filepath.to_string_lossy()),
            )
            .field("forecast_dir", Value::opt_text(path_text(&self.forecast_dir)))
            .field("result_dir", Value::opt_text(path_text(&self.result_dir)))
            .field(
                "observation_dir",
                Value::opt_text(path_text(&self.observation_dir)),
            )
            .field(
                "entry_date",
                Value::opt_text(self.entry_date.map(time::datetime_to_text)),
            )
            .unique(&["group_path"])
    }
}

fn path_text(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

/// Model list: whitespace-separated `models` value plus any Bayesian and
/// hybrid model entries
fn resolve_models(reader: &impl ConfigReader, config: &Path) -> Result<Vec<String>> {
    let mut models: Vec<String> = reader
        .element_value(config, "models")?
        .map(|text| text.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    models.extend(reader.repeated_elements(config, "BayesianModel")?);
    models.extend(reader.repeated_elements(config, "hybridModel")?);
    Ok(models)
}

/// Directory value from the config, absolute or joined onto the group path
fn resolve_dir(
    reader: &impl ConfigReader,
    config: &Path,
    group_path: &Path,
    tag: &str,
) -> Result<Option<PathBuf>> {
    Ok(reader.element_value(config, tag)?.map(|text| {
        let path = PathBuf::from(text);
        if path.is_absolute() {
            path
        } else {
            group_path.join(path)
        }
    }))
}

/// Expected forecast names recovered from the archive
///
/// Scans the forecast directory recursively, extracts the name prefix of
/// every dated artifact, and keeps the names attributable to a configured
/// model (model name is a substring). An empty archive falls back to the
/// model list itself.
fn expected_forecasts(forecast_dir: Option<&Path>, models: &[String]) -> Vec<String> {
    let mut found = BTreeSet::new();
    if let Some(dir) = forecast_dir {
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if let Some(captures) = FORECAST_NAME_RE.captures(&file_name) {
                let candidate = captures[1].to_string();
                if !candidate.is_empty() && !candidate.starts_with(INTERNAL_PREFIX) {
                    found.insert(candidate);
                }
            }
        }
    }
    if found.is_empty() {
        return models.to_vec();
    }
    found
        .into_iter()
        .filter(|candidate| models.iter().any(|model| candidate.contains(model.as_str())))
        .collect()
}
