//! Dispatcher resolution
//!
//! A dispatcher is one operational run script. Its configuration file
//! reference is mandatory; without it the dispatcher cannot name its
//! forecast groups and the caller skips it. The waiting period is
//! optional here and inherited by forecasts that carry none of their own.

use std::path::{Path, PathBuf};

use seisdb_common::db::{Record, Value};
use seisdb_common::{Error, Result};

use crate::config::ConfigReader;

/// One operational run-configuration script, resolved
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pub script_path: PathBuf,
    pub config_file: PathBuf,
    pub waiting_period: Option<i64>,
    pub group_paths: Vec<PathBuf>,
}

impl Dispatcher {
    /// Resolve a dispatcher run script down to its forecast-group paths
    pub fn resolve(reader: &impl ConfigReader, script: &Path) -> Result<Self> {
        let config_file = reader.config_file_path(script)?.ok_or_else(|| {
            Error::Config(format!(
                "{}: no configuration file named by dispatcher script",
                script.display()
            ))
        })?;
        let waiting_period = reader.waiting_period(script)?;
        let group_paths = reader.forecast_group_paths(&config_file)?;
        Ok(Self {
            script_path: script.to_path_buf(),
            config_file,
            waiting_period,
            group_paths,
        })
    }

    /// Persistence record for the `Dispatchers` row
    pub fn record(&self) -> Record {
        Record::new("Dispatchers")
            .field("script_path", Value::text(self.script_path.to_string_lossy()))
            .field(
                "config_file_name",
                Value::text(self.config_file.to_string_lossy()),
            )
            .field("waiting_period", Value::opt_integer(self.waiting_period))
            .unique(&["script_path"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfigReader;
    use seisdb_common::db::MergePolicy;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_resolve_script_with_groups() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(
            dir.path(),
            "dispatcher_daily.init",
            "forecast_groups = [\"/forecasts/one-day\"]\n",
        );
        let script = write_file(
            dir.path(),
            "dispatcher_daily.tcsh",
            &format!(
                "#!/bin/tcsh\ndispatcher.py --configFile={} waitingPeriod=31\n",
                config.display()
            ),
        );

        let dispatcher = Dispatcher::resolve(&FileConfigReader::new(), &script).unwrap();
        assert_eq!(dispatcher.config_file, config);
        assert_eq!(dispatcher.waiting_period, Some(31));
        assert_eq!(dispatcher.group_paths, vec![PathBuf::from("/forecasts/one-day")]);
    }

    #[test]
    fn test_resolve_requires_config_file_token() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_file(dir.path(), "bare.tcsh", "#!/bin/tcsh\necho nothing\n");

        let err = Dispatcher::resolve(&FileConfigReader::new(), &script).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_record_shape() {
        let dispatcher = Dispatcher {
            script_path: PathBuf::from("/scripts/daily.tcsh"),
            config_file: PathBuf::from("/etc/daily.init"),
            waiting_period: None,
            group_paths: Vec::new(),
        };

        let record = dispatcher.record();
        assert_eq!(record.table, "Dispatchers");
        assert_eq!(record.unique, vec!["script_path"]);
        assert_eq!(record.merge, MergePolicy::IgnoreOnConflict);
        assert_eq!(
            record.value_of("script_path"),
            Some(&Value::text("/scripts/daily.tcsh"))
        );
        assert_eq!(record.value_of("waiting_period"), Some(&Value::Null));
    }
}
