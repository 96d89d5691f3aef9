//! Expected-forecast resolution
//!
//! One forecast is expected per (group, name, scheduled date). The
//! archive is probed for the artifact; its metadata sidecar supplies the
//! waiting period, runtime test date and log file, with the dispatcher's
//! waiting period as the fallback. Classification of an absent artifact
//! needs a resolved waiting period; an unresolvable one is a
//! configuration error and the caller skips the artifact.

use std::path::PathBuf;

use chrono::NaiveDateTime;

use seisdb_common::db::{NodeId, Record, Value};
use seisdb_common::status::{Status, FORECAST_DAY_OFFSET};
use seisdb_common::{time, Result};

use crate::locate::{self, Sidecar};
use crate::model::group::ForecastGroup;
use crate::model::classify_required;

/// One expected forecast artifact, resolved and classified
#[derive(Debug, Clone)]
pub struct Forecast {
    pub name: String,
    pub date: NaiveDateTime,
    pub filepath: Option<PathBuf>,
    pub status: Status,
    pub waiting_period: Option<i64>,
    pub runtime_testdate: Option<String>,
    pub logfile: Option<String>,
}

impl Forecast {
    /// Locate and classify the forecast expected for (group, name, date)
    pub fn resolve(
        group: &ForecastGroup,
        dispatcher_waiting: Option<i64>,
        name: &str,
        date: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let filepath = group
            .forecast_dir
            .as_deref()
            .and_then(|dir| locate::locate_forecast(dir, name, date));

        let sidecar = match &filepath {
            Some(path) => Sidecar::read_for(path)?,
            None => None,
        };
        let sidecar_waiting = sidecar.as_ref().and_then(Sidecar::waiting_period);
        let runtime_testdate = sidecar.as_ref().and_then(Sidecar::runtime_testdate);
        let logfile = sidecar.as_ref().and_then(Sidecar::logfile);

        let waiting_period = sidecar_waiting.or(dispatcher_waiting);

        let subject = format!("forecast {} expected {}", name, time::date_to_text(date));
        let status = classify_required(
            filepath.is_some(),
            date,
            waiting_period,
            now,
            FORECAST_DAY_OFFSET,
            &subject,
        )?;

        Ok(Self {
            name: name.to_string(),
            date,
            filepath,
            status,
            waiting_period,
            runtime_testdate,
            logfile,
        })
    }

    /// Persistence record for the `Forecasts` row
    ///
    /// The unique probe is the filepath when the artifact was located,
    /// else the logical key (schedule, group, name).
    pub fn record(&self, schedule: NodeId, group: NodeId) -> Record {
        let record = Record::new("Forecasts")
            .field("schedule_id", Value::Ref(schedule))
            .field("group_id", Value::Ref(group))
            .field("name", Value::text(self.name.clone()))
            .field(
                "filepath",
                Value::opt_text(
                    self.filepath
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                ),
            )
            .field("status", Value::text(self.status.as_str()))
            .field("waiting_period", Value::opt_integer(self.waiting_period))
            .field(
                "runtime_testdate",
                Value::opt_text(self.runtime_testdate.clone()),
            )
            .field("logfile", Value::opt_text(self.logfile.clone()));
        if self.filepath.is_some() {
            record.unique(&["filepath"])
        } else {
            record.unique(&["schedule_id", "group_id", "name"])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use seisdb_common::db::{init_memory, PersistenceEngine, Store};
    use seisdb_common::Error;
    use std::io::Write;
    use std::path::Path;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn write_file(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn group_with_forecast_dir(dir: Option<PathBuf>) -> ForecastGroup {
        ForecastGroup {
            group_path: PathBuf::from("/groups/one-day"),
            group_name: "one-day".to_string(),
            description: None,
            config_filepath: PathBuf::from("/groups/one-day/forecast.init.toml"),
            models: vec!["EEPAS-0F".to_string()],
            forecast_dir: dir,
            result_dir: None,
            observation_dir: None,
            entry_date: Some(day(2018, 1, 1)),
            evaluation_tests: vec!["N".to_string()],
            expected_forecasts: vec!["EEPAS-0F".to_string()],
        }
    }

    #[test]
    fn test_located_forecast_is_complete_with_sidecar_fields() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir
            .path()
            .join("archive")
            .join("2018_6")
            .join("EEPAS-0F_6_1_2018.xml");
        write_file(&artifact, "forecast");
        write_file(
            &locate::Sidecar::path_for(&artifact),
            "option = '--waitingPeriod=7'\n\
             option = '--runtimeTestDate=2018-06-01'\n\
             option = '--logFile=/logs/eepas.log'\n",
        );
        let group = group_with_forecast_dir(Some(dir.path().to_path_buf()));

        let forecast =
            Forecast::resolve(&group, Some(31), "EEPAS-0F", day(2018, 6, 1), day(2018, 6, 2))
                .unwrap();
        assert_eq!(forecast.status, Status::Complete);
        assert_eq!(forecast.filepath, Some(artifact));
        // Sidecar waiting period overrides the dispatcher's
        assert_eq!(forecast.waiting_period, Some(7));
        assert_eq!(forecast.runtime_testdate, Some("2018-06-01".to_string()));
        assert_eq!(forecast.logfile, Some("/logs/eepas.log".to_string()));
    }

    #[test]
    fn test_absent_forecast_classified_by_dispatcher_waiting_period() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_forecast_dir(Some(dir.path().to_path_buf()));

        let scheduled =
            Forecast::resolve(&group, Some(3), "EEPAS-0F", day(2018, 6, 10), day(2018, 6, 11))
                .unwrap();
        assert_eq!(scheduled.status, Status::Scheduled);
        assert_eq!(scheduled.filepath, None);
        assert_eq!(scheduled.waiting_period, Some(3));

        let missing =
            Forecast::resolve(&group, Some(3), "EEPAS-0F", day(2018, 6, 10), day(2018, 6, 20))
                .unwrap();
        assert_eq!(missing.status, Status::Missing);
    }

    #[test]
    fn test_absent_forecast_without_waiting_period_is_an_error() {
        let group = group_with_forecast_dir(None);
        let err = Forecast::resolve(&group, None, "EEPAS-0F", day(2018, 6, 10), day(2018, 6, 20))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_absurd_waiting_period_is_an_error_not_a_panic() {
        // Inherited from a script line like waitingPeriod=99999999999999999
        let group = group_with_forecast_dir(None);
        let err = Forecast::resolve(
            &group,
            Some(99_999_999_999_999_999),
            "EEPAS-0F",
            day(2018, 6, 10),
            day(2018, 6, 20),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_record_unique_key_switches_on_location() {
        let store = Store::new(init_memory().await.unwrap());
        let mut engine = PersistenceEngine::new(&store);
        let schedule = engine.add(Record::new("ScheduledDates"));
        let group = engine.add(Record::new("ForecastGroups"));

        let located = Forecast {
            name: "EEPAS-0F".to_string(),
            date: day(2018, 6, 1),
            filepath: Some(PathBuf::from("/fc/archive/2018_6/EEPAS-0F_6_1_2018.xml")),
            status: Status::Complete,
            waiting_period: Some(7),
            runtime_testdate: None,
            logfile: None,
        };
        assert_eq!(located.record(schedule, group).unique, vec!["filepath"]);

        let absent = Forecast {
            filepath: None,
            status: Status::Missing,
            ..located
        };
        assert_eq!(
            absent.record(schedule, group).unique,
            vec!["schedule_id", "group_id", "name"]
        );
    }
}
