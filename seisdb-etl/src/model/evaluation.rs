//! Evaluation resolution
//!
//! One evaluation is expected per (forecast, test, scheduled date). The
//! result directory is probed for the newest matching artifact; its
//! sidecar supplies the creation date and runtime directory, with the
//! filesystem creation time as the creation-date fallback. The catalog
//! the evaluation consumed is resolved alongside and persisted on the
//! same row.
//!
//! Evaluations merge by precedence on conflict: a Complete row is never
//! downgraded, and a resolved catalog can be backfilled onto a row whose
//! evaluation is still Missing.

use std::path::PathBuf;

use chrono::NaiveDateTime;

use seisdb_common::db::{MergePolicy, NodeId, Record, Value};
use seisdb_common::status::Status;
use seisdb_common::{time, Result};

use crate::locate::{self, Sidecar};
use crate::model::catalog::{Catalog, CatalogResolver};
use crate::model::classify_required;
use crate::model::forecast::Forecast;
use crate::model::group::ForecastGroup;

/// Columns rewritten when an incoming evaluation is Complete
const FULL_UPDATE_COLUMNS: &[&str] = &[
    "filepath",
    "status",
    "runtime_dir",
    "creation_datetime",
    "catalog_result_filepath",
    "catalog_status",
    "catalog_creation_datetime",
];

/// Columns backfilled when only the catalog resolved
const CATALOG_UPDATE_COLUMNS: &[&str] = &[
    "catalog_result_filepath",
    "catalog_status",
    "catalog_creation_datetime",
];

/// One expected evaluation artifact, resolved and classified, with the
/// catalog it consumed
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub name: String,
    pub date: NaiveDateTime,
    pub filepath: Option<PathBuf>,
    pub status: Status,
    pub creation_datetime: Option<String>,
    pub runtime_dir: Option<String>,
    pub catalog: Catalog,
}

impl Evaluation {
    /// Locate and classify the evaluation of `forecast` by `test` on `date`
    pub fn resolve(
        group: &ForecastGroup,
        forecast: &Forecast,
        test: &str,
        date: NaiveDateTime,
        now: NaiveDateTime,
        evaluation_day_offset: i64,
    ) -> Result<Self> {
        let filepath = match group.result_dir.as_deref() {
            Some(dir) => locate::locate_evaluation(dir, test, &forecast.name, date, None)?,
            None => None,
        };

        let (creation_datetime, runtime_dir) = match &filepath {
            Some(path) => {
                let sidecar = Sidecar::read_for(path)?;
                let creation = sidecar
                    .as_ref()
                    .and_then(Sidecar::creation_date)
                    .or_else(|| locate::file_creation_date(path));
                (creation, sidecar.as_ref().and_then(Sidecar::runtime_dir))
            }
            None => (None, None),
        };

        let subject = format!(
            "evaluation {}-Test of {} expected {}",
            test,
            forecast.name,
            time::date_to_text(date)
        );
        let status = classify_required(
            filepath.is_some(),
            date,
            forecast.waiting_period,
            now,
            evaluation_day_offset,
            &subject,
        )?;

        let resolver = CatalogResolver::new(
            group.observation_dir.as_deref(),
            forecast.waiting_period,
            evaluation_day_offset,
        );
        let catalog = resolver.resolve(date, creation_datetime.as_deref(), now)?;

        Ok(Self {
            name: test.to_string(),
            date,
            filepath,
            status,
            creation_datetime,
            runtime_dir,
            catalog,
        })
    }

    /// Persistence record for the `Evaluations` row
    pub fn record(&self, schedule: NodeId, forecast: NodeId) -> Record {
        Record::new("Evaluations")
            .field("schedule_id", Value::Ref(schedule))
            .field("forecast_id", Value::Ref(forecast))
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
            .field(
                "creation_datetime",
                Value::opt_text(self.creation_datetime.clone()),
            )
            .field("runtime_dir", Value::opt_text(self.runtime_dir.clone()))
            .field(
                "catalog_result_filepath",
                Value::opt_text(
                    self.catalog
                        .result_filepath
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                ),
            )
            .field(
                "catalog_status",
                Value::text(self.catalog.status.as_str()),
            )
            .field(
                "catalog_creation_datetime",
                Value::opt_text(self.catalog.creation_date.clone()),
            )
            .unique(&["forecast_id", "name"])
            .merge(MergePolicy::UpdateOnConflict {
                full: FULL_UPDATE_COLUMNS,
                catalog: CATALOG_UPDATE_COLUMNS,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::CATALOG_TYPE;
    use chrono::NaiveDate;
    use seisdb_common::status::CatalogStatus;
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

    fn fixture_group(base: &Path) -> ForecastGroup {
        ForecastGroup {
            group_path: base.to_path_buf(),
            group_name: "one-day".to_string(),
            description: None,
            config_filepath: base.join("forecast.init.toml"),
            models: vec!["EEPAS-0F".to_string()],
            forecast_dir: Some(base.join("forecasts")),
            result_dir: Some(base.join("results")),
            observation_dir: Some(base.join("observations")),
            entry_date: Some(day(2018, 1, 1)),
            evaluation_tests: vec!["N".to_string()],
            expected_forecasts: vec!["EEPAS-0F".to_string()],
        }
    }

    fn fixture_forecast(waiting: Option<i64>) -> Forecast {
        Forecast {
            name: "EEPAS-0F".to_string(),
            date: day(2018, 6, 1),
            filepath: None,
            status: Status::Missing,
            waiting_period: waiting,
            runtime_testdate: None,
            logfile: None,
        }
    }

    #[test]
    fn test_located_evaluation_is_complete_with_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let group = fixture_group(dir.path());
        let artifact = dir
            .path()
            .join("results")
            .join("2018-06-01")
            .join("scec.csep.N-Test_EEPAS-0F_6_1_2018.svg.xml");
        write_file(&artifact, "result");
        write_file(
            &locate::Sidecar::path_for(&artifact),
            "env = 'runtimeDirectory=/runtime/2018_6_1'\n\
             CreationDateTime = 2018-06-01T04:15:00\n",
        );
        let obs_meta = dir
            .path()
            .join("observations")
            .join("2018-06-01")
            .join("catalog.nodecl.dat.meta");
        write_file(
            &obs_meta,
            &format!("# {CATALOG_TYPE}\nCreationDateTime = 2018-06-01T02:00:00\n"),
        );
        write_file(&obs_meta.with_extension(""), "catalog data");

        let evaluation = Evaluation::resolve(
            &group,
            &fixture_forecast(Some(3)),
            "N",
            day(2018, 6, 1),
            day(2018, 6, 2),
            1,
        )
        .unwrap();
        assert_eq!(evaluation.status, Status::Complete);
        assert_eq!(evaluation.filepath, Some(artifact));
        assert_eq!(evaluation.creation_datetime, Some("2018-06-01".to_string()));
        assert_eq!(evaluation.runtime_dir, Some("/runtime/2018_6_1".to_string()));
        assert_eq!(evaluation.catalog.status, CatalogStatus::Present);
        assert_eq!(
            evaluation.catalog.creation_date,
            Some("2018-06-01".to_string())
        );
    }

    #[test]
    fn test_absent_evaluation_classified_with_day_offset() {
        let dir = tempfile::tempdir().unwrap();
        let group = fixture_group(dir.path());
        let forecast = fixture_forecast(Some(3));

        let evaluation = Evaluation::resolve(
            &group,
            &forecast,
            "N",
            day(2018, 6, 10),
            day(2018, 6, 11),
            1,
        )
        .unwrap();
        assert_eq!(evaluation.status, Status::Scheduled);
        assert_eq!(evaluation.catalog.status, CatalogStatus::Scheduled);

        // The offset shortens the waiting period: overdue a day before the
        // forecast itself would be
        let evaluation = Evaluation::resolve(
            &group,
            &forecast,
            "N",
            day(2018, 6, 10),
            day(2018, 6, 12),
            1,
        )
        .unwrap();
        assert_eq!(evaluation.status, Status::Missing);
    }

    #[test]
    fn test_creation_date_falls_back_to_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let group = fixture_group(dir.path());
        let artifact = dir
            .path()
            .join("results")
            .join("2018-06-01")
            .join("scec.csep.N-Test_EEPAS-0F_6_1_2018.xml");
        write_file(&artifact, "result without sidecar");

        let evaluation = Evaluation::resolve(
            &group,
            &fixture_forecast(Some(3)),
            "N",
            day(2018, 6, 1),
            day(2018, 6, 2),
            1,
        )
        .unwrap();
        assert_eq!(evaluation.status, Status::Complete);
        // Freshly created fixture file carries today's date
        assert_eq!(
            evaluation.creation_datetime,
            Some(time::date_to_text(time::now()))
        );
        assert_eq!(evaluation.runtime_dir, None);
    }

    #[test]
    fn test_unresolved_waiting_period_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let group = fixture_group(dir.path());

        assert!(Evaluation::resolve(
            &group,
            &fixture_forecast(None),
            "N",
            day(2018, 6, 10),
            day(2018, 6, 20),
            1,
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_record_shape() {
        use seisdb_common::db::{init_memory, PersistenceEngine, Store};

        let store = Store::new(init_memory().await.unwrap());
        let mut engine = PersistenceEngine::new(&store);
        let schedule = engine.add(Record::new("ScheduledDates"));
        let forecast = engine.add(Record::new("Forecasts"));

        let evaluation = Evaluation {
            name: "N".to_string(),
            date: day(2018, 6, 1),
            filepath: None,
            status: Status::Missing,
            creation_datetime: None,
            runtime_dir: None,
            catalog: Catalog {
                result_filepath: Some(PathBuf::from("/obs/2018-06-01/catalog.nodecl.dat")),
                status: CatalogStatus::Present,
                creation_date: Some("2018-06-01".to_string()),
            },
        };

        let record = evaluation.record(schedule, forecast);
        assert_eq!(record.table, "Evaluations");
        assert_eq!(record.unique, vec!["forecast_id", "name"]);
        assert!(matches!(
            record.merge,
            MergePolicy::UpdateOnConflict { .. }
        ));
        assert_eq!(record.value_of("status"), Some(&Value::text("Missing")));
        assert_eq!(
            record.value_of("catalog_status"),
            Some(&Value::text("Present"))
        );
    }
}
