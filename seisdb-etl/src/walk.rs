//! The reconciliation walk
//!
//! One pass walks dispatcher scripts, their forecast groups, each group's
//! expected dates and the artifacts due on them, and persists the
//! resulting entity graph. Failures stay at the scope they occur:
//! an unresolvable dispatcher or group is skipped with a warning, an
//! artifact that cannot be classified is skipped, an unresolved
//! dependency skips its entity graph. Store errors abort the pass.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use seisdb_common::db::{NodeId, PersistenceEngine, Record, Store, Value};
use seisdb_common::schedule::Step;
use seisdb_common::{time, Error, Result};

use crate::config::ConfigReader;
use crate::model::{Dispatcher, Evaluation, Forecast, ForecastGroup};

const FORECAST_KIND: &str = "forecast";
const EVALUATION_KIND: &str = "evaluation";

/// Counters for one reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub dispatchers: usize,
    pub groups: usize,
    pub forecasts: usize,
    pub evaluations: usize,
    pub skipped: usize,
}

/// Run one reconciliation pass over `scripts`, persisting through `store`
///
/// `now` is the classification instant; passing it in keeps a pass
/// reproducible. The WAL is checkpointed once at the end of the pass.
pub async fn run_pass(
    store: &Store,
    reader: &impl ConfigReader,
    scripts: &[PathBuf],
    now: NaiveDateTime,
    evaluation_day_offset: i64,
) -> Result<WalkSummary> {
    let mut summary = WalkSummary::default();

    for script in scripts {
        let dispatcher = match Dispatcher::resolve(reader, script) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                warn!("Skipping dispatcher {}: {}", script.display(), e);
                summary.skipped += 1;
                continue;
            }
        };
        info!(
            "Reconciling dispatcher {} ({} groups)",
            script.display(),
            dispatcher.group_paths.len()
        );
        summary.dispatchers += 1;

        for group_path in &dispatcher.group_paths {
            let group = match ForecastGroup::resolve(reader, group_path) {
                Ok(group) => group,
                Err(e) => {
                    warn!("Skipping forecast group {}: {}", group_path.display(), e);
                    summary.skipped += 1;
                    continue;
                }
            };
            reconcile_group(
                store,
                &dispatcher,
                &group,
                now,
                evaluation_day_offset,
                &mut summary,
            )
            .await?;
            summary.groups += 1;
        }
    }

    store.checkpoint().await?;
    info!(
        "Pass complete: {} dispatchers, {} groups, {} forecasts, {} evaluations, {} skipped",
        summary.dispatchers,
        summary.groups,
        summary.forecasts,
        summary.evaluations,
        summary.skipped
    );
    Ok(summary)
}

/// Reconcile one group's expected dates and artifacts as one entity graph
async fn reconcile_group(
    store: &Store,
    dispatcher: &Dispatcher,
    group: &ForecastGroup,
    now: NaiveDateTime,
    evaluation_day_offset: i64,
    summary: &mut WalkSummary,
) -> Result<()> {
    debug!(
        "Reconciling group {}: {} expected forecasts, {} tests",
        group.group_path.display(),
        group.expected_forecasts.len(),
        group.evaluation_tests.len()
    );

    let mut engine = PersistenceEngine::new(store);
    let dispatcher_node = engine.add(dispatcher.record());
    let group_node = engine.add(group.record());
    let membership = engine.add(membership_record(dispatcher_node, group_node));
    insert_graph(&mut engine, membership, "dispatcher membership", summary).await?;

    for date in group.schedule().dates(Step::days(1)) {
        let forecast_date = engine.add(date_record(date, FORECAST_KIND));
        let evaluation_date = engine.add(date_record(date, EVALUATION_KIND));

        for name in &group.expected_forecasts {
            let forecast =
                match Forecast::resolve(group, dispatcher.waiting_period, name, date, now) {
                    Ok(forecast) => forecast,
                    Err(e @ Error::Database(_)) => return Err(e),
                    Err(e) => {
                        warn!(
                            "Skipping forecast {} on {}: {}",
                            name,
                            time::date_to_text(date),
                            e
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };
            let forecast_node = engine.add(forecast.record(forecast_date, group_node));
            if !insert_graph(&mut engine, forecast_node, "forecast", summary).await? {
                continue;
            }
            summary.forecasts += 1;

            for test in &group.evaluation_tests {
                let evaluation = match Evaluation::resolve(
                    group,
                    &forecast,
                    test,
                    date,
                    now,
                    evaluation_day_offset,
                ) {
                    Ok(evaluation) => evaluation,
                    Err(e @ Error::Database(_)) => return Err(e),
                    Err(e) => {
                        warn!(
                            "Skipping evaluation {}-Test of {} on {}: {}",
                            test,
                            name,
                            time::date_to_text(date),
                            e
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };
                let evaluation_node = engine.add(evaluation.record(evaluation_date, forecast_node));
                if insert_graph(&mut engine, evaluation_node, "evaluation", summary).await? {
                    summary.evaluations += 1;
                }
            }
        }
    }
    Ok(())
}

/// Insert one entity graph; an unresolved dependency skips it, store
/// errors propagate
async fn insert_graph(
    engine: &mut PersistenceEngine<'_>,
    node: NodeId,
    what: &str,
    summary: &mut WalkSummary,
) -> Result<bool> {
    match engine.insert(node).await {
        Ok(_) => Ok(true),
        Err(e @ Error::DependencyUnresolved { .. }) => {
            warn!("Skipping {} graph: {}", what, e);
            summary.skipped += 1;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn date_record(date: NaiveDateTime, kind: &'static str) -> Record {
    Record::new("ScheduledDates")
        .field("date_time", Value::text(time::datetime_to_text(date)))
        .field("kind", Value::text(kind))
        .unique(&["date_time", "kind"])
}

fn membership_record(dispatcher: NodeId, group: NodeId) -> Record {
    Record::new("Dispatchers_ForecastGroups")
        .field("dispatcher_id", Value::Ref(dispatcher))
        .field("group_id", Value::Ref(group))
        .unique(&["dispatcher_id", "group_id"])
}
