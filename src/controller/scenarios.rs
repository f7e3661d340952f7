//! Independent scenarios run concurrently.
//!
//! Each scenario is its own sequential rolling-horizon pipeline with its own
//! solver; nothing mutable is shared between them.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::rolling::{HorizonPlan, RollingHorizonScheduler, RollingOutcome};
use crate::domain::TimeSeries;
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::WindowSolver;
use crate::scenario::Scenario;

/// One scenario to schedule over the shared time series
#[derive(Debug, Clone)]
pub struct ScenarioJob {
    pub scenario: Scenario,
    pub plan: HorizonPlan,
    pub initial_soc: f64,
}

#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub result: ScheduleResult<RollingOutcome>,
}

/// Run every job to completion and report results in input order.
///
/// `make_solver` builds the window solver of each scenario. A failing
/// scenario does not stop the others.
pub async fn run_scenarios<F>(
    jobs: Vec<ScenarioJob>,
    series: Arc<TimeSeries>,
    make_solver: F,
) -> Vec<ScenarioReport>
where
    F: Fn(&Scenario) -> ScheduleResult<Arc<dyn WindowSolver>>,
{
    let names: Vec<String> = jobs.iter().map(|job| job.scenario.name.clone()).collect();
    let mut results: Vec<Option<ScheduleResult<RollingOutcome>>> = names.iter().map(|_| None).collect();
    let mut set = JoinSet::new();

    for (position, job) in jobs.into_iter().enumerate() {
        let solver = match make_solver(&job.scenario) {
            Ok(solver) => solver,
            Err(err) => {
                results[position] = Some(Err(err));
                continue;
            }
        };
        let storage_label = job.scenario.storage_label().map(str::to_string);
        let series = Arc::clone(&series);
        set.spawn(async move {
            let result = match RollingHorizonScheduler::new(solver, job.plan, job.initial_soc, storage_label) {
                Ok(mut scheduler) => scheduler.run(&series).await,
                Err(err) => Err(err),
            };
            (position, result)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((position, result)) => {
                match &result {
                    Ok(outcome) => info!(
                        scenario = %names[position],
                        objective = outcome.objective,
                        "scenario finished"
                    ),
                    Err(err) => error!(scenario = %names[position], error = %err, "scenario failed"),
                }
                results[position] = Some(result);
            }
            Err(join_error) => error!(error = %join_error, "scenario task panicked"),
        }
    }

    names
        .into_iter()
        .zip(results)
        .map(|(name, result)| ScenarioReport {
            result: result.unwrap_or_else(|| {
                Err(ScheduleError::SolverUnavailable(format!(
                    "scenario '{}' did not complete",
                    name
                )))
            }),
            name,
        })
        .collect()
}
