pub mod rolling;
pub mod scenarios;

pub use rolling::{
    advance, HorizonPlan, RollingHorizonScheduler, RollingOutcome, SchedulerPhase, WindowSpan,
    WindowState, WindowSummary,
};
pub use scenarios::{run_scenarios, ScenarioJob, ScenarioReport};

use tracing::info;

use crate::domain::TimeSeries;
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::{WindowRequest, WindowSolution, WindowSolver};

/// Solve the whole series as a single initializing window.
///
/// Used for investment runs, where capacities are sized over the full horizon
/// instead of being carried through a rolling loop.
pub async fn solve_single_window(
    solver: &dyn WindowSolver,
    series: &TimeSeries,
    initial_soc: f64,
) -> ScheduleResult<WindowSolution> {
    if series.is_empty() {
        return Err(ScheduleError::config("time series holds no steps"));
    }
    info!(steps = series.len(), "solving single window");
    solver
        .solve_window(WindowRequest {
            window: 0,
            series: series.clone(),
            initial_soc,
            initializing: true,
        })
        .await
}
