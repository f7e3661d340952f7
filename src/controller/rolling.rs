//! Rolling-horizon scheduling loop.
//!
//! The operating horizon `SH` is split into windows of `PH` steps that slide
//! forward by `CH`. Each window is solved on its own; its first `CH` steps are
//! committed and the storage state of charge at local offset `CH − 1` seeds
//! the next window.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Schedule, TimeSeries};
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::{WindowRequest, WindowSolution, WindowSolver};

/// Simulation, prediction and control horizon lengths in steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonPlan {
    /// Total operating length `SH`
    pub simulation: usize,
    /// Solve-window length `PH`
    pub prediction: usize,
    /// Commit-window length `CH`
    pub control: usize,
}

/// Step range `[start, end)` of one window in the full series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpan {
    pub window: usize,
    pub start: usize,
    pub end: usize,
}

impl WindowSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl HorizonPlan {
    pub fn new(simulation: usize, prediction: usize, control: usize) -> ScheduleResult<Self> {
        if control == 0 {
            return Err(ScheduleError::config("control horizon must be positive"));
        }
        if control > prediction {
            return Err(ScheduleError::config(format!(
                "control horizon {} exceeds prediction horizon {}",
                control, prediction
            )));
        }
        if simulation < control {
            return Err(ScheduleError::config(format!(
                "simulation horizon {} is shorter than one control horizon {}",
                simulation, control
            )));
        }
        Ok(Self {
            simulation,
            prediction,
            control,
        })
    }

    /// `floor(SH / CH)` windows
    pub fn iterations(&self) -> usize {
        self.simulation / self.control
    }

    /// Trailing steps of `SH` that no window commits
    pub fn uncommitted_tail(&self) -> usize {
        self.simulation % self.control
    }

    /// Lookahead windows overlap, so their objectives cover some steps twice
    pub fn double_counts_lookahead(&self) -> bool {
        self.prediction > self.control
    }

    /// Window `k` is `[k·CH, k·CH + PH)`, clipped to `series_len`
    pub fn window(&self, k: usize, series_len: usize) -> WindowSpan {
        let start = (k * self.control).min(series_len);
        let end = (k * self.control + self.prediction).min(series_len);
        WindowSpan { window: k, start, end }
    }

    pub fn windows(&self, series_len: usize) -> impl Iterator<Item = WindowSpan> + '_ {
        (0..self.iterations()).map(move |k| self.window(k, series_len))
    }
}

/// Quantities carried between windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    /// Windows folded in so far
    pub iteration: usize,
    /// SOC fraction before the first window, stored energy in kWh afterwards
    pub state_of_charge: f64,
    /// Sum of full-window objectives
    pub objective: f64,
    /// Cost of the committed steps only
    pub committed_cost: f64,
}

impl WindowState {
    pub fn seed(initial_soc: f64) -> Self {
        Self {
            iteration: 0,
            state_of_charge: initial_soc,
            objective: 0.0,
            committed_cost: 0.0,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.iteration == 0
    }
}

/// Fold one solved window into the carried state.
///
/// Without storage the state of charge is passed through untouched.
pub fn advance(
    state: &WindowState,
    solution: &WindowSolution,
    commit_steps: usize,
    storage_label: Option<&str>,
) -> ScheduleResult<WindowState> {
    if solution.steps() < commit_steps {
        return Err(ScheduleError::IncompleteSolution {
            window: solution.window,
            detail: format!(
                "window holds {} steps but {} must be committed",
                solution.steps(),
                commit_steps
            ),
        });
    }
    let state_of_charge = match storage_label {
        Some(label) => solution.soc_at(label, commit_steps - 1)?,
        None => state.state_of_charge,
    };
    Ok(WindowState {
        iteration: state.iteration + 1,
        state_of_charge,
        objective: state.objective + solution.objective,
        committed_cost: state.committed_cost + solution.committed_cost(commit_steps),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Iterating { window: usize },
    Done,
    Failed { window: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSummary {
    pub span: WindowSpan,
    pub start_time: Option<NaiveDateTime>,
    pub initial_soc: f64,
    pub objective: f64,
    pub committed_cost: f64,
    pub elapsed_ms: u64,
}

/// Result of a completed rolling-horizon run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingOutcome {
    pub run_id: Uuid,
    pub plan: HorizonPlan,
    /// Literal sum of every window's full objective
    pub objective: f64,
    /// Operating cost of committed steps plus their share of fixed cost
    pub committed_cost: f64,
    /// `PH > CH`: `objective` counts lookahead steps more than once
    pub objective_double_counts_lookahead: bool,
    pub final_state: WindowState,
    pub windows: Vec<WindowSummary>,
    /// Committed portions of all windows, stitched in time
    pub schedule: Schedule,
    pub sized_capacities: BTreeMap<String, f64>,
}

/// Drives the window solver over the whole operating horizon
pub struct RollingHorizonScheduler {
    solver: Arc<dyn WindowSolver>,
    plan: HorizonPlan,
    initial_soc: f64,
    storage_label: Option<String>,
    phase: SchedulerPhase,
}

impl RollingHorizonScheduler {
    pub fn new(
        solver: Arc<dyn WindowSolver>,
        plan: HorizonPlan,
        initial_soc: f64,
        storage_label: Option<String>,
    ) -> ScheduleResult<Self> {
        if !(0.0..=1.0).contains(&initial_soc) {
            return Err(ScheduleError::config(format!(
                "initial SOC must be a fraction in [0, 1], got {}",
                initial_soc
            )));
        }
        Ok(Self {
            solver,
            plan,
            initial_soc,
            storage_label,
            phase: SchedulerPhase::Idle,
        })
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn plan(&self) -> &HorizonPlan {
        &self.plan
    }

    /// Solve every window in order. Any window failure aborts the run.
    pub async fn run(&mut self, series: &TimeSeries) -> ScheduleResult<RollingOutcome> {
        if series.len() < self.plan.simulation {
            return Err(ScheduleError::config(format!(
                "time series holds {} steps but the simulation horizon is {}",
                series.len(),
                self.plan.simulation
            )));
        }
        if self.plan.uncommitted_tail() > 0 {
            warn!(
                tail = self.plan.uncommitted_tail(),
                "simulation horizon is not a multiple of the control horizon; trailing steps are not scheduled"
            );
        }
        if self.plan.double_counts_lookahead() {
            warn!(
                prediction = self.plan.prediction,
                control = self.plan.control,
                "objective sums full windows and counts lookahead steps more than once; see committed_cost"
            );
        }

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            iterations = self.plan.iterations(),
            "starting rolling horizon run"
        );

        let plan = self.plan;
        let commit = plan.control;
        let mut state = WindowState::seed(self.initial_soc);
        let mut schedule = Schedule::default();
        let mut windows = Vec::with_capacity(plan.iterations());
        let mut sized_capacities = BTreeMap::new();

        for span in plan.windows(series.len()) {
            self.phase = SchedulerPhase::Iterating {
                window: span.window,
            };
            let request = WindowRequest {
                window: span.window,
                series: series.slice(span.start, span.end),
                initial_soc: state.state_of_charge,
                initializing: state.is_initial(),
            };

            let solution = match self.solve(request).await {
                Ok(solution) => solution,
                Err(err) => {
                    self.phase = SchedulerPhase::Failed {
                        window: span.window,
                    };
                    error!(window = span.window, error = %err, "aborting rolling horizon run");
                    return Err(err);
                }
            };

            let next = match advance(&state, &solution, commit, self.storage_label.as_deref()) {
                Ok(next) => next,
                Err(err) => {
                    self.phase = SchedulerPhase::Failed {
                        window: span.window,
                    };
                    error!(window = span.window, error = %err, "aborting rolling horizon run");
                    return Err(err);
                }
            };

            schedule.extend(&solution.index, &solution.trace.head(commit));
            sized_capacities.extend(solution.sized_capacities.clone());
            windows.push(WindowSummary {
                span,
                start_time: solution.index.first().copied(),
                initial_soc: state.state_of_charge,
                objective: solution.objective,
                committed_cost: solution.committed_cost(commit),
                elapsed_ms: solution.stats.elapsed_ms,
            });
            info!(
                window = span.window,
                objective = solution.objective,
                carried_soc = next.state_of_charge,
                "window committed"
            );
            state = next;
        }

        self.phase = SchedulerPhase::Done;
        info!(
            %run_id,
            objective = state.objective,
            committed_cost = state.committed_cost,
            "rolling horizon run finished"
        );

        Ok(RollingOutcome {
            run_id,
            plan: self.plan,
            objective: state.objective,
            committed_cost: state.committed_cost,
            objective_double_counts_lookahead: self.plan.double_counts_lookahead(),
            final_state: state,
            windows,
            schedule,
            sized_capacities,
        })
    }

    async fn solve(&self, request: WindowRequest) -> ScheduleResult<WindowSolution> {
        let window = request.window;
        let solution = self.solver.solve_window(request).await?;
        if solution.window != window {
            return Err(ScheduleError::IncompleteSolution {
                window,
                detail: format!("solver answered for window {}", solution.window),
            });
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResultKey, SolutionTrace, VariableName};
    use crate::optimizer::{MockWindowSolver, SolveStats};
    use chrono::NaiveDate;
    use mockall::predicate::function;
    use mockall::Sequence;
    use rstest::rstest;

    fn series(steps: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeSeries::hourly(start, vec![200.0; steps], vec![0.0; steps]).unwrap()
    }

    /// Stored energy `100·(k+1) + t` at local step `t` of window `k`
    fn synthetic(request: &WindowRequest) -> WindowSolution {
        let steps = request.series.len();
        let k = request.window as f64;
        let mut trace = SolutionTrace::new(steps);
        trace.insert_sequence(
            ResultKey::new("storage", None, VariableName::Capacity),
            (0..steps).map(|t| 100.0 * (k + 1.0) + t as f64).collect(),
        );
        WindowSolution {
            window: request.window,
            index: request.series.index().to_vec(),
            objective: 10.0,
            trace,
            sized_capacities: BTreeMap::new(),
            step_costs: vec![1.0; steps],
            fixed_cost: 0.0,
            stats: SolveStats::default(),
        }
    }

    #[rstest]
    #[case(240, 24, 24, 10)]
    #[case(100, 24, 24, 4)]
    #[case(48, 36, 12, 4)]
    fn test_iteration_count(
        #[case] sh: usize,
        #[case] ph: usize,
        #[case] ch: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(HorizonPlan::new(sh, ph, ch).unwrap().iterations(), expected);
    }

    #[test]
    fn test_plan_rejects_bad_horizons() {
        assert!(HorizonPlan::new(240, 24, 0).is_err());
        assert!(HorizonPlan::new(240, 12, 24).is_err());
        assert!(HorizonPlan::new(10, 24, 24).is_err());
    }

    #[test]
    fn test_last_window_is_clipped() {
        let plan = HorizonPlan::new(48, 36, 12).unwrap();
        let last = plan.window(3, 48);
        assert_eq!((last.start, last.end), (36, 48));
        assert_eq!(last.len(), 12);
    }

    #[test]
    fn test_advance_reads_commit_boundary() {
        let request = WindowRequest {
            window: 2,
            series: series(24),
            initial_soc: 0.0,
            initializing: false,
        };
        let solution = synthetic(&request);
        let state = WindowState {
            iteration: 2,
            state_of_charge: 5.0,
            objective: 20.0,
            committed_cost: 3.0,
        };

        let next = advance(&state, &solution, 12, Some("storage")).unwrap();
        assert_eq!(next.iteration, 3);
        assert_eq!(next.state_of_charge, 311.0);
        assert_eq!(next.objective, 30.0);
        assert_eq!(next.committed_cost, 15.0);

        let passthrough = advance(&state, &solution, 12, None).unwrap();
        assert_eq!(passthrough.state_of_charge, 5.0);
    }

    #[tokio::test]
    async fn test_state_carry_through_mock_solver() {
        let mut solver = MockWindowSolver::new();
        let mut seq = Sequence::new();
        let expected_soc = [0.5, 123.0, 223.0];
        for (k, soc) in expected_soc.into_iter().enumerate() {
            solver
                .expect_solve_window()
                .with(function(move |r: &WindowRequest| {
                    r.window == k && r.initial_soc == soc && r.initializing == (k == 0)
                }))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|r| Ok(synthetic(&r)));
        }

        let plan = HorizonPlan::new(72, 24, 24).unwrap();
        let mut scheduler =
            RollingHorizonScheduler::new(Arc::new(solver), plan, 0.5, Some("storage".into())).unwrap();
        let outcome = scheduler.run(&series(72)).await.unwrap();

        assert_eq!(scheduler.phase(), SchedulerPhase::Done);
        assert_eq!(outcome.windows.len(), 3);
        assert_eq!(outcome.objective, 30.0);
        assert_eq!(outcome.final_state.state_of_charge, 323.0);
        assert!(!outcome.objective_double_counts_lookahead);
        assert_eq!(outcome.schedule.len(), 72);
    }

    #[tokio::test]
    async fn test_failure_aborts_at_window() {
        let mut solver = MockWindowSolver::new();
        solver
            .expect_solve_window()
            .returning(|r| {
                if r.window == 1 {
                    Err(ScheduleError::InfeasibleWindow {
                        window: 1,
                        reason: "no feasible commitment".into(),
                    })
                } else {
                    Ok(synthetic(&r))
                }
            })
            .times(2);

        let plan = HorizonPlan::new(72, 24, 24).unwrap();
        let mut scheduler =
            RollingHorizonScheduler::new(Arc::new(solver), plan, 0.5, Some("storage".into())).unwrap();
        let err = scheduler.run(&series(72)).await.unwrap_err();

        assert_eq!(err.window(), Some(1));
        assert_eq!(scheduler.phase(), SchedulerPhase::Failed { window: 1 });
    }

    #[tokio::test]
    async fn test_short_series_is_rejected() {
        let solver = MockWindowSolver::new();
        let plan = HorizonPlan::new(72, 24, 24).unwrap();
        let mut scheduler = RollingHorizonScheduler::new(Arc::new(solver), plan, 0.5, None).unwrap();
        let err = scheduler.run(&series(48)).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Configuration(_)));
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
    }
}
