use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::domain::{ResultKey, SolutionTrace, TimeSeries, VariableName};
use crate::error::{ScheduleError, ScheduleResult};

/// MILP backend behind the `good_lp` modelling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// Pure Rust branch and bound
    Microlp,
    Highs,
}

impl SolverBackend {
    pub fn is_available(&self) -> bool {
        match self {
            SolverBackend::Microlp => cfg!(feature = "solver-microlp"),
            SolverBackend::Highs => cfg!(feature = "solver-highs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub backend: SolverBackend,
    /// Relative MIP optimality gap
    pub mip_gap: f64,
    /// Wall-clock budget per window
    pub time_limit_secs: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Microlp,
            mip_gap: 0.03,
            time_limit_secs: 300,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> ScheduleResult<()> {
        if !(0.0..1.0).contains(&self.mip_gap) {
            return Err(ScheduleError::config(format!(
                "solver.mip_gap must lie in [0, 1), got {}",
                self.mip_gap
            )));
        }
        if self.time_limit_secs == 0 {
            return Err(ScheduleError::config("solver.time_limit_secs must be positive"));
        }
        Ok(())
    }
}

/// One window to solve
#[derive(Debug, Clone)]
pub struct WindowRequest {
    pub window: usize,
    pub series: TimeSeries,
    /// SOC fraction when `initializing`, carried energy in kWh otherwise
    pub initial_soc: f64,
    pub initializing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveStats {
    pub backend: Option<SolverBackend>,
    pub variables: usize,
    pub constraints: usize,
    pub security_constraints: usize,
    pub mip_gap: f64,
    pub elapsed_ms: u64,
}

/// Solved window: objective, per-variable trace and investment results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSolution {
    pub window: usize,
    pub index: Vec<NaiveDateTime>,
    pub objective: f64,
    pub trace: SolutionTrace,
    /// Realized capacity of every investment-sized asset, by label
    pub sized_capacities: BTreeMap<String, f64>,
    /// Operating cost per step
    pub step_costs: Vec<f64>,
    /// Capacity-proportional cost of the whole window
    pub fixed_cost: f64,
    pub stats: SolveStats,
}

impl WindowSolution {
    pub fn steps(&self) -> usize {
        self.trace.steps()
    }

    /// Stored energy of `storage_label` at local `offset`
    pub fn soc_at(&self, storage_label: &str, offset: usize) -> ScheduleResult<f64> {
        let key = ResultKey::new(storage_label, None, VariableName::Capacity);
        self.trace
            .value_at(&key, offset)
            .filter(|v| v.is_finite())
            .ok_or_else(|| ScheduleError::IncompleteSolution {
                window: self.window,
                detail: format!("no state of charge for {} at offset {}", key, offset),
            })
    }

    /// Cost of the first `commit` steps plus their share of the fixed cost
    pub fn committed_cost(&self, commit: usize) -> f64 {
        let steps = self.step_costs.len();
        if steps == 0 {
            return 0.0;
        }
        let commit = commit.min(steps);
        let operating: f64 = self.step_costs[..commit].iter().sum();
        operating + self.fixed_cost * commit as f64 / steps as f64
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowSolver: Send + Sync {
    async fn solve_window(&self, request: WindowRequest) -> ScheduleResult<WindowSolution>;
}
