//! MILP window solver.
//!
//! Builds the window topology and the security constraints on top of
//! `good_lp`, hands the model to the configured backend and reads the
//! solution back into a keyed trace. The solve itself is blocking and runs on
//! a dedicated thread under a wall-clock budget.

use async_trait::async_trait;
use good_lp::{Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::domain::{
    ResultKey, SolutionTrace, VariableName, AC_BUS, DC_BUS, DEMAND_SINK, EXCESS_SINK, INVERTER,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::costs::CostModel;
use crate::optimizer::topology::{topology_constraints, StorageAnchor, WindowObjective};
use crate::optimizer::variables::WindowVariables;
use crate::optimizer::{SolveStats, SolverBackend, SolverSettings, WindowRequest, WindowSolution, WindowSolver};
use crate::scenario::Scenario;

/// Solves one window as a mixed-integer program
pub struct MilpWindowSolver {
    scenario: Arc<Scenario>,
    settings: SolverSettings,
}

impl MilpWindowSolver {
    pub fn new(scenario: Scenario, settings: SolverSettings) -> ScheduleResult<Self> {
        scenario.validate()?;
        settings.validate()?;
        if !settings.backend.is_available() {
            return Err(ScheduleError::SolverUnavailable(format!(
                "backend '{}' is not compiled into this build",
                settings.backend
            )));
        }
        Ok(Self {
            scenario: Arc::new(scenario),
            settings,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }
}

#[async_trait]
impl WindowSolver for MilpWindowSolver {
    async fn solve_window(&self, request: WindowRequest) -> ScheduleResult<WindowSolution> {
        let window = request.window;
        let budget = Duration::from_secs(self.settings.time_limit_secs);
        let scenario = Arc::clone(&self.scenario);
        let settings = self.settings.clone();

        run_with_budget(window, budget, move || solve_blocking(&scenario, &settings, request)).await
    }
}

/// Run a blocking solve on a detached thread and wait at most `budget` for it.
/// An overrunning solve is abandoned.
async fn run_with_budget<T, F>(window: usize, budget: Duration, solve: F) -> ScheduleResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ScheduleResult<T> + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name(format!("window-solve-{}", window))
        .spawn(move || {
            // receiver is gone once the budget expired
            let _ = tx.send(solve());
        })
        .map_err(|e| {
            ScheduleError::SolverUnavailable(format!(
                "could not start solver thread for window {}: {}",
                window, e
            ))
        })?;

    match tokio::time::timeout(budget, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ScheduleError::SolverUnavailable(format!(
            "solver thread for window {} was lost",
            window
        ))),
        Err(_) => {
            warn!(window, budget_ms = budget.as_millis() as u64, "window solve exceeded its time budget; abandoning it");
            Err(ScheduleError::InfeasibleWindow {
                window,
                reason: format!("no solution within the {:?} time budget", budget),
            })
        }
    }
}

/// Window model ready to hand to a backend
struct WindowModel {
    problem: ProblemVariables,
    vars: WindowVariables,
    objective: WindowObjective,
    constraints: Vec<Constraint>,
    security_constraints: usize,
}

fn build_model(scenario: &Scenario, request: &WindowRequest) -> ScheduleResult<WindowModel> {
    let steps = request.series.len();
    if steps == 0 {
        return Err(ScheduleError::config(format!(
            "window {} holds no timesteps",
            request.window
        )));
    }
    let registry = &scenario.registry;
    let mut problem = ProblemVariables::new();
    let vars = WindowVariables::declare(&mut problem, registry, steps);

    let anchor = StorageAnchor::new(request.initial_soc, request.initializing);
    let mut constraints = topology_constraints(registry, &vars, &request.series, anchor)?;
    let security = scenario.security.build(registry, &vars, request.series.demand())?;
    let security_constraints = security.len();
    constraints.extend(security.into_iter().map(|named| named.constraint));

    let costs = CostModel::new(scenario.economics, steps);
    let objective = WindowObjective::build(registry, &vars, &costs)?;

    debug!(
        window = request.window,
        variables = vars.variable_count(),
        constraints = constraints.len(),
        security_constraints,
        "window model built"
    );
    Ok(WindowModel {
        problem,
        vars,
        objective,
        constraints,
        security_constraints,
    })
}

fn solve_blocking(
    scenario: &Scenario,
    settings: &SolverSettings,
    request: WindowRequest,
) -> ScheduleResult<WindowSolution> {
    let started = Instant::now();
    let model = build_model(scenario, &request)?;
    let stats = SolveStats {
        backend: Some(settings.backend),
        variables: model.vars.variable_count(),
        constraints: model.constraints.len(),
        security_constraints: model.security_constraints,
        mip_gap: settings.mip_gap,
        elapsed_ms: 0,
    };

    let WindowModel {
        problem,
        vars,
        objective,
        constraints,
        ..
    } = model;
    let total = objective.total();
    let window = request.window;

    let mut solved = match settings.backend {
        SolverBackend::Microlp => solve_microlp(problem, total, constraints, settings)
            .map_err(|e| resolution_error(window, e))
            .and_then(|solution| extract(scenario, &request, &vars, &objective, &solution, stats))?,
        SolverBackend::Highs => solve_highs(problem, total, constraints, settings)
            .map_err(|e| resolution_error(window, e))
            .and_then(|solution| extract(scenario, &request, &vars, &objective, &solution, stats))?,
    };
    solved.stats.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        window,
        objective = solved.objective,
        elapsed_ms = solved.stats.elapsed_ms,
        "window solved"
    );
    Ok(solved)
}

/// Failure of the backend call itself, before any solution exists
enum BackendFailure {
    Resolution(ResolutionError),
    Unavailable(String),
}

fn resolution_error(window: usize, failure: BackendFailure) -> ScheduleError {
    match failure {
        BackendFailure::Unavailable(reason) => ScheduleError::SolverUnavailable(reason),
        BackendFailure::Resolution(error) => {
            let reason = match error {
                ResolutionError::Infeasible => "solver reported the window infeasible".to_string(),
                ResolutionError::Unbounded => "solver reported the window unbounded".to_string(),
                other => other.to_string(),
            };
            ScheduleError::InfeasibleWindow { window, reason }
        }
    }
}

#[cfg(feature = "solver-microlp")]
fn solve_microlp(
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    settings: &SolverSettings,
) -> Result<impl Solution, BackendFailure> {
    // microlp solves to optimality; the configured gap is not forwarded
    debug!(mip_gap = settings.mip_gap, "microlp ignores the relative gap");
    let mut model = problem.minimise(objective).using(good_lp::microlp);
    for constraint in constraints {
        model = model.with(constraint);
    }
    model.solve().map_err(BackendFailure::Resolution)
}

#[cfg(not(feature = "solver-microlp"))]
fn solve_microlp(
    _problem: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
    _settings: &SolverSettings,
) -> Result<std::collections::HashMap<good_lp::Variable, f64>, BackendFailure> {
    Err(BackendFailure::Unavailable(
        "microlp backend requires the 'solver-microlp' feature".to_string(),
    ))
}

#[cfg(feature = "solver-highs")]
fn solve_highs(
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    settings: &SolverSettings,
) -> Result<impl Solution, BackendFailure> {
    let mut model = problem
        .minimise(objective)
        .using(good_lp::highs)
        .set_option("mip_rel_gap", settings.mip_gap)
        .set_option("time_limit", settings.time_limit_secs as f64);
    for constraint in constraints {
        model = model.with(constraint);
    }
    model.solve().map_err(BackendFailure::Resolution)
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(
    _problem: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
    _settings: &SolverSettings,
) -> Result<std::collections::HashMap<good_lp::Variable, f64>, BackendFailure> {
    Err(BackendFailure::Unavailable(
        "HiGHS backend requires the 'solver-highs' feature".to_string(),
    ))
}

/// Read the solved variables back into a keyed trace
fn extract<S: Solution>(
    scenario: &Scenario,
    request: &WindowRequest,
    vars: &WindowVariables,
    objective: &WindowObjective,
    solution: &S,
    stats: SolveStats,
) -> ScheduleResult<WindowSolution> {
    let registry = &scenario.registry;
    let steps = vars.steps();
    let values = |series: &[good_lp::Variable]| -> Vec<f64> {
        series.iter().map(|v| solution.value(*v)).collect()
    };

    let mut trace = SolutionTrace::new(steps);
    let mut sized_capacities = BTreeMap::new();

    for unit in registry.generators() {
        let unit_vars = vars.unit(unit)?;
        trace.insert_sequence(unit.flow_key().result(VariableName::Flow), values(&unit_vars.dispatch));
        trace.insert_sequence(
            unit.flow_key().result(VariableName::Status),
            values(&unit_vars.status).into_iter().map(f64::round).collect(),
        );
    }

    if let (Some(storage), Some(storage_vars)) = (registry.storage(), &vars.storage) {
        trace.insert_sequence(storage.capacity_key().result(VariableName::Capacity), values(&storage_vars.soc));
        trace.insert_sequence(storage.discharge_key().result(VariableName::Flow), values(&storage_vars.discharge));
        trace.insert_sequence(storage.charge_key().result(VariableName::Flow), values(&storage_vars.charge));
        if let Some(invest) = storage_vars.invest {
            let size = solution.value(invest);
            trace.insert_scalar(storage.capacity_key().result(VariableName::Invest), size);
            sized_capacities.insert(storage.label.clone(), size);
        }
    }

    if let (Some(source), Some(pv)) = (registry.renewable(), &vars.renewable) {
        trace.insert_sequence(source.flow_key().result(VariableName::Flow), values(&pv.flow));
        if let Some(invest) = pv.invest {
            let size = solution.value(invest);
            trace.insert_scalar(source.flow_key().result(VariableName::Invest), size);
            sized_capacities.insert(source.label.clone(), size);
        }
    }

    if let Some(missing) = registry
        .investment_labels()
        .into_iter()
        .find(|label| !sized_capacities.get(*label).is_some_and(|size| size.is_finite()))
    {
        return Err(ScheduleError::IncompleteSolution {
            window: request.window,
            detail: format!("no sized capacity for investment asset '{}'", missing),
        });
    }

    if let Some(inverter) = &vars.inverter {
        let input = values(inverter);
        let eta = registry.inverter_efficiency();
        trace.insert_sequence(
            ResultKey::new(INVERTER, Some(AC_BUS), VariableName::Flow),
            input.iter().map(|v| v * eta).collect(),
        );
        trace.insert_sequence(ResultKey::new(DC_BUS, Some(INVERTER), VariableName::Flow), input);
    }

    trace.insert_sequence(
        ResultKey::new(AC_BUS, Some(DEMAND_SINK), VariableName::Flow),
        request.series.demand().to_vec(),
    );
    trace.insert_sequence(
        ResultKey::new(AC_BUS, Some(EXCESS_SINK), VariableName::Flow),
        values(&vars.excess),
    );

    let step_costs: Vec<f64> = objective
        .step_costs
        .iter()
        .map(|cost| cost.eval_with(solution))
        .collect();
    let fixed_cost = objective.fixed.eval_with(solution);
    let total = fixed_cost + step_costs.iter().sum::<f64>();
    if !total.is_finite() {
        return Err(ScheduleError::IncompleteSolution {
            window: request.window,
            detail: format!("objective evaluated to {}", total),
        });
    }

    Ok(WindowSolution {
        window: request.window,
        index: request.series.index().to_vec(),
        objective: total,
        trace,
        sized_capacities,
        step_costs,
        fixed_cost,
        stats,
    })
}


#[cfg(all(test, feature = "solver-microlp"))]
mod tests {
    use super::*;
    use crate::domain::{
        AssetCosts, GeneratingUnit, RenewableSource, SizingMode, StorageParams, StorageUnit, TimeSeries,
        UnitRegistry,
    };
    use chrono::NaiveDate;

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry
            .add_generator(GeneratingUnit::new("pp_oil_1", 186.0, 0.3, 1.0).unwrap())
            .unwrap();
        registry
            .add_generator(GeneratingUnit::new("pp_oil_2", 320.0, 0.3, 1.0).unwrap())
            .unwrap();
        registry
            .set_storage(StorageUnit::fixed("storage", 300.0, StorageParams::default()).unwrap())
            .unwrap();
        registry
    }

    fn request(demand: f64, steps: usize) -> WindowRequest {
        let start = NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        WindowRequest {
            window: 0,
            series: TimeSeries::hourly(start, vec![demand; steps], vec![0.0; steps]).unwrap(),
            initial_soc: 0.5,
            initializing: true,
        }
    }

    #[tokio::test]
    async fn test_solves_small_window() {
        let solver = MilpWindowSolver::new(Scenario::new("test", registry()), SolverSettings::default()).unwrap();
        let solved = solver.solve_window(request(150.0, 3)).await.unwrap();

        assert_eq!(solved.steps(), 3);
        assert_eq!(solved.index.len(), 3);
        assert_eq!(solved.step_costs.len(), 3);
        assert!(solved.objective.is_finite());
        let soc = solved.trace.get("storage", None, VariableName::Capacity).unwrap();
        assert!(soc.iter().all(|v| *v >= 150.0 - 1e-6 && *v <= 300.0 + 1e-6));
        let demand = solved
            .trace
            .get(AC_BUS, Some(DEMAND_SINK), VariableName::Flow)
            .unwrap();
        assert_eq!(demand, &[150.0, 150.0, 150.0]);
        assert!(solved.sized_capacities.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_capacity_is_infeasible_window() {
        let solver = MilpWindowSolver::new(Scenario::new("test", registry()), SolverSettings::default()).unwrap();
        let mut req = request(2000.0, 2);
        req.window = 7;
        let err = solver.solve_window(req).await.unwrap_err();
        assert!(matches!(err, ScheduleError::InfeasibleWindow { window: 7, .. }));
    }

    #[tokio::test]
    async fn test_investment_sizes_storage_and_pv() {
        let mut registry = UnitRegistry::new();
        registry
            .add_generator(GeneratingUnit::new("pp_oil_1", 400.0, 0.3, 1.0).unwrap())
            .unwrap();
        registry
            .set_storage(
                StorageUnit::new("storage", None, Some(300.0), StorageParams::default(), AssetCosts::default())
                    .unwrap(),
            )
            .unwrap();
        registry
            .set_renewable(RenewableSource::new("pv", None, Some(2500.0), AssetCosts::default()).unwrap())
            .unwrap();
        registry.set_inverter_efficiency(0.95).unwrap();
        let scenario = Scenario::new("sizing", registry).with_mode(SizingMode::Investment);
        let solver = MilpWindowSolver::new(scenario, SolverSettings::default()).unwrap();

        let profile = vec![0.0, 0.5, 1.0, 0.5];
        let mut req = request(150.0, 4);
        req.series = TimeSeries::hourly(req.series.index()[0], vec![150.0; 4], profile.clone()).unwrap();
        let solved = solver.solve_window(req).await.unwrap();

        let pv_kwp = solved.sized_capacities["pv"];
        let storage_kwh = solved.sized_capacities["storage"];
        assert!(pv_kwp >= -1e-6 && storage_kwh >= -1e-6);

        let pv_flow = solved.trace.get("pv", Some(DC_BUS), VariableName::Flow).unwrap();
        for (flow, share) in pv_flow.iter().zip(&profile) {
            assert!((flow - share * pv_kwp).abs() < 1e-6, "flow {} vs {} * {}", flow, share, pv_kwp);
        }

        let invested = solved
            .trace
            .scalar(&ResultKey::new("storage", None, VariableName::Invest))
            .unwrap();
        assert!((invested - storage_kwh).abs() < 1e-9);
        let soc = solved.trace.get("storage", None, VariableName::Capacity).unwrap();
        let ceiling = storage_kwh * StorageParams::default().max_soc;
        assert!(soc.iter().all(|v| *v <= ceiling + 1e-6));
    }

    #[test]
    fn test_empty_registry_is_rejected_up_front() {
        let result = MilpWindowSolver::new(Scenario::new("empty", UnitRegistry::new()), SolverSettings::default());
        assert!(matches!(result, Err(ScheduleError::Configuration(_))));
    }

    #[cfg(not(feature = "solver-highs"))]
    #[test]
    fn test_missing_backend_is_unavailable() {
        let settings = SolverSettings {
            backend: SolverBackend::Highs,
            ..Default::default()
        };
        let result = MilpWindowSolver::new(Scenario::new("test", registry()), settings);
        assert!(matches!(result, Err(ScheduleError::SolverUnavailable(_))));
    }
}
