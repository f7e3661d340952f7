//! Full pipeline: registry, security constraints, MILP windows, rolling carry.
#![cfg(feature = "solver-microlp")]

use chrono::NaiveDate;
use microgrid_scheduler::controller::{solve_single_window, HorizonPlan, RollingHorizonScheduler};
use microgrid_scheduler::domain::{
    AssetCosts, GeneratingUnit, StorageParams, StorageUnit, TimeSeries, UnitRegistry, VariableName, AC_BUS,
    DEMAND_SINK, EXCESS_SINK, INVERTER,
};
use microgrid_scheduler::optimizer::{MilpWindowSolver, SolverSettings};
use microgrid_scheduler::scenario::Scenario;
use std::sync::Arc;

const TOL: f64 = 1e-4;
const UNITS: [(&str, f64); 3] = [("pp_oil_1", 186.0), ("pp_oil_2", 186.0), ("pp_oil_3", 320.0)];

fn scenario() -> Scenario {
    let mut registry = UnitRegistry::new();
    for (label, nominal) in UNITS {
        let unit = GeneratingUnit::new(label, nominal, 0.3, 1.0)
            .unwrap()
            .with_costs(
                AssetCosts {
                    capex_per_unit: 500.0,
                    lifetime_years: 20,
                    fixed_per_unit_year: 0.0,
                    variable_per_kwh: 1.2,
                },
                0.02,
            )
            .unwrap();
        registry.add_generator(unit).unwrap();
    }
    registry
        .set_storage(StorageUnit::fixed("storage", 300.0, StorageParams::default()).unwrap())
        .unwrap();

    Scenario::new("island", registry)
}

fn flat_demand(steps: usize, demand: f64) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    TimeSeries::hourly(start, vec![demand; steps], vec![0.0; steps]).unwrap()
}

#[tokio::test]
async fn test_rolling_schedule_is_secure_and_balanced() {
    let solver = Arc::new(MilpWindowSolver::new(scenario(), SolverSettings::default()).unwrap());
    let plan = HorizonPlan::new(24, 12, 12).unwrap();
    let mut scheduler = RollingHorizonScheduler::new(solver, plan, 0.5, Some("storage".to_string())).unwrap();

    let outcome = scheduler.run(&flat_demand(24, 200.0)).await.unwrap();
    assert_eq!(outcome.windows.len(), 2);
    assert!(outcome.objective > 0.0);
    assert!((outcome.objective - outcome.committed_cost).abs() < 1e-6);

    let trace = &outcome.schedule.trace;
    assert_eq!(trace.steps(), 24);
    let status = |label: &str| trace.get(label, Some(AC_BUS), VariableName::Status).unwrap();
    let flow = |label: &str| trace.get(label, Some(AC_BUS), VariableName::Flow).unwrap();
    let soc = trace.get("storage", None, VariableName::Capacity).unwrap();
    let inverter = trace.get(INVERTER, Some(AC_BUS), VariableName::Flow).unwrap();
    let demand = trace.get(AC_BUS, Some(DEMAND_SINK), VariableName::Flow).unwrap();
    let excess = trace.get(AC_BUS, Some(EXCESS_SINK), VariableName::Flow).unwrap();

    let params = StorageParams::default();
    for t in 0..24 {
        let (s1, s2, s3) = (status("pp_oil_1")[t], status("pp_oil_2")[t], status("pp_oil_3")[t]);
        assert!(s1 >= s2 && s2 >= s3, "precedence violated at {}: {} {} {}", t, s1, s2, s3);

        let dispatch: f64 = UNITS.iter().map(|&(label, _)| flow(label)[t]).sum();
        assert!((dispatch + inverter[t] - excess[t] - demand[t]).abs() < TOL, "AC bus unbalanced at {}", t);

        let committed: f64 = UNITS
            .iter()
            .map(|&(label, nominal)| status(label)[t] * nominal)
            .sum();
        let storage_headroom = (soc[t] - 300.0 * params.min_soc) * params.output_ratio;
        assert!(
            committed - dispatch + storage_headroom >= 0.2 * 200.0 - TOL,
            "spinning reserve short at {}",
            t
        );
        assert!(dispatch + storage_headroom >= 0.4 * 200.0 - TOL, "rotating mass short at {}", t);
        assert!(soc[t] >= 300.0 * params.min_soc - TOL);
    }

    assert!((outcome.windows[1].initial_soc - soc[11]).abs() < TOL);
    assert!((outcome.final_state.state_of_charge - soc[23]).abs() < TOL);
}

/// Three units [186, 186, 320], 300 kWh storage, flat 200 kW demand over one
/// 24-step window with the default security policy.
#[tokio::test]
async fn test_day_window_commits_smallest_units_first() {
    let solver = MilpWindowSolver::new(scenario(), SolverSettings::default()).unwrap();
    let solution = solve_single_window(&solver, &flat_demand(24, 200.0), 0.5).await.unwrap();
    assert_eq!(solution.steps(), 24);

    let status = |label: &str| {
        solution
            .trace
            .get(label, Some(AC_BUS), VariableName::Status)
            .unwrap()
            .to_vec()
    };
    let (s1, s2, s3) = (status("pp_oil_1"), status("pp_oil_2"), status("pp_oil_3"));
    for t in 0..24 {
        assert!(s1[t] >= s2[t] && s2[t] >= s3[t], "precedence violated at {}", t);
        let committed: f64 = UNITS
            .iter()
            .zip([s1[t], s2[t], s3[t]])
            .map(|(&(_, nominal), on)| on * nominal)
            .sum();
        assert!(committed >= 200.0 * 1.2 - TOL, "committed {} kW at {}", committed, t);
    }
}

#[tokio::test]
async fn test_single_window_covers_series() {
    let solver = MilpWindowSolver::new(scenario(), SolverSettings::default()).unwrap();
    let solution = solve_single_window(&solver, &flat_demand(6, 200.0), 0.5).await.unwrap();

    assert_eq!(solution.steps(), 6);
    assert_eq!(solution.step_costs.len(), 6);
    assert!(solution.sized_capacities.is_empty());
    assert!(solution.stats.security_constraints > 0);
    let step_sum: f64 = solution.step_costs.iter().sum();
    assert!((solution.objective - (step_sum + solution.fixed_cost)).abs() < 1e-3);
}
