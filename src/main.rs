use anyhow::Result;
use microgrid_scheduler::{
    config, controller,
    domain::{SizingMode, TimeSeries},
    optimizer::MilpWindowSolver,
    telemetry,
};
use config::{Config, RunStrategy};
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    let scenario = cfg.scenario()?;
    let plan = cfg.plan()?;
    let storage_label = scenario.storage_label().map(str::to_string);
    if scenario.mode == SizingMode::Investment && cfg.run.strategy == RunStrategy::Rolling {
        warn!("investment mode with the rolling strategy sizes every window independently");
    }

    let series = TimeSeries::from_csv_path(&cfg.run.timeseries_path, cfg.delimiter()?)?;
    info!(
        scenario = %scenario.name,
        mode = %scenario.mode,
        strategy = %cfg.run.strategy,
        steps = series.len(),
        "time series loaded"
    );

    let solver = Arc::new(MilpWindowSolver::new(scenario, cfg.solver.clone())?);

    let summary = match cfg.run.strategy {
        RunStrategy::Single => {
            let horizon = series.truncate(plan.simulation);
            let solution = controller::solve_single_window(solver.as_ref(), &horizon, cfg.run.initial_soc).await?;
            serde_json::json!({
                "strategy": "single",
                "objective": solution.objective,
                "sized_capacities": solution.sized_capacities,
                "stats": solution.stats,
            })
        }
        RunStrategy::Rolling => {
            let mut scheduler =
                controller::RollingHorizonScheduler::new(solver, plan, cfg.run.initial_soc, storage_label)?;
            let outcome = scheduler.run(&series).await?;
            serde_json::json!({
                "strategy": "rolling",
                "run_id": outcome.run_id,
                "objective": outcome.objective,
                "committed_cost": outcome.committed_cost,
                "objective_double_counts_lookahead": outcome.objective_double_counts_lookahead,
                "final_state": outcome.final_state,
                "windows": outcome.windows,
                "sized_capacities": outcome.sized_capacities,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
