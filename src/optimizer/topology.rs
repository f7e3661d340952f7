//! Energy-system topology of one window: bus balances, unit bounds, storage
//! dynamics and the cost objective.

use good_lp::{constraint, Constraint, Expression};
use tracing::debug;

use super::costs::CostModel;
use super::variables::WindowVariables;
use crate::domain::{TimeSeries, UnitRegistry};
use crate::error::{ScheduleError, ScheduleResult};

/// How the first storage balance of a window is anchored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageAnchor {
    /// First window: SOC fraction of the (possibly invested) capacity
    Fraction(f64),
    /// Later windows: stored energy in kWh carried from the previous window
    Energy(f64),
}

impl StorageAnchor {
    pub fn new(initial_soc: f64, initializing: bool) -> Self {
        if initializing {
            StorageAnchor::Fraction(initial_soc)
        } else {
            StorageAnchor::Energy(initial_soc)
        }
    }
}

/// Balance and bound constraints of the window network
pub fn topology_constraints(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    series: &TimeSeries,
    anchor: StorageAnchor,
) -> ScheduleResult<Vec<Constraint>> {
    let steps = vars.steps();
    if series.len() != steps {
        return Err(ScheduleError::config(format!(
            "window series has {} rows but {} steps were declared",
            series.len(),
            steps
        )));
    }
    let demand = series.demand();
    let pv_profile = series.pv();
    let mut constraints = Vec::new();

    // Generator loading bounds
    for unit in registry.generators() {
        let unit_vars = vars.unit(unit)?;
        for t in 0..steps {
            let (status, dispatch) = (unit_vars.status[t], unit_vars.dispatch[t]);
            constraints.push(constraint!(dispatch >= status * unit.min_output_kw()));
            constraints.push(constraint!(dispatch <= status * unit.max_output_kw()));
        }
    }

    // AC bus
    let eta = registry.inverter_efficiency();
    for t in 0..steps {
        let mut supply = Expression::from(0.0);
        for unit in registry.generators() {
            supply += vars.dispatch(unit, t)?;
        }
        if let Some(inverter) = &vars.inverter {
            supply += inverter[t] * eta;
        }
        let served = supply - vars.excess[t];
        constraints.push(constraint!(served == demand[t]));
    }

    // DC bus
    if let Some(inverter) = &vars.inverter {
        for t in 0..steps {
            let mut inflow = Expression::from(0.0);
            let mut outflow = Expression::from(inverter[t]);
            if let Some(pv) = &vars.renewable {
                inflow += pv.flow[t];
            }
            if let Some(storage) = &vars.storage {
                inflow += storage.discharge[t];
                outflow += storage.charge[t];
            }
            constraints.push(constraint!(inflow == outflow));
        }
    }

    // PV infeed follows the normalized profile
    if let (Some(source), Some(pv)) = (registry.renewable(), &vars.renewable) {
        for t in 0..steps {
            let available = pv.capacity(source) * pv_profile[t];
            constraints.push(constraint!(pv.flow[t] == available));
        }
    }

    // Storage dynamics and bounds
    if let (Some(storage), Some(storage_vars)) = (registry.storage(), &vars.storage) {
        let params = storage.params;
        let capacity = storage_vars.capacity(storage);
        let retention = 1.0 - params.capacity_loss;

        for t in 0..steps {
            let previous = match (t, anchor) {
                (0, StorageAnchor::Fraction(fraction)) => capacity.clone() * fraction,
                (0, StorageAnchor::Energy(kwh)) => Expression::from(kwh),
                _ => Expression::from(storage_vars.soc[t - 1]),
            };
            let next = previous * retention + storage_vars.charge[t] * params.inflow_efficiency
                - storage_vars.discharge[t] * (1.0 / params.outflow_efficiency);
            constraints.push(constraint!(storage_vars.soc[t] == next));

            let soc_floor = capacity.clone() * params.min_soc;
            let soc_ceiling = capacity.clone() * params.max_soc;
            let charge_limit = capacity.clone() * params.input_ratio;
            let discharge_limit = capacity.clone() * params.output_ratio;
            constraints.push(constraint!(storage_vars.soc[t] >= soc_floor));
            constraints.push(constraint!(storage_vars.soc[t] <= soc_ceiling));
            constraints.push(constraint!(storage_vars.charge[t] <= charge_limit));
            constraints.push(constraint!(storage_vars.discharge[t] <= discharge_limit));
        }
    }

    debug!(count = constraints.len(), steps, "built topology constraints");
    Ok(constraints)
}

/// Cost terms of one window.
///
/// `step_costs[t]` holds the operating cost of step `t`; `fixed` holds the
/// capacity-proportional costs that belong to the whole window.
pub struct WindowObjective {
    pub step_costs: Vec<Expression>,
    pub fixed: Expression,
}

impl WindowObjective {
    pub fn build(registry: &UnitRegistry, vars: &WindowVariables, costs: &CostModel) -> ScheduleResult<Self> {
        let steps = vars.steps();
        let mut step_costs = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut cost = Expression::from(0.0);
            for unit in registry.generators() {
                cost += vars.dispatch(unit, t)? * unit.costs.variable_per_kwh;
                cost += vars.status(unit, t)? * (unit.om_per_kw_hour * unit.nominal_capacity_kw);
            }
            if let (Some(storage), Some(storage_vars)) = (registry.storage(), &vars.storage) {
                cost += storage_vars.discharge[t] * storage.costs.variable_per_kwh;
            }
            if let (Some(source), Some(pv)) = (registry.renewable(), &vars.renewable) {
                cost += pv.flow[t] * source.costs.variable_per_kwh;
            }
            step_costs.push(cost);
        }

        let mut fixed = Expression::from(0.0);
        for unit in registry.generators() {
            fixed += costs.generator_fixed(unit);
        }
        if let (Some(storage), Some(storage_vars)) = (registry.storage(), &vars.storage) {
            fixed += storage_vars.capacity(storage) * costs.storage_capacity_cost(storage);
        }
        if let (Some(source), Some(pv)) = (registry.renewable(), &vars.renewable) {
            fixed += pv.capacity(source) * costs.renewable_capacity_cost(source);
        }

        Ok(Self { step_costs, fixed })
    }

    pub fn total(&self) -> Expression {
        let mut total = self.fixed.clone();
        for cost in &self.step_costs {
            total += cost.clone();
        }
        total
    }
}
