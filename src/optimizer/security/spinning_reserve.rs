use good_lp::{constraint, Expression};
use tracing::debug;

use super::{check_inputs, storage_headroom_contribution, storage_nominal_contribution};
use super::{ConstraintFamily, NamedConstraint};
use crate::domain::{LimitSeries, UnitRegistry};
use crate::error::ScheduleResult;
use crate::optimizer::ranking::rank_units;
use crate::optimizer::variables::WindowVariables;

/// Unused committed capacity plus storage headroom must cover `limit[t]`.
///
/// Per step: `Σ (status × max_power − dispatch) + storage ≥ limit`, once with
/// the flat storage rating and once with the headroom above minimum SOC.
pub fn spinning_reserve_constraints(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    limit: &LimitSeries,
) -> ScheduleResult<Vec<NamedConstraint>> {
    check_inputs(registry, vars, limit, ConstraintFamily::SpinningReserve)?;
    let ranked = rank_units(registry.generators())?;
    let storage_lower = storage_nominal_contribution(registry, vars);

    let mut constraints = Vec::with_capacity(2 * vars.steps());
    for t in 0..vars.steps() {
        let mut headroom = Expression::from(0.0);
        for unit in &ranked {
            headroom += vars.status(unit, t)? * unit.max_output_kw();
            headroom -= vars.dispatch(unit, t)?;
        }
        let required = limit.at(t);

        let lower = headroom.clone() + storage_lower.clone();
        constraints.push(NamedConstraint::new(
            ConstraintFamily::SpinningReserve,
            format!("spinning_reserve_l[{}]", t),
            constraint!(lower >= required),
        ));

        let upper = headroom + storage_headroom_contribution(registry, vars, t);
        constraints.push(NamedConstraint::new(
            ConstraintFamily::SpinningReserve,
            format!("spinning_reserve_u[{}]", t),
            constraint!(upper >= required),
        ));
    }
    debug!(count = constraints.len(), "built spinning reserve constraints");
    Ok(constraints)
}
