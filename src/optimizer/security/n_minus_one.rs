use good_lp::{constraint, Expression};
use tracing::debug;

use super::{check_inputs, ConstraintFamily, NamedConstraint};
use crate::domain::{LimitSeries, UnitRegistry};
use crate::error::ScheduleResult;
use crate::optimizer::ranking::rank_units;
use crate::optimizer::variables::WindowVariables;

/// Single-contingency survivability for the first `units` ranked generators.
///
/// For each such unit `i`, separately named:
/// `Σ status × max_power − status_i × max_power_i ≥ limit × status_i`.
/// The right side is gated by `status_i`, so a unit that is offline cannot
/// trip and its constraint is vacuous.
pub fn n_minus_one_constraints(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    limit: &LimitSeries,
    units: usize,
) -> ScheduleResult<Vec<NamedConstraint>> {
    check_inputs(registry, vars, limit, ConstraintFamily::NMinusOne)?;
    let ranked = rank_units(registry.generators())?;
    let units = units.min(ranked.len());

    let mut constraints = Vec::with_capacity(units * vars.steps());
    for (position, tripped) in ranked.iter().take(units).enumerate() {
        for t in 0..vars.steps() {
            let mut committed = Expression::from(0.0);
            for unit in &ranked {
                committed += vars.status(unit, t)? * unit.max_output_kw();
            }
            let tripped_status = vars.status(tripped, t)?;
            let remaining = committed - tripped_status * tripped.max_output_kw();
            let required = tripped_status * limit.at(t);

            constraints.push(NamedConstraint::new(
                ConstraintFamily::NMinusOne,
                format!("n{}_constraint[{}][{}]", position + 1, tripped.label, t),
                constraint!(remaining >= required),
            ));
        }
    }
    debug!(units, count = constraints.len(), "built N-1 constraints");
    Ok(constraints)
}
