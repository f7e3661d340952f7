use good_lp::constraint;
use tracing::debug;

use super::{ConstraintFamily, NamedConstraint};
use crate::domain::UnitRegistry;
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::ranking::rank_units;
use crate::optimizer::variables::WindowVariables;

/// Commitment priority: `status[r_i, t] ≥ status[r_{i+1}, t]` for the first
/// `depth` ranked units.
///
/// A smaller unit must be online whenever the next larger one is. `depth = 2`
/// orders exactly the two smallest units; `depth` equal to the unit count
/// chains the whole ranking. Depth is clamped to the number of units, and a
/// single unit yields no constraints.
pub fn precedence_constraints(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    depth: usize,
) -> ScheduleResult<Vec<NamedConstraint>> {
    if registry.generators().is_empty() {
        return Err(ScheduleError::config(
            "gen_order constraint cannot be built: no generating units",
        ));
    }
    let ranked = rank_units(registry.generators())?;
    let depth = depth.min(ranked.len());

    let mut constraints = Vec::new();
    for pair in ranked[..depth].windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        let lower_vars = vars.unit(lower)?;
        let upper_vars = vars.unit(upper)?;
        for t in 0..vars.steps() {
            constraints.push(NamedConstraint::new(
                ConstraintFamily::GenOrder,
                format!("gen_order[{}>={}][{}]", lower.label, upper.label, t),
                constraint!(lower_vars.status[t] >= upper_vars.status[t]),
            ));
        }
    }
    debug!(depth, count = constraints.len(), "built precedence constraints");
    Ok(constraints)
}
