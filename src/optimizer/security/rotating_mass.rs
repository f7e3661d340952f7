use good_lp::{constraint, Expression};
use tracing::debug;

use super::{check_inputs, storage_headroom_contribution, storage_nominal_contribution};
use super::{ConstraintFamily, NamedConstraint};
use crate::domain::{LimitSeries, UnitRegistry};
use crate::error::ScheduleResult;
use crate::optimizer::ranking::rank_units;
use crate::optimizer::variables::WindowVariables;

/// Inertia margin against `limit[t]`, as a lower and an upper bound per step.
///
/// The lower bound credits storage with its flat rating; the upper bound
/// credits it with its discharge headroom above the minimum state of charge.
pub fn rotating_mass_constraints(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    limit: &LimitSeries,
) -> ScheduleResult<Vec<NamedConstraint>> {
    check_inputs(registry, vars, limit, ConstraintFamily::RotatingMass)?;
    let ranked = rank_units(registry.generators())?;
    let storage_lower = storage_nominal_contribution(registry, vars);

    let mut constraints = Vec::with_capacity(2 * vars.steps());
    for t in 0..vars.steps() {
        let mut dispatched = Expression::from(0.0);
        for unit in &ranked {
            dispatched += vars.dispatch(unit, t)?;
        }
        let required = limit.at(t);

        let lower = dispatched.clone() + storage_lower.clone();
        constraints.push(NamedConstraint::new(
            ConstraintFamily::RotatingMass,
            format!("rotating_mass_l[{}]", t),
            constraint!(lower >= required),
        ));

        let upper = dispatched + storage_headroom_contribution(registry, vars, t);
        constraints.push(NamedConstraint::new(
            ConstraintFamily::RotatingMass,
            format!("rotating_mass_u[{}]", t),
            constraint!(upper >= required),
        ));
    }
    debug!(count = constraints.len(), "built rotating mass constraints");
    Ok(constraints)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{registry, with_fixed_storage};
    use super::*;
    use crate::error::ScheduleError;
    use good_lp::ProblemVariables;

    #[test]
    fn test_two_bounds_per_step() {
        let registry = with_fixed_storage(registry(&[("a", 100.0), ("b", 150.0)]), 300.0);
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 3);
        let limit = LimitSeries::from_demand(&[200.0, 200.0, 200.0], 0.4).unwrap();

        let built = rotating_mass_constraints(&registry, &vars, &limit).unwrap();
        let names: Vec<_> = built.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "rotating_mass_l[0]",
                "rotating_mass_u[0]",
                "rotating_mass_l[1]",
                "rotating_mass_u[1]",
                "rotating_mass_l[2]",
                "rotating_mass_u[2]",
            ]
        );
        assert!(built.iter().all(|c| c.family == ConstraintFamily::RotatingMass));
    }

    #[test]
    fn test_rejects_short_limit() {
        let registry = registry(&[("a", 100.0)]);
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 3);
        let limit = LimitSeries::constant(80.0, 2).unwrap();
        assert!(matches!(
            rotating_mass_constraints(&registry, &vars, &limit),
            Err(ScheduleError::Configuration(_))
        ));
    }
}
