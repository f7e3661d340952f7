//! Security constraint library.
//!
//! Four independent builders translate power-system security requirements
//! into constraints over the window variables. Each one ranks the registry's
//! generating units itself, so every family indexes the same order.

pub mod n_minus_one;
pub mod precedence;
pub mod rotating_mass;
pub mod spinning_reserve;

pub use n_minus_one::n_minus_one_constraints;
pub use precedence::precedence_constraints;
pub use rotating_mass::rotating_mass_constraints;
pub use spinning_reserve::spinning_reserve_constraints;

use good_lp::{Constraint, Expression};
use std::fmt;
use strum::{Display, EnumString};

use crate::domain::{Capacity, LimitSeries, UnitRegistry};
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::variables::WindowVariables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintFamily {
    GenOrder,
    RotatingMass,
    SpinningReserve,
    NMinusOne,
}

/// A constraint tagged with the family and the name it is reported under
pub struct NamedConstraint {
    pub family: ConstraintFamily,
    pub name: String,
    pub constraint: Constraint,
}

impl NamedConstraint {
    pub fn new(family: ConstraintFamily, name: String, constraint: Constraint) -> Self {
        Self {
            family,
            name,
            constraint,
        }
    }
}

impl fmt::Debug for NamedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedConstraint")
            .field("family", &self.family)
            .field("name", &self.name)
            .finish()
    }
}

/// Shared preconditions of the limit-driven builders
fn check_inputs(
    registry: &UnitRegistry,
    vars: &WindowVariables,
    limit: &LimitSeries,
    family: ConstraintFamily,
) -> ScheduleResult<()> {
    if registry.generators().is_empty() {
        return Err(ScheduleError::config(format!(
            "{} constraint cannot be built: no generating units",
            family
        )));
    }
    limit.ensure_len(vars.steps(), &family.to_string())
}

/// Flat storage contribution, `nominal × output_ratio`. Zero without storage.
fn storage_nominal_contribution(registry: &UnitRegistry, vars: &WindowVariables) -> Expression {
    match (registry.storage(), vars.storage.as_ref()) {
        (Some(storage), Some(storage_vars)) => match storage.capacity {
            Capacity::Fixed(nominal) => Expression::from(nominal * storage.params.output_ratio),
            Capacity::Investment { .. } => storage_vars.capacity(storage) * storage.params.output_ratio,
        },
        _ => Expression::from(0.0),
    }
}

/// Discharge headroom above the minimum state of charge at step `t`,
/// `(soc[t] − C × min_soc) × output_ratio`. Zero without storage.
fn storage_headroom_contribution(registry: &UnitRegistry, vars: &WindowVariables, t: usize) -> Expression {
    match (registry.storage(), vars.storage.as_ref()) {
        (Some(storage), Some(storage_vars)) => {
            let floor = storage_vars.capacity(storage) * storage.params.min_soc;
            (Expression::from(storage_vars.soc[t]) - floor) * storage.params.output_ratio
        }
        _ => Expression::from(0.0),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use good_lp::{ProblemVariables, Variable};
    use std::collections::HashMap;

    fn constant_part(expr: &Expression) -> f64 {
        expr.eval_with(&HashMap::<Variable, f64>::new())
    }

    #[test]
    fn test_nominal_contribution_branches_on_capacity() {
        let registry = with_fixed_storage(registry(&[("g", 100.0)]), 300.0);
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 2);
        let contribution = storage_nominal_contribution(&registry, &vars);
        assert!((constant_part(&contribution) - 300.0 * 0.546).abs() < 1e-9);

        let bare = super::test_support::registry(&[("g", 100.0)]);
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &bare, 2);
        assert_eq!(constant_part(&storage_nominal_contribution(&bare, &vars)), 0.0);
    }

    #[test]
    fn test_limit_length_mismatch_is_configuration_error() {
        let registry = registry(&[("g", 100.0)]);
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 3);
        let limit = LimitSeries::constant(10.0, 2).unwrap();
        assert!(matches!(
            check_inputs(&registry, &vars, &limit, ConstraintFamily::SpinningReserve),
            Err(ScheduleError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let registry = UnitRegistry::new();
        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 2);
        let limit = LimitSeries::constant(10.0, 2).unwrap();
        assert!(matches!(
            check_inputs(&registry, &vars, &limit, ConstraintFamily::RotatingMass),
            Err(ScheduleError::Configuration(_))
        ));
    }
}
