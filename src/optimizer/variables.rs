//! Decision variables of one window model

use good_lp::{variable, Expression, ProblemVariables, Variable};
use std::collections::BTreeMap;

use crate::domain::{Capacity, FlowKey, GeneratingUnit, RenewableSource, StorageUnit, UnitRegistry};
use crate::error::{ScheduleError, ScheduleResult};

/// Commitment and dispatch of one generating unit, one entry per timestep
#[derive(Debug, Clone)]
pub struct GeneratorVariables {
    pub status: Vec<Variable>,
    pub dispatch: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub struct StorageVariables {
    /// Stored energy at the end of each step (kWh)
    pub soc: Vec<Variable>,
    pub charge: Vec<Variable>,
    pub discharge: Vec<Variable>,
    /// Present only for investment-sized storage
    pub invest: Option<Variable>,
}

impl StorageVariables {
    /// Realized capacity: the literal size or the investment variable
    pub fn capacity(&self, storage: &StorageUnit) -> Expression {
        capacity_expression(&storage.capacity, self.invest)
    }
}

#[derive(Debug, Clone)]
pub struct RenewableVariables {
    pub flow: Vec<Variable>,
    pub invest: Option<Variable>,
}

impl RenewableVariables {
    pub fn capacity(&self, source: &RenewableSource) -> Expression {
        capacity_expression(&source.capacity, self.invest)
    }
}

fn capacity_expression(capacity: &Capacity, invest: Option<Variable>) -> Expression {
    match (capacity, invest) {
        (Capacity::Fixed(value), _) => Expression::from(*value),
        (Capacity::Investment { .. }, Some(var)) => Expression::from(var),
        (Capacity::Investment { .. }, None) => Expression::from(0.0),
    }
}

/// All variables of one window, keyed the way the constraint builders index them.
///
/// Generator variables are addressed by `(unit, output bus)`, the same flow key
/// their results are reported under.
#[derive(Debug, Clone)]
pub struct WindowVariables {
    steps: usize,
    generators: BTreeMap<FlowKey, GeneratorVariables>,
    pub storage: Option<StorageVariables>,
    pub renewable: Option<RenewableVariables>,
    /// DC-side input of the inverter; AC output is `η × input`
    pub inverter: Option<Vec<Variable>>,
    pub excess: Vec<Variable>,
}

impl WindowVariables {
    pub fn declare(problem: &mut ProblemVariables, registry: &UnitRegistry, steps: usize) -> Self {
        let generators = registry
            .generators()
            .iter()
            .map(|unit| (unit.flow_key(), declare_generator(problem, unit, steps)))
            .collect();

        let storage = registry.storage().map(|storage| StorageVariables {
            soc: problem.add_vector(variable().min(0.0), steps),
            charge: problem.add_vector(variable().min(0.0), steps),
            discharge: problem.add_vector(variable().min(0.0), steps),
            invest: storage
                .capacity
                .is_investment()
                .then(|| problem.add(variable().min(0.0))),
        });

        let renewable = registry.renewable().map(|source| RenewableVariables {
            flow: problem.add_vector(variable().min(0.0), steps),
            invest: source
                .capacity
                .is_investment()
                .then(|| problem.add(variable().min(0.0))),
        });

        let inverter = registry
            .has_dc_side()
            .then(|| problem.add_vector(variable().min(0.0), steps));

        Self {
            steps,
            generators,
            storage,
            renewable,
            inverter,
            excess: problem.add_vector(variable().min(0.0), steps),
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn generator(&self, key: &FlowKey) -> ScheduleResult<&GeneratorVariables> {
        self.generators
            .get(key)
            .ok_or_else(|| ScheduleError::config(format!("no variables declared for generator flow {}", key)))
    }

    /// Variables of `unit` at its output bus
    pub fn unit(&self, unit: &GeneratingUnit) -> ScheduleResult<&GeneratorVariables> {
        self.generator(&unit.flow_key())
    }

    pub fn status(&self, unit: &GeneratingUnit, t: usize) -> ScheduleResult<Variable> {
        Ok(self.unit(unit)?.status[t])
    }

    pub fn dispatch(&self, unit: &GeneratingUnit, t: usize) -> ScheduleResult<Variable> {
        Ok(self.unit(unit)?.dispatch[t])
    }

    pub fn variable_count(&self) -> usize {
        let per_step = 2 * self.generators.len()
            + self.storage.as_ref().map_or(0, |_| 3)
            + self.renewable.as_ref().map_or(0, |_| 1)
            + self.inverter.as_ref().map_or(0, |_| 1)
            + 1;
        let scalars = self.storage.as_ref().map_or(0, |s| usize::from(s.invest.is_some()))
            + self.renewable.as_ref().map_or(0, |r| usize::from(r.invest.is_some()));
        per_step * self.steps + scalars
    }
}

fn declare_generator(problem: &mut ProblemVariables, unit: &GeneratingUnit, steps: usize) -> GeneratorVariables {
    GeneratorVariables {
        status: problem.add_vector(variable().binary(), steps),
        dispatch: problem.add_vector(variable().min(0.0).max(unit.max_output_kw()), steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetCosts, StorageParams, AC_BUS, DC_BUS};

    #[test]
    fn test_declare_counts() {
        let mut registry = UnitRegistry::new();
        registry
            .add_generator(GeneratingUnit::new("pp_oil_1", 186.0, 0.3, 1.0).unwrap())
            .unwrap();
        registry
            .add_generator(GeneratingUnit::new("pp_oil_2", 320.0, 0.3, 1.0).unwrap())
            .unwrap();
        registry
            .set_storage(
                StorageUnit::new("storage", None, Some(300.0), StorageParams::default(), AssetCosts::default())
                    .unwrap(),
            )
            .unwrap();

        let mut problem = ProblemVariables::new();
        let vars = WindowVariables::declare(&mut problem, &registry, 4);

        assert_eq!(vars.steps(), 4);
        assert!(vars.generator(&FlowKey::new("pp_oil_2", Some(AC_BUS))).is_ok());
        assert!(vars.unit(&registry.generators()[0]).is_ok());
        assert!(matches!(
            vars.generator(&FlowKey::new("pp_oil_9", Some(AC_BUS))),
            Err(ScheduleError::Configuration(_))
        ));
        assert!(matches!(
            vars.generator(&FlowKey::new("pp_oil_2", Some(DC_BUS))),
            Err(ScheduleError::Configuration(_))
        ));
        assert!(vars.storage.as_ref().unwrap().invest.is_some());
        assert!(vars.renewable.is_none());
        assert!(vars.inverter.is_some());
        // 2 × 2 generator + 3 storage + 1 inverter + 1 excess per step, plus invest
        assert_eq!(vars.variable_count(), 9 * 4 + 1);
        assert_eq!(problem.len(), vars.variable_count());
    }
}
