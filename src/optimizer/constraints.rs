use serde::{Deserialize, Serialize};
use tracing::debug;

use super::security::{
    n_minus_one_constraints, precedence_constraints, rotating_mass_constraints,
    spinning_reserve_constraints, NamedConstraint,
};
use super::variables::WindowVariables;
use crate::domain::{LimitSeries, UnitRegistry};
use crate::error::{ScheduleError, ScheduleResult};

/// Which security families are attached to a window and how their limits
/// derive from demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Spinning reserve limit as fraction of demand
    pub reserve_fraction: f64,
    /// Rotating mass limit as fraction of demand
    pub rotating_mass_fraction: f64,
    pub precedence_enabled: bool,
    /// Ranked units covered by the precedence chain; unset chains every unit
    pub precedence_units: Option<usize>,
    pub n_minus_one_enabled: bool,
    /// N-1 limit as fraction of demand
    pub n_minus_one_fraction: f64,
    /// Ranked units that get their own contingency constraint
    pub n_minus_one_units: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            reserve_fraction: 0.2,
            rotating_mass_fraction: 0.4,
            precedence_enabled: true,
            precedence_units: None,
            n_minus_one_enabled: false,
            n_minus_one_fraction: 1.0,
            n_minus_one_units: 3,
        }
    }
}

impl SecurityPolicy {
    pub fn validate(&self) -> ScheduleResult<()> {
        let fractions = [
            ("reserve_fraction", self.reserve_fraction),
            ("rotating_mass_fraction", self.rotating_mass_fraction),
            ("n_minus_one_fraction", self.n_minus_one_fraction),
        ];
        if self.precedence_units == Some(0) {
            return Err(ScheduleError::config("security.precedence_units must be positive"));
        }
        for (name, value) in fractions {
            if !value.is_finite() || value < 0.0 {
                return Err(ScheduleError::config(format!(
                    "security.{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Attach every enabled family for one window with demand-derived limits
    pub fn build(
        &self,
        registry: &UnitRegistry,
        vars: &WindowVariables,
        demand: &[f64],
    ) -> ScheduleResult<Vec<NamedConstraint>> {
        let reserve = LimitSeries::from_demand(demand, self.reserve_fraction)?;
        let rotating_mass = LimitSeries::from_demand(demand, self.rotating_mass_fraction)?;

        let mut constraints = Vec::new();
        if self.precedence_enabled {
            let depth = self.precedence_units.unwrap_or(registry.generators().len());
            constraints.extend(precedence_constraints(registry, vars, depth)?);
        }
        constraints.extend(rotating_mass_constraints(registry, vars, &rotating_mass)?);
        constraints.extend(spinning_reserve_constraints(registry, vars, &reserve)?);
        if self.n_minus_one_enabled {
            let limit = LimitSeries::from_demand(demand, self.n_minus_one_fraction)?;
            constraints.extend(n_minus_one_constraints(
                registry,
                vars,
                &limit,
                self.n_minus_one_units,
            )?);
        }
        debug!(count = constraints.len(), "attached security constraints");
        Ok(constraints)
    }
}
