use serde::{Deserialize, Serialize};

use super::schedule::FlowKey;
use super::types::{AssetCosts, AC_BUS};
use crate::error::{ScheduleError, ScheduleResult};

/// Dispatchable generating unit (diesel genset or similar).
///
/// Commitment status and dispatch are solver variables; the unit only carries
/// the static attributes they are bounded by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratingUnit {
    pub label: String,
    /// Bus the electrical output terminal connects to
    pub output_bus: String,
    pub nominal_capacity_kw: f64,
    /// Minimum loading fraction while committed
    pub min_load: f64,
    /// Maximum loading fraction while committed
    pub max_load: f64,
    pub costs: AssetCosts,
    /// O&M cost per kW of nominal capacity and committed hour
    pub om_per_kw_hour: f64,
}

impl GeneratingUnit {
    pub fn new(
        label: impl Into<String>,
        nominal_capacity_kw: f64,
        min_load: f64,
        max_load: f64,
    ) -> ScheduleResult<Self> {
        let unit = Self {
            label: label.into(),
            output_bus: AC_BUS.to_string(),
            nominal_capacity_kw,
            min_load,
            max_load,
            costs: AssetCosts::default(),
            om_per_kw_hour: 0.0,
        };
        unit.validate()?;
        Ok(unit)
    }

    pub fn with_costs(mut self, costs: AssetCosts, om_per_kw_hour: f64) -> ScheduleResult<Self> {
        self.costs = costs;
        self.om_per_kw_hour = om_per_kw_hour;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        if self.label.trim().is_empty() {
            return Err(ScheduleError::config("generator label must not be empty"));
        }
        if !self.nominal_capacity_kw.is_finite() || self.nominal_capacity_kw <= 0.0 {
            return Err(ScheduleError::config(format!(
                "{}: nominal capacity must be positive, got {}",
                self.label, self.nominal_capacity_kw
            )));
        }
        if !(0.0..=1.0).contains(&self.min_load) || !(0.0..=1.0).contains(&self.max_load) {
            return Err(ScheduleError::config(format!(
                "{}: loading fractions must lie in [0, 1] (min {}, max {})",
                self.label, self.min_load, self.max_load
            )));
        }
        if self.min_load > self.max_load {
            return Err(ScheduleError::config(format!(
                "{}: min_load {} exceeds max_load {}",
                self.label, self.min_load, self.max_load
            )));
        }
        if !self.om_per_kw_hour.is_finite() || self.om_per_kw_hour < 0.0 {
            return Err(ScheduleError::config(format!(
                "{}: om_per_kw_hour must be non-negative",
                self.label
            )));
        }
        self.costs.validate(&self.label)
    }

    /// Maximum deliverable power: nominal capacity times max loading
    pub fn max_output_kw(&self) -> f64 {
        self.nominal_capacity_kw * self.max_load
    }

    pub fn min_output_kw(&self) -> f64 {
        self.nominal_capacity_kw * self.min_load
    }

    /// Key of the unit's electrical output flow
    pub fn flow_key(&self) -> FlowKey {
        FlowKey::new(&self.label, Some(self.output_bus.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_output() {
        let unit = GeneratingUnit::new("pp_oil_3", 320.0, 0.3, 0.9).unwrap();
        assert!((unit.max_output_kw() - 288.0).abs() < 1e-9);
        assert!((unit.min_output_kw() - 96.0).abs() < 1e-9);
        assert_eq!(unit.flow_key(), FlowKey::new("pp_oil_3", Some("electricity")));
    }

    #[test]
    fn test_rejects_inverted_loading() {
        assert!(GeneratingUnit::new("g", 100.0, 0.8, 0.5).is_err());
        assert!(GeneratingUnit::new("g", 100.0, -0.1, 0.5).is_err());
        assert!(GeneratingUnit::new("g", 0.0, 0.3, 1.0).is_err());
        assert!(GeneratingUnit::new("", 100.0, 0.3, 1.0).is_err());
    }
}
