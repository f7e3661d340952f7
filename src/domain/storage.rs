use serde::{Deserialize, Serialize};

use super::schedule::FlowKey;
use super::types::{AssetCosts, Capacity, DC_BUS};
use crate::error::{ScheduleError, ScheduleResult};

/// Technical parameters of a storage unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageParams {
    /// Minimum state of charge as fraction of capacity
    pub min_soc: f64,
    /// Maximum state of charge as fraction of capacity
    pub max_soc: f64,
    pub inflow_efficiency: f64,
    pub outflow_efficiency: f64,
    /// Charge power per unit of capacity
    pub input_ratio: f64,
    /// Discharge power per unit of capacity
    pub output_ratio: f64,
    /// Self-discharge per timestep as fraction of stored energy
    pub capacity_loss: f64,
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            min_soc: 0.5,
            max_soc: 1.0,
            inflow_efficiency: 0.92,
            outflow_efficiency: 0.92,
            input_ratio: 0.546,
            output_ratio: 0.546,
            capacity_loss: 0.0,
        }
    }
}

impl StorageParams {
    pub fn validate(&self, label: &str) -> ScheduleResult<()> {
        let fractions = [
            ("min_soc", self.min_soc),
            ("max_soc", self.max_soc),
            ("capacity_loss", self.capacity_loss),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScheduleError::config(format!(
                    "{}: {} must lie in [0, 1], got {}",
                    label, name, value
                )));
            }
        }
        if self.min_soc > self.max_soc {
            return Err(ScheduleError::config(format!(
                "{}: min_soc {} exceeds max_soc {}",
                label, self.min_soc, self.max_soc
            )));
        }
        let positives = [
            ("inflow_efficiency", self.inflow_efficiency),
            ("outflow_efficiency", self.outflow_efficiency),
            ("input_ratio", self.input_ratio),
            ("output_ratio", self.output_ratio),
        ];
        for (name, value) in positives {
            if !value.is_finite() || value <= 0.0 {
                return Err(ScheduleError::config(format!(
                    "{}: {} must be positive, got {}",
                    label, name, value
                )));
            }
        }
        if self.inflow_efficiency > 1.0 || self.outflow_efficiency > 1.0 {
            return Err(ScheduleError::config(format!(
                "{}: efficiencies cannot exceed 1.0",
                label
            )));
        }
        Ok(())
    }
}

/// Battery storage attached to the DC bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub label: String,
    pub bus: String,
    pub capacity: Capacity,
    pub params: StorageParams,
    pub costs: AssetCosts,
}

impl StorageUnit {
    /// Exactly one of `fixed_kwh` and `investment_cost` must be given.
    pub fn new(
        label: impl Into<String>,
        fixed_kwh: Option<f64>,
        investment_cost: Option<f64>,
        params: StorageParams,
        costs: AssetCosts,
    ) -> ScheduleResult<Self> {
        let label = label.into();
        let capacity = Capacity::from_options(fixed_kwh, investment_cost)
            .map_err(|e| ScheduleError::config(format!("{}: {}", label, e)))?;
        params.validate(&label)?;
        costs.validate(&label)?;
        Ok(Self {
            label,
            bus: DC_BUS.to_string(),
            capacity,
            params,
            costs,
        })
    }

    pub fn fixed(label: impl Into<String>, capacity_kwh: f64, params: StorageParams) -> ScheduleResult<Self> {
        Self::new(label, Some(capacity_kwh), None, params, AssetCosts::default())
    }

    /// Key of the state-of-charge trajectory, `(label, None)`
    pub fn capacity_key(&self) -> FlowKey {
        FlowKey::new(&self.label, None)
    }

    pub fn discharge_key(&self) -> FlowKey {
        FlowKey::new(&self.label, Some(self.bus.as_str()))
    }

    pub fn charge_key(&self) -> FlowKey {
        FlowKey::new(&self.bus, Some(self.label.as_str()))
    }
}
