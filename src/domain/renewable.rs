use serde::{Deserialize, Serialize};

use super::schedule::FlowKey;
use super::types::{AssetCosts, Capacity, DC_BUS};
use crate::error::{ScheduleError, ScheduleResult};

/// PV array feeding the DC bus with a fixed, normalized infeed profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewableSource {
    pub label: String,
    pub bus: String,
    pub capacity: Capacity,
    pub costs: AssetCosts,
}

impl RenewableSource {
    pub fn new(
        label: impl Into<String>,
        fixed_kw: Option<f64>,
        investment_cost: Option<f64>,
        costs: AssetCosts,
    ) -> ScheduleResult<Self> {
        let label = label.into();
        let capacity = Capacity::from_options(fixed_kw, investment_cost)
            .map_err(|e| ScheduleError::config(format!("{}: {}", label, e)))?;
        costs.validate(&label)?;
        Ok(Self {
            label,
            bus: DC_BUS.to_string(),
            capacity,
            costs,
        })
    }

    pub fn flow_key(&self) -> FlowKey {
        FlowKey::new(&self.label, Some(self.bus.as_str()))
    }
}
