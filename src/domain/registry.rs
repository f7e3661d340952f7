use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{GeneratingUnit, RenewableSource, StorageUnit};
use crate::error::{ScheduleError, ScheduleResult};

/// Components of one scheduling problem instance.
///
/// Built explicitly: callers push units into a registry they own and hand it
/// to the solver. Generators keep their insertion order, which the ranking
/// uses to break ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRegistry {
    generators: Vec<GeneratingUnit>,
    storage: Option<StorageUnit>,
    renewable: Option<RenewableSource>,
    inverter_efficiency: f64,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            generators: Vec::new(),
            storage: None,
            renewable: None,
            inverter_efficiency: 1.0,
        }
    }

    pub fn add_generator(&mut self, unit: GeneratingUnit) -> ScheduleResult<&mut Self> {
        unit.validate()?;
        if self.contains_label(&unit.label) {
            return Err(ScheduleError::config(format!(
                "duplicate component label '{}'",
                unit.label
            )));
        }
        self.generators.push(unit);
        Ok(self)
    }

    pub fn set_storage(&mut self, storage: StorageUnit) -> ScheduleResult<&mut Self> {
        if self.generators.iter().any(|g| g.label == storage.label)
            || self.renewable.as_ref().is_some_and(|r| r.label == storage.label)
        {
            return Err(ScheduleError::config(format!(
                "duplicate component label '{}'",
                storage.label
            )));
        }
        self.storage = Some(storage);
        Ok(self)
    }

    pub fn set_renewable(&mut self, source: RenewableSource) -> ScheduleResult<&mut Self> {
        if self.generators.iter().any(|g| g.label == source.label)
            || self.storage.as_ref().is_some_and(|s| s.label == source.label)
        {
            return Err(ScheduleError::config(format!(
                "duplicate component label '{}'",
                source.label
            )));
        }
        self.renewable = Some(source);
        Ok(self)
    }

    pub fn set_inverter_efficiency(&mut self, efficiency: f64) -> ScheduleResult<&mut Self> {
        if !efficiency.is_finite() || efficiency <= 0.0 || efficiency > 1.0 {
            return Err(ScheduleError::config(format!(
                "inverter efficiency must lie in (0, 1], got {}",
                efficiency
            )));
        }
        self.inverter_efficiency = efficiency;
        Ok(self)
    }

    pub fn generators(&self) -> &[GeneratingUnit] {
        &self.generators
    }

    pub fn storage(&self) -> Option<&StorageUnit> {
        self.storage.as_ref()
    }

    pub fn renewable(&self) -> Option<&RenewableSource> {
        self.renewable.as_ref()
    }

    pub fn inverter_efficiency(&self) -> f64 {
        self.inverter_efficiency
    }

    /// The DC side (and its inverter) exists when PV or storage is present
    pub fn has_dc_side(&self) -> bool {
        self.storage.is_some() || self.renewable.is_some()
    }

    /// Labels of every asset whose capacity is an investment decision
    pub fn investment_labels(&self) -> Vec<&str> {
        let mut labels = Vec::new();
        if let Some(storage) = self.storage.as_ref().filter(|s| s.capacity.is_investment()) {
            labels.push(storage.label.as_str());
        }
        if let Some(pv) = self.renewable.as_ref().filter(|r| r.capacity.is_investment()) {
            labels.push(pv.label.as_str());
        }
        labels
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        if self.generators.is_empty() {
            return Err(ScheduleError::config("unit registry holds no generating units"));
        }
        let mut seen = HashSet::new();
        for unit in &self.generators {
            unit.validate()?;
            if !seen.insert(unit.label.as_str()) {
                return Err(ScheduleError::config(format!(
                    "duplicate generator label '{}'",
                    unit.label
                )));
            }
        }
        Ok(())
    }

    fn contains_label(&self, label: &str) -> bool {
        self.generators.iter().any(|g| g.label == label)
            || self.storage.as_ref().is_some_and(|s| s.label == label)
            || self.renewable.as_ref().is_some_and(|r| r.label == label)
    }
}
