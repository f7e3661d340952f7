use serde::{Deserialize, Serialize};

use crate::domain::{SizingMode, UnitRegistry};
use crate::error::ScheduleResult;
use crate::optimizer::{Economics, SecurityPolicy};

/// Everything a window solve needs besides the time series itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub mode: SizingMode,
    pub registry: UnitRegistry,
    pub security: SecurityPolicy,
    pub economics: Economics,
}

impl Scenario {
    pub fn new(name: impl Into<String>, registry: UnitRegistry) -> Self {
        Self {
            name: name.into(),
            mode: SizingMode::Simulation,
            registry,
            security: SecurityPolicy::default(),
            economics: Economics::default(),
        }
    }

    pub fn with_security(mut self, security: SecurityPolicy) -> Self {
        self.security = security;
        self
    }

    pub fn with_economics(mut self, economics: Economics) -> Self {
        self.economics = economics;
        self
    }

    pub fn with_mode(mut self, mode: SizingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fail fast before any window is built
    pub fn validate(&self) -> ScheduleResult<()> {
        self.registry.validate()?;
        self.security.validate()?;
        self.economics.validate()
    }

    /// Label of the storage unit whose state of charge is carried
    pub fn storage_label(&self) -> Option<&str> {
        self.registry.storage().map(|s| s.label.as_str())
    }
}
