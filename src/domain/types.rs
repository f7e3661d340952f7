use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

use crate::error::{ScheduleError, ScheduleResult};

// ============================================================================
// Bus and component labels
// ============================================================================

/// AC bus all generators and the demand sink attach to
pub const AC_BUS: &str = "electricity";
/// DC bus shared by PV array and storage
pub const DC_BUS: &str = "electricity_dc";
pub const DEMAND_SINK: &str = "demand";
pub const EXCESS_SINK: &str = "excess";
pub const INVERTER: &str = "Inv_pv";

/// Hours per year, used to scale annual cost figures to a window
pub const HOURS_PER_YEAR: f64 = 8760.0;

// ============================================================================
// Capacity
// ============================================================================

/// Capacity of a storage unit or renewable source.
///
/// `Fixed` is a sized asset with a literal nominal value. `Investment` leaves the
/// capacity to the solver, which picks a non-negative value priced at
/// `cost_per_unit` (overnight capital cost per kWh or kWp).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Fixed(f64),
    Investment { cost_per_unit: f64 },
}

impl Capacity {
    /// Build from the two raw configuration options; exactly one must be set.
    pub fn from_options(fixed: Option<f64>, investment: Option<f64>) -> ScheduleResult<Self> {
        match (fixed, investment) {
            (Some(value), None) => {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ScheduleError::config(format!(
                        "fixed capacity must be positive and finite, got {}",
                        value
                    )));
                }
                Ok(Capacity::Fixed(value))
            }
            (None, Some(cost_per_unit)) => {
                if !cost_per_unit.is_finite() || cost_per_unit < 0.0 {
                    return Err(ScheduleError::config(format!(
                        "investment cost must be non-negative and finite, got {}",
                        cost_per_unit
                    )));
                }
                Ok(Capacity::Investment { cost_per_unit })
            }
            (Some(_), Some(_)) => Err(ScheduleError::config(
                "both a fixed capacity and an investment were given; choose one",
            )),
            (None, None) => Err(ScheduleError::config(
                "neither a fixed capacity nor an investment was given",
            )),
        }
    }

    pub fn fixed(&self) -> Option<f64> {
        match self {
            Capacity::Fixed(value) => Some(*value),
            Capacity::Investment { .. } => None,
        }
    }

    pub fn is_investment(&self) -> bool {
        matches!(self, Capacity::Investment { .. })
    }
}

// ============================================================================
// Sizing mode
// ============================================================================

/// Whether storage and PV are sized assets or investment decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SizingMode {
    Simulation,
    Investment,
}

impl SizingMode {
    pub fn parse(s: &str) -> ScheduleResult<Self> {
        s.trim().parse().map_err(|_| {
            ScheduleError::config(format!(
                "unknown mode '{}': expected 'simulation' or 'investment'",
                s
            ))
        })
    }
}

// ============================================================================
// Cost attributes
// ============================================================================

/// Annual cost assumptions of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetCosts {
    /// Overnight capital cost per kW / kWh
    pub capex_per_unit: f64,
    pub lifetime_years: u32,
    /// Fixed O&M per kW / kWh and year
    pub fixed_per_unit_year: f64,
    /// Cost per kWh of output
    pub variable_per_kwh: f64,
}

impl Default for AssetCosts {
    fn default() -> Self {
        Self {
            capex_per_unit: 0.0,
            lifetime_years: 20,
            fixed_per_unit_year: 0.0,
            variable_per_kwh: 0.0,
        }
    }
}

impl AssetCosts {
    pub fn validate(&self, label: &str) -> ScheduleResult<()> {
        let values = [
            ("capex_per_unit", self.capex_per_unit),
            ("fixed_per_unit_year", self.fixed_per_unit_year),
            ("variable_per_kwh", self.variable_per_kwh),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(ScheduleError::config(format!(
                    "{}: {} must be non-negative and finite, got {}",
                    label, name, value
                )));
            }
        }
        if self.lifetime_years == 0 {
            return Err(ScheduleError::config(format!(
                "{}: lifetime_years must be at least 1",
                label
            )));
        }
        Ok(())
    }
}

/// Flow key display helper: `'label'` or `None`
pub(crate) struct PyLabel<'a>(pub Option<&'a str>);

impl fmt::Display for PyLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(label) => write!(f, "'{}'", label),
            None => write!(f, "None"),
        }
    }
}
