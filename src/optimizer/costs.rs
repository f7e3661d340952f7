//! Annuitized capital cost and window-scaled cost attributes

use serde::{Deserialize, Serialize};

use crate::domain::{AssetCosts, Capacity, GeneratingUnit, RenewableSource, StorageUnit, HOURS_PER_YEAR};
use crate::error::{ScheduleError, ScheduleResult};

/// Equivalent periodic cost of a capital expense over `lifetime_years` at `wacc`.
///
/// Falls back to straight-line depreciation when `wacc` is zero.
pub fn annuity(capex: f64, lifetime_years: u32, wacc: f64) -> f64 {
    let n = f64::from(lifetime_years.max(1));
    if wacc.abs() < f64::EPSILON {
        return capex / n;
    }
    let growth = (1.0 + wacc).powf(n);
    capex * wacc * growth / (growth - 1.0)
}

/// Scenario-wide economic assumptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    /// Weighted average cost of capital
    pub wacc: f64,
}

impl Default for Economics {
    fn default() -> Self {
        Self { wacc: 0.094 }
    }
}

impl Economics {
    pub fn validate(&self) -> ScheduleResult<()> {
        if !self.wacc.is_finite() || self.wacc < 0.0 {
            return Err(ScheduleError::config(format!(
                "wacc must be non-negative, got {}",
                self.wacc
            )));
        }
        Ok(())
    }
}

/// Cost attributes scaled to the length of one solve window.
///
/// Annual figures are multiplied by `hours / 8760` before annuitizing, so a
/// window of `PH` hours carries `PH / 8760` of a year's capital and fixed cost.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    economics: Economics,
    hours: f64,
}

impl CostModel {
    pub fn new(economics: Economics, window_hours: usize) -> Self {
        Self {
            economics,
            hours: window_hours as f64,
        }
    }

    fn scale(&self) -> f64 {
        self.hours / HOURS_PER_YEAR
    }

    /// Annuitized capital cost per unit of capacity for this window
    pub fn equivalent_periodic_cost(&self, capex_per_unit: f64, lifetime_years: u32) -> f64 {
        annuity(capex_per_unit * self.scale(), lifetime_years, self.economics.wacc)
    }

    /// Fixed O&M per unit of capacity for this window
    pub fn fixed_om(&self, costs: &AssetCosts) -> f64 {
        costs.fixed_per_unit_year * self.scale()
    }

    /// Capital plus fixed O&M per unit of capacity. Investment assets are
    /// priced at their `cost_per_unit`; sized assets at their configured capex.
    pub fn capacity_cost(&self, capacity: &Capacity, costs: &AssetCosts) -> f64 {
        let capex = match capacity {
            Capacity::Fixed(_) => costs.capex_per_unit,
            Capacity::Investment { cost_per_unit } => *cost_per_unit,
        };
        self.equivalent_periodic_cost(capex, costs.lifetime_years) + self.fixed_om(costs)
    }

    /// Constant window cost of a generating unit, `fix × nominal`
    pub fn generator_fixed(&self, unit: &GeneratingUnit) -> f64 {
        (self.equivalent_periodic_cost(unit.costs.capex_per_unit, unit.costs.lifetime_years)
            + self.fixed_om(&unit.costs))
            * unit.nominal_capacity_kw
    }

    pub fn storage_capacity_cost(&self, storage: &StorageUnit) -> f64 {
        self.capacity_cost(&storage.capacity, &storage.costs)
    }

    pub fn renewable_capacity_cost(&self, source: &RenewableSource) -> f64 {
        self.capacity_cost(&source.capacity, &source.costs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000.0, 10, 0.0, 100.0)]
    #[case(1000.0, 1, 0.1, 1100.0)]
    fn test_annuity(#[case] capex: f64, #[case] years: u32, #[case] wacc: f64, #[case] expected: f64) {
        assert!((annuity(capex, years, wacc) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_annuity_matches_closed_form() {
        let a = annuity(500.0, 20, 0.094);
        let growth = 1.094_f64.powi(20);
        assert!((a - 500.0 * 0.094 * growth / (growth - 1.0)).abs() < 1e-9);
        assert!(a > 500.0 / 20.0);
    }

    #[test]
    fn test_window_scaling() {
        let model = CostModel::new(Economics::default(), 24);
        let costs = AssetCosts {
            capex_per_unit: 300.0,
            lifetime_years: 10,
            fixed_per_unit_year: 3.88,
            variable_per_kwh: 0.087,
        };
        let expected = annuity(300.0 * 24.0 / 8760.0, 10, 0.094) + 3.88 * 24.0 / 8760.0;
        assert!((model.capacity_cost(&Capacity::Fixed(300.0), &costs) - expected).abs() < 1e-12);

        let invest = Capacity::Investment { cost_per_unit: 600.0 };
        let expected = annuity(600.0 * 24.0 / 8760.0, 10, 0.094) + 3.88 * 24.0 / 8760.0;
        assert!((model.capacity_cost(&invest, &costs) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_generator_fixed_cost_scales_with_nominal() {
        let model = CostModel::new(Economics::default(), 24);
        let unit = GeneratingUnit::new("pp_oil_1", 186.0, 0.3, 1.0)
            .unwrap()
            .with_costs(
                AssetCosts {
                    capex_per_unit: 500.0,
                    lifetime_years: 20,
                    fixed_per_unit_year: 0.0,
                    variable_per_kwh: 1.2,
                },
                0.02,
            )
            .unwrap();
        let per_kw = annuity(500.0 * 24.0 / 8760.0, 20, 0.094);
        assert!((model.generator_fixed(&unit) - per_kw * 186.0).abs() < 1e-9);
    }
}
