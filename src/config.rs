use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;
use strum::{Display, EnumString};

use crate::controller::HorizonPlan;
use crate::domain::{
    AssetCosts, GeneratingUnit, RenewableSource, SizingMode, StorageParams, StorageUnit, UnitRegistry,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::optimizer::{Economics, SecurityPolicy, SolverSettings};
use crate::scenario::Scenario;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub horizon: HorizonConfig,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub security: SecurityPolicy,
    #[serde(default)]
    pub economics: Economics,
    #[serde(default)]
    pub generators: Vec<GeneratorConfig>,
    pub storage: Option<StorageConfig>,
    pub pv: Option<PvConfig>,
    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStrategy {
    /// One window over the whole simulation horizon
    Single,
    Rolling,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    /// `simulation` or `investment`
    pub mode: String,
    pub strategy: RunStrategy,
    pub timeseries_path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Storage SOC fraction at the start of the first window
    #[serde(default = "default_initial_soc")]
    pub initial_soc: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HorizonConfig {
    pub simulation: usize,
    pub prediction: usize,
    pub control: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub label: String,
    pub nominal_capacity_kw: f64,
    #[serde(default = "default_min_load")]
    pub min_load: f64,
    #[serde(default = "default_max_load")]
    pub max_load: f64,
    #[serde(default = "default_generator_variable_cost")]
    pub variable_cost: f64,
    #[serde(default = "default_generator_om")]
    pub om_cost: f64,
    #[serde(default = "default_generator_capex")]
    pub capex_per_kw: f64,
    #[serde(default = "default_generator_lifetime")]
    pub lifetime_years: u32,
    #[serde(default)]
    pub fixed_om_per_kw_year: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_label")]
    pub label: String,
    /// Sized capacity used in simulation mode
    pub nominal_capacity_kwh: Option<f64>,
    #[serde(default = "default_storage_capex")]
    pub capex_per_kwh: f64,
    #[serde(default = "default_storage_lifetime")]
    pub lifetime_years: u32,
    #[serde(default = "default_storage_fixed_om")]
    pub fixed_om_per_kwh_year: f64,
    #[serde(default = "default_storage_variable_cost")]
    pub variable_cost: f64,
    #[serde(default)]
    pub params: StorageParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PvConfig {
    #[serde(default = "default_pv_label")]
    pub label: String,
    /// Sized capacity used in simulation mode
    pub nominal_capacity_kw: Option<f64>,
    #[serde(default = "default_pv_capex")]
    pub capex_per_kw: f64,
    #[serde(default = "default_generator_lifetime")]
    pub lifetime_years: u32,
    #[serde(default = "default_pv_fixed_om")]
    pub fixed_om_per_kw_year: f64,
    #[serde(default)]
    pub variable_cost: f64,
}

fn default_inverter_efficiency() -> f64 { 1.0 }
fn default_delimiter() -> String { ";".to_string() }
fn default_initial_soc() -> f64 { 0.5 }
fn default_min_load() -> f64 { 0.3 }
fn default_max_load() -> f64 { 1.0 }
fn default_generator_variable_cost() -> f64 { 1.2 }
fn default_generator_om() -> f64 { 0.02 }
fn default_generator_capex() -> f64 { 500.0 }
fn default_generator_lifetime() -> u32 { 20 }
fn default_storage_label() -> String { "storage".to_string() }
fn default_storage_capex() -> f64 { 300.0 }
fn default_storage_lifetime() -> u32 { 10 }
fn default_storage_fixed_om() -> f64 { 3.88 }
fn default_storage_variable_cost() -> f64 { 0.087 }
fn default_pv_label() -> String { "pv".to_string() }
fn default_pv_capex() -> f64 { 2500.0 }
fn default_pv_fixed_om() -> f64 { 25.0 }

impl Config {
    /// `config/default.toml` (or the file named by `MGS_CONFIG`) overlaid
    /// with `MGS__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var("MGS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("MGS__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        self.mode()?;
        self.plan()?;
        self.delimiter()?;
        self.solver.validate()?;
        self.security.validate()?;
        self.economics.validate()?;
        if !(0.0..=1.0).contains(&self.run.initial_soc) {
            return Err(ScheduleError::config(format!(
                "run.initial_soc must lie in [0, 1], got {}",
                self.run.initial_soc
            )));
        }
        if self.generators.is_empty() {
            return Err(ScheduleError::config("no [[generators]] configured"));
        }
        Ok(())
    }

    pub fn mode(&self) -> ScheduleResult<SizingMode> {
        SizingMode::parse(&self.run.mode)
    }

    pub fn plan(&self) -> ScheduleResult<HorizonPlan> {
        HorizonPlan::new(
            self.horizon.simulation,
            self.horizon.prediction,
            self.horizon.control,
        )
    }

    pub fn delimiter(&self) -> ScheduleResult<u8> {
        match self.run.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ScheduleError::config(format!(
                "run.delimiter must be a single byte, got '{}'",
                self.run.delimiter
            ))),
        }
    }

    /// Build the scenario: sized assets in simulation mode, investment
    /// decisions in investment mode.
    pub fn scenario(&self) -> ScheduleResult<Scenario> {
        let mode = self.mode()?;
        let mut registry = UnitRegistry::new();

        for g in &self.generators {
            let unit = GeneratingUnit::new(&g.label, g.nominal_capacity_kw, g.min_load, g.max_load)?
                .with_costs(
                    AssetCosts {
                        capex_per_unit: g.capex_per_kw,
                        lifetime_years: g.lifetime_years,
                        fixed_per_unit_year: g.fixed_om_per_kw_year,
                        variable_per_kwh: g.variable_cost,
                    },
                    g.om_cost,
                )?;
            registry.add_generator(unit)?;
        }

        if let Some(s) = &self.storage {
            let (fixed, investment) = sizing_options(mode, s.nominal_capacity_kwh, s.capex_per_kwh);
            let costs = AssetCosts {
                capex_per_unit: s.capex_per_kwh,
                lifetime_years: s.lifetime_years,
                fixed_per_unit_year: s.fixed_om_per_kwh_year,
                variable_per_kwh: s.variable_cost,
            };
            registry.set_storage(StorageUnit::new(&s.label, fixed, investment, s.params, costs)?)?;
        }

        if let Some(p) = &self.pv {
            let (fixed, investment) = sizing_options(mode, p.nominal_capacity_kw, p.capex_per_kw);
            let costs = AssetCosts {
                capex_per_unit: p.capex_per_kw,
                lifetime_years: p.lifetime_years,
                fixed_per_unit_year: p.fixed_om_per_kw_year,
                variable_per_kwh: p.variable_cost,
            };
            registry.set_renewable(RenewableSource::new(&p.label, fixed, investment, costs)?)?;
        }

        registry.set_inverter_efficiency(self.inverter_efficiency)?;

        let scenario = Scenario::new(&self.run.name, registry)
            .with_mode(mode)
            .with_security(self.security.clone())
            .with_economics(self.economics);
        scenario.validate()?;
        Ok(scenario)
    }
}

fn sizing_options(mode: SizingMode, nominal: Option<f64>, capex: f64) -> (Option<f64>, Option<f64>) {
    match mode {
        SizingMode::Simulation => (nominal, None),
        SizingMode::Investment => (None, Some(capex)),
    }
}
