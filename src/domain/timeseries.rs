use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ScheduleError, ScheduleResult};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Demand forecast and normalized PV infeed on a shared hourly index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    index: Vec<NaiveDateTime>,
    demand_el: Vec<f64>,
    pv: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesRow {
    timestamp: String,
    demand_el: f64,
    #[serde(rename = "PV")]
    pv: f64,
}

impl TimeSeries {
    /// PV values above 1.0 are clamped to 1.0.
    pub fn new(index: Vec<NaiveDateTime>, demand_el: Vec<f64>, pv: Vec<f64>) -> ScheduleResult<Self> {
        if index.len() != demand_el.len() || index.len() != pv.len() {
            return Err(ScheduleError::Input(format!(
                "column lengths differ: index {}, demand_el {}, PV {}",
                index.len(),
                demand_el.len(),
                pv.len()
            )));
        }
        if let Some((t, d)) = demand_el
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d < 0.0)
        {
            return Err(ScheduleError::Input(format!(
                "demand_el at step {} must be finite and non-negative, got {}",
                t, d
            )));
        }
        if let Some((t, p)) = pv.iter().enumerate().find(|(_, p)| !p.is_finite() || **p < 0.0) {
            return Err(ScheduleError::Input(format!(
                "PV at step {} must be finite and non-negative, got {}",
                t, p
            )));
        }

        let clamped = pv.iter().filter(|p| **p > 1.0).count();
        if clamped > 0 {
            debug!(clamped, "clamping PV infeed above 1.0");
        }
        let pv = pv.into_iter().map(|p| p.min(1.0)).collect();

        Ok(Self { index, demand_el, pv })
    }

    /// Hourly index starting at `start`
    pub fn hourly(start: NaiveDateTime, demand_el: Vec<f64>, pv: Vec<f64>) -> ScheduleResult<Self> {
        let index = (0..demand_el.len())
            .map(|h| start + Duration::hours(h as i64))
            .collect();
        Self::new(index, demand_el, pv)
    }

    /// Load a `timestamp, demand_el, PV` table. Extra columns are ignored.
    pub fn from_csv_path(path: impl AsRef<Path>, delimiter: u8) -> ScheduleResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut index = Vec::new();
        let mut demand = Vec::new();
        let mut pv = Vec::new();
        for (line, row) in reader.deserialize::<TimeSeriesRow>().enumerate() {
            let row = row?;
            index.push(parse_timestamp(&row.timestamp).ok_or_else(|| {
                ScheduleError::Input(format!(
                    "{}: unparseable timestamp '{}' in row {}",
                    path.display(),
                    row.timestamp,
                    line + 1
                ))
            })?);
            demand.push(row.demand_el);
            pv.push(row.pv);
        }
        if index.is_empty() {
            warn!(path = %path.display(), "time series file holds no rows");
        }
        Self::new(index, demand, pv)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn demand(&self) -> &[f64] {
        &self.demand_el
    }

    pub fn pv(&self) -> &[f64] {
        &self.pv
    }

    /// Rows `[start, end)`, clipped to the series length
    pub fn slice(&self, start: usize, end: usize) -> TimeSeries {
        let end = end.min(self.len());
        let start = start.min(end);
        TimeSeries {
            index: self.index[start..end].to_vec(),
            demand_el: self.demand_el[start..end].to_vec(),
            pv: self.pv[start..end].to_vec(),
        }
    }

    /// Leading `steps` rows
    pub fn truncate(&self, steps: usize) -> TimeSeries {
        self.slice(0, steps)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Time-varying requirement, one non-negative value per window timestep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitSeries(Vec<f64>);

impl LimitSeries {
    pub fn new(values: Vec<f64>) -> ScheduleResult<Self> {
        if let Some((t, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(ScheduleError::config(format!(
                "limit at step {} must be finite and non-negative, got {}",
                t, v
            )));
        }
        Ok(Self(values))
    }

    /// `demand[t] * fraction` for every step
    pub fn from_demand(demand: &[f64], fraction: f64) -> ScheduleResult<Self> {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(ScheduleError::config(format!(
                "limit fraction must be non-negative, got {}",
                fraction
            )));
        }
        Self::new(demand.iter().map(|d| d * fraction).collect())
    }

    pub fn constant(value: f64, steps: usize) -> ScheduleResult<Self> {
        Self::new(vec![value; steps])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn at(&self, t: usize) -> f64 {
        self.0[t]
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Reject a series that does not cover exactly `steps` timesteps
    pub fn ensure_len(&self, steps: usize, family: &str) -> ScheduleResult<()> {
        if self.len() != steps {
            return Err(ScheduleError::config(format!(
                "{} limit covers {} steps but the window has {}",
                family,
                self.len(),
                steps
            )));
        }
        Ok(())
    }
}
