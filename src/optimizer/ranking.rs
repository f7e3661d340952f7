//! Commitment priority order over generating units

use itertools::Itertools;

use crate::domain::GeneratingUnit;
use crate::error::{ScheduleError, ScheduleResult};

/// Sort units ascending by maximum deliverable power (`nominal × max_load`).
///
/// Ties keep insertion order. Nothing is cached; every constraint builder calls
/// this on the registry it is handed, so all families see the same order for
/// the same registry.
pub fn rank_units(units: &[GeneratingUnit]) -> ScheduleResult<Vec<&GeneratingUnit>> {
    if units.is_empty() {
        return Err(ScheduleError::config(
            "cannot rank an empty list of generating units",
        ));
    }
    Ok(units
        .iter()
        .sorted_by(|a, b| a.max_output_kw().total_cmp(&b.max_output_kw()))
        .collect())
}

/// Labels of the ranked units, lowest first
pub fn ranked_labels(units: &[GeneratingUnit]) -> ScheduleResult<Vec<&str>> {
    Ok(rank_units(units)?
        .into_iter()
        .map(|unit| unit.label.as_str())
        .collect())
}
