use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumString};

use super::types::PyLabel;

/// `(source, destination)` pair a result belongs to. Component-internal
/// quantities (storage state of charge) have no destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub source: String,
    pub target: Option<String>,
}

impl FlowKey {
    pub fn new(source: &str, target: Option<&str>) -> Self {
        Self {
            source: source.to_string(),
            target: target.map(str::to_string),
        }
    }

    /// Address `variable` on this flow
    pub fn result(self, variable: VariableName) -> ResultKey {
        ResultKey {
            flow: self,
            variable,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            PyLabel(Some(self.source.as_str())),
            PyLabel(self.target.as_deref())
        )
    }
}

/// Name of a solution variable
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VariableName {
    Flow,
    Status,
    Capacity,
    Invest,
}

/// `((source, destination), variable)` result address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub flow: FlowKey,
    pub variable: VariableName,
}

impl ResultKey {
    pub fn new(source: &str, target: Option<&str>, variable: VariableName) -> Self {
        Self {
            flow: FlowKey::new(source, target),
            variable,
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, '{}')", self.flow, self.variable)
    }
}

/// Per-variable solution values of one window (or a stitched run).
///
/// Sequences hold one value per timestep; scalars hold investment results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionTrace {
    steps: usize,
    sequences: BTreeMap<ResultKey, Vec<f64>>,
    scalars: BTreeMap<ResultKey, f64>,
}

impl SolutionTrace {
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn insert_sequence(&mut self, key: ResultKey, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.steps, "sequence length mismatch for {}", key);
        self.sequences.insert(key, values);
    }

    pub fn insert_scalar(&mut self, key: ResultKey, value: f64) {
        self.scalars.insert(key, value);
    }

    pub fn sequence(&self, key: &ResultKey) -> Option<&[f64]> {
        self.sequences.get(key).map(Vec::as_slice)
    }

    pub fn scalar(&self, key: &ResultKey) -> Option<f64> {
        self.scalars.get(key).copied()
    }

    /// Look up a sequence by its tuple address
    pub fn get(&self, source: &str, target: Option<&str>, variable: VariableName) -> Option<&[f64]> {
        self.sequence(&ResultKey::new(source, target, variable))
    }

    pub fn value_at(&self, key: &ResultKey, step: usize) -> Option<f64> {
        self.sequence(key).and_then(|values| values.get(step).copied())
    }

    pub fn sequence_keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.sequences.keys()
    }

    pub fn scalars(&self) -> &BTreeMap<ResultKey, f64> {
        &self.scalars
    }

    /// First `steps` timesteps of every sequence; scalars are kept
    pub fn head(&self, steps: usize) -> SolutionTrace {
        let steps = steps.min(self.steps);
        SolutionTrace {
            steps,
            sequences: self
                .sequences
                .iter()
                .map(|(k, v)| (k.clone(), v[..steps].to_vec()))
                .collect(),
            scalars: self.scalars.clone(),
        }
    }

    /// Append another trace in time. Keys missing on one side are padded
    /// with NaN so every sequence keeps the stitched length.
    pub fn append(&mut self, other: &SolutionTrace) {
        let before = self.steps;
        for (key, values) in &other.sequences {
            let entry = self
                .sequences
                .entry(key.clone())
                .or_insert_with(|| vec![f64::NAN; before]);
            entry.extend_from_slice(values);
        }
        self.steps += other.steps;
        for values in self.sequences.values_mut() {
            values.resize(self.steps, f64::NAN);
        }
        for (key, value) in &other.scalars {
            self.scalars.insert(key.clone(), *value);
        }
    }
}

/// Continuous operational trace assembled from committed window portions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub index: Vec<NaiveDateTime>,
    pub trace: SolutionTrace,
}

impl Schedule {
    pub fn len(&self) -> usize {
        self.trace.steps()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, index: &[NaiveDateTime], committed: &SolutionTrace) {
        self.index.extend_from_slice(&index[..committed.steps().min(index.len())]);
        self.trace.append(committed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(steps: usize, offset: f64) -> SolutionTrace {
        let mut trace = SolutionTrace::new(steps);
        trace.insert_sequence(
            ResultKey::new("storage", None, VariableName::Capacity),
            (0..steps).map(|t| offset + t as f64).collect(),
        );
        trace
    }

    #[test]
    fn test_result_key_display() {
        let key = ResultKey::new("storage", None, VariableName::Capacity);
        assert_eq!(key.to_string(), "(('storage', None), 'capacity')");
        let key = ResultKey::new("pp_oil_1", Some("electricity"), VariableName::Flow);
        assert_eq!(key.to_string(), "(('pp_oil_1', 'electricity'), 'flow')");
    }

    #[test]
    fn test_head_and_append_stitch() {
        let mut stitched = SolutionTrace::default();
        stitched.append(&trace(5, 0.0).head(3));
        stitched.append(&trace(5, 100.0).head(3));

        assert_eq!(stitched.steps(), 6);
        assert_eq!(
            stitched.get("storage", None, VariableName::Capacity).unwrap(),
            &[0.0, 1.0, 2.0, 100.0, 101.0, 102.0]
        );
    }

    #[test]
    fn test_append_pads_missing_keys() {
        let mut stitched = trace(2, 0.0);
        let mut other = SolutionTrace::new(2);
        other.insert_sequence(
            ResultKey::new("pp_oil_1", Some("electricity"), VariableName::Flow),
            vec![1.0, 2.0],
        );
        stitched.append(&other);

        let flow = stitched.get("pp_oil_1", Some("electricity"), VariableName::Flow).unwrap();
        assert!(flow[0].is_nan() && flow[1].is_nan());
        assert_eq!(&flow[2..], &[1.0, 2.0]);
        let soc = stitched.get("storage", None, VariableName::Capacity).unwrap();
        assert_eq!(soc.len(), 4);
        assert!(soc[3].is_nan());
    }
}
