use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::field_value::FieldValue;

/// step key -> field map. Keys are opaque to the engine.
pub type StepDataMap = BTreeMap<String, StepData>;

/// field key -> timestamped value for one wizard step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepData(BTreeMap<String, FieldValue>);

impl StepData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(field.into(), value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw values with timestamps stripped; `null`/`false`/`0` are kept as-is.
    pub fn values(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(field, fv)| (field.clone(), fv.value.clone()))
            .collect()
    }

    pub fn latest_update(&self) -> Option<i64> {
        self.0.values().map(|fv| fv.updated_at).max()
    }
}

impl FromIterator<(String, FieldValue)> for StepData {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for StepData {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Number of individual fields across all steps.
pub fn field_count(steps: &StepDataMap) -> usize {
    steps.values().map(StepData::len).sum()
}
