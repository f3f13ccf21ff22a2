use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single answer plus the device timestamp (unix millis) of its last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Value,
    pub updated_at: i64,
}

impl FieldValue {
    pub fn new(value: Value, updated_at: i64) -> Self {
        Self { value, updated_at }
    }

    pub fn is_newer_than(&self, other: &FieldValue) -> bool {
        self.updated_at > other.updated_at
    }
}
