use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow status of a diagnostic project. Variants are declared in forward order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Draft,
    InProgress,
    Validated,
    Exported,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::InProgress => "in_progress",
            RecordStatus::Validated => "validated",
            RecordStatus::Exported => "exported",
            RecordStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(RecordStatus::Draft),
            "in_progress" => Some(RecordStatus::InProgress),
            "validated" => Some(RecordStatus::Validated),
            "exported" => Some(RecordStatus::Exported),
            "archived" => Some(RecordStatus::Archived),
            _ => None,
        }
    }

    /// Forward-only: staying put or moving further along the workflow.
    pub fn can_advance_to(&self, next: RecordStatus) -> bool {
        next >= *self
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
