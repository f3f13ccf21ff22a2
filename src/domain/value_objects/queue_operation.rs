use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    Create,
    Update,
    UploadAsset,
    Delete,
}

impl QueueOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Create => "create",
            QueueOperation::Update => "update",
            QueueOperation::UploadAsset => "upload_asset",
            QueueOperation::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(QueueOperation::Create),
            "update" => Some(QueueOperation::Update),
            "upload_asset" => Some(QueueOperation::UploadAsset),
            "delete" => Some(QueueOperation::Delete),
            _ => None,
        }
    }

    /// Create and update entries are both satisfied by one field reconciliation.
    pub fn is_field_sync(&self) -> bool {
        matches!(self, QueueOperation::Create | QueueOperation::Update)
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
