use std::fmt;

use crate::application::ports::remote_store::{FailureKind, RemoteError};

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Storage(String),
    Network(String),
    RemoteValidation(String),
    NotFound(String),
    InvalidInput(String),
    ValidationError(String),
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl fmt::Display) -> Self {
        AppError::NotFound(format!("{kind} {id}"))
    }

    /// Local persistence failures are fatal to the attempted operation.
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Storage(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::RemoteValidation(_) => "REMOTE_VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Storage(_) => {
                "Local data could not be saved on this device".to_string()
            }
            AppError::Network(_) => {
                "The server is unreachable; changes are kept on this device".to_string()
            }
            AppError::RemoteValidation(msg) => format!("The server rejected this project: {msg}"),
            AppError::NotFound(msg) => format!("Not found: {msg}"),
            AppError::InvalidInput(msg) | AppError::ValidationError(msg) => msg.clone(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::RemoteValidation(msg) => write!(f, "Remote validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AppError::DeserializationError(err.to_string())
        } else {
            AppError::SerializationError(err.to_string())
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(id) => AppError::NotFound(format!("remote record {id}")),
            other => match other.failure_kind() {
                FailureKind::Validation => AppError::RemoteValidation(other.to_string()),
                FailureKind::Transient => AppError::Network(other.to_string()),
            },
        }
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_map_to_their_class() {
        let err: AppError = RemoteError::Timeout(30_000).into();
        assert!(matches!(err, AppError::Network(_)));

        let err: AppError = RemoteError::Validation("missing surface".into()).into();
        assert!(matches!(err, AppError::RemoteValidation(_)));
        assert_eq!(err.code(), "REMOTE_VALIDATION_ERROR");

        let err: AppError = RemoteError::NotFound("p-1".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn storage_class_covers_database_and_capacity() {
        assert!(AppError::Database("locked".into()).is_storage());
        assert!(AppError::Storage("too large".into()).is_storage());
        assert!(!AppError::Network("down".into()).is_storage());
    }
}
