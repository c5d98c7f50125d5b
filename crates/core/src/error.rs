//! Common error handling utilities and conventions

use crate::storage::StorageError;

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Core error types shared with the gateway crate
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A persisted record exists but cannot be decoded
    #[error("Stored {key} record is corrupt: {message}")]
    CorruptRecord { key: &'static str, message: String },

    /// A record has the wrong shape for the requested operation
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CoreError {
    /// Create a serialization error
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a corrupt record error for the given storage key
    pub fn corrupt_record(key: &'static str, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            key,
            message: message.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}
