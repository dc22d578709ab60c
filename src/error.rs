//! Error kinds surfaced by the query layer and the entity facade

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by option resolution and entity operations.
#[derive(Debug, Error)]
pub enum EntityError {
    /// Caller input (search, sort, relations, payload) could not be understood
    #[error("{0}")]
    MalformedInput(String),

    /// The target record does not exist or has been soft-deleted
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The backing store failed; `message` is safe to show to callers
    #[error("{message}")]
    StoreFailure {
        operation: &'static str,
        message: String,
    },

    /// A schema descriptor is inconsistent (startup misconfiguration)
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl EntityError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EntityError::MalformedInput(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EntityError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP-style status code for the error envelope
    pub fn status_code(&self) -> u16 {
        match self {
            EntityError::MalformedInput(_) => 400,
            EntityError::NotFound { .. } => 404,
            EntityError::StoreFailure { .. } => 400,
            EntityError::InvalidSchema(_) => 500,
        }
    }

    /// Short machine-readable name of the error kind
    pub fn error_name(&self) -> &'static str {
        match self {
            EntityError::MalformedInput(_) => "MalformedInput",
            EntityError::NotFound { .. } => "NotFound",
            EntityError::StoreFailure { .. } => "StoreFailure",
            EntityError::InvalidSchema(_) => "InternalServerError",
        }
    }
}

/// Uniform error shape handed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    pub error_name: String,
    pub timestamp: String,
}

impl From<&EntityError> for ErrorEnvelope {
    fn from(err: &EntityError) -> Self {
        let message = match err {
            // never leak schema details
            EntityError::InvalidSchema(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            status_code: err.status_code(),
            message,
            error_name: err.error_name().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
