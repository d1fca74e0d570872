//! Unified error type for the semantic layer.
//!
//! Every failure that can reach the query-serving boundary is a
//! [`SemanticLayerError`]. Module-level errors (`SafeExpressionError`,
//! `SettingsError`, `LoadError`, `ConnectionError`, `EngineError`) convert into it.

use serde::Serialize;

use crate::config::connection::ConnectionError;
use crate::config::settings::SettingsError;
use crate::engine::EngineError;
use crate::expression::SafeExpressionError;
use crate::model::LoadError;

/// Result type for semantic layer operations.
pub type SemanticResult<T> = Result<T, SemanticLayerError>;

/// Base error for the semantic layer.
///
/// Variants hold owned strings so the error can be cloned and shared
/// between callers coalesced onto one in-flight query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticLayerError {
    /// Malformed or incomplete model document or settings file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The data store could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Metric '{name}' not found. Available metrics: {}", available.join(", "))]
    MetricNotFound { name: String, available: Vec<String> },

    #[error("Dimension '{name}' not found. Available dimensions: {}", available.join(", "))]
    DimensionNotFound { name: String, available: Vec<String> },

    /// The compiled plan could not be built or failed during execution.
    #[error("Query error: {0}")]
    Query(String),

    /// Request-shape validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    SafeExpression(#[from] SafeExpressionError),
}

impl SemanticLayerError {
    /// Stable name of the error kind, used in structured payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SemanticLayerError::Configuration(_) => "ConfigurationError",
            SemanticLayerError::Connection(_) => "ConnectionError",
            SemanticLayerError::MetricNotFound { .. } => "MetricNotFoundError",
            SemanticLayerError::DimensionNotFound { .. } => "DimensionNotFoundError",
            SemanticLayerError::Query(_) => "QueryError",
            SemanticLayerError::Validation(_) => "ValidationError",
            SemanticLayerError::SafeExpression(_) => "SafeExpressionError",
        }
    }

    /// Build the `{error, message, request}` payload handed to callers.
    pub fn to_payload(&self, request: serde_json::Value) -> ErrorPayload {
        ErrorPayload {
            error: self.kind().to_string(),
            message: self.to_string(),
            request,
        }
    }
}

impl From<SettingsError> for SemanticLayerError {
    fn from(e: SettingsError) -> Self {
        SemanticLayerError::Configuration(e.to_string())
    }
}

impl From<LoadError> for SemanticLayerError {
    fn from(e: LoadError) -> Self {
        SemanticLayerError::Configuration(e.to_string())
    }
}

impl From<ConnectionError> for SemanticLayerError {
    fn from(e: ConnectionError) -> Self {
        SemanticLayerError::Connection(e.to_string())
    }
}

impl From<EngineError> for SemanticLayerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Open { .. } => SemanticLayerError::Connection(e.to_string()),
            other => SemanticLayerError::Query(other.to_string()),
        }
    }
}

/// Structured failure returned at the service boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
    pub request: serde_json::Value,
}
