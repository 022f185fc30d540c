//! Error types for the docs adapter.

use rmcp::model::ErrorCode;
use thiserror::Error;

/// Main error type for the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Request failed contract validation; upstream is never contacted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors (missing upstream credential)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Named tool absent from the upstream's advertised tool list.
    #[error("Upstream tool '{0}' not found")]
    CapabilityMissing(String),

    /// Connect, invoke, or close failure against the upstream.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl AdapterError {
    /// JSON-RPC error code this error surfaces as: validation failures are
    /// client-side rejections, everything else is an opaque server failure.
    #[must_use]
    pub fn jsonrpc_code(&self) -> ErrorCode {
        match self {
            AdapterError::InvalidInput(_) => ErrorCode::INVALID_PARAMS,
            AdapterError::Config(_)
            | AdapterError::CapabilityMissing(_)
            | AdapterError::Upstream(_) => ErrorCode::INTERNAL_ERROR,
        }
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
