//! Error types for the teller agent
//!
//! The conversation core never fails a turn; these errors belong to the
//! layers around it (session store, configuration, reference data, HTTP).

use thiserror::Error;

/// Result type alias for teller agent operations
pub type Result<T> = std::result::Result<T, TellerError>;

#[derive(Error, Debug)]
pub enum TellerError {

    // =============================
    // Service Errors
    // =============================

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded. Please try again later")]
    RateLimited,

    #[error("Outgoing response failed security validation")]
    ResponseRejected,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Reference data error: {0}")]
    ReferenceDataError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
