//! Error types for Metagate.
//!
//! Defines the main error enum used throughout the gateway.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum MetagateError {
    /// Configuration errors (missing required keys, unknown driver, bad URL).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure to check a session out of the pool (exhausted, network, auth).
    #[error("Connection acquisition error: {0}")]
    ConnectionAcquisition(String),

    /// A statement failed during execution (syntax error, missing object,
    /// constraint violation). Aborts the remainder of the batch.
    #[error("Statement execution error: {0}")]
    StatementExecution(String),

    /// Bind parameters do not line up with the statement placeholders, or
    /// the batch parameter list is shorter than the statement count.
    #[error("Parameter binding error: {0}")]
    ParameterBinding(String),
}

impl MetagateError {
    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection acquisition error with the given message.
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::ConnectionAcquisition(msg.into())
    }

    /// Creates a statement execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::StatementExecution(msg.into())
    }

    /// Creates a parameter binding error with the given message.
    pub fn binding(msg: impl Into<String>) -> Self {
        Self::ParameterBinding(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration Error",
            Self::ConnectionAcquisition(_) => "Connection Acquisition Error",
            Self::StatementExecution(_) => "Statement Execution Error",
            Self::ParameterBinding(_) => "Parameter Binding Error",
        }
    }

    /// Returns true if retrying the call could succeed without a config
    /// change (acquisition failures are the only retryable kind).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionAcquisition(_))
    }
}

/// Result type alias using MetagateError.
pub type Result<T> = std::result::Result<T, MetagateError>;
