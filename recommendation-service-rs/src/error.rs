//! Error handling for the recommendation service
//!
//! This module provides the error system shared by the outbound caller, the
//! circuit breakers and the pipeline:
//! - Categorizes upstream call failures by kind (timeout, upstream, transport)
//! - Carries the breaker state on fast-fail rejections
//! - Maps `reqwest` errors to normalized variants
//! - Provides a convenient Result type alias

use thiserror::Error;

use crate::circuit_breaker::CircuitState;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the recommendation service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The call did not produce a result before its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The upstream answered with a non-2xx status
    #[error("Upstream error: status {status}")]
    Upstream { status: u16 },

    /// Connection, DNS or socket level errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// The circuit breaker refused to admit the call
    #[error("Circuit breaker rejected call while {state}")]
    RejectedOpen { state: CircuitState },

    /// Response body could not be decoded
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Bootstrap or environment errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create an upstream error carrying the HTTP status
    pub fn upstream(status: u16) -> Self {
        ServiceError::Upstream { status }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::Transport(message.into())
    }

    /// Create a rejection error carrying the breaker state
    pub fn rejected_open(state: CircuitState) -> Self {
        ServiceError::RejectedOpen { state }
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Check if this error is a breaker rejection rather than a call outcome
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::RejectedOpen { .. })
    }
}

/// Convert reqwest errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::transport(format!("Connection error: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else if let Some(status) = err.status() {
            ServiceError::upstream(status.as_u16())
        } else {
            ServiceError::transport(format!("HTTP client error: {}", err))
        }
    }
}
