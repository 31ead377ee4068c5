// --- File: crates/civic_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type shared by all civic alerts crates.
///
/// Crate-specific errors (`DbError`, `PushError`) convert into this type so the
/// orchestration layer and the HTTP surface deal with a single taxonomy.
#[derive(Error, Debug)]
pub enum CivicError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CivicError {
    /// Whether the failure is worth retrying on a later run.
    ///
    /// Provider and network failures are transient; validation and
    /// configuration failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CivicError::HttpError(_)
                | CivicError::ExternalServiceError { .. }
                | CivicError::TimeoutError(_)
                | CivicError::DatabaseError(_)
        )
    }
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for CivicError {
    fn status_code(&self) -> u16 {
        match self {
            CivicError::HttpError(_) => 500,
            CivicError::ParseError(_) => 400,
            CivicError::ConfigError(_) => 500,
            CivicError::AuthError(_) => 401,
            CivicError::ValidationError(_) => 400,
            CivicError::DatabaseError(_) => 500,
            CivicError::ExternalServiceError { .. } => 502,
            CivicError::NotFoundError(_) => 404,
            CivicError::TimeoutError(_) => 504,
            CivicError::InternalError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for CivicError {
    fn from(err: serde_json::Error) -> Self {
        CivicError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for CivicError {
    fn from(err: std::io::Error) -> Self {
        CivicError::InternalError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> CivicError {
    CivicError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> CivicError {
    CivicError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> CivicError {
    CivicError::NotFoundError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> CivicError {
    CivicError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(validation_error("bad").status_code(), 400);
        assert_eq!(not_found("weather").status_code(), 404);
        assert_eq!(external_service_error("push", "boom").status_code(), 502);
        assert_eq!(CivicError::TimeoutError("slow".into()).status_code(), 504);
    }

    #[test]
    fn test_transient_classification() {
        assert!(external_service_error("push", "503").is_transient());
        assert!(CivicError::TimeoutError("slow".into()).is_transient());
        assert!(!validation_error("bad config").is_transient());
        assert!(!config_error("missing url").is_transient());
    }
}
