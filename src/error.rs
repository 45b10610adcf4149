//! Error types for chatdesk
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatdesk operations
///
/// Covers configuration and bootstrap problems, failures talking to the
/// remote conversation and speech services, and malformed service payloads.
#[derive(Error, Debug)]
pub enum ChatdeskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required session parameters are missing (client_id, branch_id)
    #[error("Missing required parameters: {missing}\n\n{remediation}")]
    MissingParameters {
        /// Comma separated names of the missing parameters
        missing: String,
        /// Instructions shown to the user
        remediation: String,
    },

    /// A remote service answered with a non-success status
    #[error("{service} returned error {status}: {body}")]
    ServiceStatus {
        /// Name of the service that failed
        service: String,
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// A remote service could not be reached or timed out
    #[error("Failed to reach {service}: {message}")]
    Transport {
        /// Name of the service that failed
        service: String,
        /// Transport error description
        message: String,
    },

    /// A remote service answered with a payload that could not be used
    #[error("Malformed response from {service}: {message}")]
    Payload {
        /// Name of the service that failed
        service: String,
        /// What was wrong with the payload
        message: String,
    },

    /// Input rejected before any request was made
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Operation disabled by configuration
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Audio playback failed
    #[error("Playback error: {0}")]
    Playback(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for chatdesk operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
