/*!
 * Error types for the sublingo orchestration core.
 *
 * This module contains custom error types for different parts of the crate,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to a generative-text provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors surfaced by `RequestOrchestrator::dispatch`
///
/// Each variant carries a different recovery expectation: transport failures
/// are retried with backoff before becoming fatal, parse failures are retried
/// without backoff, validation failures are fatal on first occurrence, and
/// configuration failures are never retried.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Required API credentials or model identifiers are absent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote call failed on every retry attempt
    #[error("Request still failing after {attempts} attempts: {source}")]
    Transport {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The last underlying provider error
        #[source]
        source: ProviderError,
    },

    /// Structured-response parsing failed on every retry attempt
    #[error("Structured response parsing still failing after {attempts} attempts")]
    Parse {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// A caller-supplied validator rejected the parsed response
    #[error("Response validation failed: {0}")]
    Validation(String),
}

impl DispatchError {
    /// Whether this error left an entry in the error log partition
    pub fn is_audited(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation(_))
    }
}
