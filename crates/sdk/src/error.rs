//! SDK-specific error types with retry classification.
//!
//! Provides a two-tier error model:
//! - **Transport errors**: connection failures, timeouts, non-2xx API responses
//! - **Decode errors**: response bodies that do not match the expected shape
//!
//! Errors know whether they are worth retrying; see [`SdkError::is_retryable`].

use snafu::{Location, Snafu};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SdkError {
    /// Failed to establish a connection or build the HTTP client.
    #[snafu(display("Connection error at {location}: {message}"))]
    Connection {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Request could not be sent or its response could not be read.
    #[snafu(display("HTTP error at {location}: {source}"))]
    Http {
        /// Underlying HTTP client error.
        source: reqwest::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// The service answered with an error status.
    #[snafu(display("API error (status={status}, code={}): {description}", error_code.as_deref().unwrap_or("-")))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Service-specific error code (e.g. `CF-OrganizationNotFound`).
        error_code: Option<String>,
        /// Error description from the service.
        description: String,
    },

    /// Response body did not match the expected shape.
    #[snafu(display("Failed to decode {what}: {source}"))]
    Decode {
        /// What was being decoded.
        what: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// OAuth token acquisition failed.
    #[snafu(display("Token error: {message}"))]
    Token {
        /// Error description.
        message: String,
    },

    /// Retry attempts exhausted.
    #[snafu(display("Retry exhausted after {attempts} attempts: {last_error}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message before giving up.
        last_error: String,
    },

    /// Configuration validation error.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// URL parsing error.
    #[snafu(display("Invalid URL '{url}': {message}"))]
    InvalidUrl {
        /// The invalid URL.
        url: String,
        /// Parse error description.
        message: String,
    },
}

impl SdkError {
    /// Returns true if the error is transient and the request should be retried.
    ///
    /// Retryable errors:
    /// - Connection failures and timeouts
    /// - `429 Too Many Requests`
    /// - `502`, `503`, `504` gateway and availability errors
    ///
    /// Non-retryable errors:
    /// - Any other API status (authentication, not found, conflicts)
    /// - Decode errors: the same body would fail again
    /// - Configuration and URL errors
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            },
            Self::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            // Non-retryable
            Self::Decode { .. } => false,
            Self::Token { .. } => false,
            Self::RetryExhausted { .. } => false,
            Self::Config { .. } => false,
            Self::InvalidUrl { .. } => false,
        }
    }

    /// Returns true if the response arrived but could not be understood.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns the HTTP status if this is an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds an API error from a status and description.
    pub fn api(status: u16, error_code: Option<&str>, description: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_code: error_code.map(str::to_owned),
            description: description.into(),
        }
    }
}
