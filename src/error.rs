//! Error types for quote and product record access.

use std::fmt;

/// Result type for quote-kit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for quote-kit.
///
/// Every facade and backend operation returns `Result<T>`.
/// Different variants represent different failure modes:
#[derive(Debug, Clone)]
pub enum Error {
    /// Input rejected before it reached storage.
    ///
    /// Raised when:
    /// - A quote is submitted without any selected product
    /// - A new quote misses required fields (customer info, items)
    /// - Quote items or totals break their arithmetic invariants
    /// - A status transition is not allowed by the application
    ///
    /// **Recovery:** Fix the input. Never retried.
    ValidationError(String),

    /// The addressed record does not exist.
    ///
    /// Returned by `patch_quote` when the identifier matches no stored quote.
    NotFound(String),

    /// Transport or storage failure (network, HTTP 5xx, SQLite error).
    ///
    /// Common causes:
    /// - Hosted backend unreachable or timing out
    /// - Hosted backend answered with an unexpected status
    /// - Embedded store rejected a statement
    ///
    /// **Recovery:** The caller may retry, see `crate::retry::RetryPolicy`.
    BackendError(String),

    /// Serialization failed when encoding a record for storage or the wire.
    SerializationError(String),

    /// Stored or received data could not be decoded into a record.
    ///
    /// Common causes:
    /// - Corrupted JSON in an embedded text column
    /// - Unparseable timestamp
    /// - Unknown quote status
    DeserializationError(String),

    /// Configuration error while building a backend.
    ///
    /// Common causes:
    /// - Missing or malformed environment variable
    /// - Unknown backend kind
    ConfigError(String),

    /// Backend not compiled in.
    ///
    /// **Recovery:** Enable the required Cargo feature (`embedded` or `hosted`).
    NotImplemented(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether a caller-side retry can succeed without changing the input.
    ///
    /// Only transport/storage failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackendError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(e: chrono::ParseError) -> Self {
        Error::DeserializationError(format!("invalid timestamp: {}", e))
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "embedded")]
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Error::DeserializationError(format!("SQLite decode error: {}", e))
            }
            other => Error::BackendError(format!("SQLite error: {}", other)),
        }
    }
}

#[cfg(feature = "hosted")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::DeserializationError(format!("HTTP response decode error: {}", e))
        } else {
            Error::BackendError(format!("HTTP error: {}", e))
        }
    }
}
