use thiserror::Error;

/// Typed error enum for remote media API operations
///
/// This enum differentiates between different failure modes so that the
/// retry executor and the circuit breaker can decide what to do with them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network/connection errors (connection refused, DNS, reset)
    /// Transient errors that should be retried
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Server error (500+)
    #[error("Server error: {message} (status: {status})")]
    ServerError { status: u16, message: String },

    /// Rate limiting error (429)
    #[error("Rate limited: {message} (retry after: {retry_after:?}s)")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// Authentication failed (401, 403)
    /// The user has to sign in again, retrying cannot help
    #[error("Authentication failed: {message} (status: {status})")]
    Authentication { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Client error (400-499, excluding auth, not found and rate limit)
    #[error("Client error: {message} (status: {status})")]
    Client { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The caller gave up; never retried
    #[error("Operation cancelled")]
    Cancelled,

    /// Rejected locally because the circuit for this operation is open
    #[error("Service unavailable: circuit open for {key}")]
    ServiceUnavailable { key: String },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Coarse classification used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Server,
    RateLimited,
    Authentication,
    NotFound,
    Client,
    Parse,
    Cancelled,
    ServiceUnavailable,
    Unknown,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::ServerError { .. } => ErrorKind::Server,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Parse(_) => ErrorKind::Parse,
            ApiError::Cancelled => ErrorKind::Cancelled,
            ApiError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            ApiError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether a retry of the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::Server
                | ErrorKind::RateLimited
                | ErrorKind::Unknown
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Get the retry-after duration for rate limit errors
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Create an error from a reqwest error
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ApiError::Timeout(error.to_string())
        } else if error.is_connect() {
            ApiError::Network(format!("Connection failed: {}", error))
        } else if error.is_request() {
            ApiError::Network(format!("Request error: {}", error))
        } else if error.is_decode() {
            ApiError::Parse(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            ApiError::Unknown(error.to_string())
        }
    }

    /// Create an error from an HTTP status code and response body
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ApiError::Authentication {
                status,
                message: body,
            },
            404 => ApiError::NotFound(body),
            408 => ApiError::Timeout(body),
            429 => ApiError::RateLimited {
                message: body,
                retry_after: None,
            },
            400..=499 => ApiError::Client {
                status,
                message: body,
            },
            500..=599 => ApiError::ServerError {
                status,
                message: body,
            },
            _ => ApiError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }
}
