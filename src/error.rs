//! Error types for the recommendations pipeline.

use thiserror::Error;

/// Root error type for recommendation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendationsError {
    /// Options missing or invalid at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend returned no usable items
    #[error("No recommendations")]
    NoRecommendations,

    /// Failure reported by the transport, passed through unchanged
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl RecommendationsError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::NoRecommendations => "NO_RECOMMENDATIONS",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }
}

/// Errors raised by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection-level failure
    #[error("Network failure: {0}")]
    Network(String),

    /// Request exceeded its timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Backend answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Anything else the transport wants to report
    #[error("{0}")]
    Other(String),
}

impl From<String> for TransportError {
    fn from(msg: String) -> Self {
        TransportError::Other(msg)
    }
}

impl From<&str> for TransportError {
    fn from(msg: &str) -> Self {
        TransportError::Other(msg.to_string())
    }
}

/// Result type alias for recommendation operations.
pub type Result<T> = std::result::Result<T, RecommendationsError>;

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RecommendationsError::NoRecommendations.code(),
            "NO_RECOMMENDATIONS"
        );
        assert_eq!(
            RecommendationsError::Configuration("x".into()).code(),
            "CONFIGURATION_ERROR"
        );
        let err: RecommendationsError = TransportError::Timeout(500).into();
        assert_eq!(err.code(), "TRANSPORT_ERROR");
        assert_eq!(err.to_string(), "Transport error: Request timed out after 500ms");
    }

    #[test]
    fn test_transport_error_from_str() {
        let err: TransportError = "boom".into();
        assert_eq!(err, TransportError::Other("boom".to_string()));
    }
}
