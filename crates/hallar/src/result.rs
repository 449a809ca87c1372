//! Result and error types for Hallar.

use thiserror::Error;

/// Result type for Hallar operations
pub type HallarResult<T> = Result<T, HallarError>;

/// Errors that can occur in Hallar
#[derive(Debug, Error)]
pub enum HallarError {
    /// Candidate rejected at construction (confidence out of range, empty selector)
    #[error("Invalid candidate: {message}")]
    InvalidCandidate {
        /// Error message
        message: String,
    },

    /// Query rejected at construction (malformed caller input)
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Error message
        message: String,
    },

    /// A provider failed internally. Absorbed at the executor boundary,
    /// never propagated out of `resolve`.
    #[error("Provider '{provider}' failed: {message}")]
    ProviderFailure {
        /// Provider that failed
        provider: String,
        /// Error message
        message: String,
    },

    /// A provider exceeded its deadline. Treated identically to a failure.
    #[error("Provider '{provider}' timed out after {ms}ms")]
    ProviderTimeout {
        /// Provider that timed out
        provider: String,
        /// Deadline in milliseconds
        ms: u64,
    },

    /// The verifier could not evaluate a selector against the snapshot.
    /// Non-fatal: the candidate is kept with a confidence penalty.
    #[error("Verification error: {message}")]
    VerificationError {
        /// Error message
        message: String,
    },

    /// Persistence failed. The engine fails open with in-memory defaults.
    #[error("Persistence error: {message}")]
    PersistenceError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_candidate_display() {
        let err = HallarError::InvalidCandidate {
            message: "confidence 1.5 out of range".to_string(),
        };
        assert!(err.to_string().contains("Invalid candidate"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_provider_timeout_display() {
        let err = HallarError::ProviderTimeout {
            provider: "semantic".to_string(),
            ms: 250,
        };
        assert!(err.to_string().contains("semantic"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: HallarError = io.into();
        assert!(matches!(err, HallarError::Io(_)));
    }
}
