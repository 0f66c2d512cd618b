//! Error types for the Marionette domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// Maximum number of characters of an upstream error body kept for diagnostics.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// The top-level error type for all Marionette operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level failures of a token source. Any of these aborts the
/// autopilot stream for the request that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Could not connect to provider: {0}")]
    Connection(String),

    #[error("Provider timed out: {0}")]
    Timeout(String),

    #[error("Provider returned status {status_code}: {body}")]
    Status { status_code: u16, body: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Could not decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Build a status error, keeping only the head of the response body.
    pub fn status(status_code: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
            Some((cut, _)) => format!("{}…", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status { status_code, body }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_displays_code_and_body() {
        let err = Error::Provider(ProviderError::status(503, "model is loading"));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn status_error_truncates_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS * 3);
        match ProviderError::status(500, &body) {
            ProviderError::Status { body, .. } => {
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS + 1);
                assert!(body.ends_with('…'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_error_truncation_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_CHARS + 5);
        let err = ProviderError::status(502, &body);
        assert!(err.to_string().starts_with("Provider returned status 502"));
    }
}
