//! Error types for the sockagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all sockagent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Discovery errors ---
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Execution errors ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Learning errors ---
    #[error("Learning error: {0}")]
    Learning(#[from] LearningError),

    // --- Stub artifact errors ---
    #[error("Stub format error: {0}")]
    Stub(#[from] StubFormatError),

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

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No socket-agent descriptor found at {url}")]
    NotFound { url: String },

    #[error("HTTP {status} when fetching descriptor: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Failed to fetch descriptor: {0}")]
    Network(String),

    #[error("Descriptor size {size_bytes}B exceeds hard cap {max_bytes}B")]
    TooLarge { size_bytes: usize, max_bytes: usize },

    #[error("Invalid JSON in descriptor: {0}")]
    InvalidJson(String),

    #[error("Invalid descriptor: {0}")]
    Invalid(String),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("No descriptor endpoint matches '{0}'")]
    EndpointNotFound(String),

    #[error("Empty input text")]
    EmptyInput,

    #[error("Client not started — call discover() first")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Request failed: {message} (status: {status_code})")]
    HttpStatus { status_code: u16, message: String },

    #[error("Request timed out after {timeout_secs}s: {url}")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No LLM handler configured for fallback")]
    NoLlmHandler,

    #[error("LLM handler failed: {0}")]
    LlmHandler(String),
}

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("Corrupt observation: {0}")]
    CorruptObservation(String),

    #[error("Pattern mining failed: {0}")]
    MiningFailed(String),

    #[error("Invalid intent pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StubFormatError {
    #[error("Malformed stub file: {0}")]
    Malformed(String),

    #[error("Unsupported stub version '{found}' (expected '{expected}')")]
    VersionMismatch { found: String, expected: String },

    #[error("Failed to read stub file: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_displays_correctly() {
        let err = Error::Discovery(DiscoveryError::TooLarge {
            size_bytes: 9216,
            max_bytes: 8192,
        });
        assert!(err.to_string().contains("9216"));
        assert!(err.to_string().contains("8192"));
    }

    #[test]
    fn routing_error_displays_correctly() {
        let err = Error::Routing(RoutingError::EndpointNotFound("create_widget".into()));
        assert!(err.to_string().contains("create_widget"));
    }

    #[test]
    fn stub_version_mismatch_displays_both_versions() {
        let err = Error::Stub(StubFormatError::VersionMismatch {
            found: "9.0".into(),
            expected: "1.0".into(),
        });
        assert!(err.to_string().contains("9.0"));
        assert!(err.to_string().contains("1.0"));
    }
}
