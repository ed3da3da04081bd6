use thiserror::Error;

/// Top-level error type for the Advisor gateway.
///
/// Subsystem crates define their own error types and convert into
/// `AdvisorError` at the composition root so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdvisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl From<toml::de::Error> for AdvisorError {
    fn from(err: toml::de::Error) -> Self {
        AdvisorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        AdvisorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Advisor operations.
pub type Result<T> = std::result::Result<T, AdvisorError>;
