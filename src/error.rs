//! Error types for the tabplay library

use std::io;

/// Library error type for tabplay operations
#[derive(Debug, thiserror::Error)]
pub enum TabError {
    /// Parsing error when reading songs or notation cells
    #[error("parsing error: {0}")]
    ParsingError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Audio-related error
    #[error("audio error: {0}")]
    AudioError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for TabError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for TabError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParsingError(error.to_string())
    }
}
