//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Generation ended in the error state
    #[error("Generation failed: {message}")]
    Generation {
        /// Message reported by the service
        message: String,
    },

    /// No API key could be obtained
    #[error("No API key available: set GEMINI_API_KEY or enter one when prompted")]
    MissingCredential,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TypeMotion library error
    #[error("TypeMotion error: {0}")]
    TypeMotion(#[from] typemotion::TypeMotionError),

    /// Export failed
    #[error("Export failed: {0}")]
    Export(#[from] typemotion::ExportError),

    /// Transcode failed
    #[error("Transcode failed: {0}")]
    Transcode(#[from] typemotion::TranscodeError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a generation error
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }
}
