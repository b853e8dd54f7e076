//! Result and error types for TypeMotion.

use crate::export::ExportFormat;
use thiserror::Error;

/// Result type for TypeMotion operations
pub type TypeMotionResult<T> = Result<T, TypeMotionError>;

/// Result type for transcoder operations
pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Result type for calls into the generation service
pub type GenerationResult<T> = Result<T, GenerationFailure>;

/// Errors that can occur in TypeMotion outside of a transcode
#[derive(Debug, Error)]
pub enum TypeMotionError {
    /// Request rejected before submission
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Download sink could not persist a resource
    #[error("Failed to save {file_name}: {message}")]
    SinkFailed {
        /// Suggested file name of the resource
        file_name: String,
        /// Error message
        message: String,
    },

    /// Inline media payload could not be decoded
    #[error("Invalid media payload: {message}")]
    InvalidPayload {
        /// Error message
        message: String,
    },

    /// HTTP client could not be set up
    #[error("HTTP client error: {message}")]
    HttpClient {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl TypeMotionError {
    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// A rejection from the external generation service.
///
/// Only the message is meaningful: it is matched against the configured
/// credential markers and otherwise shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerationFailure {
    /// Message reported by the service
    pub message: String,
}

impl GenerationFailure {
    /// Create a failure carrying the given message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Whether the message contains one of the credential markers.
    ///
    /// Plain substring matching on service wording; kept as-is for
    /// compatibility even though it is a weak contract.
    #[must_use]
    pub fn is_credential_problem<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        markers
            .iter()
            .any(|marker| !marker.as_ref().is_empty() && self.message.contains(marker.as_ref()))
    }
}

/// Errors produced by the animated-image and stream transcoders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    /// The encoding or decoding capability is not available in this runtime
    #[error("Encoder unavailable: {message}")]
    EncoderUnavailable {
        /// Error message
        message: String,
    },

    /// The source video could not be loaded
    #[error("Source video unreadable: {message}")]
    SourceUnreadable {
        /// Error message
        message: String,
    },

    /// Quantization or container writing failed
    #[error("Encode failed: {message}")]
    EncodeFailed {
        /// Error message
        message: String,
    },

    /// The runtime cannot capture the rendered output of a video
    #[error("Runtime does not support capturing the video stream")]
    CaptureUnsupported,

    /// Playback of the source video did not start
    #[error("Playback failed: {message}")]
    PlaybackFailed {
        /// Error message
        message: String,
    },

    /// The recorder failed while playback was running
    #[error("Recording failed: {message}")]
    RecordingFailed {
        /// Error message
        message: String,
    },
}

impl TranscodeError {
    /// Create an encoder unavailable error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: message.into(),
        }
    }

    /// Create a source unreadable error
    #[must_use]
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            message: message.into(),
        }
    }

    /// Create an encode failed error
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }
}

/// Errors reported to the caller of an export.
///
/// None of these change the generation state.
#[derive(Debug, Error)]
pub enum ExportError {
    /// No finished video is held by the session
    #[error("No finished video to export")]
    NothingToExport,

    /// An export of the same format is still running
    #[error("{0} export already in progress")]
    AlreadyInFlight(ExportFormat),

    /// The transcoder failed
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// The download sink failed
    #[error(transparent)]
    Sink(#[from] TypeMotionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_marker_matching() {
        let markers = ["Requested entity was not found", "404"];
        assert!(GenerationFailure::new("HTTP 404: model missing").is_credential_problem(&markers));
        assert!(GenerationFailure::new("Requested entity was not found.")
            .is_credential_problem(&markers));
        assert!(!GenerationFailure::new("quota exceeded").is_credential_problem(&markers));
    }

    #[test]
    fn test_empty_marker_never_matches() {
        let markers = [""];
        assert!(!GenerationFailure::new("anything").is_credential_problem(&markers));
    }

    #[test]
    fn test_failure_displays_message_verbatim() {
        let failure = GenerationFailure::new("Safety filter blocked the prompt");
        assert_eq!(failure.to_string(), "Safety filter blocked the prompt");
    }

    #[test]
    fn test_export_error_display() {
        let err = ExportError::AlreadyInFlight(ExportFormat::Gif);
        assert_eq!(err.to_string(), "GIF export already in progress");
    }
}
