//! Generation state machine values.
//!
//! The media a state owns lives inside its variant, so "keyframe only while
//! generating the video or playing, video only while playing" holds by
//! construction.

use crate::export::ExportFormat;
use crate::media::{MediaHandle, PublishedMedia};
use serde::Serialize;
use std::fmt;

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    /// Waiting for a submission
    #[default]
    Idle,
    /// Keyframe requested from the service
    GeneratingImage,
    /// Keyframe received, video requested
    GeneratingVideo {
        /// Generated keyframe
        keyframe: PublishedMedia,
    },
    /// Both stages finished
    Playing {
        /// Generated keyframe
        keyframe: PublishedMedia,
        /// Generated video
        video: PublishedMedia,
    },
    /// A stage failed
    Error {
        /// Failure message for display
        message: String,
    },
}

impl GenerationState {
    /// Variant tag
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Idle => StateKind::Idle,
            Self::GeneratingImage => StateKind::GeneratingImage,
            Self::GeneratingVideo { .. } => StateKind::GeneratingVideo,
            Self::Playing { .. } => StateKind::Playing,
            Self::Error { .. } => StateKind::Error,
        }
    }

    /// Keyframe held by this state
    #[must_use]
    pub const fn keyframe(&self) -> Option<&PublishedMedia> {
        match self {
            Self::GeneratingVideo { keyframe } | Self::Playing { keyframe, .. } => Some(keyframe),
            _ => None,
        }
    }

    /// Video held by this state
    #[must_use]
    pub const fn video(&self) -> Option<&PublishedMedia> {
        match self {
            Self::Playing { video, .. } => Some(video),
            _ => None,
        }
    }

    /// Error message, if failed
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Handles owned by this state
    #[must_use]
    pub fn handles(&self) -> Vec<&MediaHandle> {
        self.keyframe()
            .into_iter()
            .chain(self.video())
            .map(|media| &media.handle)
            .collect()
    }
}

/// Payload-free view of [`GenerationState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StateKind {
    /// Waiting for a submission
    Idle,
    /// Keyframe stage
    GeneratingImage,
    /// Video stage
    GeneratingVideo,
    /// Finished
    Playing,
    /// Failed
    Error,
}

impl StateKind {
    /// Whether a generation stage is running
    #[must_use]
    pub const fn is_generating(self) -> bool {
        matches!(self, Self::GeneratingImage | Self::GeneratingVideo)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::GeneratingImage => "generating-image",
            Self::GeneratingVideo => "generating-video",
            Self::Playing => "playing",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Progress shown while a stage runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Percentage in `[0, 100]`
    pub percent: f64,
    /// Human-readable phase label
    pub label: String,
}

/// In-flight marker per transcoded export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExportFlags {
    gif: Option<u64>,
    webm: Option<u64>,
}

impl ExportFlags {
    /// Whether an export of `format` is running
    #[must_use]
    pub const fn is_running(&self, format: ExportFormat) -> bool {
        match format {
            ExportFormat::Mp4 => false,
            ExportFormat::Gif => self.gif.is_some(),
            ExportFormat::WebM => self.webm.is_some(),
        }
    }

    /// Whether any export is running
    #[must_use]
    pub const fn any_running(&self) -> bool {
        self.gif.is_some() || self.webm.is_some()
    }

    /// Mark `format` as running under `job`. Returns `false` if it already was.
    pub(crate) fn try_claim(&mut self, format: ExportFormat, job: u64) -> bool {
        let slot = match format {
            ExportFormat::Mp4 => return true,
            ExportFormat::Gif => &mut self.gif,
            ExportFormat::WebM => &mut self.webm,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(job);
        true
    }

    /// Clear `format` if it is still owned by `job`
    pub(crate) fn release(&mut self, format: ExportFormat, job: u64) {
        let slot = match format {
            ExportFormat::Mp4 => return,
            ExportFormat::Gif => &mut self.gif,
            ExportFormat::WebM => &mut self.webm,
        };
        if *slot == Some(job) {
            *slot = None;
        }
    }

    /// Clear every flag
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Read-only view of the session for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Current state
    pub state: GenerationState,
    /// Current progress
    pub progress: ProgressSample,
    /// Export flags
    pub exports: ExportFlags,
    /// Whether a style suggestion is being fetched
    pub suggesting_style: bool,
    /// Editable style text
    pub style_draft: String,
}

impl SessionSnapshot {
    /// Variant tag of the current state
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        self.state.kind()
    }
}

/// Observable change to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The state changed; carries the progress at the moment of the change
    StateChanged {
        /// Previous state
        from: StateKind,
        /// New state
        to: StateKind,
        /// Progress after the transition
        progress: f64,
    },
    /// Progress or phase label changed
    Progress(ProgressSample),
    /// An export started or finished
    ExportChanged {
        /// Affected format
        format: ExportFormat,
        /// Whether it is now running
        running: bool,
    },
    /// The style draft was replaced by a suggestion
    StyleSuggested(String),
}
