//! Generation requests and the quality tier.

use crate::error::{TypeMotionError, TypeMotionResult};
use crate::media::MediaResource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum message length, counted in characters
pub const MAX_MESSAGE_CHARS: usize = 40;

/// Output fidelity, ordered from fastest to highest quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum QualityTier {
    /// 720p video, 1K keyframe
    #[default]
    #[serde(rename = "720p")]
    Low,
    /// 1080p video, 2K keyframe
    #[serde(rename = "1080p")]
    Mid,
    /// 4K video, 4K keyframe
    #[serde(rename = "4k")]
    High,
}

impl QualityTier {
    /// All tiers in ascending order
    pub const ALL: [Self; 3] = [Self::Low, Self::Mid, Self::High];

    /// Image-size class requested for the keyframe
    #[must_use]
    pub const fn image_size(self) -> ImageSize {
        match self {
            Self::Low => ImageSize::OneK,
            Self::Mid => ImageSize::TwoK,
            Self::High => ImageSize::FourK,
        }
    }

    /// Video resolution requested from the video stage
    #[must_use]
    pub const fn resolution(self) -> &'static str {
        match self {
            Self::Low => "720p",
            Self::Mid => "1080p",
            Self::High => "4k",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resolution())
    }
}

impl FromStr for QualityTier {
    type Err = TypeMotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "720p" | "low" => Ok(Self::Low),
            "1080p" | "mid" => Ok(Self::Mid),
            "4k" | "2160p" | "high" => Ok(Self::High),
            other => Err(TypeMotionError::invalid_request(format!(
                "unknown quality tier '{other}' (expected 720p, 1080p or 4k)"
            ))),
        }
    }
}

/// Keyframe size class understood by the image stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1K
    #[serde(rename = "1K")]
    OneK,
    /// 2K
    #[serde(rename = "2K")]
    TwoK,
    /// 4K
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    /// Wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one generation.
///
/// Construction only enforces the length limit; a blank message is accepted
/// here and ignored at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    message: String,
    style: String,
    typography: String,
    reference_image: Option<MediaResource>,
    quality: QualityTier,
}

impl GenerationRequest {
    /// Create a request for `message` with default settings
    pub fn new(message: impl Into<String>) -> TypeMotionResult<Self> {
        let message = message.into();
        let chars = message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(TypeMotionError::invalid_request(format!(
                "message is {chars} characters, the limit is {MAX_MESSAGE_CHARS}"
            )));
        }

        Ok(Self {
            message,
            style: String::new(),
            typography: String::new(),
            reference_image: None,
            quality: QualityTier::default(),
        })
    }

    /// Set the style description (empty means "pick a preset")
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Set the typography directive
    #[must_use]
    pub fn with_typography(mut self, typography: impl Into<String>) -> Self {
        self.typography = typography.into();
        self
    }

    /// Attach a reference image
    #[must_use]
    pub fn with_reference_image(mut self, image: MediaResource) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// Set the quality tier
    #[must_use]
    pub const fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    /// Message text as entered
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the message is empty after trimming
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }

    /// Style text as entered
    #[must_use]
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Explicit style, if it is not blank
    #[must_use]
    pub fn explicit_style(&self) -> Option<&str> {
        let trimmed = self.style.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Typography directive
    #[must_use]
    pub fn typography(&self) -> &str {
        &self.typography
    }

    /// Reference image, if any
    #[must_use]
    pub fn reference_image(&self) -> Option<&MediaResource> {
        self.reference_image.as_ref()
    }

    /// Quality tier
    #[must_use]
    pub const fn quality(&self) -> QualityTier {
        self.quality
    }
}
