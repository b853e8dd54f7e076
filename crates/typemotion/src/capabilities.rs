//! External capabilities the orchestrator depends on.
//!
//! Everything here is opaque to the core: the orchestrator only branches on
//! results. Implementations:
//!
//! - `GeminiClient` (feature `gemini`) - generation over HTTP
//! - [`crate::mock`] - scripted doubles for tests
//! - the CLI supplies a prompting credential gate and a directory sink

use crate::error::{GenerationResult, TypeMotionResult};
use crate::media::MediaResource;
use crate::request::{ImageSize, QualityTier};
use async_trait::async_trait;
use std::path::PathBuf;

/// Input of the keyframe stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerationParams {
    /// Message to render
    pub message: String,
    /// Effective style (never blank)
    pub style: String,
    /// Typography directive, possibly empty
    pub typography: String,
    /// Optional reference image
    pub reference_image: Option<MediaResource>,
    /// Requested size class
    pub image_size: ImageSize,
}

/// Input of the video stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoGenerationParams {
    /// Message to reveal
    pub message: String,
    /// Keyframe produced by the first stage
    pub keyframe: MediaResource,
    /// Effective style (same as the keyframe stage)
    pub style: String,
    /// Requested quality tier
    pub quality: QualityTier,
}

/// Remote generation service
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate the keyframe still
    async fn generate_image(&self, params: ImageGenerationParams) -> GenerationResult<MediaResource>;

    /// Animate the keyframe into a video
    async fn generate_video(&self, params: VideoGenerationParams) -> GenerationResult<MediaResource>;

    /// Suggest a style description for `message`.
    ///
    /// An empty string means "no suggestion".
    async fn suggest_style(&self, message: &str) -> GenerationResult<String>;
}

/// Gate in front of the generation service
#[async_trait]
pub trait CredentialGate: Send + Sync {
    /// Whether a usable credential is present
    async fn has_credential(&self) -> bool;

    /// Ask the user for a credential; resolves once the request is dealt with
    async fn request_credential(&self);
}

/// Destination for finished downloads
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Persist `resource` under the suggested name, returning where it went
    async fn save(&self, resource: &MediaResource, file_name: &str) -> TypeMotionResult<PathBuf>;
}
