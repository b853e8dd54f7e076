//! TypeMotion: typographic video generation and client-side export
//!
//! A word or short phrase plus a visual style goes through two generation
//! stages (a still keyframe, then a video animating it). The finished clip can
//! be saved as-is, re-encoded to WebM by recording its playback, or turned
//! into a looping GIF.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   GenerationRequest                                          │
//! │         │                                                    │
//! │         ▼                                                    │
//! │   ┌──────────────┐  image, video  ┌───────────────────────┐  │
//! │   │ Orchestrator │───────────────►│ GenerationService     │  │
//! │   │ (state +     │                │ (Gemini / mock)       │  │
//! │   │  progress)   │                └───────────────────────┘  │
//! │   └──────┬───────┘                                           │
//! │          │ export(format)                                    │
//! │          ▼                                                   │
//! │   ┌──────────────────────┐   ┌─────────────────────────┐     │
//! │   │ AnimatedImage (GIF)  │   │ Stream (WebM)           │     │
//! │   │ seek, quantize, write│   │ replay + record         │     │
//! │   └──────────────────────┘   └─────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use typemotion::mock::{MockCredentialGate, MockGenerationService};
//! use typemotion::{GenerationRequest, Orchestrator, QualityTier, SubmitOutcome};
//!
//! # async fn run() -> typemotion::TypeMotionResult<()> {
//! let orchestrator = Orchestrator::new(Arc::new(MockGenerationService::new()));
//! let request = GenerationRequest::new("AURORA")?.with_quality(QualityTier::Mid);
//!
//! let outcome = orchestrator
//!     .submit(&request, &MockCredentialGate::granted())
//!     .await;
//! assert_eq!(outcome, SubmitOutcome::Completed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod capabilities;
pub mod config;
mod error;
pub mod export;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod media;
pub mod mock;
pub mod orchestrator;
pub mod presets;
pub mod progress;
pub mod request;
pub mod state;
pub mod transcode;

pub use capabilities::{
    CredentialGate, DownloadSink, GenerationService, ImageGenerationParams, VideoGenerationParams,
};
pub use config::{GifSettings, ProgressConfig, TypeMotionConfig};
pub use error::{
    ExportError, GenerationFailure, GenerationResult, TranscodeError, TranscodeResult,
    TypeMotionError, TypeMotionResult,
};
pub use export::{download_name, download_name_now, ExportFormat};
#[cfg(feature = "gemini")]
pub use gemini::{GeminiClient, GeminiConfig, SharedApiKey};
pub use media::{HandleRegistry, MediaHandle, MediaResource, PublishedMedia};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, SubmitOutcome};
pub use request::{GenerationRequest, ImageSize, QualityTier, MAX_MESSAGE_CHARS};
pub use state::{
    ExportFlags, GenerationState, ProgressSample, SessionEvent, SessionSnapshot, StateKind,
};
pub use transcode::{AnimatedImageTranscoder, MediaTranscoder, StreamTranscoder};
