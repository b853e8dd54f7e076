//! Client-side transcoding of a finished video.
//!
//! - [`AnimatedImageTranscoder`]: frame-accurate sampling, per-frame palette
//!   quantization, GIF89a container writing
//! - [`StreamTranscoder`]: real-time replay of the source through a capture
//!   and record capability
//!
//! Both are one-shot: a call borrows the source resource for its duration and
//! returns a new resource. Neither touches session state.

mod animated;
mod quantize;
mod stream;

pub use animated::{
    output_geometry, sample_timestamps, AnimatedImageTranscoder, DecodedVideo, OutputGeometry,
    VideoDecoder,
};
pub use quantize::{quantize_frame, IndexedFrame};
pub use stream::{
    negotiate_recording_type, CaptureBackend, RecordingSession, StreamTranscoder,
    RECORDING_TYPE_PREFERENCE,
};

use crate::error::TranscodeResult;
use crate::media::MediaResource;
use async_trait::async_trait;

/// MIME type of the animated-image output
pub const GIF_MIME: &str = "image/gif";

/// MIME type of the re-encoded container
pub const WEBM_MIME: &str = "video/webm";

/// Derives an alternate representation of a video resource
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Produce the derived resource
    async fn transcode(&self, source: &MediaResource) -> TranscodeResult<MediaResource>;
}
