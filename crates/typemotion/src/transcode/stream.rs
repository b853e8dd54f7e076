//! Real-time stream transcoder.
//!
//! No frames are decoded here. The source is played back at its natural rate
//! while a capture backend records the rendered output, and the recorded
//! chunks are concatenated once playback ends. Audio is not captured.

use super::{MediaTranscoder, WEBM_MIME};
use crate::error::{TranscodeError, TranscodeResult};
use crate::media::MediaResource;
use async_trait::async_trait;

/// Recording types in order of preference; the last one is always accepted
pub const RECORDING_TYPE_PREFERENCE: [&str; 3] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
];

/// Capability that replays a video and records what it renders
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether live capture of a playing video exists in this runtime
    fn can_capture(&self) -> bool;

    /// Whether the recorder accepts `mime_type`
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Open a capture of `source` with a recorder attached, not yet playing
    async fn start(
        &self,
        source: &MediaResource,
        mime_type: &str,
    ) -> TranscodeResult<Box<dyn RecordingSession>>;
}

/// A capture in progress
#[async_trait]
pub trait RecordingSession: Send {
    /// Start playback; resolves once it is running
    async fn play(&mut self) -> TranscodeResult<()>;

    /// Next recorded chunk, or `None` once playback has ended and the
    /// recorder has flushed
    async fn next_chunk(&mut self) -> Option<TranscodeResult<Vec<u8>>>;
}

/// Pick the most preferred recording type the backend supports
pub fn negotiate_recording_type<B: CaptureBackend + ?Sized>(backend: &B) -> &'static str {
    let [preferred @ .., fallback] = RECORDING_TYPE_PREFERENCE;
    preferred
        .iter()
        .copied()
        .find(|mime| backend.is_type_supported(mime))
        .unwrap_or(fallback)
}

/// Re-encodes a video by recording its playback
#[derive(Debug, Clone)]
pub struct StreamTranscoder<B> {
    backend: B,
}

impl<B: CaptureBackend> StreamTranscoder<B> {
    /// Create a transcoder over `backend`
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The capture backend
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Play `source` through the recorder and collect the container.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::CaptureUnsupported`] before anything is started
    /// - [`TranscodeError::PlaybackFailed`] if playback does not start
    /// - [`TranscodeError::RecordingFailed`] if the recorder errors or
    ///   produces nothing
    pub async fn reencode(&self, source: &MediaResource) -> TranscodeResult<MediaResource> {
        if !self.backend.can_capture() {
            return Err(TranscodeError::CaptureUnsupported);
        }

        let mime_type = negotiate_recording_type(&self.backend);
        tracing::info!(mime_type, source_bytes = source.len(), "recording stream");

        let mut session = self.backend.start(source, mime_type).await?;
        session.play().await.map_err(|e| match e {
            TranscodeError::PlaybackFailed { .. } => e,
            other => TranscodeError::PlaybackFailed {
                message: other.to_string(),
            },
        })?;

        let mut recorded = Vec::new();
        let mut chunks = 0usize;
        while let Some(chunk) = session.next_chunk().await {
            let chunk = chunk.map_err(|e| match e {
                TranscodeError::RecordingFailed { .. } => e,
                other => TranscodeError::RecordingFailed {
                    message: other.to_string(),
                },
            })?;
            if chunk.is_empty() {
                continue;
            }
            chunks += 1;
            tracing::debug!(chunk = chunks, bytes = chunk.len(), "chunk recorded");
            recorded.extend_from_slice(&chunk);
        }

        if recorded.is_empty() {
            return Err(TranscodeError::RecordingFailed {
                message: "recorder produced no data".to_string(),
            });
        }

        tracing::info!(chunks, bytes = recorded.len(), "stream recorded");
        Ok(MediaResource::new(recorded, WEBM_MIME))
    }
}

#[async_trait]
impl<B: CaptureBackend> MediaTranscoder for StreamTranscoder<B> {
    async fn transcode(&self, source: &MediaResource) -> TranscodeResult<MediaResource> {
        self.reencode(source).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::MockCapture;

    fn source() -> MediaResource {
        MediaResource::new(vec![7u8; 32], "video/mp4")
    }

    mod negotiation_tests {
        use super::*;

        #[test]
        fn test_prefers_vp9() {
            let backend = MockCapture::new(vec![]);
            assert_eq!(negotiate_recording_type(&backend), "video/webm;codecs=vp9");
        }

        #[test]
        fn test_falls_back_to_vp8() {
            let backend = MockCapture::new(vec![]).with_supported_types(["video/webm;codecs=vp8"]);
            assert_eq!(negotiate_recording_type(&backend), "video/webm;codecs=vp8");
        }

        #[test]
        fn test_generic_container_is_unconditional() {
            let backend = MockCapture::new(vec![]).with_supported_types(Vec::<String>::new());
            assert_eq!(negotiate_recording_type(&backend), "video/webm");
        }
    }

    mod reencode_tests {
        use super::*;

        #[tokio::test]
        async fn test_chunks_are_concatenated() {
            let backend = MockCapture::new(vec![b"\x1aE".to_vec(), vec![], b"\xdf\xa3".to_vec()]);
            let transcoder = StreamTranscoder::new(backend.clone());

            let output = transcoder.reencode(&source()).await.unwrap();
            assert_eq!(output.mime_type(), WEBM_MIME);
            assert_eq!(output.bytes(), b"\x1aE\xdf\xa3");
            assert_eq!(backend.start_count(), 1);
            assert_eq!(backend.started_types(), vec!["video/webm;codecs=vp9".to_string()]);
        }

        #[tokio::test]
        async fn test_capture_unsupported_fails_before_start() {
            let backend = MockCapture::unsupported();
            let transcoder = StreamTranscoder::new(backend.clone());
            assert_eq!(
                transcoder.reencode(&source()).await.unwrap_err(),
                TranscodeError::CaptureUnsupported
            );
            assert_eq!(backend.start_count(), 0);
        }

        #[tokio::test]
        async fn test_playback_failure() {
            let transcoder =
                StreamTranscoder::new(MockCapture::new(vec![]).with_playback_failure("autoplay blocked"));
            let err = transcoder.reencode(&source()).await.unwrap_err();
            assert_eq!(
                err,
                TranscodeError::PlaybackFailed {
                    message: "autoplay blocked".to_string()
                }
            );
        }

        #[tokio::test]
        async fn test_no_data_is_recording_failure() {
            let transcoder = StreamTranscoder::new(MockCapture::new(vec![vec![]]));
            assert!(matches!(
                transcoder.reencode(&source()).await,
                Err(TranscodeError::RecordingFailed { .. })
            ));
        }
    }
}
