//! Scripted capabilities for tests and offline runs.
//!
//! Every mock is cheap to clone and clones share their call logs, so a test
//! can hand one copy to the orchestrator and inspect the other.

use crate::capabilities::{
    CredentialGate, DownloadSink, GenerationService, ImageGenerationParams, VideoGenerationParams,
};
use crate::error::{
    GenerationFailure, GenerationResult, TranscodeError, TranscodeResult, TypeMotionError,
    TypeMotionResult,
};
use crate::media::{HandleRegistry, MediaResource};
use crate::transcode::{CaptureBackend, DecodedVideo, RecordingSession, VideoDecoder};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call received by [`MockGenerationService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Keyframe request
    Image(ImageGenerationParams),
    /// Video request
    Video(VideoGenerationParams),
    /// Style suggestion request
    Style(String),
}

#[derive(Debug, Default)]
struct ServiceScript {
    image: VecDeque<GenerationResult<MediaResource>>,
    video: VecDeque<GenerationResult<MediaResource>>,
    style: VecDeque<GenerationResult<String>>,
    calls: Vec<MockCall>,
}

/// Generation service answering from queued results.
///
/// With nothing queued, image and video calls succeed with small placeholder
/// payloads and style calls return an empty suggestion.
#[derive(Debug, Clone, Default)]
pub struct MockGenerationService {
    script: Arc<Mutex<ServiceScript>>,
    image_delay: Duration,
    video_delay: Duration,
    style_delay: Duration,
}

impl MockGenerationService {
    /// Create a service that always succeeds immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder keyframe returned when nothing is queued
    #[must_use]
    pub fn placeholder_keyframe() -> MediaResource {
        MediaResource::new(b"\x89PNG\r\n\x1a\nmock-keyframe".to_vec(), "image/png")
    }

    /// Placeholder video returned when nothing is queued
    #[must_use]
    pub fn placeholder_video() -> MediaResource {
        MediaResource::new(b"\x00\x00\x00\x18ftypmp42mock-video".to_vec(), "video/mp4")
    }

    /// Queue the result of the next keyframe call
    #[must_use]
    pub fn with_image_result(self, result: GenerationResult<MediaResource>) -> Self {
        lock(&self.script).image.push_back(result);
        self
    }

    /// Queue the result of the next video call
    #[must_use]
    pub fn with_video_result(self, result: GenerationResult<MediaResource>) -> Self {
        lock(&self.script).video.push_back(result);
        self
    }

    /// Queue the result of the next style call
    #[must_use]
    pub fn with_style_result(self, result: GenerationResult<String>) -> Self {
        lock(&self.script).style.push_back(result);
        self
    }

    /// Make keyframe calls take `delay`
    #[must_use]
    pub const fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = delay;
        self
    }

    /// Make video calls take `delay`
    #[must_use]
    pub const fn with_video_delay(mut self, delay: Duration) -> Self {
        self.video_delay = delay;
        self
    }

    /// Make style calls take `delay`
    #[must_use]
    pub const fn with_style_delay(mut self, delay: Duration) -> Self {
        self.style_delay = delay;
        self
    }

    /// Every call received so far
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.script).calls.clone()
    }

    /// Parameters of every keyframe call
    #[must_use]
    pub fn image_calls(&self) -> Vec<ImageGenerationParams> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Image(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    /// Parameters of every video call
    #[must_use]
    pub fn video_calls(&self) -> Vec<VideoGenerationParams> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Video(params) => Some(params),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate_image(&self, params: ImageGenerationParams) -> GenerationResult<MediaResource> {
        let result = {
            let mut script = lock(&self.script);
            script.calls.push(MockCall::Image(params));
            script.image.pop_front()
        };
        tokio::time::sleep(self.image_delay).await;
        result.unwrap_or_else(|| Ok(Self::placeholder_keyframe()))
    }

    async fn generate_video(&self, params: VideoGenerationParams) -> GenerationResult<MediaResource> {
        let result = {
            let mut script = lock(&self.script);
            script.calls.push(MockCall::Video(params));
            script.video.pop_front()
        };
        tokio::time::sleep(self.video_delay).await;
        result.unwrap_or_else(|| Ok(Self::placeholder_video()))
    }

    async fn suggest_style(&self, message: &str) -> GenerationResult<String> {
        let result = {
            let mut script = lock(&self.script);
            script.calls.push(MockCall::Style(message.to_string()));
            script.style.pop_front()
        };
        tokio::time::sleep(self.style_delay).await;
        result.unwrap_or_else(|| Ok(String::new()))
    }
}

/// Credential gate with a switchable credential
#[derive(Debug, Clone)]
pub struct MockCredentialGate {
    present: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    grant_on_request: bool,
}

impl MockCredentialGate {
    /// Gate that reports a credential
    #[must_use]
    pub fn granted() -> Self {
        Self {
            present: Arc::new(AtomicBool::new(true)),
            requests: Arc::new(AtomicUsize::new(0)),
            grant_on_request: false,
        }
    }

    /// Gate without a credential
    #[must_use]
    pub fn missing() -> Self {
        let gate = Self::granted();
        gate.present.store(false, Ordering::SeqCst);
        gate
    }

    /// Make a credential request succeed, so the next check passes
    #[must_use]
    pub const fn granting_on_request(mut self) -> Self {
        self.grant_on_request = true;
        self
    }

    /// How often a credential was requested
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialGate for MockCredentialGate {
    async fn has_credential(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    async fn request_credential(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            self.present.store(true, Ordering::SeqCst);
        }
    }
}

/// Download sink keeping everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    saved: Arc<Mutex<Vec<(String, MediaResource)>>>,
    live_during_save: Arc<Mutex<Vec<usize>>>,
    registry: Option<HandleRegistry>,
    failure: Option<String>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the registry's live handle count at every save
    #[must_use]
    pub fn observing(mut self, registry: HandleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Fail every save with `message`
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Everything saved so far, as `(file name, resource)`
    #[must_use]
    pub fn saved(&self) -> Vec<(String, MediaResource)> {
        lock(&self.saved).clone()
    }

    /// Live handle counts observed during saves
    #[must_use]
    pub fn live_during_save(&self) -> Vec<usize> {
        lock(&self.live_during_save).clone()
    }
}

#[async_trait]
impl DownloadSink for MemorySink {
    async fn save(&self, resource: &MediaResource, file_name: &str) -> TypeMotionResult<PathBuf> {
        if let Some(registry) = &self.registry {
            lock(&self.live_during_save).push(registry.live_count());
        }
        if let Some(message) = &self.failure {
            return Err(TypeMotionError::SinkFailed {
                file_name: file_name.to_string(),
                message: message.clone(),
            });
        }
        lock(&self.saved).push((file_name.to_string(), resource.clone()));
        Ok(PathBuf::from(file_name))
    }
}

/// Decoder producing synthetic frames.
///
/// Frames are rendered at most 192x108 whatever the reported dimensions;
/// their colors depend on the seek position so consecutive frames differ.
#[derive(Debug, Clone)]
pub struct MockDecoder {
    available: bool,
    open_failure: Option<String>,
    duration: Option<f64>,
    dimensions: (u32, u32),
    stall_seeks: bool,
    seeks: Arc<Mutex<Vec<f64>>>,
}

impl MockDecoder {
    /// Decoder for a clip of `duration` seconds at `width`x`height`
    #[must_use]
    pub fn new(duration: Option<f64>, width: u32, height: u32) -> Self {
        Self {
            available: true,
            open_failure: None,
            duration,
            dimensions: (width, height),
            stall_seeks: false,
            seeks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Decoder reporting that it cannot run
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Some(1.0), 16, 16)
        }
    }

    /// Decoder whose `open` fails with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            open_failure: Some(message.into()),
            ..Self::new(Some(1.0), 16, 16)
        }
    }

    /// Never signal seek completion
    #[must_use]
    pub const fn with_stalled_seeks(mut self) -> Self {
        self.stall_seeks = true;
        self
    }

    /// Every requested seek position, in order
    #[must_use]
    pub fn seek_log(&self) -> Vec<f64> {
        lock(&self.seeks).clone()
    }
}

#[async_trait]
impl VideoDecoder for MockDecoder {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self, _source: &MediaResource) -> TranscodeResult<Box<dyn DecodedVideo>> {
        if let Some(message) = &self.open_failure {
            return Err(TranscodeError::unreadable(message.clone()));
        }
        Ok(Box::new(MockVideo {
            duration: self.duration,
            dimensions: self.dimensions,
            stall_seeks: self.stall_seeks,
            seeks: Arc::clone(&self.seeks),
            position: 0.0,
        }))
    }
}

struct MockVideo {
    duration: Option<f64>,
    dimensions: (u32, u32),
    stall_seeks: bool,
    seeks: Arc<Mutex<Vec<f64>>>,
    position: f64,
}

#[async_trait]
impl DecodedVideo for MockVideo {
    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    async fn seek(&mut self, seconds: f64) -> TranscodeResult<()> {
        lock(&self.seeks).push(seconds);
        if self.stall_seeks {
            std::future::pending::<()>().await;
        }
        self.position = seconds;
        Ok(())
    }

    fn current_frame(&mut self) -> TranscodeResult<RgbaImage> {
        let width = self.dimensions.0.clamp(1, 192);
        let height = self.dimensions.1.clamp(1, 108);
        let shade = ((self.position * 40.0) as u32 % 256) as u8;
        Ok(RgbaImage::from_fn(width, height, |x, y| {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            Rgba([r, g, shade, 255])
        }))
    }
}

/// Capture backend replaying scripted chunks
#[derive(Debug, Clone)]
pub struct MockCapture {
    can_capture: bool,
    supported: Option<Vec<String>>,
    chunks: Vec<Vec<u8>>,
    playback_failure: Option<String>,
    gate: Option<Arc<Semaphore>>,
    started: Arc<Mutex<Vec<String>>>,
}

impl MockCapture {
    /// Backend that records `chunks` and supports every recording type
    #[must_use]
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            can_capture: true,
            supported: None,
            chunks,
            playback_failure: None,
            gate: None,
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend without capture support
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            can_capture: false,
            ..Self::new(Vec::new())
        }
    }

    /// Restrict the accepted recording types
    #[must_use]
    pub fn with_supported_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Make playback fail to start
    #[must_use]
    pub fn with_playback_failure(mut self, message: impl Into<String>) -> Self {
        self.playback_failure = Some(message.into());
        self
    }

    /// Hold playback until [`MockCapture::release`] is called
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one gated playback start
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Number of capture sessions started
    #[must_use]
    pub fn start_count(&self) -> usize {
        lock(&self.started).len()
    }

    /// Recording type of every started session
    #[must_use]
    pub fn started_types(&self) -> Vec<String> {
        lock(&self.started).clone()
    }
}

#[async_trait]
impl CaptureBackend for MockCapture {
    fn can_capture(&self) -> bool {
        self.can_capture
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == mime_type))
    }

    async fn start(
        &self,
        _source: &MediaResource,
        mime_type: &str,
    ) -> TranscodeResult<Box<dyn RecordingSession>> {
        lock(&self.started).push(mime_type.to_string());
        Ok(Box::new(MockRecording {
            chunks: self.chunks.iter().cloned().collect(),
            playback_failure: self.playback_failure.clone(),
            gate: self.gate.clone(),
        }))
    }
}

struct MockRecording {
    chunks: VecDeque<Vec<u8>>,
    playback_failure: Option<String>,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl RecordingSession for MockRecording {
    async fn play(&mut self) -> TranscodeResult<()> {
        if let Some(message) = &self.playback_failure {
            return Err(TranscodeError::PlaybackFailed {
                message: message.clone(),
            });
        }
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| TranscodeError::PlaybackFailed {
                    message: e.to_string(),
                })?
                .forget();
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<TranscodeResult<Vec<u8>>> {
        self.chunks.pop_front().map(Ok)
    }
}

/// Failure with the wording the service uses for a missing model or key
#[must_use]
pub fn not_found_failure() -> GenerationFailure {
    GenerationFailure::new("Requested entity was not found.")
}
