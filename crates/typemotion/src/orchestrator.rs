//! Generation orchestrator.
//!
//! Owns the single [`GenerationState`] of a session together with the
//! simulated progress, the export flags and the style draft. All mutation
//! happens under one lock, and every state change goes through
//! `Inner::transition`, which revokes the handles the new state no longer
//! holds and stops the progress ticker of the stage being left.
//!
//! Nothing here cancels an in-flight service call. Each submission takes a
//! run number; a result arriving for a run that is no longer current is
//! dropped without touching the session.

use crate::capabilities::{
    CredentialGate, DownloadSink, GenerationService, ImageGenerationParams, VideoGenerationParams,
};
use crate::config::TypeMotionConfig;
use crate::error::{ExportError, GenerationFailure, TranscodeError};
use crate::export::{download_name_now, ExportFormat};
use crate::media::{HandleRegistry, MediaResource, PublishedMedia};
use crate::presets::{random_label, random_style, style_by_id};
use crate::progress::{advance, ProgressTicker, Stage, Tick};
use crate::request::GenerationRequest;
use crate::state::{ExportFlags, GenerationState, ProgressSample, SessionEvent, SessionSnapshot};
use crate::transcode::MediaTranscoder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

/// Message shown when the service fails without saying why
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong creating your art.";

const EVENT_CAPACITY: usize = 256;

/// How a call to [`Orchestrator::submit`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank message, nothing happened
    Ignored,
    /// The credential gate was asked for a credential; state is `Idle`
    CredentialRequested,
    /// Both stages succeeded; state is `Playing`
    Completed,
    /// A stage failed; state is `Error` with this message
    Failed(String),
    /// A reset or newer submission overtook this run; its result was dropped
    Superseded,
}

struct Session {
    state: GenerationState,
    progress: f64,
    label: String,
    exports: ExportFlags,
    run: u64,
    phase: u64,
    next_job: u64,
    ticker: Option<ProgressTicker>,
    style_draft: String,
    /// Style suggestions in flight
    suggesting: usize,
    rng: StdRng,
}

struct Inner {
    session: Mutex<Session>,
    events: broadcast::Sender<SessionEvent>,
    service: Arc<dyn GenerationService>,
    registry: HandleRegistry,
    config: TypeMotionConfig,
    gif: Option<Arc<dyn MediaTranscoder>>,
    webm: Option<Arc<dyn MediaTranscoder>>,
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    service: Arc<dyn GenerationService>,
    config: TypeMotionConfig,
    registry: HandleRegistry,
    gif: Option<Arc<dyn MediaTranscoder>>,
    webm: Option<Arc<dyn MediaTranscoder>>,
}

impl OrchestratorBuilder {
    /// Use `config` instead of the defaults
    #[must_use]
    pub fn with_config(mut self, config: TypeMotionConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish media through `registry`
    #[must_use]
    pub fn with_registry(mut self, registry: HandleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Transcoder used for [`ExportFormat::Gif`]
    #[must_use]
    pub fn with_gif_transcoder(mut self, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        self.gif = Some(transcoder);
        self
    }

    /// Transcoder used for [`ExportFormat::WebM`]
    #[must_use]
    pub fn with_webm_transcoder(mut self, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        self.webm = Some(transcoder);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Orchestrator {
        let rng = self
            .config
            .rng_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Orchestrator {
            inner: Arc::new(Inner {
                session: Mutex::new(Session {
                    state: GenerationState::Idle,
                    progress: 0.0,
                    label: String::new(),
                    exports: ExportFlags::default(),
                    run: 0,
                    phase: 0,
                    next_job: 0,
                    ticker: None,
                    style_draft: String::new(),
                    suggesting: 0,
                    rng,
                }),
                events,
                service: self.service,
                registry: self.registry,
                config: self.config,
                gif: self.gif,
                webm: self.webm,
            }),
        }
    }
}

/// Drives the two-stage generation and the exports of one session.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.lock();
        f.debug_struct("Orchestrator")
            .field("state", &session.state.kind())
            .field("progress", &session.progress)
            .field("exports", &session.exports)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start building an orchestrator around `service`
    #[must_use]
    pub fn builder(service: Arc<dyn GenerationService>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            service,
            config: TypeMotionConfig::default(),
            registry: HandleRegistry::new(),
            gif: None,
            webm: None,
        }
    }

    /// Orchestrator with default configuration and no transcoders
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self::builder(service).build()
    }

    /// Registry through which keyframes, videos and exports are published
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry {
        &self.inner.registry
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &TypeMotionConfig {
        &self.inner.config
    }

    /// Receive every subsequent [`SessionEvent`]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Read-only copy of the session
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.lock();
        SessionSnapshot {
            state: session.state.clone(),
            progress: ProgressSample {
                percent: session.progress,
                label: session.label.clone(),
            },
            exports: session.exports,
            suggesting_style: session.suggesting > 0,
            style_draft: session.style_draft.clone(),
        }
    }

    /// Run both generation stages for `request`.
    ///
    /// Returns once the run has reached `Playing`, `Error` or `Idle`, or has
    /// been overtaken by a reset or a newer submission.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        gate: &dyn CredentialGate,
    ) -> SubmitOutcome {
        if request.is_blank() {
            tracing::debug!("ignoring submission with blank message");
            return SubmitOutcome::Ignored;
        }
        if !gate.has_credential().await {
            tracing::info!("no credential, requesting one");
            gate.request_credential().await;
            return SubmitOutcome::CredentialRequested;
        }

        let inner = &self.inner;
        let (run, style) = {
            let mut session = inner.lock();
            session.run += 1;
            let style = match request.explicit_style() {
                Some(style) => style.to_string(),
                None => random_style(&mut session.rng).to_string(),
            };
            inner.clear_exports(&mut session);
            session.progress = inner.config.progress.seed;
            session.label = Stage::Image.initial_label().to_string();
            inner.transition(&mut session, GenerationState::GeneratingImage);
            inner.start_ticker(&mut session, Stage::Image);
            (session.run, style)
        };

        let quality = request.quality();
        tracing::info!(
            run,
            message = request.message(),
            style = %style,
            quality = %quality,
            image_size = quality.image_size().as_str(),
            "generation submitted"
        );

        let image = inner
            .service
            .generate_image(ImageGenerationParams {
                message: request.message().to_string(),
                style: style.clone(),
                typography: request.typography().to_string(),
                reference_image: request.reference_image().cloned(),
                image_size: quality.image_size(),
            })
            .await;
        let keyframe = match image {
            Ok(keyframe) => keyframe,
            Err(failure) => return inner.fail(run, &failure, gate).await,
        };

        let keyframe = {
            let mut session = inner.lock();
            if session.run != run {
                tracing::info!(run, "dropping keyframe of superseded run");
                return SubmitOutcome::Superseded;
            }
            let keyframe = inner.registry.publish(keyframe);
            session.progress = inner.config.progress.image_cap;
            session.label = Stage::Video.initial_label().to_string();
            inner.transition(
                &mut session,
                GenerationState::GeneratingVideo {
                    keyframe: keyframe.clone(),
                },
            );
            inner.start_ticker(&mut session, Stage::Video);
            keyframe.resource
        };

        let video = inner
            .service
            .generate_video(VideoGenerationParams {
                message: request.message().to_string(),
                keyframe,
                style,
                quality,
            })
            .await;
        let video = match video {
            Ok(video) => video,
            Err(failure) => return inner.fail(run, &failure, gate).await,
        };

        let mut session = inner.lock();
        if session.run != run {
            tracing::info!(run, "dropping video of superseded run");
            return SubmitOutcome::Superseded;
        }
        let Some(keyframe) = session.state.keyframe().cloned() else {
            return SubmitOutcome::Superseded;
        };
        let video = inner.registry.publish(video);
        session.progress = 100.0;
        inner.transition(&mut session, GenerationState::Playing { keyframe, video });
        SubmitOutcome::Completed
    }

    /// Return to `Idle` from any state, dropping media and export flags
    pub fn reset(&self) {
        let inner = &self.inner;
        let mut session = inner.lock();
        session.run += 1;
        session.progress = 0.0;
        session.label.clear();
        inner.clear_exports(&mut session);
        inner.transition(&mut session, GenerationState::Idle);
    }

    /// Current editable style text
    #[must_use]
    pub fn style_draft(&self) -> String {
        self.inner.lock().style_draft.clone()
    }

    /// Replace the editable style text
    pub fn set_style_draft(&self, style: impl Into<String>) {
        self.inner.lock().style_draft = style.into();
    }

    /// Copy a preset's prompt into the style draft. Returns `false` for an
    /// unknown id.
    pub fn apply_preset(&self, id: &str) -> bool {
        match style_by_id(id) {
            Some(preset) => {
                self.set_style_draft(preset.prompt);
                true
            }
            None => false,
        }
    }

    /// Ask the service for a style matching `message`.
    ///
    /// A non-blank suggestion replaces the style draft and is returned.
    /// Failures are logged and swallowed; the generation state is never
    /// touched.
    pub async fn suggest_style(&self, message: &str) -> Option<String> {
        let inner = &self.inner;
        inner.lock().suggesting += 1;

        let result = inner.service.suggest_style(message).await;

        let mut session = inner.lock();
        session.suggesting = session.suggesting.saturating_sub(1);
        match result {
            Ok(suggestion) if !suggestion.trim().is_empty() => {
                let suggestion = suggestion.trim().to_string();
                session.style_draft.clone_from(&suggestion);
                inner.emit(SessionEvent::StyleSuggested(suggestion.clone()));
                Some(suggestion)
            }
            Ok(_) => {
                tracing::debug!("style suggestion was empty");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "style suggestion failed");
                None
            }
        }
    }

    /// Save the finished video in `format` through `sink`.
    ///
    /// GIF and WebM are transcoded first; at most one export per transcoded
    /// format runs at a time and a second request is rejected. The generation
    /// state is never changed, whatever the outcome.
    pub async fn export(
        &self,
        format: ExportFormat,
        sink: &dyn DownloadSink,
    ) -> Result<PathBuf, ExportError> {
        let inner = &self.inner;
        let (video, job) = {
            let mut session = inner.lock();
            let video = session
                .state
                .video()
                .map(|video| video.resource.clone())
                .ok_or(ExportError::NothingToExport)?;
            session.next_job += 1;
            let job = session.next_job;
            if !session.exports.try_claim(format, job) {
                tracing::warn!(%format, "export already in progress");
                return Err(ExportError::AlreadyInFlight(format));
            }
            if format.is_transcoded() {
                inner.emit(SessionEvent::ExportChanged {
                    format,
                    running: true,
                });
            }
            (video, job)
        };

        tracing::info!(%format, job, "export started");
        let result = inner.run_export(format, &video, sink).await;

        if format.is_transcoded() {
            let mut session = inner.lock();
            if session.exports.is_running(format) {
                session.exports.release(format, job);
                if !session.exports.is_running(format) {
                    inner.emit(SessionEvent::ExportChanged {
                        format,
                        running: false,
                    });
                }
            }
        }

        match &result {
            Ok(path) => tracing::info!(%format, path = %path.display(), "export saved"),
            Err(e) => tracing::warn!(%format, error = %e, "export failed"),
        }
        result
    }

    /// Save the keyframe of the current run through `sink`
    pub async fn save_keyframe(&self, sink: &dyn DownloadSink) -> Result<PathBuf, ExportError> {
        let keyframe = self
            .inner
            .lock()
            .state
            .keyframe()
            .map(|keyframe| keyframe.resource.clone())
            .ok_or(ExportError::NothingToExport)?;
        let file_name = download_name_now(keyframe.extension());
        Ok(sink.save(&keyframe, &file_name).await?)
    }
}

/// Last clone gone: release whatever the session still publishes.
impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker) = session.ticker.take() {
            ticker.stop();
        }
        for handle in session.state.handles() {
            self.registry.revoke(handle);
        }
        tracing::debug!(kind = %session.state.kind(), "session torn down");
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Replace the state, revoking handles it no longer holds and stopping
    /// the ticker of the stage being left.
    fn transition(&self, session: &mut Session, next: GenerationState) {
        let previous = std::mem::replace(&mut session.state, next);
        let kept = session.state.handles();
        for handle in previous.handles() {
            if !kept.contains(&handle) {
                self.registry.revoke(handle);
            }
        }

        session.phase += 1;
        if let Some(ticker) = session.ticker.take() {
            ticker.stop();
        }

        let (from, to) = (previous.kind(), session.state.kind());
        if !to.is_generating() {
            session.label.clear();
        }
        tracing::info!(%from, %to, progress = session.progress, "state changed");
        self.emit(SessionEvent::StateChanged {
            from,
            to,
            progress: session.progress,
        });
    }

    fn start_ticker(self: &Arc<Self>, session: &mut Session, stage: Stage) {
        let phase = session.phase;
        let weak: Weak<Self> = Arc::downgrade(self);
        session.ticker = Some(ProgressTicker::start(&self.config.progress, move |tick| {
            weak.upgrade()
                .is_some_and(|inner| inner.on_tick(phase, stage, tick))
        }));
        self.emit(SessionEvent::Progress(ProgressSample {
            percent: session.progress,
            label: session.label.clone(),
        }));
    }

    /// Apply one tick. Returns `false` once the stage it belongs to is over.
    fn on_tick(&self, phase: u64, stage: Stage, tick: Tick) -> bool {
        let mut session = self.lock();
        if session.phase != phase {
            return false;
        }
        match tick {
            Tick::Label => {
                let label = random_label(stage.labels(), &mut session.rng);
                session.label = label.to_string();
            }
            Tick::Progress => {
                let jitter: f64 = session.rng.gen();
                let cap = stage.cap(&self.config.progress);
                let next = advance(session.progress, cap, &self.config.progress, jitter);
                if next == session.progress {
                    return true;
                }
                session.progress = next;
            }
        }
        self.emit(SessionEvent::Progress(ProgressSample {
            percent: session.progress,
            label: session.label.clone(),
        }));
        true
    }

    fn clear_exports(&self, session: &mut Session) {
        for format in ExportFormat::ALL {
            if session.exports.is_running(format) {
                self.emit(SessionEvent::ExportChanged {
                    format,
                    running: false,
                });
            }
        }
        session.exports.clear();
    }

    async fn fail(
        &self,
        run: u64,
        failure: &GenerationFailure,
        gate: &dyn CredentialGate,
    ) -> SubmitOutcome {
        let credential = failure.is_credential_problem(&self.config.credential_markers);
        let message = {
            let mut session = self.lock();
            if session.run != run {
                tracing::info!(run, error = %failure, "dropping failure of superseded run");
                return SubmitOutcome::Superseded;
            }
            session.progress = 0.0;
            if credential {
                self.transition(&mut session, GenerationState::Idle);
                None
            } else {
                let message = if failure.message.trim().is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    failure.message.clone()
                };
                self.transition(
                    &mut session,
                    GenerationState::Error {
                        message: message.clone(),
                    },
                );
                Some(message)
            }
        };

        match message {
            Some(message) => {
                tracing::error!(run, error = %message, "generation failed");
                SubmitOutcome::Failed(message)
            }
            None => {
                tracing::warn!(run, error = %failure, "credential rejected, requesting a new one");
                gate.request_credential().await;
                SubmitOutcome::CredentialRequested
            }
        }
    }

    fn transcoder(&self, format: ExportFormat) -> Option<&Arc<dyn MediaTranscoder>> {
        match format {
            ExportFormat::Mp4 => None,
            ExportFormat::Gif => self.gif.as_ref(),
            ExportFormat::WebM => self.webm.as_ref(),
        }
    }

    async fn run_export(
        &self,
        format: ExportFormat,
        video: &MediaResource,
        sink: &dyn DownloadSink,
    ) -> Result<PathBuf, ExportError> {
        let file_name = download_name_now(format.extension());
        if !format.is_transcoded() {
            return Ok(sink.save(video, &file_name).await?);
        }

        let transcoder = self.transcoder(format).ok_or_else(|| {
            TranscodeError::unavailable(format!("no {format} transcoder configured"))
        })?;
        let output = transcoder.transcode(video).await?;

        let published: PublishedMedia = self.registry.publish(output);
        let saved = sink.save(&published.resource, &file_name).await;
        self.registry.revoke(&published.handle);
        Ok(saved?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{
        not_found_failure, MemorySink, MockCapture, MockCredentialGate, MockDecoder,
        MockGenerationService,
    };
    use crate::presets::STYLE_PRESETS;
    use crate::request::{ImageSize, QualityTier};
    use crate::state::StateKind;
    use crate::transcode::{AnimatedImageTranscoder, StreamTranscoder};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    fn orchestrator(service: &MockGenerationService) -> Orchestrator {
        Orchestrator::builder(Arc::new(service.clone()))
            .with_config(TypeMotionConfig::default().with_rng_seed(7))
            .build()
    }

    fn request(message: &str) -> GenerationRequest {
        GenerationRequest::new(message).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => {}
                Err(_) => return events,
            }
        }
    }

    fn transitions(events: &[SessionEvent]) -> Vec<(StateKind, StateKind, f64)> {
        events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::StateChanged { from, to, progress } => Some((*from, *to, *progress)),
                _ => None,
            })
            .collect()
    }

    async fn playing(service: &MockGenerationService) -> Orchestrator {
        let orchestrator = orchestrator(service);
        let gate = MockCredentialGate::granted();
        assert_eq!(
            orchestrator.submit(&request("HELLO"), &gate).await,
            SubmitOutcome::Completed
        );
        orchestrator
    }

    mod submit_tests {
        use super::*;

        #[tokio::test]
        async fn test_blank_message_ignored() {
            let service = MockGenerationService::new();
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::granted();
            let mut rx = orchestrator.subscribe();

            for message in ["", "   ", "\t\n"] {
                assert_eq!(
                    orchestrator.submit(&request(message), &gate).await,
                    SubmitOutcome::Ignored
                );
            }
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
            assert!(drain(&mut rx).is_empty());
            assert!(service.calls().is_empty());
        }

        #[tokio::test]
        async fn test_missing_credential_requests_one() {
            let service = MockGenerationService::new();
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::missing();

            assert_eq!(
                orchestrator.submit(&request("HELLO"), &gate).await,
                SubmitOutcome::CredentialRequested
            );
            assert_eq!(gate.request_count(), 1);
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
            assert!(service.calls().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_successful_run_sequence() {
            let service = MockGenerationService::new()
                .with_image_delay(Duration::from_secs(4))
                .with_video_delay(Duration::from_secs(9));
            let orchestrator = orchestrator(&service);
            let mut rx = orchestrator.subscribe();
            let gate = MockCredentialGate::granted();

            assert_eq!(
                orchestrator.submit(&request("HELLO"), &gate).await,
                SubmitOutcome::Completed
            );

            let events = drain(&mut rx);
            assert_eq!(
                transitions(&events),
                vec![
                    (StateKind::Idle, StateKind::GeneratingImage, 5.0),
                    (StateKind::GeneratingImage, StateKind::GeneratingVideo, 30.0),
                    (StateKind::GeneratingVideo, StateKind::Playing, 100.0),
                ]
            );

            // progress never decreases within a stage and respects the caps
            let mut last = 0.0;
            let mut stage_cap = 30.0;
            let mut ticks = 0;
            for event in &events {
                match event {
                    SessionEvent::StateChanged { to, progress, .. } => {
                        last = *progress;
                        stage_cap = if *to == StateKind::GeneratingVideo { 95.0 } else { 30.0 };
                    }
                    SessionEvent::Progress(sample) if last < 100.0 => {
                        assert!(sample.percent >= last);
                        assert!(sample.percent <= stage_cap);
                        last = sample.percent;
                        ticks += 1;
                    }
                    _ => {}
                }
            }
            assert!(ticks > 20);

            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.kind(), StateKind::Playing);
            assert_eq!(snapshot.progress.percent, 100.0);
            assert!(snapshot.state.keyframe().is_some());
            assert!(snapshot.state.video().is_some());
            assert_eq!(orchestrator.registry().live_count(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_ticks_after_playing() {
            let service = MockGenerationService::new().with_video_delay(Duration::from_secs(3));
            let orchestrator = playing(&service).await;
            let mut rx = orchestrator.subscribe();

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert!(drain(&mut rx).is_empty());
            assert_eq!(orchestrator.snapshot().progress.percent, 100.0);
        }

        #[tokio::test]
        async fn test_credential_failure_returns_to_idle() {
            for failure in [
                not_found_failure(),
                GenerationFailure::new("HTTP 404: models/veo not found"),
            ] {
                let service = MockGenerationService::new().with_video_result(Err(failure));
                let orchestrator = orchestrator(&service);
                let gate = MockCredentialGate::granted();

                assert_eq!(
                    orchestrator.submit(&request("HELLO"), &gate).await,
                    SubmitOutcome::CredentialRequested
                );
                assert_eq!(gate.request_count(), 1);
                let snapshot = orchestrator.snapshot();
                assert_eq!(snapshot.kind(), StateKind::Idle);
                assert!(snapshot.state.error_message().is_none());
                assert_eq!(orchestrator.registry().live_count(), 0);
            }
        }

        #[tokio::test]
        async fn test_other_failure_preserved_verbatim() {
            let message = "The prompt was blocked: SAFETY (category 3)";
            let service =
                MockGenerationService::new().with_image_result(Err(GenerationFailure::new(message)));
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::granted();

            assert_eq!(
                orchestrator.submit(&request("HELLO"), &gate).await,
                SubmitOutcome::Failed(message.to_string())
            );
            assert_eq!(gate.request_count(), 0);
            assert_eq!(orchestrator.snapshot().state.error_message(), Some(message));
            assert!(service.video_calls().is_empty());
        }

        #[tokio::test]
        async fn test_empty_failure_uses_fallback() {
            let service =
                MockGenerationService::new().with_video_result(Err(GenerationFailure::new("")));
            let orchestrator = orchestrator(&service);
            let outcome = orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;
            assert_eq!(outcome, SubmitOutcome::Failed(FALLBACK_ERROR_MESSAGE.to_string()));
            // the keyframe is dropped along with the failed run
            assert_eq!(orchestrator.registry().live_count(), 0);
        }

        #[tokio::test]
        async fn test_aurora_scenario() {
            let service = MockGenerationService::new();
            let orchestrator = orchestrator(&service);
            let request = request("AURORA").with_style("").with_quality(QualityTier::Mid);

            assert_eq!(
                orchestrator
                    .submit(&request, &MockCredentialGate::granted())
                    .await,
                SubmitOutcome::Completed
            );

            let image_calls = service.image_calls();
            assert_eq!(image_calls.len(), 1);
            assert_eq!(image_calls[0].image_size, ImageSize::TwoK);
            assert!(!image_calls[0].style.is_empty());
            assert!(STYLE_PRESETS.iter().any(|p| p.prompt == image_calls[0].style));

            let video_calls = service.video_calls();
            assert_eq!(video_calls[0].style, image_calls[0].style);
            assert_eq!(video_calls[0].quality, QualityTier::Mid);
            assert_eq!(video_calls[0].keyframe, MockGenerationService::placeholder_keyframe());

            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.kind(), StateKind::Playing);
            assert!(snapshot.state.keyframe().is_some());
            assert!(snapshot.state.video().is_some());
        }

        #[tokio::test]
        async fn test_explicit_style_and_reference_forwarded() {
            let service = MockGenerationService::new();
            let orchestrator = orchestrator(&service);
            let reference = MediaResource::new(vec![1u8, 2, 3], "image/jpeg");
            let request = request("NEON")
                .with_style("  chrome liquid  ")
                .with_typography("bold serif")
                .with_reference_image(reference.clone())
                .with_quality(QualityTier::High);

            orchestrator
                .submit(&request, &MockCredentialGate::granted())
                .await;
            let call = &service.image_calls()[0];
            assert_eq!(call.style, "chrome liquid");
            assert_eq!(call.typography, "bold serif");
            assert_eq!(call.reference_image, Some(reference));
            assert_eq!(call.image_size, ImageSize::FourK);
        }

        #[tokio::test]
        async fn test_resubmission_revokes_previous_media() {
            let service = MockGenerationService::new();
            let orchestrator = playing(&service).await;
            let first = orchestrator.snapshot();
            let old_handles: Vec<_> = first.state.handles().into_iter().cloned().collect();

            orchestrator
                .submit(&request("AGAIN"), &MockCredentialGate::granted())
                .await;
            for handle in &old_handles {
                assert!(!orchestrator.registry().is_live(handle));
            }
            assert_eq!(orchestrator.registry().live_count(), 2);
        }
    }

    mod staleness_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_reset_during_image_stage_discards_result() {
            let service = MockGenerationService::new().with_image_delay(Duration::from_secs(5));
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::granted();

            let background = orchestrator.clone();
            let run = tokio::spawn(async move {
                background
                    .submit(&GenerationRequest::new("LATE").unwrap(), &gate)
                    .await
            });

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(orchestrator.snapshot().kind(), StateKind::GeneratingImage);
            orchestrator.reset();

            assert_eq!(run.await.unwrap(), SubmitOutcome::Superseded);
            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.kind(), StateKind::Idle);
            assert_eq!(snapshot.progress.percent, 0.0);
            assert_eq!(orchestrator.registry().live_count(), 0);
            assert!(service.video_calls().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_reset_during_video_stage_revokes_keyframe() {
            let service = MockGenerationService::new().with_video_delay(Duration::from_secs(5));
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::granted();

            let background = orchestrator.clone();
            let run = tokio::spawn(async move {
                background
                    .submit(&GenerationRequest::new("LATE").unwrap(), &gate)
                    .await
            });

            tokio::time::sleep(Duration::from_secs(1)).await;
            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.kind(), StateKind::GeneratingVideo);
            let keyframe = snapshot.state.keyframe().unwrap().handle.clone();
            assert!(orchestrator.registry().is_live(&keyframe));

            orchestrator.reset();
            assert!(orchestrator.registry().resolve(&keyframe).is_none());

            assert_eq!(run.await.unwrap(), SubmitOutcome::Superseded);
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
            assert_eq!(orchestrator.registry().live_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_reset_stops_progress() {
            let service = MockGenerationService::new().with_image_delay(Duration::from_secs(60));
            let orchestrator = orchestrator(&service);
            let gate = MockCredentialGate::granted();
            let background = orchestrator.clone();
            let _run = tokio::spawn(async move {
                background
                    .submit(&GenerationRequest::new("SLOW").unwrap(), &gate)
                    .await
            });

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(orchestrator.snapshot().progress.percent > 5.0);

            orchestrator.reset();
            let mut rx = orchestrator.subscribe();
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(drain(&mut rx).is_empty());
            assert_eq!(orchestrator.snapshot().progress.percent, 0.0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_newer_submission_wins() {
            let service = MockGenerationService::new()
                .with_image_delay(Duration::from_secs(2))
                .with_image_result(Err(GenerationFailure::new("first run failure")));
            let orchestrator = orchestrator(&service);

            let background = orchestrator.clone();
            let first = tokio::spawn(async move {
                background
                    .submit(
                        &GenerationRequest::new("ONE").unwrap(),
                        &MockCredentialGate::granted(),
                    )
                    .await
            });
            tokio::time::sleep(Duration::from_millis(500)).await;

            let second = orchestrator
                .submit(&request("TWO"), &MockCredentialGate::granted())
                .await;
            assert_eq!(first.await.unwrap(), SubmitOutcome::Superseded);
            assert_eq!(second, SubmitOutcome::Completed);
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Playing);
        }
    }

    mod reset_tests {
        use super::*;

        #[tokio::test]
        async fn test_reset_from_playing_is_idempotent() {
            let service = MockGenerationService::new();
            let orchestrator = playing(&service).await;

            for _ in 0..3 {
                orchestrator.reset();
                let snapshot = orchestrator.snapshot();
                assert_eq!(snapshot.kind(), StateKind::Idle);
                assert_eq!(snapshot.progress.percent, 0.0);
                assert!(snapshot.state.keyframe().is_none());
                assert!(snapshot.state.video().is_none());
                assert!(!snapshot.exports.any_running());
                assert_eq!(orchestrator.registry().live_count(), 0);
            }
        }

        #[tokio::test]
        async fn test_reset_from_error() {
            let service =
                MockGenerationService::new().with_image_result(Err(GenerationFailure::new("boom")));
            let orchestrator = orchestrator(&service);
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Error);

            orchestrator.reset();
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
        }

        #[tokio::test(start_paused = true)]
        async fn test_reset_clears_export_flag() {
            let capture = MockCapture::new(vec![b"webm".to_vec()]).gated();
            let service = MockGenerationService::new();
            let orchestrator = Orchestrator::builder(Arc::new(service))
                .with_webm_transcoder(Arc::new(StreamTranscoder::new(capture.clone())))
                .build();
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;

            let background = orchestrator.clone();
            let export = tokio::spawn(async move {
                background.export(ExportFormat::WebM, &MemorySink::new()).await
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(orchestrator.snapshot().exports.is_running(ExportFormat::WebM));

            orchestrator.reset();
            assert!(!orchestrator.snapshot().exports.any_running());

            capture.release();
            assert!(export.await.unwrap().is_ok());
            assert!(!orchestrator.snapshot().exports.any_running());
        }

        #[tokio::test]
        async fn test_dropping_playing_session_revokes_handles() {
            let registry = HandleRegistry::new();
            let orchestrator = Orchestrator::builder(Arc::new(MockGenerationService::new()))
                .with_registry(registry.clone())
                .build();
            let clone = orchestrator.clone();
            assert_eq!(
                orchestrator
                    .submit(&request("HELLO"), &MockCredentialGate::granted())
                    .await,
                SubmitOutcome::Completed
            );
            assert_eq!(registry.live_count(), 2);

            drop(orchestrator);
            assert_eq!(registry.live_count(), 2);
            drop(clone);
            tokio::task::yield_now().await;
            assert_eq!(registry.live_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_dropping_generating_session_stops_ticker() {
            let registry = HandleRegistry::new();
            let service = MockGenerationService::new().with_video_delay(Duration::from_secs(60));
            let orchestrator = Orchestrator::builder(Arc::new(service))
                .with_registry(registry.clone())
                .build();

            let background = orchestrator.clone();
            let run = tokio::spawn(async move {
                background
                    .submit(&request("HELLO"), &MockCredentialGate::granted())
                    .await
            });
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(orchestrator.snapshot().kind(), StateKind::GeneratingVideo);
            assert_eq!(registry.live_count(), 1);

            run.abort();
            let _ = run.await;
            let mut rx = orchestrator.subscribe();
            drop(orchestrator);
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(registry.live_count(), 0);
            assert!(matches!(
                rx.try_recv(),
                Err(TryRecvError::Closed)
            ));
        }
    }

    mod style_tests {
        use super::*;

        #[tokio::test]
        async fn test_suggestion_overwrites_draft() {
            let service =
                MockGenerationService::new().with_style_result(Ok(" molten gold ".to_string()));
            let orchestrator = orchestrator(&service);
            orchestrator.set_style_draft("old");

            assert_eq!(
                orchestrator.suggest_style("HELLO").await,
                Some("molten gold".to_string())
            );
            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.style_draft, "molten gold");
            assert!(!snapshot.suggesting_style);
        }

        #[tokio::test]
        async fn test_empty_or_failed_suggestion_keeps_draft() {
            let service = MockGenerationService::new()
                .with_style_result(Ok("   ".to_string()))
                .with_style_result(Err(GenerationFailure::new("quota")));
            let orchestrator = orchestrator(&service);
            orchestrator.set_style_draft("keep me");

            assert_eq!(orchestrator.suggest_style("HELLO").await, None);
            assert_eq!(orchestrator.suggest_style("HELLO").await, None);
            let snapshot = orchestrator.snapshot();
            assert_eq!(snapshot.style_draft, "keep me");
            assert!(!snapshot.suggesting_style);
            assert_eq!(snapshot.kind(), StateKind::Idle);
        }

        #[tokio::test(start_paused = true)]
        async fn test_overlapping_suggestions_keep_flag_until_last_finishes() {
            let service = MockGenerationService::new()
                .with_style_result(Ok("first".to_string()))
                .with_style_result(Ok("second".to_string()))
                .with_style_delay(Duration::from_millis(100));
            let orchestrator = orchestrator(&service);

            let early = orchestrator.clone();
            let first = tokio::spawn(async move { early.suggest_style("HELLO").await });
            tokio::time::sleep(Duration::from_millis(50)).await;
            let late = orchestrator.clone();
            let second = tokio::spawn(async move { late.suggest_style("HELLO").await });

            assert_eq!(first.await.unwrap(), Some("first".to_string()));
            assert!(orchestrator.snapshot().suggesting_style);

            assert_eq!(second.await.unwrap(), Some("second".to_string()));
            let snapshot = orchestrator.snapshot();
            assert!(!snapshot.suggesting_style);
            assert_eq!(snapshot.style_draft, "second");
        }

        #[test]
        fn test_apply_preset() {
            let orchestrator = orchestrator(&MockGenerationService::new());
            let preset = &STYLE_PRESETS[0];
            assert!(orchestrator.apply_preset(preset.id));
            assert_eq!(orchestrator.style_draft(), preset.prompt);
            assert!(!orchestrator.apply_preset("no-such-preset"));
        }
    }

    mod export_tests {
        use super::*;

        fn with_transcoders(service: &MockGenerationService, capture: &MockCapture) -> Orchestrator {
            Orchestrator::builder(Arc::new(service.clone()))
                .with_gif_transcoder(Arc::new(AnimatedImageTranscoder::new(MockDecoder::new(
                    Some(0.5),
                    64,
                    36,
                ))))
                .with_webm_transcoder(Arc::new(StreamTranscoder::new(capture.clone())))
                .build()
        }

        #[tokio::test]
        async fn test_nothing_to_export_before_playing() {
            let orchestrator = orchestrator(&MockGenerationService::new());
            let sink = MemorySink::new();
            for format in ExportFormat::ALL {
                assert!(matches!(
                    orchestrator.export(format, &sink).await,
                    Err(ExportError::NothingToExport)
                ));
            }
            assert!(matches!(
                orchestrator.save_keyframe(&sink).await,
                Err(ExportError::NothingToExport)
            ));
        }

        #[tokio::test]
        async fn test_native_export_saves_video() {
            let service = MockGenerationService::new();
            let orchestrator = playing(&service).await;
            let sink = MemorySink::new();

            let path = orchestrator.export(ExportFormat::Mp4, &sink).await.unwrap();
            let saved = sink.saved();
            assert_eq!(saved.len(), 1);
            assert!(path.to_string_lossy().ends_with(".mp4"));
            assert!(saved[0].0.starts_with("typemotion-"));
            assert_eq!(saved[0].1, MockGenerationService::placeholder_video());
        }

        #[tokio::test]
        async fn test_gif_export_publishes_then_revokes() {
            let service = MockGenerationService::new();
            let capture = MockCapture::new(vec![]);
            let orchestrator = with_transcoders(&service, &capture);
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;

            let sink = MemorySink::new().observing(orchestrator.registry().clone());
            let path = orchestrator.export(ExportFormat::Gif, &sink).await.unwrap();

            assert!(path.to_string_lossy().ends_with(".gif"));
            assert_eq!(sink.live_during_save(), vec![3]);
            assert_eq!(orchestrator.registry().live_count(), 2);
            assert!(sink.saved()[0].1.bytes().starts_with(b"GIF89a"));
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Playing);
            assert!(!orchestrator.snapshot().exports.any_running());
        }

        #[tokio::test]
        async fn test_failed_transcode_keeps_playing() {
            let service = MockGenerationService::new();
            let orchestrator = Orchestrator::builder(Arc::new(service))
                .with_webm_transcoder(Arc::new(StreamTranscoder::new(MockCapture::unsupported())))
                .build();
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;
            let mut rx = orchestrator.subscribe();

            let err = orchestrator
                .export(ExportFormat::WebM, &MemorySink::new())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ExportError::Transcode(TranscodeError::CaptureUnsupported)
            ));
            assert_eq!(orchestrator.snapshot().kind(), StateKind::Playing);
            assert!(!orchestrator.snapshot().exports.any_running());
            assert_eq!(
                drain(&mut rx),
                vec![
                    SessionEvent::ExportChanged {
                        format: ExportFormat::WebM,
                        running: true
                    },
                    SessionEvent::ExportChanged {
                        format: ExportFormat::WebM,
                        running: false
                    },
                ]
            );
        }

        #[tokio::test]
        async fn test_missing_transcoder_is_unavailable() {
            let orchestrator = playing(&MockGenerationService::new()).await;
            assert!(matches!(
                orchestrator.export(ExportFormat::Gif, &MemorySink::new()).await,
                Err(ExportError::Transcode(TranscodeError::EncoderUnavailable { .. }))
            ));
            assert!(!orchestrator.snapshot().exports.any_running());
        }

        #[tokio::test]
        async fn test_sink_failure_revokes_output() {
            let service = MockGenerationService::new();
            let capture = MockCapture::new(vec![b"webm".to_vec()]);
            let orchestrator = with_transcoders(&service, &capture);
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;

            let result = orchestrator
                .export(ExportFormat::WebM, &MemorySink::new().failing("disk full"))
                .await;
            assert!(matches!(result, Err(ExportError::Sink(_))));
            assert_eq!(orchestrator.registry().live_count(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_second_webm_rejected_without_new_capture() {
            let service = MockGenerationService::new();
            let capture = MockCapture::new(vec![b"\x1aE\xdf\xa3".to_vec()]).gated();
            let orchestrator = with_transcoders(&service, &capture);
            orchestrator
                .submit(&request("HELLO"), &MockCredentialGate::granted())
                .await;

            let background = orchestrator.clone();
            let first = tokio::spawn(async move {
                background.export(ExportFormat::WebM, &MemorySink::new()).await
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(capture.start_count(), 1);

            let second = orchestrator
                .export(ExportFormat::WebM, &MemorySink::new())
                .await;
            assert!(matches!(
                second,
                Err(ExportError::AlreadyInFlight(ExportFormat::WebM))
            ));
            assert_eq!(capture.start_count(), 1);

            // other formats are independent
            assert!(orchestrator
                .export(ExportFormat::Gif, &MemorySink::new())
                .await
                .is_ok());

            capture.release();
            assert!(first.await.unwrap().is_ok());
            assert!(!orchestrator.snapshot().exports.any_running());
        }

        #[tokio::test]
        async fn test_save_keyframe() {
            let orchestrator = playing(&MockGenerationService::new()).await;
            let sink = MemorySink::new();
            let path = orchestrator.save_keyframe(&sink).await.unwrap();
            assert!(path.to_string_lossy().ends_with(".png"));
            assert_eq!(sink.saved()[0].1, MockGenerationService::placeholder_keyframe());
        }
    }

    mod property_tests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn prop_whitespace_never_leaves_idle(message in "[ \t\n]{0,40}") {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let service = MockGenerationService::new();
                    let orchestrator = orchestrator(&service);
                    let outcome = orchestrator
                        .submit(&request(&message), &MockCredentialGate::granted())
                        .await;
                    prop_assert_eq!(outcome, SubmitOutcome::Ignored);
                    prop_assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
                    Ok(())
                })?;
            }

            #[test]
            fn prop_failure_classification(
                message in "[A-Za-z][A-Za-z ]{0,29}",
                marker in prop_oneof![Just(""), Just("404"), Just("Requested entity was not found")],
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let full = format!("{message}{marker}");
                runtime.block_on(async {
                    let service = MockGenerationService::new()
                        .with_image_result(Err(GenerationFailure::new(full.clone())));
                    let orchestrator = orchestrator(&service);
                    let gate = MockCredentialGate::granted();
                    let outcome = orchestrator.submit(&request("HELLO"), &gate).await;

                    if marker.is_empty() {
                        prop_assert_eq!(orchestrator.snapshot().kind(), StateKind::Error);
                        prop_assert_eq!(outcome, SubmitOutcome::Failed(full.clone()));
                        prop_assert_eq!(gate.request_count(), 0);
                    } else {
                        prop_assert_eq!(orchestrator.snapshot().kind(), StateKind::Idle);
                        prop_assert_eq!(outcome, SubmitOutcome::CredentialRequested);
                        prop_assert_eq!(gate.request_count(), 1);
                    }
                    Ok(())
                })?;
            }
        }
    }
}
