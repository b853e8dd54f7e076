//! Generate and suggest command handlers

use crate::commands::{GenerateArgs, SuggestArgs};
use crate::config::{api_key_from_env, CliConfig};
use crate::credentials::{OfflineGate, PromptCredentialGate};
use crate::error::{CliError, CliResult};
use crate::ffmpeg::{FfmpegCapture, FfmpegDecoder, FfmpegTools};
use crate::handlers::read_media;
use crate::output::ProgressReporter;
use crate::sink::DirectorySink;
use std::sync::Arc;
use typemotion::mock::MockGenerationService;
use typemotion::presets::{style_by_id, typography_by_id, STYLE_PRESETS};
use typemotion::{
    AnimatedImageTranscoder, CredentialGate, ExportFormat, GeminiClient, GenerationRequest,
    GenerationService, Orchestrator, SharedApiKey, StreamTranscoder, SubmitOutcome,
};

/// Service and gate a command talks to
struct Backend {
    service: Arc<dyn GenerationService>,
    gate: Box<dyn CredentialGate>,
}

impl Backend {
    fn select(mock: bool, config: &CliConfig, message: &str) -> CliResult<Self> {
        if mock {
            let suggestion = STYLE_PRESETS[message.chars().count() % STYLE_PRESETS.len()].prompt;
            return Ok(Self {
                service: Arc::new(MockGenerationService::new().with_style_result(Ok(
                    suggestion.to_string(),
                ))),
                gate: Box::new(OfflineGate),
            });
        }
        let key = SharedApiKey::new(api_key_from_env());
        Ok(Self {
            service: Arc::new(GeminiClient::new(config.gemini.clone(), key.clone())?),
            gate: Box::new(PromptCredentialGate::new(key)),
        })
    }
}

/// Build the request from command-line arguments
pub async fn build_request(args: &GenerateArgs) -> CliResult<GenerationRequest> {
    let mut request = GenerationRequest::new(args.message.clone())?.with_quality(args.quality.into());

    if let Some(style) = &args.style {
        request = request.with_style(style.clone());
    } else if let Some(id) = &args.preset {
        let preset = style_by_id(id)
            .ok_or_else(|| CliError::invalid_argument(format!("unknown style preset '{id}'")))?;
        request = request.with_style(preset.prompt);
    }

    if let Some(typography) = &args.typography {
        request = request.with_typography(typography.clone());
    } else if let Some(id) = &args.typography_preset {
        let suggestion = typography_by_id(id).ok_or_else(|| {
            CliError::invalid_argument(format!("unknown typography preset '{id}'"))
        })?;
        request = request.with_typography(suggestion.prompt);
    }

    if let Some(path) = &args.reference {
        request = request.with_reference_image(read_media(path).await?);
    }

    Ok(request)
}

fn requested_formats(args: &GenerateArgs) -> Vec<ExportFormat> {
    let mut formats: Vec<ExportFormat> = Vec::new();
    for format in args.exports.iter().copied().map(ExportFormat::from) {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

async fn build_orchestrator(
    config: &CliConfig,
    service: Arc<dyn GenerationService>,
    formats: &[ExportFormat],
) -> Orchestrator {
    let mut builder = Orchestrator::builder(service).with_config(config.typemotion.clone());
    let tools = FfmpegTools::new();
    if formats.contains(&ExportFormat::Gif) {
        let decoder = FfmpegDecoder::detect(tools.clone()).await;
        builder = builder.with_gif_transcoder(Arc::new(
            AnimatedImageTranscoder::new(decoder).with_settings(config.typemotion.gif.clone()),
        ));
    }
    if formats.contains(&ExportFormat::WebM) {
        let capture = FfmpegCapture::detect(tools).await;
        builder = builder.with_webm_transcoder(Arc::new(StreamTranscoder::new(capture)));
    }
    builder.build()
}

/// Map a finished submission to the command result
fn check_outcome(outcome: SubmitOutcome) -> CliResult<()> {
    match outcome {
        SubmitOutcome::Completed => Ok(()),
        SubmitOutcome::Ignored => Err(CliError::invalid_argument("message must not be blank")),
        SubmitOutcome::CredentialRequested => Err(CliError::MissingCredential),
        SubmitOutcome::Failed(message) => Err(CliError::generation(message)),
        SubmitOutcome::Superseded => Err(CliError::generation("run was superseded")),
    }
}

/// Run both stages and export the result
pub async fn execute_generate(config: &CliConfig, args: &GenerateArgs) -> CliResult<()> {
    let request = build_request(args).await?;
    let formats = requested_formats(args);
    let backend = Backend::select(args.mock, config, &args.message)?;
    let orchestrator = build_orchestrator(config, backend.service.clone(), &formats).await;

    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.start_progress("Starting...");
    let follower = tokio::spawn(reporter.clone().follow(orchestrator.subscribe()));

    let mut outcome = orchestrator.submit(&request, backend.gate.as_ref()).await;
    if outcome == SubmitOutcome::CredentialRequested && backend.gate.has_credential().await {
        tracing::info!("credential provided, resubmitting");
        outcome = orchestrator.submit(&request, backend.gate.as_ref()).await;
    }
    let result = check_outcome(outcome);
    if let Err(ref e) = result {
        follower.abort();
        reporter.finish();
        reporter.failure(&e.to_string());
        orchestrator.reset();
        return result;
    }

    let sink = DirectorySink::new(&args.output);
    let mut first_error = None;

    if args.keyframe {
        match orchestrator.save_keyframe(&sink).await {
            Ok(path) => reporter.success(&format!("Keyframe saved to {}", path.display())),
            Err(e) => {
                reporter.warning(&format!("Keyframe not saved: {e}"));
                first_error.get_or_insert(CliError::from(e));
            }
        }
    }

    for format in formats {
        match orchestrator.export(format, &sink).await {
            Ok(path) => reporter.success(&format!("{format} saved to {}", path.display())),
            Err(e) => {
                reporter.warning(&format!("{format} export failed: {e}"));
                first_error.get_or_insert(CliError::from(e));
            }
        }
    }

    follower.abort();
    reporter.finish();
    orchestrator.reset();

    first_error.map_or(Ok(()), Err)
}

/// Print a style suggestion for a message
pub async fn execute_suggest(config: &CliConfig, args: &SuggestArgs) -> CliResult<()> {
    let backend = Backend::select(args.mock, config, &args.message)?;
    if !backend.gate.has_credential().await {
        backend.gate.request_credential().await;
        if !backend.gate.has_credential().await {
            return Err(CliError::MissingCredential);
        }
    }

    let orchestrator = Orchestrator::builder(backend.service)
        .with_config(config.typemotion.clone())
        .build();
    match orchestrator.suggest_style(&args.message).await {
        Some(style) => println!("{style}"),
        None => {
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
                .warning("No suggestion returned");
        }
    }
    Ok(())
}
