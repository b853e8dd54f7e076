//! Standalone GIF and WebM conversion of local videos

use crate::commands::{GifArgs, WebmArgs};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::ffmpeg::{FfmpegCapture, FfmpegDecoder, FfmpegTools};
use crate::handlers::read_media;
use crate::output::ProgressReporter;
use crate::sink::DirectorySink;
use std::path::Path;
use typemotion::transcode::MediaTranscoder;
use typemotion::{
    download_name_now, AnimatedImageTranscoder, DownloadSink, ExportFormat, GifSettings,
    StreamTranscoder,
};

/// GIF settings from the configuration with command-line overrides applied
pub fn gif_settings(config: &CliConfig, args: &GifArgs) -> CliResult<GifSettings> {
    let mut settings = config.typemotion.gif.clone();
    if let Some(width) = args.width {
        settings = settings.with_width(width);
    }
    if let Some(fps) = args.fps {
        settings = settings.with_fps(fps);
    }
    config.typemotion.clone().with_gif(settings.clone()).validate()?;
    Ok(settings)
}

async fn convert(
    config: &CliConfig,
    video: &Path,
    output: &Path,
    format: ExportFormat,
    transcoder: &dyn MediaTranscoder,
) -> CliResult<()> {
    let source = read_media(video).await?;

    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.start_spinner(&format!("Encoding {format}..."));
    let result = transcoder.transcode(&source).await;
    reporter.finish();

    let encoded = match result {
        Ok(encoded) => encoded,
        Err(e) => {
            reporter.failure(&format!("{format} encoding failed: {e}"));
            return Err(e.into());
        }
    };

    let sink = DirectorySink::new(output);
    let path = sink
        .save(&encoded, &download_name_now(format.extension()))
        .await?;
    reporter.success(&format!("{format} saved to {}", path.display()));
    Ok(())
}

/// Convert a local video to a looping GIF
pub async fn execute_gif(config: &CliConfig, args: &GifArgs) -> CliResult<()> {
    let settings = gif_settings(config, args)?;
    let decoder = FfmpegDecoder::detect(FfmpegTools::new()).await;
    let transcoder = AnimatedImageTranscoder::new(decoder).with_settings(settings);
    convert(config, &args.video, &args.output, ExportFormat::Gif, &transcoder).await
}

/// Re-encode a local video to WebM
pub async fn execute_webm(config: &CliConfig, args: &WebmArgs) -> CliResult<()> {
    let capture = FfmpegCapture::detect(FfmpegTools::new()).await;
    let transcoder = StreamTranscoder::new(capture);
    convert(config, &args.video, &args.output, ExportFormat::WebM, &transcoder).await
}
