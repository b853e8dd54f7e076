//! CLI command definitions

use crate::config::ColorChoice;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use typemotion::{ExportFormat, QualityTier};

/// TypeMotion: typographic reveal videos from a single word
#[derive(Parser, Debug)]
#[command(name = "typemotion")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (YAML)
    #[arg(long, env = "TYPEMOTION_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a keyframe and video for a message, then export it
    Generate(GenerateArgs),

    /// Ask the service for a style matching a message
    Suggest(SuggestArgs),

    /// Convert a local video into a looping GIF
    Gif(GifArgs),

    /// Re-encode a local video to WebM by replaying it
    Webm(WebmArgs),

    /// List style presets and typography suggestions
    Presets(PresetsArgs),

    /// Print the effective configuration
    Config,
}

/// Arguments for the generate command
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Word or short phrase to animate
    pub message: String,

    /// Visual style description (random preset when omitted)
    #[arg(short, long, conflicts_with = "preset")]
    pub style: Option<String>,

    /// Style preset id (see `typemotion presets`)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Typography direction
    #[arg(short, long, conflicts_with = "typography_preset")]
    pub typography: Option<String>,

    /// Typography suggestion id
    #[arg(long)]
    pub typography_preset: Option<String>,

    /// Reference image guiding the keyframe
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Output quality
    #[arg(long, default_value = "720p")]
    pub quality: QualityArg,

    /// Directory downloads are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Formats to export once the video is ready (repeatable)
    #[arg(short, long = "export", value_name = "FORMAT", default_value = "mp4")]
    pub exports: Vec<FormatArg>,

    /// Also save the keyframe image
    #[arg(long)]
    pub keyframe: bool,

    /// Use the offline mock service instead of the API
    #[arg(long)]
    pub mock: bool,
}

/// Arguments for the suggest command
#[derive(Args, Debug, Clone)]
pub struct SuggestArgs {
    /// Message to find a style for
    pub message: String,

    /// Use the offline mock service instead of the API
    #[arg(long)]
    pub mock: bool,
}

/// Arguments for the gif command
#[derive(Args, Debug, Clone)]
pub struct GifArgs {
    /// Source video
    pub video: PathBuf,

    /// Directory the GIF is written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Output width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Sample rate in frames per second
    #[arg(long)]
    pub fps: Option<u32>,
}

/// Arguments for the webm command
#[derive(Args, Debug, Clone)]
pub struct WebmArgs {
    /// Source video
    pub video: PathBuf,

    /// Directory the WebM is written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// Arguments for the presets command
#[derive(Args, Debug, Clone)]
pub struct PresetsArgs {
    /// Only show styles of this category
    #[arg(long)]
    pub category: Option<String>,

    /// List typography suggestions instead of styles
    #[arg(long)]
    pub typography: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Always use colors
    Always,
    /// Auto-detect
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Always => Self::Always,
            ColorArg::Auto => Self::Auto,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Quality argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QualityArg {
    /// 720p video, 1K keyframe
    #[default]
    #[value(name = "720p")]
    Low,
    /// 1080p video, 2K keyframe
    #[value(name = "1080p")]
    Mid,
    /// 4K video and keyframe
    #[value(name = "4k")]
    High,
}

impl From<QualityArg> for QualityTier {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => Self::Low,
            QualityArg::Mid => Self::Mid,
            QualityArg::High => Self::High,
        }
    }
}

/// Export format argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// Video as delivered
    Mp4,
    /// Looping animated GIF
    Gif,
    /// Re-encoded WebM
    Webm,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mp4 => Self::Mp4,
            FormatArg::Gif => Self::Gif,
            FormatArg::Webm => Self::WebM,
        }
    }
}
