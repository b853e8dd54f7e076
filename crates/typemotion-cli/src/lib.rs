//! TypeMotion CLI library
//!
//! Command-line front end for the TypeMotion generation pipeline: argument
//! parsing, ffmpeg-backed transcoding capabilities, a directory download sink
//! and terminal progress display.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
pub mod credentials;
mod error;
pub mod ffmpeg;
pub mod handlers;
pub mod logging;
mod output;
pub mod sink;

pub use commands::{
    Cli, ColorArg, Commands, FormatArg, GenerateArgs, GifArgs, PresetsArgs, QualityArg,
    SuggestArgs, WebmArgs,
};
pub use config::{api_key_from_env, CliConfig, ColorChoice, Verbosity, API_KEY_VARS};
pub use credentials::{OfflineGate, PromptCredentialGate};
pub use error::{CliError, CliResult};
pub use ffmpeg::{FfmpegCapture, FfmpegDecoder, FfmpegTools};
pub use output::{state_message, ProgressReporter};
pub use sink::DirectorySink;
