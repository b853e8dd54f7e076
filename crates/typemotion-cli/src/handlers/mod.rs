//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for one command plus the
//! pure helpers it is built from.

pub mod config;
pub mod generate;
pub mod presets;
pub mod transcode;

pub use config::execute_config;
pub use generate::{build_request, execute_generate, execute_suggest};
pub use presets::{execute_presets, render_styles, render_typography};
pub use transcode::{execute_gif, execute_webm, gif_settings};

use crate::error::{CliError, CliResult};
use std::path::Path;
use typemotion::MediaResource;

/// Load a local file as a media resource, guessing its type from the name
pub async fn read_media(path: &Path) -> CliResult<MediaResource> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        CliError::invalid_argument(format!("cannot read {}: {e}", path.display()))
    })?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(MediaResource::new(bytes, mime.essence_str()))
}
