//! Export formats and download naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeMotionError;

/// Prefix of every suggested download name
pub const FILE_PREFIX: &str = "typemotion";

/// Target representation of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// The generated video as delivered by the service
    Mp4,
    /// Looping animated image (sampled, palette-quantized)
    Gif,
    /// Re-encoded video container (real-time replay)
    WebM,
}

impl ExportFormat {
    /// All formats
    pub const ALL: [Self; 3] = [Self::Mp4, Self::Gif, Self::WebM];

    /// File extension of the exported file
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::WebM => "webm",
        }
    }

    /// Whether the export runs a transcode job
    #[must_use]
    pub const fn is_transcoded(self) -> bool {
        !matches!(self, Self::Mp4)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mp4 => "MP4",
            Self::Gif => "GIF",
            Self::WebM => "WebM",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = TypeMotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "gif" => Ok(Self::Gif),
            "webm" => Ok(Self::WebM),
            other => Err(TypeMotionError::invalid_request(format!(
                "unknown export format '{other}'"
            ))),
        }
    }
}

/// Suggested name `typemotion-<timestamp_ms>.<ext>`
#[must_use]
pub fn download_name(timestamp_ms: i64, extension: &str) -> String {
    format!("{FILE_PREFIX}-{timestamp_ms}.{extension}")
}

/// Suggested name stamped with the current wall clock
#[must_use]
pub fn download_name_now(extension: &str) -> String {
    download_name(chrono::Utc::now().timestamp_millis(), extension)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_name() {
        assert_eq!(download_name(1_700_000_000_123, "gif"), "typemotion-1700000000123.gif");
    }

    #[test]
    fn test_download_name_now_shape() {
        let name = download_name_now("webm");
        let stamp = name
            .strip_prefix("typemotion-")
            .and_then(|rest| rest.strip_suffix(".webm"))
            .unwrap();
        assert!(stamp.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn test_format_parse_and_extension() {
        for format in ExportFormat::ALL {
            assert_eq!(format.extension().parse::<ExportFormat>().unwrap(), format);
        }
        assert!("avi".parse::<ExportFormat>().is_err());
        assert!(!ExportFormat::Mp4.is_transcoded());
        assert!(ExportFormat::Gif.is_transcoded());
    }
}
