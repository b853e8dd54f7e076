//! Runtime configuration
//!
//! Every section has defaults matching the reference behaviour, so an empty
//! YAML document (or no file at all) is a valid configuration.

use crate::error::{TypeMotionError, TypeMotionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Substrings that mark a service failure as a credential problem
pub const DEFAULT_CREDENTIAL_MARKERS: [&str; 2] = ["Requested entity was not found", "404"];

/// Simulated progress while a generation stage is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Interval between phase label changes (ms)
    pub label_interval_ms: u64,
    /// Interval between progress ticks (ms)
    pub tick_interval_ms: u64,
    /// Progress published on submission
    pub seed: f64,
    /// Cap of the keyframe stage, also the checkpoint set on its completion
    pub image_cap: f64,
    /// Cap of the video stage
    pub video_cap: f64,
    /// Smallest deterministic increment per tick
    pub min_increment: f64,
    /// Remaining distance is divided by this to get the increment
    pub decay_divisor: f64,
    /// Upper bound of the uniform jitter added per tick
    pub jitter: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            label_interval_ms: 3500,
            tick_interval_ms: 200,
            seed: 5.0,
            image_cap: 30.0,
            video_cap: 95.0,
            min_increment: 0.1,
            decay_divisor: 50.0,
            jitter: 0.2,
        }
    }
}

impl ProgressConfig {
    /// Label interval as a duration
    #[must_use]
    pub fn label_interval(&self) -> Duration {
        Duration::from_millis(self.label_interval_ms.max(1))
    }

    /// Tick interval as a duration
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Animated-image sampling and encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifSettings {
    /// Output width in pixels; height follows the source aspect ratio
    pub width: u32,
    /// Sample rate in frames per second
    pub fps: u32,
    /// Palette bound per frame (2..=256)
    pub max_colors: usize,
    /// How long to wait for a seek to complete before using the current frame (ms)
    pub seek_timeout_ms: u64,
    /// Duration assumed when the source does not report one (s)
    pub fallback_duration_secs: f64,
    /// NeuQuant sampling factor (1 = best, 30 = fastest)
    pub sample_factor: i32,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            width: 400,
            fps: 10,
            max_colors: 256,
            seek_timeout_ms: 1000,
            fallback_duration_secs: 5.0,
            sample_factor: 10,
        }
    }
}

impl GifSettings {
    /// Seek timeout as a duration
    #[must_use]
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    /// Set the output width
    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the sample rate
    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the seek timeout
    #[must_use]
    pub const fn with_seek_timeout_ms(mut self, ms: u64) -> Self {
        self.seek_timeout_ms = ms;
        self
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMotionConfig {
    /// Progress simulation
    pub progress: ProgressConfig,
    /// Animated-image export
    pub gif: GifSettings,
    /// Failure substrings routed to the credential gate
    pub credential_markers: Vec<String>,
    /// Seed for preset, label and jitter picks (random when absent)
    pub rng_seed: Option<u64>,
}

impl Default for TypeMotionConfig {
    fn default() -> Self {
        Self {
            progress: ProgressConfig::default(),
            gif: GifSettings::default(),
            credential_markers: DEFAULT_CREDENTIAL_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            rng_seed: None,
        }
    }
}

impl TypeMotionConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> TypeMotionResult<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> TypeMotionResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> TypeMotionResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the progress section
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    /// Set the animated-image section
    #[must_use]
    pub fn with_gif(mut self, gif: GifSettings) -> Self {
        self.gif = gif;
        self
    }

    /// Replace the credential markers
    #[must_use]
    pub fn with_credential_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.credential_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Fix the random seed
    #[must_use]
    pub const fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Reject values the pipeline cannot honour
    pub fn validate(&self) -> TypeMotionResult<()> {
        let p = &self.progress;
        if !(0.0..=p.image_cap).contains(&p.seed) {
            return Err(TypeMotionError::invalid_config(
                "progress.seed must lie between 0 and progress.image_cap",
            ));
        }
        if !(p.image_cap <= p.video_cap && p.video_cap <= 100.0) {
            return Err(TypeMotionError::invalid_config(
                "progress caps must satisfy image_cap <= video_cap <= 100",
            ));
        }
        if p.decay_divisor <= 0.0 || p.min_increment < 0.0 || p.jitter < 0.0 {
            return Err(TypeMotionError::invalid_config(
                "progress.decay_divisor must be positive, min_increment and jitter non-negative",
            ));
        }

        let g = &self.gif;
        if g.width < 2 || g.width > u32::from(u16::MAX) {
            return Err(TypeMotionError::invalid_config(
                "gif.width must lie between 2 and 65535",
            ));
        }
        if g.fps == 0 || g.fps > 100 {
            return Err(TypeMotionError::invalid_config("gif.fps must lie between 1 and 100"));
        }
        if !(2..=256).contains(&g.max_colors) {
            return Err(TypeMotionError::invalid_config(
                "gif.max_colors must lie between 2 and 256",
            ));
        }
        if !(1..=30).contains(&g.sample_factor) {
            return Err(TypeMotionError::invalid_config(
                "gif.sample_factor must lie between 1 and 30",
            ));
        }
        if !(g.fallback_duration_secs.is_finite() && g.fallback_duration_secs > 0.0) {
            return Err(TypeMotionError::invalid_config(
                "gif.fallback_duration_secs must be positive",
            ));
        }
        Ok(())
    }
}
