//! Animated-image (GIF89a) transcoder.
//!
//! The source is sampled at a fixed rate by seeking a decoder to each
//! timestamp in turn. Every sampled frame is resized to the output geometry,
//! reduced to its own palette and appended to a looping GIF. The pipeline is
//! strictly sequential: one decoder, one pass, no frame revisited.

use super::quantize::{quantize_frame, IndexedFrame};
use super::{MediaTranscoder, GIF_MIME};
use crate::config::GifSettings;
use crate::error::{TranscodeError, TranscodeResult};
use crate::media::MediaResource;
use async_trait::async_trait;
use gif::{Encoder, Frame, Repeat};
use image::imageops::FilterType;
use image::RgbaImage;
use std::borrow::Cow;

/// Capability that loads a video for frame sampling
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Whether decoding (and the pixel readback it needs) works in this runtime
    fn is_available(&self) -> bool;

    /// Load `source` and read its metadata
    async fn open(&self, source: &MediaResource) -> TranscodeResult<Box<dyn DecodedVideo>>;
}

/// A loaded video positioned at some timestamp
#[async_trait]
pub trait DecodedVideo: Send {
    /// Intrinsic duration in seconds, if the container reports one
    fn duration(&self) -> Option<f64>;

    /// Intrinsic pixel dimensions `(width, height)`
    fn dimensions(&self) -> (u32, u32);

    /// Move to `seconds`; resolves when the frame there is decoded.
    ///
    /// Callers bound this with a timeout and fall back to whatever frame is
    /// current, so a cancelled seek must leave the video usable.
    async fn seek(&mut self, seconds: f64) -> TranscodeResult<()>;

    /// The frame currently decoded; the caller rescales it
    fn current_frame(&mut self) -> TranscodeResult<RgbaImage>;
}

/// Pixel size of the animated output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels (always even)
    pub height: u16,
}

/// Scale a source to `width`, keeping the aspect ratio.
///
/// The height is floored, lowered by one when odd and never below 2.
pub fn output_geometry(
    source_width: u32,
    source_height: u32,
    width: u32,
) -> TranscodeResult<OutputGeometry> {
    if source_width == 0 || source_height == 0 {
        return Err(TranscodeError::unreadable(format!(
            "source reports {source_width}x{source_height} pixels"
        )));
    }
    let out_width = u16::try_from(width)
        .map_err(|_| TranscodeError::encode(format!("output width {width} exceeds 65535")))?;

    let scaled = u64::from(source_height) * u64::from(width) / u64::from(source_width);
    let clamped = scaled.min(u64::from(u16::MAX)) as u16;
    let height = (clamped - clamped % 2).max(2);

    Ok(OutputGeometry {
        width: out_width,
        height,
    })
}

/// Timestamps (seconds) at which a clip of `duration` is sampled at `fps`
#[must_use]
pub fn sample_timestamps(duration: f64, fps: u32) -> Vec<f64> {
    if fps == 0 || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let rate = f64::from(fps);
    let count = (duration * rate).floor() as usize;
    (0..count).map(|i| i as f64 / rate).collect()
}

/// Encodes a video resource as a looping GIF
#[derive(Debug, Clone)]
pub struct AnimatedImageTranscoder<D> {
    decoder: D,
    settings: GifSettings,
}

impl<D: VideoDecoder> AnimatedImageTranscoder<D> {
    /// Create a transcoder with default settings
    #[must_use]
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            settings: GifSettings::default(),
        }
    }

    /// Replace the sampling and encoding settings
    #[must_use]
    pub fn with_settings(mut self, settings: GifSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings
    #[must_use]
    pub const fn settings(&self) -> &GifSettings {
        &self.settings
    }

    /// Sample, quantize and encode `source`.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::EncoderUnavailable`] if the decoder cannot run here
    /// - [`TranscodeError::SourceUnreadable`] if the video does not load
    /// - [`TranscodeError::EncodeFailed`] if quantization or writing fails;
    ///   nothing partial is returned
    pub async fn encode(&self, source: &MediaResource) -> TranscodeResult<MediaResource> {
        if !self.decoder.is_available() {
            return Err(TranscodeError::unavailable(
                "frame decoding is not supported by this runtime",
            ));
        }

        let mut video = self.decoder.open(source).await.map_err(|e| match e {
            TranscodeError::SourceUnreadable { .. } | TranscodeError::EncoderUnavailable { .. } => e,
            other => TranscodeError::unreadable(other.to_string()),
        })?;

        let (source_width, source_height) = video.dimensions();
        let geometry = output_geometry(source_width, source_height, self.settings.width)?;
        let duration = video
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(self.settings.fallback_duration_secs);
        let timestamps = sample_timestamps(duration, self.settings.fps);

        tracing::info!(
            source_width,
            source_height,
            width = geometry.width,
            height = geometry.height,
            duration,
            frames = timestamps.len(),
            "encoding animated image"
        );

        match self.write_frames(video.as_mut(), geometry, &timestamps).await {
            Ok(bytes) => {
                tracing::info!(bytes = bytes.len(), "animated image encoded");
                Ok(MediaResource::new(bytes, GIF_MIME))
            }
            Err(e) => {
                tracing::error!(error = %e, "animated image encoding failed");
                Err(e)
            }
        }
    }

    async fn write_frames(
        &self,
        video: &mut dyn DecodedVideo,
        geometry: OutputGeometry,
        timestamps: &[f64],
    ) -> TranscodeResult<Vec<u8>> {
        if timestamps.is_empty() {
            return Err(TranscodeError::encode("source is too short to sample a frame"));
        }

        let delay = frame_delay_cs(self.settings.fps);
        let mut output = Vec::new();
        {
            let mut encoder = Encoder::new(&mut output, geometry.width, geometry.height, &[])
                .map_err(|e| TranscodeError::encode(format!("failed to create GIF encoder: {e}")))?;
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| TranscodeError::encode(format!("failed to set GIF repeat: {e}")))?;

            for (index, &timestamp) in timestamps.iter().enumerate() {
                self.seek_bounded(video, timestamp).await;
                let pixels = resize_to(video.current_frame()?, geometry);
                let indexed = quantize_frame(
                    pixels.as_raw(),
                    geometry.width,
                    geometry.height,
                    self.settings.max_colors,
                    self.settings.sample_factor,
                )?;
                tracing::debug!(index, timestamp, colors = indexed.palette_len(), "frame sampled");

                encoder
                    .write_frame(&to_gif_frame(indexed, delay))
                    .map_err(|e| TranscodeError::encode(format!("failed to write GIF frame: {e}")))?;
            }
        }
        Ok(output)
    }

    /// Seek, giving up on the completion signal after the configured timeout
    async fn seek_bounded(&self, video: &mut dyn DecodedVideo, timestamp: f64) {
        match tokio::time::timeout(self.settings.seek_timeout(), video.seek(timestamp)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(timestamp, error = %e, "seek failed, using current frame");
            }
            Err(_) => {
                tracing::warn!(timestamp, "seek timed out, using current frame");
            }
        }
    }
}

#[async_trait]
impl<D: VideoDecoder> MediaTranscoder for AnimatedImageTranscoder<D> {
    async fn transcode(&self, source: &MediaResource) -> TranscodeResult<MediaResource> {
        self.encode(source).await
    }
}

/// Per-frame delay in hundredths of a second
fn frame_delay_cs(fps: u32) -> u16 {
    (100 / fps.max(1)).max(1) as u16
}

fn resize_to(frame: RgbaImage, geometry: OutputGeometry) -> RgbaImage {
    let (width, height) = (u32::from(geometry.width), u32::from(geometry.height));
    if frame.width() == width && frame.height() == height {
        return frame;
    }
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

fn to_gif_frame(indexed: IndexedFrame, delay: u16) -> Frame<'static> {
    Frame {
        width: indexed.width,
        height: indexed.height,
        delay,
        palette: Some(indexed.palette),
        buffer: Cow::Owned(indexed.indices),
        ..Frame::default()
    }
}
