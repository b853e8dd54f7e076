//! Decoding and capture capabilities backed by the `ffmpeg` binaries.
//!
//! Frame sampling shells out to `ffprobe` for metadata and to `ffmpeg` for a
//! single raw RGBA frame per seek. Stream capture replays the source at its
//! native rate (`-re`) into a WebM muxer and streams stdout back as chunks.

use async_trait::async_trait;
use image::RgbaImage;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use typemotion::transcode::{CaptureBackend, DecodedVideo, RecordingSession, VideoDecoder};
use typemotion::{MediaResource, TranscodeError, TranscodeResult};

/// Bytes read from the recorder per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Locations of the ffmpeg binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    /// `ffmpeg` executable
    pub ffmpeg: String,
    /// `ffprobe` executable
    pub ffprobe: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegTools {
    /// Binaries found on `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit binaries
    #[must_use]
    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

async fn runs(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|status| status.success())
}

/// Write `source` to a scratch file ffmpeg can open
fn spill(source: &MediaResource) -> std::io::Result<NamedTempFile> {
    let suffix = format!(".{}", source.extension());
    let mut file = tempfile::Builder::new()
        .prefix("typemotion-")
        .suffix(&suffix)
        .tempfile()?;
    std::io::Write::write_all(&mut file, source.bytes())?;
    Ok(file)
}

/// Metadata read by `ffprobe`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    /// Width of the first video stream
    pub width: u32,
    /// Height of the first video stream
    pub height: u32,
    /// Container duration in seconds, if known
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output
pub fn parse_probe(json: &str) -> TranscodeResult<ProbeInfo> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| TranscodeError::unreadable(format!("unexpected ffprobe output: {e}")))?;
    let stream = output
        .streams
        .first()
        .ok_or_else(|| TranscodeError::unreadable("no video stream"))?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(TranscodeError::unreadable("video stream has no dimensions"));
    };
    let duration = output
        .format
        .and_then(|format| format.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(ProbeInfo {
        width,
        height,
        duration,
    })
}

/// Frame sampler running `ffprobe` and `ffmpeg` per seek
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    tools: FfmpegTools,
    available: bool,
}

impl FfmpegDecoder {
    /// Check that both binaries run
    pub async fn detect(tools: FfmpegTools) -> Self {
        let available = runs(&tools.ffmpeg).await && runs(&tools.ffprobe).await;
        if !available {
            tracing::debug!(?tools, "ffmpeg/ffprobe not found");
        }
        Self { tools, available }
    }

    async fn probe(&self, path: &Path) -> TranscodeResult<ProbeInfo> {
        let output = Command::new(&self.tools.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height:format=duration"])
            .args(["-of", "json"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscodeError::unavailable(format!("ffprobe: {e}")))?;
        if !output.status.success() {
            return Err(TranscodeError::unreadable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_probe(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self, source: &MediaResource) -> TranscodeResult<Box<dyn DecodedVideo>> {
        let file = spill(source).map_err(|e| TranscodeError::unreadable(e.to_string()))?;
        let info = self.probe(file.path()).await?;
        tracing::debug!(
            width = info.width,
            height = info.height,
            duration = ?info.duration,
            "probed source"
        );

        let frame = extract_frame(&self.tools.ffmpeg, file.path(), 0.0, info.width, info.height)
            .await
            .map_err(|e| TranscodeError::unreadable(e.to_string()))?;

        Ok(Box::new(FfmpegVideo {
            ffmpeg: self.tools.ffmpeg.clone(),
            file,
            info,
            frame,
        }))
    }
}

async fn extract_frame(
    ffmpeg: &str,
    path: &Path,
    seconds: f64,
    width: u32,
    height: u32,
) -> TranscodeResult<RgbaImage> {
    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-ss", &format!("{seconds:.3}"), "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TranscodeError::unavailable(format!("ffmpeg: {e}")))?;
    if !output.status.success() {
        return Err(TranscodeError::encode(format!(
            "frame at {seconds:.3}s: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    RgbaImage::from_raw(width, height, output.stdout).ok_or_else(|| {
        TranscodeError::encode(format!("no complete frame at {seconds:.3}s"))
    })
}

struct FfmpegVideo {
    ffmpeg: String,
    file: NamedTempFile,
    info: ProbeInfo,
    frame: RgbaImage,
}

#[async_trait]
impl DecodedVideo for FfmpegVideo {
    fn duration(&self) -> Option<f64> {
        self.info.duration
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    async fn seek(&mut self, seconds: f64) -> TranscodeResult<()> {
        // a cancelled seek leaves the previous frame in place
        self.frame = extract_frame(
            &self.ffmpeg,
            self.file.path(),
            seconds,
            self.info.width,
            self.info.height,
        )
        .await?;
        Ok(())
    }

    fn current_frame(&mut self) -> TranscodeResult<RgbaImage> {
        Ok(self.frame.clone())
    }
}

/// VP8/VP9 encoders compiled into the local ffmpeg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderSupport {
    /// `libvpx-vp9` present
    pub vp9: bool,
    /// `libvpx` present
    pub vp8: bool,
}

/// Parse `ffmpeg -encoders` output
#[must_use]
pub fn parse_encoders(listing: &str) -> EncoderSupport {
    let mut support = EncoderSupport::default();
    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(flags), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !flags.starts_with('V') {
            continue;
        }
        match name {
            "libvpx-vp9" => support.vp9 = true,
            "libvpx" => support.vp8 = true,
            _ => {}
        }
    }
    support
}

/// ffmpeg encoder for a recording type; `None` leaves the muxer default
#[must_use]
pub fn codec_for(mime_type: &str) -> Option<&'static str> {
    let codecs = mime_type
        .split(';')
        .skip(1)
        .find_map(|param| param.trim().strip_prefix("codecs="))?;
    match codecs.trim_matches('"') {
        "vp9" => Some("libvpx-vp9"),
        "vp8" => Some("libvpx"),
        _ => None,
    }
}

/// Capture backend replaying the source through ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCapture {
    ffmpeg: String,
    available: bool,
    encoders: EncoderSupport,
}

impl FfmpegCapture {
    /// Query the local ffmpeg for WebM encoders
    pub async fn detect(tools: FfmpegTools) -> Self {
        let listing = Command::new(&tools.ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .stderr(Stdio::null())
            .output()
            .await;
        match listing {
            Ok(output) if output.status.success() => {
                let encoders = parse_encoders(&String::from_utf8_lossy(&output.stdout));
                tracing::debug!(?encoders, "ffmpeg encoders");
                Self {
                    ffmpeg: tools.ffmpeg,
                    available: encoders.vp9 || encoders.vp8,
                    encoders,
                }
            }
            _ => {
                tracing::debug!(ffmpeg = %tools.ffmpeg, "ffmpeg not usable for capture");
                Self {
                    ffmpeg: tools.ffmpeg,
                    available: false,
                    encoders: EncoderSupport::default(),
                }
            }
        }
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCapture {
    fn can_capture(&self) -> bool {
        self.available
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        match codec_for(mime_type) {
            Some("libvpx-vp9") => self.encoders.vp9,
            Some("libvpx") => self.encoders.vp8,
            _ => self.encoders.vp9 || self.encoders.vp8,
        }
    }

    async fn start(
        &self,
        source: &MediaResource,
        mime_type: &str,
    ) -> TranscodeResult<Box<dyn RecordingSession>> {
        let file = spill(source).map_err(|e| TranscodeError::unreadable(e.to_string()))?;
        Ok(Box::new(FfmpegRecording {
            ffmpeg: self.ffmpeg.clone(),
            codec: codec_for(mime_type),
            file,
            child: None,
            stdout: None,
            stderr: None,
        }))
    }
}

struct FfmpegRecording {
    ffmpeg: String,
    codec: Option<&'static str>,
    file: NamedTempFile,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    /// Drains stderr while stdout is read so a chatty ffmpeg never blocks
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegRecording {
    async fn finish(&mut self) -> Option<TranscodeResult<Vec<u8>>> {
        let mut child = self.child.take()?;
        let status = child.wait().await;
        let stderr = match self.stderr.take() {
            Some(drain) => drain.await.unwrap_or_default(),
            None => String::new(),
        };
        match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(TranscodeError::RecordingFailed {
                message: format!("ffmpeg exited with {status}: {}", stderr.trim()),
            })),
            Err(e) => Some(Err(TranscodeError::RecordingFailed {
                message: e.to_string(),
            })),
        }
    }
}

#[async_trait]
impl RecordingSession for FfmpegRecording {
    async fn play(&mut self) -> TranscodeResult<()> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "error", "-re", "-i"])
            .arg(self.file.path())
            .arg("-an");
        if let Some(codec) = self.codec {
            command.args(["-c:v", codec]);
        }
        let mut child = command
            .args(["-f", "webm", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::PlaybackFailed {
                message: e.to_string(),
            })?;
        self.stdout = child.stdout.take();
        self.stderr = child.stderr.take().map(|pipe| tokio::spawn(drain_stderr(pipe)));
        self.child = Some(child);
        tracing::debug!(codec = ?self.codec, "replay started");
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<TranscodeResult<Vec<u8>>> {
        if let Some(stdout) = self.stdout.as_mut() {
            match read_chunk(stdout).await {
                Ok(chunk) if !chunk.is_empty() => return Some(Ok(chunk)),
                Ok(_) => {}
                Err(e) => {
                    self.stdout = None;
                    return Some(Err(TranscodeError::RecordingFailed {
                        message: e.to_string(),
                    }));
                }
            }
            self.stdout = None;
        }
        self.finish().await
    }
}

async fn drain_stderr(mut pipe: ChildStderr) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut bytes).await {
        tracing::debug!(error = %e, "ffmpeg stderr closed early");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let read = reader.read(&mut chunk).await?;
    chunk.truncate(read);
    Ok(chunk)
}
