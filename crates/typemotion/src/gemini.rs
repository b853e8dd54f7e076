//! HTTP client for the Gemini image, Veo video and text models.
//!
//! - keyframe: `models/{image_model}:generateContent` with an `IMAGE`
//!   response modality and `imageConfig.imageSize`
//! - video: `models/{video_model}:predictLongRunning`, then the returned
//!   operation is polled until done and the first sample downloaded
//! - style: `models/{text_model}:generateContent`, text parts joined
//!
//! Every non-success status becomes a [`GenerationFailure`] reading
//! `HTTP <status>: <body>`, so credential markers such as `404` still match.

use crate::capabilities::{GenerationService, ImageGenerationParams, VideoGenerationParams};
use crate::error::{GenerationFailure, GenerationResult, TypeMotionError, TypeMotionResult};
use crate::media::MediaResource;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const ASPECT_RATIO: &str = "16:9";

/// Endpoint and model selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API root, without the version segment
    pub base_url: String,
    /// Model producing the keyframe
    pub image_model: String,
    /// Model animating the keyframe
    pub video_model: String,
    /// Model suggesting styles
    pub text_model: String,
    /// Delay between operation polls (ms)
    pub poll_interval_ms: u64,
    /// Give up on a video operation after this many polls
    pub max_polls: u32,
    /// Timeout of a single HTTP request (s)
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            poll_interval_ms: 10_000,
            max_polls: 60,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    gemini: GeminiConfig,
}

impl GeminiConfig {
    /// Read the `gemini` section of a configuration document
    pub fn from_config_yaml(yaml: &str) -> TypeMotionResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: ConfigFile = serde_yaml_ng::from_str(yaml)?;
        Ok(file.gemini)
    }

    /// Poll interval as a duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// API key shared between the client and whatever collects it
#[derive(Debug, Clone, Default)]
pub struct SharedApiKey(Arc<RwLock<Option<String>>>);

impl SharedApiKey {
    /// Holder with an optional initial key
    #[must_use]
    pub fn new(key: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(key.filter(|k| !k.trim().is_empty()))))
    }

    /// Current key
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the key; blank input clears it
    pub fn set(&self, key: impl Into<String>) {
        let key = key.into();
        let key = (!key.trim().is_empty()).then(|| key.trim().to_string());
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = key;
    }

    /// Whether a key is present
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// [`GenerationService`] backed by the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
    key: SharedApiKey,
}

impl GeminiClient {
    /// Create a client whose requests time out after
    /// `request_timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMotionError::HttpClient`] if the HTTP client cannot be
    /// built.
    pub fn new(config: GeminiConfig, key: SharedApiKey) -> TypeMotionResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TypeMotionError::HttpClient {
                message: e.to_string(),
            })?;
        Ok(Self::with_client(config, key, client))
    }

    /// Create a client around an already configured [`reqwest::Client`]
    #[must_use]
    pub fn with_client(config: GeminiConfig, key: SharedApiKey, client: reqwest::Client) -> Self {
        Self {
            client,
            config: GeminiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            key,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.config.base_url)
    }

    fn api_key(&self) -> GenerationResult<String> {
        self.key
            .get()
            .ok_or_else(|| GenerationFailure::new("API key not set"))
    }

    async fn post_json(&self, url: &str, body: &Value) -> GenerationResult<Value> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(transport_failure)?;
        read_json(response).await
    }

    async fn get_json(&self, url: &str) -> GenerationResult<Value> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(transport_failure)?;
        read_json(response).await
    }

    async fn download(&self, uri: &str) -> GenerationResult<Vec<u8>> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_failure(status.as_u16(), &body));
        }
        let bytes = response.bytes().await.map_err(transport_failure)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate_image(&self, params: ImageGenerationParams) -> GenerationResult<MediaResource> {
        let url = self.model_url(&self.config.image_model, "generateContent");
        tracing::debug!(model = %self.config.image_model, size = params.image_size.as_str(), "requesting keyframe");
        let response = self.post_json(&url, &image_request_body(&params)).await?;
        parse_image_response(&response)
    }

    async fn generate_video(&self, params: VideoGenerationParams) -> GenerationResult<MediaResource> {
        let url = self.model_url(&self.config.video_model, "predictLongRunning");
        tracing::debug!(model = %self.config.video_model, resolution = params.quality.resolution(), "requesting video");
        let mut operation = self.post_json(&url, &video_request_body(&params)).await?;

        let name = operation_name(&operation)?;
        let mut polls = 0u32;
        while !operation_done(&operation) {
            if polls >= self.config.max_polls {
                return Err(GenerationFailure::new(format!(
                    "video generation did not finish after {polls} polls"
                )));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
            polls += 1;
            tracing::debug!(operation = %name, polls, "polling video operation");
            operation = self
                .get_json(&format!("{}/v1beta/{name}", self.config.base_url))
                .await?;
        }

        let uri = video_uri(&operation)?;
        let bytes = self.download(&uri).await?;
        Ok(MediaResource::new(bytes, "video/mp4"))
    }

    async fn suggest_style(&self, message: &str) -> GenerationResult<String> {
        let url = self.model_url(&self.config.text_model, "generateContent");
        let body = json!({
            "contents": [{ "parts": [{ "text": style_prompt(message) }] }]
        });
        let response = self.post_json(&url, &body).await?;
        Ok(response_text(&response))
    }
}

fn transport_failure(error: reqwest::Error) -> GenerationFailure {
    GenerationFailure::new(format!("request failed: {error}"))
}

fn http_failure(status: u16, body: &str) -> GenerationFailure {
    GenerationFailure::new(format!("HTTP {status}: {}", body.trim()))
}

async fn read_json(response: reqwest::Response) -> GenerationResult<Value> {
    let status = response.status();
    let body = response.text().await.map_err(transport_failure)?;
    if !status.is_success() {
        return Err(http_failure(status.as_u16(), &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| GenerationFailure::new(format!("malformed response: {e}")))
}

fn image_prompt(params: &ImageGenerationParams) -> String {
    let mut prompt = format!(
        "A single cinematic still of the text \"{}\" rendered as the hero of the frame. \
         Visual style: {}. The letters must be spelled exactly and fully legible.",
        params.message, params.style
    );
    if !params.typography.trim().is_empty() {
        prompt.push_str(" Typography: ");
        prompt.push_str(params.typography.trim());
        prompt.push('.');
    }
    if params.reference_image.is_some() {
        prompt.push_str(" Match the palette and mood of the reference image.");
    }
    prompt
}

fn video_prompt(params: &VideoGenerationParams) -> String {
    format!(
        "Animate this image: the text \"{}\" is revealed with fluid, physically plausible motion \
         in the style of {}. Keep the lettering stable and legible; the camera moves slowly.",
        params.message, params.style
    )
}

fn style_prompt(message: &str) -> String {
    format!(
        "Suggest one vivid visual style, in at most 25 words, for an animated typographic \
         artwork of the word \"{message}\". Reply with the style description only."
    )
}

fn image_request_body(params: &ImageGenerationParams) -> Value {
    let mut parts = Vec::new();
    if let Some(reference) = &params.reference_image {
        parts.push(json!({
            "inlineData": { "mimeType": reference.mime_type(), "data": reference.to_base64() }
        }));
    }
    parts.push(json!({ "text": image_prompt(params) }));

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": {
                "aspectRatio": ASPECT_RATIO,
                "imageSize": params.image_size.as_str()
            }
        }
    })
}

fn video_request_body(params: &VideoGenerationParams) -> Value {
    json!({
        "instances": [{
            "prompt": video_prompt(params),
            "image": {
                "bytesBase64Encoded": params.keyframe.to_base64(),
                "mimeType": params.keyframe.mime_type()
            }
        }],
        "parameters": {
            "aspectRatio": ASPECT_RATIO,
            "resolution": params.quality.resolution()
        }
    })
}

fn candidate_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn parse_image_response(response: &Value) -> GenerationResult<MediaResource> {
    let inline = candidate_parts(response)
        .find_map(|part| part.get("inlineData"))
        .ok_or_else(|| {
            let reason = response
                .pointer("/candidates/0/finishReason")
                .and_then(Value::as_str)
                .unwrap_or("no image returned");
            GenerationFailure::new(format!("image generation failed: {reason}"))
        })?;

    let data = inline
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationFailure::new("image part has no data"))?;
    let mime_type = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("image/png");
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| GenerationFailure::new(format!("image data is not base64: {e}")))?;
    Ok(MediaResource::new(bytes, mime_type))
}

fn response_text(response: &Value) -> String {
    candidate_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>()
        .trim()
        .to_string()
}

fn operation_name(operation: &Value) -> GenerationResult<String> {
    operation
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| GenerationFailure::new("video operation has no name"))
}

fn operation_done(operation: &Value) -> bool {
    operation.get("done").and_then(Value::as_bool).unwrap_or(false)
}

fn video_uri(operation: &Value) -> GenerationResult<String> {
    if let Some(message) = operation.pointer("/error/message").and_then(Value::as_str) {
        return Err(GenerationFailure::new(message));
    }
    operation
        .pointer("/response/generateVideoResponse/generatedSamples/0/video/uri")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| GenerationFailure::new("video generation returned no video"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::{ImageSize, QualityTier};

    fn image_params() -> ImageGenerationParams {
        ImageGenerationParams {
            message: "AURORA".to_string(),
            style: "liquid chrome".to_string(),
            typography: "condensed sans".to_string(),
            reference_image: Some(MediaResource::new(vec![1u8, 2, 3], "image/jpeg")),
            image_size: ImageSize::TwoK,
        }
    }

    mod request_tests {
        use super::*;

        #[test]
        fn test_image_body() {
            let body = image_request_body(&image_params());
            assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
            assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");

            let parts = body["contents"][0]["parts"].as_array().unwrap();
            assert_eq!(parts.len(), 2);
            assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
            assert_eq!(parts[0]["inlineData"]["data"], "AQID");
            let prompt = parts[1]["text"].as_str().unwrap();
            assert!(prompt.contains("\"AURORA\""));
            assert!(prompt.contains("liquid chrome"));
            assert!(prompt.contains("condensed sans"));
        }

        #[test]
        fn test_image_body_without_reference() {
            let params = ImageGenerationParams {
                reference_image: None,
                typography: String::new(),
                ..image_params()
            };
            let body = image_request_body(&params);
            let parts = body["contents"][0]["parts"].as_array().unwrap();
            assert_eq!(parts.len(), 1);
            assert!(!parts[0]["text"].as_str().unwrap().contains("Typography"));
        }

        #[test]
        fn test_video_body() {
            let params = VideoGenerationParams {
                message: "AURORA".to_string(),
                keyframe: MediaResource::new(vec![0xffu8], "image/png"),
                style: "liquid chrome".to_string(),
                quality: QualityTier::High,
            };
            let body = video_request_body(&params);
            assert_eq!(body["parameters"]["resolution"], "4k");
            assert_eq!(body["instances"][0]["image"]["mimeType"], "image/png");
            assert_eq!(body["instances"][0]["image"]["bytesBase64Encoded"], "/w==");
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_parse_image() {
            let response = json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                ]}}]
            });
            let image = parse_image_response(&response).unwrap();
            assert_eq!(image.bytes(), &[1, 2, 3]);
            assert_eq!(image.mime_type(), "image/png");
        }

        #[test]
        fn test_missing_image_reports_reason() {
            let response = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
            let err = parse_image_response(&response).unwrap_err();
            assert!(err.message.contains("SAFETY"));
        }

        #[test]
        fn test_response_text_joined_and_trimmed() {
            let response = json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "  neon " }, { "text": "noir\n" }
                ]}}]
            });
            assert_eq!(response_text(&response), "neon noir");
            assert_eq!(response_text(&json!({})), "");
        }

        #[test]
        fn test_operation_helpers() {
            let pending = json!({ "name": "models/veo/operations/abc" });
            assert_eq!(operation_name(&pending).unwrap(), "models/veo/operations/abc");
            assert!(!operation_done(&pending));

            let done = json!({
                "name": "models/veo/operations/abc",
                "done": true,
                "response": { "generateVideoResponse": { "generatedSamples": [
                    { "video": { "uri": "https://example.invalid/v.mp4" } }
                ]}}
            });
            assert!(operation_done(&done));
            assert_eq!(video_uri(&done).unwrap(), "https://example.invalid/v.mp4");
        }

        #[test]
        fn test_operation_error_message_kept() {
            let failed = json!({
                "done": true,
                "error": { "code": 404, "message": "Requested entity was not found." }
            });
            let err = video_uri(&failed).unwrap_err();
            assert!(err.is_credential_problem(&["Requested entity was not found"]));
        }

        #[test]
        fn test_http_failure_keeps_status() {
            let failure = http_failure(404, " {\"error\":\"not found\"}\n");
            assert_eq!(failure.message, "HTTP 404: {\"error\":\"not found\"}");
            assert!(failure.is_credential_problem(&["404"]));
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_section_parsed_with_defaults() {
            let config =
                GeminiConfig::from_config_yaml("gif:\n  fps: 8\ngemini:\n  max_polls: 3\n").unwrap();
            assert_eq!(config.max_polls, 3);
            assert_eq!(config.image_model, GeminiConfig::default().image_model);
            assert_eq!(GeminiConfig::from_config_yaml("").unwrap(), GeminiConfig::default());
        }

        #[test]
        fn test_shared_key() {
            let key = SharedApiKey::new(Some("  ".to_string()));
            assert!(!key.is_set());
            let clone = key.clone();
            clone.set(" abc ");
            assert_eq!(key.get(), Some("abc".to_string()));
        }

        #[test]
        fn test_new_normalizes_base_url() {
            let config = GeminiConfig {
                base_url: "http://localhost:9/".to_string(),
                request_timeout_secs: 0,
                ..GeminiConfig::default()
            };
            let client = GeminiClient::new(config, SharedApiKey::default()).unwrap();
            assert_eq!(client.config().base_url, "http://localhost:9");
            assert_eq!(
                client.model_url("m", "generateContent"),
                "http://localhost:9/v1beta/models/m:generateContent"
            );
        }

        #[test]
        fn test_with_client_keeps_config() {
            let http = reqwest::Client::builder().build().unwrap();
            let client = GeminiClient::with_client(
                GeminiConfig::default(),
                SharedApiKey::new(Some("k".to_string())),
                http,
            );
            assert_eq!(client.config().text_model, GeminiConfig::default().text_model);
        }

        #[tokio::test]
        async fn test_missing_key_fails_before_request() {
            let client =
                GeminiClient::new(GeminiConfig::default(), SharedApiKey::default()).unwrap();
            let err = client.suggest_style("HI").await.unwrap_err();
            assert_eq!(err.message, "API key not set");
        }
    }
}
