//! OpenAI implementations of the two collaborators: Chat Completions with an
//! image input for the style analysis, Images Edits for the variations.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::base_image::BaseImage;
use crate::config::UpstreamConfig;
use crate::constants::{
    FALLBACK_STYLE_DESCRIPTION, IMAGE_SIZE, STYLE_ANALYSIS_INSTRUCTION, STYLE_ANALYSIS_MAX_TOKENS,
};
use crate::error::MonkeyGenError;
use crate::gallery::GeneratedImage;
use crate::orchestrator::{GenerationRequest, ImageGenerator, StyleAnalyzer};

// -----------------------------
// Chat Completions (vision)
// -----------------------------

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

// -----------------------------
// Images API
// -----------------------------

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Option<Vec<ImageData>>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Talks to the OpenAI REST API.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl OpenAiClient {
    /// Client for the given upstream config.
    pub fn new(config: UpstreamConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Client reusing an existing `reqwest::Client`.
    pub fn with_http_client(config: UpstreamConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// The config this client was built with.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, MonkeyGenError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(MonkeyGenError::NotConfigured)
    }

    /// Downloads an image the provider returned as a URL.
    pub async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>, MonkeyGenError> {
        let resp = self
            .http
            .get(url.clone())
            .timeout(self.config.generate_timeout)
            .send()
            .await
            .map_err(|err| MonkeyGenError::Upstream(format!("Failed to download image: {err}")))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| MonkeyGenError::Upstream(format!("Failed to read image: {err}")))?;
        if !status.is_success() {
            return Err(MonkeyGenError::Upstream(format!(
                "Image download error {status}"
            )));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl StyleAnalyzer for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.config.vision_model))]
    async fn analyze_style(&self, image: &BaseImage) -> Result<String, MonkeyGenError> {
        let api_key = self.api_key()?;
        let req_body = json!({
            "model": self.config.vision_model,
            "max_tokens": STYLE_ANALYSIS_MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": { "url": image.to_data_url(), "detail": "low" }
                    },
                    { "type": "text", "text": STYLE_ANALYSIS_INSTRUCTION }
                ]
            }]
        });

        let resp = self
            .http
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .timeout(self.config.analyze_timeout)
            .json(&req_body)
            .send()
            .await
            .map_err(|err| request_failed("chat/completions", &err))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| request_failed("chat/completions", &err))?;
        if !status.is_success() {
            return Err(MonkeyGenError::Upstream(error_message(status, &bytes)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes).map_err(|err| {
            MonkeyGenError::Upstream(format!("Failed to parse chat/completions JSON: {err}"))
        })?;
        let style = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| {
                debug!("Vision model returned no text, using fallback style");
                FALLBACK_STYLE_DESCRIPTION.to_string()
            });
        Ok(style)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.config.image_model))]
    async fn generate_image(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GeneratedImage, MonkeyGenError> {
        let api_key = self.api_key()?;
        let image = request.image;
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name())
            .mime_str(image.media_type())
            .map_err(|err| MonkeyGenError::InternalServerError(err.to_string()))?;
        let form = Form::new()
            .text("model", self.config.image_model.clone())
            .text("prompt", request.prompt.to_string())
            .text("n", "1")
            .text("size", IMAGE_SIZE)
            .part("image", part);

        let resp = self
            .http
            .post(self.config.endpoint("images/edits"))
            .bearer_auth(api_key)
            .timeout(self.config.generate_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|err| request_failed("images/edits", &err))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| request_failed("images/edits", &err))?;
        match status {
            StatusCode::UNAUTHORIZED => return Err(MonkeyGenError::InvalidCredential),
            StatusCode::TOO_MANY_REQUESTS => return Err(MonkeyGenError::RateLimited),
            StatusCode::BAD_REQUEST => {
                debug!("Image edit rejected: {}", error_message(status, &bytes));
                return Err(MonkeyGenError::ContentPolicy);
            }
            status if !status.is_success() => {
                return Err(MonkeyGenError::Upstream(error_message(status, &bytes)));
            }
            _ => {}
        }

        let parsed: ImagesResponse = serde_json::from_slice(&bytes).map_err(|err| {
            MonkeyGenError::Upstream(format!("Failed to parse images/edits JSON: {err}"))
        })?;
        let first = parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or(MonkeyGenError::NoImageReturned)?;

        if let Some(b64_json) = first.b64_json.filter(|value| !value.is_empty()) {
            let bytes = general_purpose::STANDARD.decode(b64_json).map_err(|err| {
                MonkeyGenError::Upstream(format!("Failed to base64-decode image: {err}"))
            })?;
            return Ok(GeneratedImage::Inline(bytes));
        }
        if let Some(url) = first.url.filter(|value| !value.is_empty()) {
            let url = Url::parse(&url).map_err(|err| {
                MonkeyGenError::Upstream(format!("Invalid image URL in response: {err}"))
            })?;
            return Ok(GeneratedImage::Remote(url));
        }
        Err(MonkeyGenError::NoImageReturned)
    }
}

fn request_failed(endpoint: &str, err: &reqwest::Error) -> MonkeyGenError {
    if err.is_timeout() {
        MonkeyGenError::Upstream(format!("Request to /{endpoint} timed out"))
    } else {
        MonkeyGenError::Upstream(format!("Request to /{endpoint} failed: {err}"))
    }
}

/// Pulls `error.message` out of an OpenAI error body, falling back to the raw text.
fn error_message(status: StatusCode, bytes: &[u8]) -> String {
    match serde_json::from_slice::<ApiErrorBody>(bytes) {
        Ok(body) => body.error.message,
        Err(_) => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim();
            if text.is_empty() {
                format!("OpenAI API error {status}")
            } else {
                format!("OpenAI API error {status}: {}", text.chars().take(300).collect::<String>())
            }
        }
    }
}
