//! The two stateless JSON boundaries. Each request carries everything it needs.

use base64::Engine;
use base64::engine::general_purpose;

use super::prelude::*;
use crate::orchestrator::GenerationRequest;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct AnalyzeRequest {
    pub(crate) image_base64: Option<String>,
    pub(crate) mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyzeResponse {
    pub(crate) style_description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct GenerateRequest {
    pub(crate) image_base64: Option<String>,
    pub(crate) mime_type: Option<String>,
    pub(crate) prompt: Option<String>,
}

/// `{"b64": ...}` or `{"url": ...}`
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GenerateResponse {
    B64(String),
    Url(String),
}

impl From<GeneratedImage> for GenerateResponse {
    fn from(image: GeneratedImage) -> Self {
        match image {
            GeneratedImage::Inline(bytes) => Self::B64(general_purpose::STANDARD.encode(bytes)),
            GeneratedImage::Remote(url) => Self::Url(url.to_string()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// POST /api/analyze
#[instrument(skip_all)]
pub(crate) async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, MonkeyGenError> {
    state.ensure_configured()?;
    let payload = non_blank(request.image_base64)
        .ok_or_else(|| MonkeyGenError::BadRequest("No image provided".to_string()))?;
    let image = BaseImage::from_base64(&payload, request.mime_type.as_deref())?;

    let style_description = state.orchestrator.analyzer().analyze_style(&image).await?;
    Ok(Json(AnalyzeResponse { style_description }))
}

/// POST /api/generate
#[instrument(skip_all)]
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, MonkeyGenError> {
    state.ensure_configured()?;
    let (Some(payload), Some(prompt)) = (
        non_blank(request.image_base64),
        non_blank(request.prompt),
    ) else {
        return Err(MonkeyGenError::BadRequest(
            "Missing imageBase64 or prompt".to_string(),
        ));
    };
    let image = BaseImage::from_base64(&payload, request.mime_type.as_deref())?;

    let generated = state
        .orchestrator
        .generator()
        .generate_image(&GenerationRequest {
            image: &image,
            prompt: &prompt,
        })
        .await?;
    debug!("Generated {:?}", generated);
    Ok(Json(generated.into()))
}
