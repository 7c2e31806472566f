//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, info, warn};

use crate::constants::NOT_CONFIGURED_MESSAGE;

/// definitions for the monkeygen application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonkeyGenError {
    /// No upstream API key was configured
    NotConfigured,
    /// When you didn't do the right thing
    BadRequest(String),
    /// Upload is over the size limit
    PayloadTooLarge,
    /// Upload isn't one of the raster formats we take
    UnsupportedMediaType(String),
    /// Upstream rejected the API key
    InvalidCredential,
    /// Upstream rate limit hit
    RateLimited,
    /// Upstream refused the prompt
    ContentPolicy,
    /// Upstream answered but without an image
    NoImageReturned,
    /// Any other upstream failure
    Upstream(String),
    /// A run is still going
    RunInProgress,
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl MonkeyGenError {
    /// HTTP status sent back for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConfigured
            | Self::NoImageReturned
            | Self::Upstream(_)
            | Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) | Self::ContentPolicy => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::RunInProgress => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl std::fmt::Display for MonkeyGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => f.write_str(NOT_CONFIGURED_MESSAGE),
            Self::BadRequest(message) => f.write_str(message),
            Self::PayloadTooLarge => f.write_str("Image is larger than 5MB"),
            Self::UnsupportedMediaType(media_type) => {
                write!(f, "Unsupported image type {media_type}, use PNG, JPG or WebP")
            }
            Self::InvalidCredential => f.write_str("Invalid API key or no access to gpt-image-1"),
            Self::RateLimited => f.write_str("Rate limit hit, wait a moment and retry"),
            Self::ContentPolicy => {
                f.write_str("Prompt rejected by content policy, try different traits")
            }
            Self::NoImageReturned => f.write_str("No image in response"),
            Self::Upstream(message) => f.write_str(message),
            Self::RunInProgress => f.write_str("A generation run is already in progress"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::InternalServerError(_) => f.write_str("Internal server error"),
        }
    }
}

impl std::error::Error for MonkeyGenError {}

impl From<std::io::Error> for MonkeyGenError {
    fn from(err: std::io::Error) -> Self {
        MonkeyGenError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for MonkeyGenError {
    fn from(err: axum::http::Error) -> Self {
        MonkeyGenError::InternalServerError(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for MonkeyGenError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        MonkeyGenError::BadRequest(err.body_text())
    }
}

impl IntoResponse for MonkeyGenError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match &self {
            MonkeyGenError::InternalServerError(message) => {
                error!("Internal server error: {}", message);
            }
            MonkeyGenError::NotConfigured | MonkeyGenError::Upstream(_) => {
                error!("{}", self);
            }
            MonkeyGenError::InvalidCredential
            | MonkeyGenError::RateLimited
            | MonkeyGenError::ContentPolicy
            | MonkeyGenError::NoImageReturned => {
                warn!("Upstream error: {}", self);
            }
            _ => info!("{} {}", status.as_u16(), self),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
