pub(crate) use super::AppState;
pub(crate) use super::flash::{self, FlashMessage};
pub(crate) use crate::base_image::BaseImage;
pub(crate) use crate::error::MonkeyGenError;
pub(crate) use crate::gallery::GeneratedImage;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::Json;
pub(crate) use axum::extract::{Form, Multipart, Path, State};
pub(crate) use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use tracing::{debug, info, instrument, warn};
