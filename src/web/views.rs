//! The studio page and the handlers behind its forms.

use std::collections::BTreeSet;

use super::prelude::*;
use crate::constants::COUNT_CHOICES;
use crate::gallery::{ProgressState, Slot, download_filename, estimated_cost_usd};
use crate::orchestrator::RunPhase;
use crate::studio::{Studio, StudioSettings};
use crate::trait_pool::TraitCategory;

#[derive(Clone, Debug)]
pub(crate) struct TraitToggle {
    pub(crate) id: &'static str,
    pub(crate) label: &'static str,
    pub(crate) active: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct CountChoice {
    pub(crate) value: u32,
    pub(crate) selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct SlotView {
    pub(crate) label: String,
    pub(crate) state: &'static str,
    pub(crate) prompt: String,
    pub(crate) image_url: String,
    pub(crate) download_url: String,
    pub(crate) file_name: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) flash: Option<FlashMessage>,
    pub(crate) has_base_image: bool,
    pub(crate) base_image_url: String,
    pub(crate) style_description: Option<String>,
    pub(crate) traits: Vec<TraitToggle>,
    pub(crate) counts: Vec<CountChoice>,
    pub(crate) extra_prompt: String,
    pub(crate) estimated_cost: String,
    pub(crate) running: bool,
    pub(crate) phase: &'static str,
    pub(crate) failure: Option<String>,
    pub(crate) progress: ProgressState,
    pub(crate) percent: u32,
    pub(crate) slots: Vec<SlotView>,
    pub(crate) succeeded: usize,
    pub(crate) spent: String,
    pub(crate) run_window: Option<String>,
}

impl IndexTemplate {
    fn new(studio: &Studio, flash: Option<FlashMessage>) -> Self {
        let settings = studio.settings();
        let run_id = studio.run_id();
        let progress = studio.progress().clone();

        // an aborted run never reaches its remaining indices
        let shown = match studio.phase() {
            RunPhase::Failed(_) => studio.gallery().outcomes().len() as u32,
            _ => progress.total,
        };
        let slots = if run_id == 0 {
            Vec::new()
        } else {
            (1..=shown)
                .map(|index| slot_view(studio, run_id, index))
                .collect()
        };
        let failure = match studio.phase() {
            RunPhase::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        let run_window = studio.started_at().map(|started| {
            let started = started.format("%H:%M:%S UTC");
            match studio.finished_at() {
                Some(finished) => {
                    format!("Started {started}, finished {}", finished.format("%H:%M:%S UTC"))
                }
                None => format!("Started {started}"),
            }
        });

        Self {
            flash,
            has_base_image: studio.base_image().is_some(),
            base_image_url: format!("/studio/base-image?rev={}", studio.image_revision()),
            style_description: studio.style_description().map(str::to_string),
            traits: TraitCategory::ALL
                .iter()
                .map(|category| TraitToggle {
                    id: category.id(),
                    label: category.label(),
                    active: settings.active.contains(category),
                })
                .collect(),
            counts: COUNT_CHOICES
                .iter()
                .map(|value| CountChoice {
                    value: *value,
                    selected: *value == settings.count,
                })
                .collect(),
            extra_prompt: settings.extra_prompt.clone(),
            estimated_cost: format!("{:.2}", estimated_cost_usd(settings.count as usize)),
            running: studio.phase().is_active(),
            phase: studio.phase().name(),
            failure,
            percent: progress.percent(),
            progress,
            slots,
            succeeded: studio.gallery().succeeded(),
            spent: format!("{:.2}", estimated_cost_usd(studio.gallery().succeeded())),
            run_window,
        }
    }
}

fn slot_view(studio: &Studio, run_id: u64, index: u32) -> SlotView {
    let (state, prompt) = match studio.gallery().slot(index) {
        Slot::Pending => ("pending", String::new()),
        Slot::Failed => ("failed", outcome_prompt(studio, index)),
        Slot::Ready(_) => ("ready", outcome_prompt(studio, index)),
    };
    SlotView {
        label: format!("#{index:03}"),
        state,
        prompt,
        image_url: format!("/studio/outcomes/{index}/image?run={run_id}"),
        download_url: format!("/studio/outcomes/{index}/download"),
        file_name: download_filename(index),
    }
}

fn outcome_prompt(studio: &Studio, index: u32) -> String {
    studio
        .gallery()
        .get(index)
        .map(|outcome| outcome.prompt.clone())
        .unwrap_or_default()
}

/// GET /
pub(crate) async fn index_handler(State(state): State<AppState>) -> IndexTemplate {
    let flash = flash::take_flash_message(&state).await;
    let studio = state.studio.read().await;
    IndexTemplate::new(&studio, flash)
}

/// POST /studio/image
#[instrument(skip_all)]
pub(crate) async fn upload_image_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, MonkeyGenError> {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        // browsers send octet-stream when they can't tell
        let content_type = field
            .content_type()
            .filter(|value| *value != "application/octet-stream")
            .map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((bytes.to_vec(), content_type));
    }

    let result = match upload {
        Some((bytes, content_type)) => match BaseImage::new(bytes, content_type.as_deref()) {
            Ok(image) => state.studio.write().await.load_image(image),
            Err(err) => Err(err),
        },
        None => Err(MonkeyGenError::BadRequest("No image provided".to_string())),
    };
    let message = match result {
        Ok(()) => FlashMessage::success("Base image loaded. Its style is analysed on the next run."),
        Err(err) => {
            warn!("Base image rejected: {}", err);
            FlashMessage::error(err.to_string())
        }
    };
    flash::set_flash(&state, message).await;
    Ok(Redirect::to("/"))
}

/// Reads the run form: `count`, one `trait` value per checked category and
/// `extra_prompt`.
pub(crate) fn parse_run_form(fields: &[(String, String)]) -> Result<StudioSettings, MonkeyGenError> {
    let mut settings = StudioSettings {
        active: BTreeSet::new(),
        ..StudioSettings::default()
    };
    for (key, value) in fields {
        match key.as_str() {
            "count" => {
                settings.count = value.trim().parse().map_err(|_| {
                    MonkeyGenError::BadRequest(format!("Invalid count {value:?}"))
                })?;
            }
            "trait" => {
                settings.active.insert(value.parse()?);
            }
            "extra_prompt" => settings.extra_prompt = value.clone(),
            other => debug!("Ignoring form field {}", other),
        }
    }
    Ok(settings)
}

/// POST /studio/run
#[instrument(skip_all)]
pub(crate) async fn start_run_handler(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let result = match parse_run_form(&fields) {
        Ok(settings) => state.start_run(settings).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(run_id) => info!("Run {} started", run_id),
        Err(err) => {
            warn!("Run not started: {}", err);
            flash::set_flash(&state, FlashMessage::error(err.to_string())).await;
        }
    }
    Redirect::to("/")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OutcomeSnapshot {
    pub(crate) index: u32,
    pub(crate) state: &'static str,
    pub(crate) prompt: String,
    pub(crate) image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressSnapshot {
    pub(crate) run_id: u64,
    pub(crate) phase: &'static str,
    pub(crate) error: Option<String>,
    pub(crate) progress: ProgressState,
    pub(crate) percent: u32,
    pub(crate) style_description: Option<String>,
    pub(crate) succeeded: usize,
    pub(crate) outcomes: Vec<OutcomeSnapshot>,
}

impl From<&Studio> for ProgressSnapshot {
    fn from(studio: &Studio) -> Self {
        let error = match studio.phase() {
            RunPhase::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            run_id: studio.run_id(),
            phase: studio.phase().name(),
            error,
            progress: studio.progress().clone(),
            percent: studio.progress().percent(),
            style_description: studio.style_description().map(str::to_string),
            succeeded: studio.gallery().succeeded(),
            outcomes: studio
                .gallery()
                .outcomes()
                .iter()
                .map(|outcome| OutcomeSnapshot {
                    index: outcome.index,
                    state: if outcome.succeeded() { "ready" } else { "failed" },
                    prompt: outcome.prompt.clone(),
                    image_url: outcome
                        .succeeded()
                        .then(|| format!("/studio/outcomes/{}/image", outcome.index)),
                })
                .collect(),
        }
    }
}

/// GET /studio/progress
pub(crate) async fn progress_handler(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    let studio = state.studio.read().await;
    Json(ProgressSnapshot::from(&*studio))
}

/// GET /studio/base-image
pub(crate) async fn base_image_handler(
    State(state): State<AppState>,
) -> Result<Response, MonkeyGenError> {
    let image = state
        .studio
        .read()
        .await
        .base_image()
        .cloned()
        .ok_or_else(|| MonkeyGenError::NotFound("base image".to_string()))?;
    Ok(([(CONTENT_TYPE, image.media_type())], image.bytes().to_vec()).into_response())
}

async fn outcome_image(state: &AppState, index: u32) -> Result<GeneratedImage, MonkeyGenError> {
    let studio = state.studio.read().await;
    let outcome = studio
        .gallery()
        .get(index)
        .ok_or_else(|| MonkeyGenError::NotFound(format!("outcome {index}")))?;
    outcome
        .image
        .clone()
        .ok_or_else(|| MonkeyGenError::NotFound(format!("image of failed outcome {index}")))
}

/// GET /studio/outcomes/{index}/image
pub(crate) async fn outcome_image_handler(
    State(state): State<AppState>,
    Path(index): Path<u32>,
) -> Result<Response, MonkeyGenError> {
    Ok(match outcome_image(&state, index).await? {
        GeneratedImage::Inline(bytes) => ([(CONTENT_TYPE, "image/png")], bytes).into_response(),
        GeneratedImage::Remote(url) => Redirect::temporary(url.as_str()).into_response(),
    })
}

/// GET /studio/outcomes/{index}/download
pub(crate) async fn outcome_download_handler(
    State(state): State<AppState>,
    Path(index): Path<u32>,
) -> Result<Response, MonkeyGenError> {
    Ok(match outcome_image(&state, index).await? {
        GeneratedImage::Inline(bytes) => (
            [
                (CONTENT_TYPE, "image/png".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", download_filename(index)),
                ),
            ],
            bytes,
        )
            .into_response(),
        GeneratedImage::Remote(url) => Redirect::temporary(url.as_str()).into_response(),
    })
}
