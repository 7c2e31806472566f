//! Drives a generation run: one style analysis, then N sequential image edits.
//!
//! A [`Run`] is a lazy sequence. Nothing is sent upstream until the caller
//! pulls the next outcome, and only one upstream call is ever in flight.
//! Abandoning a run is just dropping it.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

use crate::base_image::BaseImage;
use crate::error::MonkeyGenError;
use crate::gallery::{Gallery, GeneratedImage, ProgressState, VariationOutcome};
use crate::prompt::compose;
use crate::trait_pool::TraitCategory;

/// Status label while the style is being analysed.
pub const STATUS_ANALYZING: &str = "Analyzing style...";
/// Status label of a finished run.
pub const STATUS_DONE: &str = "Done!";

/// Produces a short style description of an image.
#[async_trait]
pub trait StyleAnalyzer: Send + Sync {
    /// Describes the visual style of `image`.
    async fn analyze_style(&self, image: &BaseImage) -> Result<String, MonkeyGenError>;
}

/// Produces a new image from the base image and a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Runs one image edit.
    async fn generate_image(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GeneratedImage, MonkeyGenError>;
}

/// Input of one generation attempt. Lives only for the duration of the call.
#[derive(Clone, Copy, Debug)]
pub struct GenerationRequest<'a> {
    /// Image to vary
    pub image: &'a BaseImage,
    /// Instruction for the image model
    pub prompt: &'a str,
}

/// What the caller asks a run to do.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Image every variation starts from
    pub image: Arc<BaseImage>,
    /// Number of variations
    pub count: u32,
    /// Trait categories to sample
    pub active: BTreeSet<TraitCategory>,
    /// Free text appended to every prompt
    pub extra_prompt: Option<String>,
    /// Style description cached for this image, if any
    pub cached_style: Option<String>,
}

/// Where a run is in its life.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing started
    #[default]
    Idle,
    /// Waiting for the style description
    AnalyzingStyle,
    /// Generating variations
    Generating,
    /// Every attempt was made
    Completed,
    /// The run was aborted, by a style analysis failure or an unrecordable outcome
    Failed(String),
}

impl RunPhase {
    /// True while upstream calls may still happen.
    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::AnalyzingStyle | RunPhase::Generating)
    }

    /// Short name for JSON and CSS classes.
    pub fn name(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::AnalyzingStyle => "analyzing",
            RunPhase::Generating => "generating",
            RunPhase::Completed => "completed",
            RunPhase::Failed(_) => "failed",
        }
    }
}

/// Holds the two collaborators and starts runs.
#[derive(Clone)]
pub struct Orchestrator {
    analyzer: Arc<dyn StyleAnalyzer>,
    generator: Arc<dyn ImageGenerator>,
}

impl Orchestrator {
    /// New orchestrator over the given collaborators.
    pub fn new(analyzer: Arc<dyn StyleAnalyzer>, generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            analyzer,
            generator,
        }
    }

    /// The style analyzer.
    pub fn analyzer(&self) -> &Arc<dyn StyleAnalyzer> {
        &self.analyzer
    }

    /// The image generator.
    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    /// Starts a run. No upstream call is made until the run is pulled.
    pub fn run(&self, request: RunRequest, rng: StdRng) -> Run {
        Run::new(self.clone(), request, rng)
    }
}

/// An attempt whose prompt is composed but whose image is not yet requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based index
    pub index: u32,
    /// Composed prompt
    pub prompt: String,
}

/// One run of the orchestrator.
pub struct Run {
    orchestrator: Orchestrator,
    request: RunRequest,
    style: Option<String>,
    next_index: u32,
    progress: ProgressState,
    phase: RunPhase,
    rng: StdRng,
}

impl Run {
    fn new(orchestrator: Orchestrator, request: RunRequest, rng: StdRng) -> Self {
        let style = request.cached_style.clone();
        let phase = if request.count == 0 {
            RunPhase::Completed
        } else if style.is_some() {
            RunPhase::Generating
        } else {
            RunPhase::AnalyzingStyle
        };
        let status = match phase {
            RunPhase::AnalyzingStyle => STATUS_ANALYZING.to_string(),
            RunPhase::Generating => generating_label(1),
            _ => STATUS_DONE.to_string(),
        };
        Self {
            orchestrator,
            progress: ProgressState {
                completed: 0,
                total: request.count,
                status,
            },
            request,
            style,
            next_index: 1,
            phase,
            rng,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Current progress.
    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// The style description once known.
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Makes sure a style description exists, asking the analyzer at most once.
    ///
    /// On failure the run moves to [`RunPhase::Failed`] and yields nothing more.
    pub async fn ensure_style(&mut self) -> Result<&str, MonkeyGenError> {
        if let RunPhase::Failed(reason) = &self.phase {
            return Err(MonkeyGenError::Upstream(reason.clone()));
        }
        if self.style.is_none() {
            info!("Analyzing style of {:?}", self.request.image);
            match self
                .orchestrator
                .analyzer
                .analyze_style(&self.request.image)
                .await
            {
                Ok(style) => {
                    debug!("Style description: {}", style);
                    self.style = Some(style);
                    if self.phase == RunPhase::AnalyzingStyle {
                        self.phase = RunPhase::Generating;
                        self.progress.status = generating_label(self.next_index);
                    }
                }
                Err(err) => {
                    warn!("Style analysis failed, aborting run: {}", err);
                    self.phase = RunPhase::Failed(err.to_string());
                    self.progress.status = format!("Style analysis failed: {err}");
                    return Err(err);
                }
            }
        }
        Ok(self.style.as_deref().unwrap_or_default())
    }

    /// Composes the prompt of the next attempt, or `None` once all were made.
    ///
    /// Call [`Run::ensure_style`] first.
    pub fn begin_attempt(&mut self) -> Result<Option<Attempt>, MonkeyGenError> {
        if self.phase != RunPhase::Generating {
            return match &self.phase {
                RunPhase::Failed(reason) => Err(MonkeyGenError::Upstream(reason.clone())),
                RunPhase::Completed => Ok(None),
                _ => Err(MonkeyGenError::InternalServerError(
                    "attempt started before the style was known".to_string(),
                )),
            };
        }
        let style = self.style.as_deref().unwrap_or_default();
        let prompt = compose(
            style,
            &self.request.active,
            self.request.extra_prompt.as_deref(),
            &mut self.rng,
        );
        self.progress.status = generating_label(self.next_index);
        Ok(Some(Attempt {
            index: self.next_index,
            prompt,
        }))
    }

    /// Requests the image for `attempt` and records the result.
    ///
    /// Upstream failures become a failed outcome; they never end the run.
    #[instrument(skip_all, fields(index = attempt.index))]
    pub async fn finish_attempt(&mut self, attempt: Attempt) -> VariationOutcome {
        let request = GenerationRequest {
            image: &self.request.image,
            prompt: &attempt.prompt,
        };
        let result = self.orchestrator.generator.generate_image(&request).await;
        let image = match result {
            Ok(image) => {
                self.progress.status = format!("Generated #{:03} ✓", attempt.index);
                Some(image)
            }
            Err(err) => {
                warn!("NFT #{} failed: {}", attempt.index, err);
                self.progress.status = format!("Failed #{:03}", attempt.index);
                None
            }
        };

        self.progress.completed = attempt.index;
        self.next_index = attempt.index + 1;
        if attempt.index >= self.request.count {
            self.phase = RunPhase::Completed;
            self.progress.status = STATUS_DONE.to_string();
        }

        VariationOutcome {
            index: attempt.index,
            image,
            prompt: attempt.prompt,
        }
    }

    /// Pulls the next outcome, analysing the style first if needed.
    ///
    /// `Ok(None)` once the run is complete. An error means the style analysis
    /// failed and the run is over.
    pub async fn next_outcome(&mut self) -> Result<Option<VariationOutcome>, MonkeyGenError> {
        if self.phase == RunPhase::Completed {
            return Ok(None);
        }
        self.ensure_style().await?;
        match self.begin_attempt()? {
            Some(attempt) => Ok(Some(self.finish_attempt(attempt).await)),
            None => Ok(None),
        }
    }

    /// Pulls every outcome into `gallery`, which is reset first.
    pub async fn run_to_completion(&mut self, gallery: &mut Gallery) -> Result<(), MonkeyGenError> {
        gallery.reset();
        while let Some(outcome) = self.next_outcome().await? {
            gallery.record(outcome)?;
        }
        Ok(())
    }
}

fn generating_label(index: u32) -> String {
    format!("Generating #{index:03}...")
}
