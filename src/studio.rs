//! The studio controller: the one place that owns the loaded base image, the
//! cached style, the trait selection, the gallery and the progress of the
//! current run.
//!
//! Runs execute in a background task that reports back through
//! [`Studio::apply`]. Every update carries the id of the run it belongs to and
//! updates from a superseded run are dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::base_image::BaseImage;
use crate::constants::{DEFAULT_COUNT, MAX_COUNT};
use crate::error::MonkeyGenError;
use crate::gallery::{Gallery, ProgressState, VariationOutcome};
use crate::orchestrator::{Orchestrator, RunPhase, RunRequest, STATUS_ANALYZING};
use crate::style::StyleCache;
use crate::trait_pool::{TraitCategory, default_active};

/// What the user picked for the next run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudioSettings {
    /// Trait categories to vary
    pub active: BTreeSet<TraitCategory>,
    /// Number of variations
    pub count: u32,
    /// Free text appended to every prompt
    pub extra_prompt: String,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            active: default_active(),
            count: DEFAULT_COUNT,
            extra_prompt: String::new(),
        }
    }
}

impl StudioSettings {
    fn validate(&self) -> Result<(), MonkeyGenError> {
        if self.count == 0 || self.count > MAX_COUNT {
            return Err(MonkeyGenError::BadRequest(format!(
                "Count must be between 1 and {MAX_COUNT}"
            )));
        }
        Ok(())
    }
}

/// Everything a background task needs to execute a run.
#[derive(Debug)]
pub struct RunTicket {
    /// Id checked on every update
    pub run_id: u64,
    /// Base image revision the run started on
    pub revision: u64,
    /// Input for the orchestrator
    pub request: RunRequest,
}

/// A change reported by a running task.
#[derive(Clone, Debug)]
pub enum RunUpdate {
    /// The style analysis finished
    Style {
        /// Base image revision it describes
        revision: u64,
        /// The description
        description: String,
    },
    /// Progress moved without a new outcome
    Progress {
        /// New progress
        progress: ProgressState,
        /// New phase
        phase: RunPhase,
    },
    /// An attempt resolved
    Outcome {
        /// The resolved outcome
        outcome: VariationOutcome,
        /// New progress
        progress: ProgressState,
        /// New phase
        phase: RunPhase,
    },
}

/// Controller state shared by the web handlers.
#[derive(Debug, Default)]
pub struct Studio {
    base_image: Option<Arc<BaseImage>>,
    style: StyleCache,
    settings: StudioSettings,
    gallery: Gallery,
    progress: ProgressState,
    phase: RunPhase,
    run_id: u64,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Studio {
    /// Empty studio with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded base image.
    pub fn base_image(&self) -> Option<&Arc<BaseImage>> {
        self.base_image.as_ref()
    }

    /// Bumped every time a base image is loaded.
    pub fn image_revision(&self) -> u64 {
        self.style.revision()
    }

    /// Cached style description of the loaded image.
    pub fn style_description(&self) -> Option<&str> {
        self.style.get()
    }

    /// Settings of the last run, or the defaults.
    pub fn settings(&self) -> &StudioSettings {
        &self.settings
    }

    /// Outcomes of the current run.
    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Progress of the current run.
    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Phase of the current run.
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Id of the current run, zero before the first one.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// When the current run started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the current run reached a terminal phase.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Replaces the base image and forgets its style. Refused during a run.
    pub fn load_image(&mut self, image: BaseImage) -> Result<(), MonkeyGenError> {
        if self.phase.is_active() {
            return Err(MonkeyGenError::RunInProgress);
        }
        let revision = self.style.revision() + 1;
        info!("Loaded base image {:?} as revision {}", image, revision);
        self.base_image = Some(Arc::new(image));
        self.style.invalidate(revision);
        Ok(())
    }

    /// Resets the gallery and progress and hands out a ticket for a new run.
    pub fn begin_run(&mut self, settings: StudioSettings) -> Result<RunTicket, MonkeyGenError> {
        if self.phase.is_active() {
            return Err(MonkeyGenError::RunInProgress);
        }
        settings.validate()?;
        let image = self
            .base_image
            .clone()
            .ok_or_else(|| MonkeyGenError::BadRequest("Upload a base image first".to_string()))?;

        let cached_style = self.style.get().map(str::to_string);
        self.run_id += 1;
        self.gallery.reset();
        self.phase = if cached_style.is_some() {
            RunPhase::Generating
        } else {
            RunPhase::AnalyzingStyle
        };
        self.progress = ProgressState {
            completed: 0,
            total: settings.count,
            status: if cached_style.is_some() {
                "Generating #001...".to_string()
            } else {
                STATUS_ANALYZING.to_string()
            },
        };
        self.started_at = Some(Utc::now());
        self.finished_at = None;

        let extra = settings.extra_prompt.trim();
        let request = RunRequest {
            image,
            count: settings.count,
            active: settings.active.clone(),
            extra_prompt: (!extra.is_empty()).then(|| extra.to_string()),
            cached_style,
        };
        self.settings = settings;
        info!(
            "Starting run {} with {} variations",
            self.run_id, request.count
        );
        Ok(RunTicket {
            run_id: self.run_id,
            revision: self.style.revision(),
            request,
        })
    }

    /// Applies an update from run `run_id`. Returns `false` if that run was
    /// superseded or its outcome could not be recorded, in which case the
    /// caller should stop. A rejected outcome moves the run to `Failed`.
    pub fn apply(&mut self, run_id: u64, update: RunUpdate) -> bool {
        if run_id != self.run_id {
            debug!("Dropping update from stale run {}", run_id);
            return false;
        }
        match update {
            RunUpdate::Style {
                revision,
                description,
            } => {
                if !self.style.set(revision, description) {
                    debug!("Style for revision {} not cached", revision);
                }
            }
            RunUpdate::Progress { progress, phase } => self.set_progress(progress, phase),
            RunUpdate::Outcome {
                outcome,
                progress,
                phase,
            } => {
                if let Err(err) = self.gallery.record(outcome) {
                    error!("{}", err);
                    let progress = self.progress.clone();
                    self.set_progress(progress, RunPhase::Failed(err.to_string()));
                    return false;
                }
                self.set_progress(progress, phase);
            }
        }
        true
    }

    fn set_progress(&mut self, progress: ProgressState, phase: RunPhase) {
        if !phase.is_active() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.progress = progress;
        self.phase = phase;
    }
}

/// Executes a run and streams its updates into `studio`.
///
/// The lock is only taken between upstream calls. The task stops as soon as
/// the studio reports the run as superseded.
#[instrument(skip_all, fields(run_id = ticket.run_id))]
pub async fn drive_run(
    studio: Arc<RwLock<Studio>>,
    orchestrator: Orchestrator,
    ticket: RunTicket,
    rng: StdRng,
) {
    let RunTicket {
        run_id,
        revision,
        request,
    } = ticket;
    let mut run = orchestrator.run(request, rng);

    if run.style().is_none() {
        let result = run.ensure_style().await.map(str::to_string);
        let mut studio = studio.write().await;
        match result {
            Ok(description) => {
                if !studio.apply(
                    run_id,
                    RunUpdate::Style {
                        revision,
                        description,
                    },
                ) {
                    return;
                }
            }
            Err(err) => {
                error!("Run {} aborted: {}", run_id, err);
                studio.apply(
                    run_id,
                    RunUpdate::Progress {
                        progress: run.progress().clone(),
                        phase: run.phase().clone(),
                    },
                );
                return;
            }
        }
    }

    loop {
        let attempt = match run.begin_attempt() {
            Ok(Some(attempt)) => attempt,
            Ok(None) => break,
            Err(err) => {
                error!("Run {} stopped: {}", run_id, err);
                break;
            }
        };
        let update = RunUpdate::Progress {
            progress: run.progress().clone(),
            phase: run.phase().clone(),
        };
        if !studio.write().await.apply(run_id, update) {
            return;
        }

        let outcome = run.finish_attempt(attempt).await;
        let update = RunUpdate::Outcome {
            outcome,
            progress: run.progress().clone(),
            phase: run.phase().clone(),
        };
        if !studio.write().await.apply(run_id, update) {
            return;
        }
    }
    info!("Run {} finished", run_id);
}
