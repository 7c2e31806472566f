//! Outcome records of a run, in the order they were attempted.

use serde::Serialize;
use url::Url;

use crate::constants::COST_PER_IMAGE_USD;
use crate::error::MonkeyGenError;

/// Image returned by the generation service.
#[derive(Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// PNG bytes decoded from the base64 payload
    Inline(Vec<u8>),
    /// Hosted by the provider
    Remote(Url),
}

impl std::fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            Self::Remote(url) => write!(f, "Remote({url})"),
        }
    }
}

/// One requested variation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariationOutcome {
    /// 1-based position in the run
    pub index: u32,
    /// `None` when the attempt failed
    pub image: Option<GeneratedImage>,
    /// Prompt the attempt was made with
    pub prompt: String,
}

impl VariationOutcome {
    /// Whether the attempt produced an image.
    pub fn succeeded(&self) -> bool {
        self.image.is_some()
    }

    /// Local file name a download is saved under, e.g. `nft-007.png`.
    pub fn download_filename(&self) -> String {
        download_filename(self.index)
    }
}

/// Download file name for a 1-based index.
pub fn download_filename(index: u32) -> String {
    format!("nft-{index:03}.png")
}

/// Rough upstream spend for `images` generated images.
pub fn estimated_cost_usd(images: usize) -> f64 {
    images as f64 * COST_PER_IMAGE_USD
}

/// Counter and label shown while a run goes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    /// Attempts finished, successful or not
    pub completed: u32,
    /// Attempts requested
    pub total: u32,
    /// Human readable status
    pub status: String,
}

impl ProgressState {
    /// Whole-number percentage for the progress bar.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((u64::from(self.completed) * 100 + u64::from(self.total) / 2) / u64::from(self.total))
            as u32
    }
}

/// What a gallery position currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot<'a> {
    /// Not attempted yet
    Pending,
    /// Attempted, no image
    Failed,
    /// Attempted, got an image
    Ready(&'a GeneratedImage),
}

/// Append-only list of outcomes for the current run.
#[derive(Clone, Debug, Default)]
pub struct Gallery {
    outcomes: Vec<VariationOutcome>,
}

impl Gallery {
    /// Empty gallery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every outcome; called when a run starts.
    pub fn reset(&mut self) {
        self.outcomes.clear();
    }

    /// Appends an outcome. Indices must arrive as 1, 2, 3, ...
    pub fn record(&mut self, outcome: VariationOutcome) -> Result<(), MonkeyGenError> {
        let expected = self.outcomes.len() as u32 + 1;
        if outcome.index != expected {
            return Err(MonkeyGenError::InternalServerError(format!(
                "outcome #{} recorded out of order, expected #{}",
                outcome.index, expected
            )));
        }
        self.outcomes.push(outcome);
        Ok(())
    }

    /// Outcomes in index order.
    pub fn outcomes(&self) -> &[VariationOutcome] {
        &self.outcomes
    }

    /// Outcome at a 1-based index.
    pub fn get(&self, index: u32) -> Option<&VariationOutcome> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.outcomes.get(position)
    }

    /// State of the slot at a 1-based index.
    pub fn slot(&self, index: u32) -> Slot<'_> {
        match self.get(index) {
            None => Slot::Pending,
            Some(VariationOutcome { image: None, .. }) => Slot::Failed,
            Some(VariationOutcome {
                image: Some(image), ..
            }) => Slot::Ready(image),
        }
    }

    /// Number of outcomes with an image.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Number of outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: u32, ok: bool) -> VariationOutcome {
        VariationOutcome {
            index,
            image: ok.then(|| GeneratedImage::Inline(vec![1, 2, 3])),
            prompt: format!("prompt {index}"),
        }
    }

    #[test]
    fn slots_tell_pending_failed_and_ready_apart() {
        let mut gallery = Gallery::new();
        gallery.record(outcome(1, true)).expect("record 1");
        gallery.record(outcome(2, false)).expect("record 2");

        assert!(matches!(gallery.slot(1), Slot::Ready(_)));
        assert_eq!(gallery.slot(2), Slot::Failed);
        assert_eq!(gallery.slot(3), Slot::Pending);
        assert_eq!(gallery.slot(0), Slot::Pending);
        assert_eq!(gallery.succeeded(), 1);
    }

    #[test]
    fn out_of_order_outcomes_are_rejected() {
        let mut gallery = Gallery::new();
        assert!(gallery.record(outcome(2, true)).is_err());
        gallery.record(outcome(1, true)).expect("record 1");
        assert!(gallery.record(outcome(1, true)).is_err());
        assert_eq!(gallery.len(), 1);

        gallery.reset();
        assert!(gallery.is_empty());
        gallery.record(outcome(1, false)).expect("record after reset");
    }

    #[test]
    fn download_names_are_zero_padded() {
        assert_eq!(outcome(7, true).download_filename(), "nft-007.png");
        assert_eq!(download_filename(120), "nft-120.png");
    }

    #[test]
    fn percent_rounds() {
        let progress = ProgressState {
            completed: 1,
            total: 3,
            status: String::new(),
        };
        assert_eq!(progress.percent(), 33);
        assert_eq!(ProgressState::default().percent(), 0);
    }

    #[test]
    fn cost_estimate() {
        assert!((estimated_cost_usd(3) - 0.126).abs() < 1e-9);
    }
}
