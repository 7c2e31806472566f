//! Caches the style description of the currently loaded base image.

/// Style description bound to one revision of the base image.
///
/// The studio bumps the revision every time a new image is loaded, which
/// clears the description. A description computed for an older revision is
/// dropped on [`StyleCache::set`].
#[derive(Clone, Debug, Default)]
pub struct StyleCache {
    revision: u64,
    description: Option<String>,
}

impl StyleCache {
    /// Empty cache for revision zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached description, if any.
    pub fn get(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Revision of the base image this cache tracks.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Stores `description` if it belongs to the current image and nothing is
    /// cached yet. Returns whether it was stored.
    pub fn set(&mut self, revision: u64, description: impl Into<String>) -> bool {
        if revision != self.revision || self.description.is_some() {
            return false;
        }
        self.description = Some(description.into());
        true
    }

    /// Forgets the description; called when `revision` becomes the loaded image.
    pub fn invalidate(&mut self, revision: u64) {
        self.revision = revision;
        self.description = None;
    }
}
