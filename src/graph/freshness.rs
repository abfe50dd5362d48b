//! File freshness checking
//!
//! Compares the text the model last analyzed against what the source
//! provider currently returns for the same file.

use super::files::compute_fingerprint;
use super::schema::FileState;
use super::CodebaseModel;
use crate::error::{ModelError, ModelResult};
use crate::validation::FileKey;

/// Freshness status of one tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessStatus {
    /// Model text differs from the provider's
    diverged: bool,
    /// An editor overlay is open for the file
    has_overlay: bool,
    /// The provider could read the file
    on_disk: bool,
    /// The file awaits reanalysis
    stale: bool,
    state: FileState,
}

impl FreshnessStatus {
    pub fn new(diverged: bool, has_overlay: bool, on_disk: bool, stale: bool, state: FileState) -> Self {
        Self {
            diverged,
            has_overlay,
            on_disk,
            stale,
            state,
        }
    }

    /// Whether a query would currently see outdated facts
    pub fn is_stale(&self) -> bool {
        self.stale || self.state != FileState::Analyzed || (self.diverged && !self.has_overlay)
    }

    pub fn diverged_from_disk(&self) -> bool {
        self.diverged
    }

    pub fn has_overlay(&self) -> bool {
        self.has_overlay
    }

    pub fn on_disk(&self) -> bool {
        self.on_disk
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Warning for a file whose disk text moved on without a save event
    pub fn warning_message(&self, file: &FileKey) -> String {
        if !self.on_disk {
            return format!("WARNING: {} has no source on disk", file);
        }
        format!(
            "WARNING: {} may be stale (state {}, disk {})\n  Send a save event to reload it",
            file,
            self.state,
            if self.diverged { "changed" } else { "unchanged" }
        )
    }
}

/// Check one file against the source provider
///
/// Never mutates the model; an unreadable source is reported as not on
/// disk rather than as an error.
pub(crate) fn check_freshness(model: &CodebaseModel, file: &FileKey) -> ModelResult<FreshnessStatus> {
    let record = model
        .files
        .get(file)
        .ok_or_else(|| ModelError::file_not_found(file))?;
    let has_overlay = model.files.has_temporary(file);

    let (on_disk, diverged) = match model.source.read(&record.display_path) {
        Ok(disk) => (true, compute_fingerprint(&disk) != record.fingerprint),
        Err(_) => (false, true),
    };

    Ok(FreshnessStatus::new(
        diverged,
        has_overlay,
        on_disk,
        record.stale,
        record.state,
    ))
}
