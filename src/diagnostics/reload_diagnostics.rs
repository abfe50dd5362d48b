//! Reload diagnostics for structured per-file failure reporting.
//!
//! A reload batch never aborts because one file failed; each failure is
//! recorded as a [`ReloadDiagnostic`] tagged with the pipeline stage, and
//! the batch carries on with the remaining files.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::ModelError;
use crate::validation::FileKey;

/// Reason a file was not put through the full pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Edit carried the same text the model already analyzed
    Unchanged,
    /// Record restored from the cache instead of rescanned
    CacheHit,
    /// Affected-set growth capped by configuration
    TransitiveLimit,
}

impl SkipReason {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::Unchanged => 0,
            SkipReason::CacheHit => 1,
            SkipReason::TransitiveLimit => 2,
        }
    }

    /// Human-readable description for log output.
    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::Unchanged => "text unchanged",
            SkipReason::CacheHit => "restored from cache",
            SkipReason::TransitiveLimit => "affected-set limit reached",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for SkipReason {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SkipReason {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Stage in the reload pipeline where a failure occurred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReloadStage {
    /// Source provider could not supply the text
    Read,
    /// Scanner rejected the text
    Scan,
    /// Inheritance could not be resolved
    Populate,
    /// Analyzer failed
    Analyze,
    /// Cache read or write-through failed
    Cache,
}

impl ReloadStage {
    /// Stable sort key, in pipeline order.
    pub fn sort_key(&self) -> u8 {
        match self {
            ReloadStage::Read => 0,
            ReloadStage::Scan => 1,
            ReloadStage::Populate => 2,
            ReloadStage::Analyze => 3,
            ReloadStage::Cache => 4,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReloadStage::Read => "reading source",
            ReloadStage::Scan => "scanning declarations",
            ReloadStage::Populate => "populating inheritance",
            ReloadStage::Analyze => "analyzing",
            ReloadStage::Cache => "caching",
        }
    }
}

impl fmt::Display for ReloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for ReloadStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReloadStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A diagnostic event from one reload batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReloadDiagnostic {
    Skipped {
        path: String,
        reason: SkipReason,
    },
    Error {
        path: String,
        stage: ReloadStage,
        /// Stable error code (`MER-...`)
        code: String,
        message: String,
    },
}

impl ReloadDiagnostic {
    pub fn path(&self) -> &str {
        match self {
            ReloadDiagnostic::Skipped { path, .. } => path,
            ReloadDiagnostic::Error { path, .. } => path,
        }
    }

    /// Primary: path. Secondary: errors before skips. Tertiary: stage/reason.
    pub fn sort_key(&self) -> (&str, u8, u8) {
        match self {
            ReloadDiagnostic::Error { path, stage, .. } => (path, 0, stage.sort_key()),
            ReloadDiagnostic::Skipped { path, reason } => (path, 1, reason.sort_key()),
        }
    }

    pub fn skipped(file: &FileKey, reason: SkipReason) -> Self {
        ReloadDiagnostic::Skipped {
            path: file.to_string(),
            reason,
        }
    }

    /// Record a model error against a file.
    pub fn error(file: &FileKey, stage: ReloadStage, err: &ModelError) -> Self {
        ReloadDiagnostic::Error {
            path: file.to_string(),
            stage,
            code: err.code().to_string(),
            message: format!("{:#}", err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReloadDiagnostic::Error { .. })
    }

    pub fn stage(&self) -> Option<ReloadStage> {
        match self {
            ReloadDiagnostic::Error { stage, .. } => Some(*stage),
            ReloadDiagnostic::Skipped { .. } => None,
        }
    }

    /// Examples:
    /// - "SKIP src/a.php: text unchanged"
    /// - "ERROR src/b.php: populating inheritance: [MER-REF-002] parent Base of B not found"
    pub fn format_stderr(&self) -> String {
        match self {
            ReloadDiagnostic::Skipped { path, reason } => format!("SKIP {}: {}", path, reason),
            ReloadDiagnostic::Error {
                path,
                stage,
                message,
                ..
            } => format!("ERROR {}: {}: {}", path, stage, message),
        }
    }
}

impl fmt::Display for ReloadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_stderr())
    }
}

impl PartialOrd for ReloadDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReloadDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Outcome of one reload batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Files invalidated by the triggering event, in key order
    pub affected: Vec<FileKey>,
    /// Files that reached `Analyzed` in this batch
    pub analyzed: Vec<FileKey>,
    pub diagnostics: Vec<ReloadDiagnostic>,
}

impl ReloadReport {
    /// No file failed at any stage
    pub fn is_clean(&self) -> bool {
        !self.diagnostics.iter().any(ReloadDiagnostic::is_error)
    }

    /// Files with at least one error, deduplicated
    pub fn failed_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(ReloadDiagnostic::path)
            .collect();
        files.sort_unstable();
        files.dedup();
        files
    }

    pub fn errors_at(&self, stage: ReloadStage) -> impl Iterator<Item = &ReloadDiagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.stage() == Some(stage))
    }

    pub fn sort(&mut self) {
        self.diagnostics.sort();
    }
}
