//! Path keys and path validation.
//!
//! Every path entering the model is normalized exactly once into a
//! [`FileKey`]: `/`-separated, `.` components dropped, `..` folded, and
//! lower-cased, so lookups never re-normalize. Disk reads go through
//! [`validate_path_within_root`] so a crafted path cannot escape the project.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Error types for path validation.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    /// Path is not valid UTF-8
    #[error("path is not valid UTF-8: {0}")]
    NotUtf8(String),

    /// Path cannot be canonicalized (doesn't exist or permission denied)
    #[error("cannot canonicalize path: {0}")]
    CannotCanonicalize(String),

    /// Resolved path escapes the project root
    #[error("path escapes project root: {0} (root: {1})")]
    OutsideRoot(String, String),
}

/// Case-insensitive, normalized key identifying one file in the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey(String);

impl FileKey {
    /// Normalize a display path into a key
    pub fn new(path: &str) -> Self {
        FileKey(normalize_path_str(path).to_lowercase())
    }

    pub fn from_path(path: &Path) -> Result<Self, PathValidationError> {
        let utf8 = Utf8Path::from_path(path)
            .ok_or_else(|| PathValidationError::NotUtf8(path.to_string_lossy().to_string()))?;
        Ok(Self::new(utf8.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(path: &str) -> Self {
        FileKey::new(path)
    }
}

/// Lexically normalize a path string without touching the filesystem.
///
/// Keeps the original casing; [`FileKey::new`] lower-cases on top of this.
pub fn normalize_path_str(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let utf8 = Utf8Path::new(&unified);
    let mut out: Vec<&str> = Vec::new();
    let mut absolute = false;

    for component in utf8.components() {
        match component {
            Utf8Component::RootDir => absolute = true,
            Utf8Component::Prefix(p) => out.push(p.as_str()),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if matches!(out.last(), Some(last) if *last != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            Utf8Component::Normal(part) => out.push(part),
        }
    }

    let joined = out.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Canonicalize a path using std::fs::canonicalize.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, PathValidationError> {
    std::fs::canonicalize(path).map_err(|_| {
        PathValidationError::CannotCanonicalize(path.to_string_lossy().to_string())
    })
}

/// Validate that a path is within the given root directory.
///
/// Both paths are canonicalized (symlinks, `.`, `..` resolved) before the
/// prefix check. Returns the canonical path on success.
pub fn validate_path_within_root(path: &Path, root: &Path) -> Result<Utf8PathBuf, PathValidationError> {
    let canonical_path = canonicalize_path(path)?;
    let canonical_root = canonicalize_path(root)?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(PathValidationError::OutsideRoot(
            canonical_path.to_string_lossy().to_string(),
            canonical_root.to_string_lossy().to_string(),
        ));
    }

    Utf8PathBuf::from_path_buf(canonical_path)
        .map_err(|p| PathValidationError::NotUtf8(p.to_string_lossy().to_string()))
}
