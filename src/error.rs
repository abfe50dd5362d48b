//! Error taxonomy for the codebase model
//!
//! - `NotFound`: symbol/class/file absent. Reported, never fatal.
//! - `Malformed`: cache entry unreadable or stale. Treated as a cache miss.
//! - `Inconsistent`: pipeline invariant broken (populate before scan). Fatal
//!   for the batch it happened in, never for other files' records.
//! - `External`: scanner/analyzer/source provider failure for one file.
//!
//! A query against a file that is not yet analyzed is not an error: the
//! model escalates and analyzes it first.

use crate::error_codes::*;
use crate::validation::FileKey;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("[{code}] {what} not found")]
    NotFound { code: &'static str, what: String },

    #[error("[{code}] malformed cache entry for {file}: {reason}")]
    Malformed {
        code: &'static str,
        file: FileKey,
        reason: String,
    },

    #[error("[{code}] inconsistent pipeline state: {reason}")]
    Inconsistent { code: &'static str, reason: String },

    #[error("[{code}] {file}: {source}")]
    External {
        code: &'static str,
        file: FileKey,
        #[source]
        source: anyhow::Error,
    },
}

impl ModelError {
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        ModelError::NotFound {
            code: MER_REF_001_SYMBOL_NOT_FOUND,
            what: format!("symbol {}", symbol.into()),
        }
    }

    pub fn parent_not_found(class: &str, parent: &str) -> Self {
        ModelError::NotFound {
            code: MER_REF_002_PARENT_NOT_FOUND,
            what: format!("parent {} of {}", parent, class),
        }
    }

    pub fn file_not_found(file: &FileKey) -> Self {
        ModelError::NotFound {
            code: MER_QRY_001_FILE_NOT_FOUND,
            what: format!("file {}", file),
        }
    }

    pub fn offset_out_of_range(file: &FileKey, offset: usize, len: usize) -> Self {
        ModelError::NotFound {
            code: MER_QRY_002_OFFSET_OUT_OF_RANGE,
            what: format!("offset {} in {} ({} bytes)", offset, file, len),
        }
    }

    pub fn inconsistent(code: &'static str, reason: impl Into<String>) -> Self {
        ModelError::Inconsistent {
            code,
            reason: reason.into(),
        }
    }

    pub fn external(code: &'static str, file: &FileKey, source: anyhow::Error) -> Self {
        ModelError::External {
            code,
            file: file.clone(),
            source,
        }
    }

    /// Stable error code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::NotFound { code, .. }
            | ModelError::Malformed { code, .. }
            | ModelError::Inconsistent { code, .. }
            | ModelError::External { code, .. } => code,
        }
    }

    /// Whether the failure only concerns data that can be rebuilt
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ModelError::Inconsistent { .. })
    }
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = ModelError::symbol_not_found("app\\user");
        assert_eq!(err.code(), MER_REF_001_SYMBOL_NOT_FOUND);
        assert!(err.to_string().contains("MER-REF-001"));
        assert!(err.to_string().contains("app\\user"));
    }

    #[test]
    fn test_inconsistent_is_not_recoverable() {
        let err = ModelError::Inconsistent {
            code: MER_P_001_UNSCANNED_IN_BATCH,
            reason: "a.php unscanned".to_string(),
        };
        assert!(!err.is_recoverable());
        assert!(ModelError::file_not_found(&FileKey::new("a.php")).is_recoverable());
    }
}
