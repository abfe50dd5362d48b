//! Model configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Codebase model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Keep every reference location for find-references (default: false)
    pub collect_references: bool,
    /// Write analyzed files through to the cache and exhume from it (default: true)
    pub cache_enabled: bool,
    /// Bound on queued editor requests (default: 64)
    pub queue_capacity: usize,
    /// Stop growing the affected set past this many files (default: unlimited)
    pub max_transitive_files: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            collect_references: false,
            cache_enabled: true,
            queue_capacity: 64,
            max_transitive_files: None,
        }
    }
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ModelConfig =
            serde_json::from_str(json).context("parsing model configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn with_collect_references(mut self, on: bool) -> Self {
        self.collect_references = on;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        if self.max_transitive_files == Some(0) {
            anyhow::bail!("max_transitive_files must be at least 1 when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert!(!config.collect_references);
        assert!(config.cache_enabled);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.max_transitive_files, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ModelConfig::from_json_str(r#"{"collect_references": true}"#).unwrap();
        assert!(config.collect_references);
        assert!(config.cache_enabled);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn test_rejects_unknown_and_invalid_fields() {
        assert!(ModelConfig::from_json_str(r#"{"collect_refs": true}"#).is_err());
        assert!(ModelConfig::from_json_str(r#"{"queue_capacity": 0}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meridian.json");
        std::fs::write(&path, r#"{"max_transitive_files": 500, "cache_enabled": false}"#).unwrap();

        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.max_transitive_files, Some(500));
        assert!(!config.cache_enabled);

        assert!(ModelConfig::load(&temp_dir.path().join("missing.json")).is_err());
    }
}
