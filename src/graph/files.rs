//! File records, source access and the editor overlay
//!
//! Text for a file comes from the editor overlay when one is open, from the
//! [`SourceProvider`] otherwise.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::graph::schema::{FileRecord, FileState};
use crate::validation::{validate_path_within_root, FileKey};

/// Access to on-disk source text
pub trait SourceProvider: Send {
    fn read(&self, path: &str) -> Result<String>;
}

/// Reads files beneath a project root
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl SourceProvider for DiskSource {
    fn read(&self, path: &str) -> Result<String> {
        let joined = self.root.join(path);
        let resolved = validate_path_within_root(&joined, &self.root)?;
        std::fs::read_to_string(&resolved).with_context(|| format!("reading {}", resolved))
    }
}

/// Compute SHA-256 fingerprint of file contents
pub fn compute_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// File records plus open-editor text
#[derive(Debug, Default)]
pub struct FileStore {
    records: BTreeMap<FileKey, FileRecord>,
    temporary: BTreeMap<FileKey, String>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FileKey) -> Option<&FileRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &FileKey) -> Option<&mut FileRecord> {
        self.records.get_mut(key)
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.records.insert(record.key.clone(), record);
    }

    pub fn remove(&mut self, key: &FileKey) -> Option<FileRecord> {
        self.temporary.remove(key);
        self.records.remove(key)
    }

    /// Tracked files, in key order
    pub fn keys(&self) -> impl Iterator<Item = &FileKey> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Files currently at `state`, in key order
    pub fn in_state(&self, state: FileState) -> Vec<FileKey> {
        self.records
            .values()
            .filter(|r| r.state == state)
            .map(|r| r.key.clone())
            .collect()
    }

    /// Record open-editor text for a file
    pub fn set_temporary(&mut self, key: &FileKey, text: &str) {
        self.temporary.insert(key.clone(), text.to_string());
    }

    /// Drop open-editor text; returns whether there was any
    pub fn clear_temporary(&mut self, key: &FileKey) -> bool {
        self.temporary.remove(key).is_some()
    }

    pub fn temporary(&self, key: &FileKey) -> Option<&str> {
        self.temporary.get(key).map(String::as_str)
    }

    pub fn has_temporary(&self, key: &FileKey) -> bool {
        self.temporary.contains_key(key)
    }

    /// Current text for `display_path`: overlay first, then the provider
    pub fn read_text(
        &self,
        key: &FileKey,
        display_path: &str,
        source: &dyn SourceProvider,
    ) -> Result<String> {
        if let Some(text) = self.temporary.get(key) {
            return Ok(text.clone());
        }
        source.read(display_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = compute_fingerprint("");
        assert_eq!(fp, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
        assert_ne!(compute_fingerprint("a"), compute_fingerprint("b"));
    }

    #[test]
    fn test_disk_source_reads_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.php"), "class A {}").unwrap();

        let source = DiskSource::new(temp_dir.path());
        assert_eq!(source.read("a.php").unwrap(), "class A {}");
        assert!(source.read("missing.php").is_err());
        assert!(source.read("../outside.php").is_err());
    }

    #[test]
    fn test_overlay_wins_over_provider() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.php"), "disk").unwrap();
        let source = DiskSource::new(temp_dir.path());

        let mut store = FileStore::new();
        let key = FileKey::new("a.php");
        assert_eq!(store.read_text(&key, "a.php", &source).unwrap(), "disk");

        store.set_temporary(&key, "editor");
        assert_eq!(store.read_text(&key, "a.php", &source).unwrap(), "editor");

        assert!(store.clear_temporary(&key));
        assert!(!store.clear_temporary(&key));
        assert_eq!(store.read_text(&key, "a.php", &source).unwrap(), "disk");
    }

    #[test]
    fn test_in_state_is_key_ordered() {
        let mut store = FileStore::new();
        for name in ["c.php", "a.php", "b.php"] {
            store.insert(FileRecord::new(FileKey::new(name), name, String::new(), String::new()));
        }
        let keys: Vec<String> = store
            .in_state(FileState::Unscanned)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["a.php", "b.php", "c.php"]);
    }
}
