// KV Encoding Helpers for the file cache
//
// A file's cached state is one JSON document. Decoding failures surface as
// Malformed errors, which callers treat as a cache miss.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::error_codes::MER_C_001_UNREADABLE_ENTRY;
use crate::graph::schema::DeclarationRecord;
use crate::graph::side_tables::{ReferenceMap, TypeMap};
use crate::ingest::{Span, SymbolId};
use crate::validation::FileKey;

/// Format version; bump when the layout changes so old entries miss
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Everything needed to restore an analyzed file without rescanning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedFile {
    pub version: u32,
    pub key: FileKey,
    pub display_path: String,
    pub fingerprint: String,
    pub declarations: Vec<DeclarationRecord>,
    pub references: Vec<(Span, SymbolId)>,
    pub reference_map: ReferenceMap,
    pub type_map: TypeMap,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

pub fn encode_cached_file(entry: &CachedFile) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(entry)?)
}

/// Decode a record, rejecting unreadable bytes and foreign versions
pub fn decode_cached_file(file: &FileKey, bytes: &[u8]) -> Result<CachedFile, ModelError> {
    let entry: CachedFile = serde_json::from_slice(bytes).map_err(|e| ModelError::Malformed {
        code: MER_C_001_UNREADABLE_ENTRY,
        file: file.clone(),
        reason: e.to_string(),
    })?;

    if entry.version != CACHE_FORMAT_VERSION {
        return Err(ModelError::Malformed {
            code: MER_C_001_UNREADABLE_ENTRY,
            file: file.clone(),
            reason: format!("format version {} (expected {})", entry.version, CACHE_FORMAT_VERSION),
        });
    }
    if &entry.key != file {
        return Err(ModelError::Malformed {
            code: MER_C_001_UNREADABLE_ENTRY,
            file: file.clone(),
            reason: format!("entry belongs to {}", entry.key),
        });
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::side_tables::PositionMapBuilder;

    fn entry(key: &str) -> CachedFile {
        let mut refs = PositionMapBuilder::new();
        refs.insert(Span::new(4, 8), SymbolId::new("A"));
        CachedFile {
            version: CACHE_FORMAT_VERSION,
            key: FileKey::new(key),
            display_path: key.to_string(),
            fingerprint: "abc".to_string(),
            declarations: Vec::new(),
            references: vec![(Span::new(4, 8), SymbolId::new("A"))],
            reference_map: refs.freeze(),
            type_map: TypeMap::default(),
            diagnostics: vec!["unused variable".to_string()],
        }
    }

    #[test]
    fn test_decode_encoded_entry() {
        let original = entry("a.php");
        let bytes = encode_cached_file(&original).unwrap();
        let decoded = decode_cached_file(&FileKey::new("a.php"), &bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let err = decode_cached_file(&FileKey::new("a.php"), b"{not json").unwrap_err();
        assert!(matches!(err, ModelError::Malformed { .. }));
        assert_eq!(err.code(), MER_C_001_UNREADABLE_ENTRY);
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let mut old = entry("a.php");
        old.version = CACHE_FORMAT_VERSION + 1;
        let bytes = encode_cached_file(&old).unwrap();
        assert!(decode_cached_file(&FileKey::new("a.php"), &bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_entry_for_other_file() {
        let bytes = encode_cached_file(&entry("a.php")).unwrap();
        assert!(decode_cached_file(&FileKey::new("b.php"), &bytes).is_err());
    }
}
