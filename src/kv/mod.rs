// KV cache contract for analyzed files
//
// The model writes each analyzed file through to a key/value store and can
// restore ("exhume") it later without rescanning, provided the stored
// fingerprint matches the current text. The byte layout of the backing store
// is not our concern; anything implementing CacheStore will do.
//
// ## Key Patterns
//
// | Pattern        | Purpose                         | Value Type           |
// |----------------|---------------------------------|----------------------|
// | file:rec:{key} | Restorable file record          | CachedFile (JSON)    |
// | file:fp:{key}  | Fingerprint of the cached text  | UTF-8 hex string     |

pub mod encoding;
pub mod keys;

use ahash::AHashMap;

pub use encoding::{decode_cached_file, encode_cached_file, CachedFile, CACHE_FORMAT_VERSION};
pub use keys::{file_fingerprint_key, file_record_key};

use crate::error::ModelError;
use crate::error_codes::{MER_C_001_UNREADABLE_ENTRY, MER_C_002_FINGERPRINT_MISMATCH};
use crate::validation::FileKey;

/// Key/value persistence contract
pub trait CacheStore: Send {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> anyhow::Result<()>;
    fn remove(&mut self, key: &[u8]) -> anyhow::Result<()>;
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: AHashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> anyhow::Result<()> {
        self.entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

impl CacheStore for Box<dyn CacheStore> {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> anyhow::Result<()> {
        (**self).put(key, value)
    }

    fn remove(&mut self, key: &[u8]) -> anyhow::Result<()> {
        (**self).remove(key)
    }
}

/// Write a file's entry and its fingerprint
pub fn store_file(store: &mut dyn CacheStore, entry: &CachedFile) -> anyhow::Result<()> {
    let bytes = encode_cached_file(entry)?;
    store.put(&file_record_key(&entry.key), bytes)?;
    store.put(&file_fingerprint_key(&entry.key), entry.fingerprint.as_bytes().to_vec())?;
    Ok(())
}

/// Read a file's entry if it was built from text with `fingerprint`
///
/// Returns `Ok(None)` when nothing is cached. A fingerprint mismatch or an
/// unreadable entry is `Malformed`; callers treat both as a miss.
pub fn load_file(
    store: &dyn CacheStore,
    file: &FileKey,
    fingerprint: &str,
) -> Result<Option<CachedFile>, ModelError> {
    let unreadable = |e: anyhow::Error| ModelError::Malformed {
        code: MER_C_001_UNREADABLE_ENTRY,
        file: file.clone(),
        reason: format!("{:#}", e),
    };

    let Some(stored_fp) = store.get(&file_fingerprint_key(file)).map_err(unreadable)? else {
        return Ok(None);
    };
    if stored_fp != fingerprint.as_bytes() {
        return Err(ModelError::Malformed {
            code: MER_C_002_FINGERPRINT_MISMATCH,
            file: file.clone(),
            reason: "cached text differs from current text".to_string(),
        });
    }

    let Some(bytes) = store.get(&file_record_key(file)).map_err(unreadable)? else {
        return Ok(None);
    };
    let entry = decode_cached_file(file, &bytes)?;
    if entry.fingerprint != fingerprint {
        return Err(ModelError::Malformed {
            code: MER_C_002_FINGERPRINT_MISMATCH,
            file: file.clone(),
            reason: "record fingerprint differs from index".to_string(),
        });
    }
    Ok(Some(entry))
}

/// Drop a file's entry and fingerprint
pub fn forget_file(store: &mut dyn CacheStore, file: &FileKey) -> anyhow::Result<()> {
    store.remove(&file_record_key(file))?;
    store.remove(&file_fingerprint_key(file))?;
    Ok(())
}
