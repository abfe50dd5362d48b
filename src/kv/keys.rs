// KV Key Construction Helpers for the file cache
//
// Each key pattern serves a specific lookup purpose:
//
// - file:rec:{key} → serialized CachedFile (declarations, maps, references)
// - file:fp:{key}  → fingerprint of the text the record was built from
//
// Key design principles:
// - Namespaced prefixes prevent key collisions
// - Keys are built from normalized FileKeys only, so casing never splits an entry
// - Consistent encoding (Vec<u8>) for the CacheStore API

use crate::validation::FileKey;

/// Construct the key holding a file's cached record.
///
/// The key format is: b"file:rec:{key}"
///
/// # Example
/// ```ignore
/// let key = file_record_key(&FileKey::new("src/User.php"));
/// // Returns: b"file:rec:src/user.php"
/// ```
pub fn file_record_key(file: &FileKey) -> Vec<u8> {
    format!("file:rec:{}", file).into_bytes()
}

/// Construct the key holding a file's cached fingerprint.
///
/// Checked before the record is decoded, so a stale record is never
/// deserialized.
///
/// The key format is: b"file:fp:{key}"
pub fn file_fingerprint_key(file: &FileKey) -> Vec<u8> {
    format!("file:fp:{}", file).into_bytes()
}
