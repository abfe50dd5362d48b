//! Meridian-specific error codes
//!
//! Error codes follow the pattern: MER-{CATEGORY}-{3-digit number}
//!
//! Categories (1-3 uppercase letters):
//! - REF: Symbol/class resolution (lookup, inheritance links)
//! - QRY: Query-related errors (unknown file, bad offset)
//! - IO: Source access errors
//! - C: Cache errors (unreadable entry, fingerprint mismatch)
//! - P: Protocol errors (pipeline invariants violated)
//!
//! Each error code is stable and should not be reused.

/// Symbol not found
pub const MER_REF_001_SYMBOL_NOT_FOUND: &str = "MER-REF-001";

/// Parent class-like could not be resolved while populating
pub const MER_REF_002_PARENT_NOT_FOUND: &str = "MER-REF-002";

/// Inheritance chain loops back on itself
pub const MER_REF_003_INHERITANCE_CYCLE: &str = "MER-REF-003";

/// File not tracked by the model
pub const MER_QRY_001_FILE_NOT_FOUND: &str = "MER-QRY-001";

/// Offset outside the file's text
pub const MER_QRY_002_OFFSET_OUT_OF_RANGE: &str = "MER-QRY-002";

/// Source could not be read
pub const MER_IO_001_READ_FAILED: &str = "MER-IO-001";

/// Cache write-through failed
pub const MER_IO_002_CACHE_WRITE_FAILED: &str = "MER-IO-002";

/// Cache entry unreadable
pub const MER_C_001_UNREADABLE_ENTRY: &str = "MER-C-001";

/// Cache entry fingerprint does not match current text
pub const MER_C_002_FINGERPRINT_MISMATCH: &str = "MER-C-002";

/// Populate invoked on a batch holding an unscanned file
pub const MER_P_001_UNSCANNED_IN_BATCH: &str = "MER-P-001";

/// Collaborator (scanner/analyzer) failed
pub const MER_P_002_COLLABORATOR_FAILED: &str = "MER-P-002";

/// Analysis requested for a file that has not been populated
pub const MER_P_003_NOT_POPULATED: &str = "MER-P-003";

/// Error code documentation
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | MER-REF-001 | Symbol not found | Check the identifier; the declaring file may not be loaded |
/// | MER-REF-002 | Parent not found | Load the file declaring the parent, then reload |
/// | MER-REF-003 | Inheritance cycle | Break the `extends` loop in source |
/// | MER-QRY-001 | File not tracked | Call `add_file`/`on_edit` first |
/// | MER-QRY-002 | Offset out of range | Convert positions against the current text |
/// | MER-IO-001 | Read failed | Check path and permissions |
/// | MER-IO-002 | Cache write failed | Facts stay in memory; check the cache backend |
/// | MER-C-001 | Unreadable cache entry | Treated as a miss; the file is rescanned |
/// | MER-C-002 | Fingerprint mismatch | Treated as a miss; the file is rescanned |
/// | MER-P-001 | Unscanned file in populate batch | Scan the whole batch before populating |
/// | MER-P-002 | Collaborator failed | See the wrapped message |
/// | MER-P-003 | Analysis before populate | Run the batch through populate first |
pub const ERROR_CODE_DOCUMENTATION: &str = "Error code documentation available in source";
