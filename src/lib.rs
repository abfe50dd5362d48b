//! Meridian: an incremental declaration model for editor-integrated analysis
//!
//! Meridian keeps a codebase's declarations, inheritance chains, reference
//! graph and per-file position maps current while files are edited one at a
//! time. An edit is diffed at declaration granularity; only the files whose
//! facts could have changed are rescanned, repopulated and reanalyzed.
//!
//! # Pipeline
//!
//! Every file moves through `Unscanned → Scanned → Populated → Analyzed`:
//! - **Scan**: a [`Scanner`] turns text into a declaration tree
//! - **Populate**: inheritance chains are resolved for a whole batch
//! - **Analyze**: an [`Analyzer`] fills the file's reference and type maps
//!
//! A query against a file below `Analyzed` escalates and analyzes it first.
//!
//! # Position Conventions
//!
//! All spans and offsets are 0-indexed byte offsets from file start. Spans
//! are half-open for containment (`start..end`); point lookups also hit an
//! entry whose end equals the cursor offset.

pub mod config;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod error_codes;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod kv;
pub mod session;
pub mod validation;

pub use config::ModelConfig;
pub use diagnostics::{ReloadDiagnostic, ReloadReport, ReloadStage, SkipReason};
pub use diff::{diff_declarations, DiffElement, DiffMap, FileDiff};
pub use error::{ModelError, ModelResult};
pub use graph::{
    CodebaseModel, CompletionItem, DeclarationRecord, DiskSource, FileState, FreshnessStatus,
    Hover, Location, ReferenceMap, SourceProvider, TypeDescriptor, TypeMap,
};
pub use indexer::{IndexerError, IndexerHandle, RequestKind, RequestStage, RequestState, Transition};
pub use ingest::{DeclKind, Declaration, Scanner, Span, SymbolId};
pub use kv::{CacheStore, MemoryStore};
pub use session::{AnalysisInput, AnalysisOutput, AnalysisSession, Analyzer};
pub use validation::{validate_path_within_root, FileKey, PathValidationError};
