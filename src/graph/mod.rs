//! Incremental codebase model
//!
//! Holds every tracked file's declarations, the global reference graph and
//! the per-file position maps, and keeps them current as files are edited
//! one at a time.

pub mod files;
pub mod freshness;
mod invalidate;
mod ops;
mod populate;
pub mod query;
pub mod references;
pub mod schema;
pub mod side_tables;
pub mod symbols;

use ahash::AHashMap;

use crate::config::ModelConfig;
use crate::diagnostics::ReloadReport;
use crate::error::{ModelError, ModelResult};
use crate::ingest::{Scanner, SymbolId};
use crate::kv::CacheStore;
use crate::session::Analyzer;
use crate::validation::FileKey;

pub use files::{compute_fingerprint, DiskSource, FileStore, SourceProvider};
pub use freshness::FreshnessStatus;
pub use query::{CompletionItem, Hover};
pub use references::ReferenceGraph;
pub use schema::{BodyFacts, DeclarationRecord, FileRecord, FileState, Location};
pub use side_tables::{
    PositionEntry, PositionMap, PositionMapBuilder, ReferenceMap, TypeDescriptor, TypeMap,
};
pub use symbols::SymbolStore;

/// The incremental model
///
/// Mutated through `&mut self` only; see [`crate::indexer`] for the queue
/// that serializes editor requests onto one owner.
pub struct CodebaseModel {
    config: ModelConfig,
    scanner: Box<dyn Scanner>,
    analyzer: Box<dyn Analyzer>,
    source: Box<dyn SourceProvider>,
    cache: Option<Box<dyn CacheStore>>,

    /// File records and editor overlay
    files: FileStore,

    /// Declaration records by normalized id
    symbols: SymbolStore,

    /// Who references what
    references: ReferenceGraph,

    /// Stubbed constant types seeded into every analysis session
    stubs: AHashMap<String, TypeDescriptor>,
}

impl CodebaseModel {
    /// Create an empty model
    ///
    /// # Arguments
    /// * `config` - Model configuration
    /// * `scanner` - Declaration-tree producer
    /// * `analyzer` - Inference/rule engine writing maps and body facts
    /// * `source` - On-disk text provider
    pub fn new(
        config: ModelConfig,
        scanner: impl Scanner + 'static,
        analyzer: impl Analyzer + 'static,
        source: impl SourceProvider + 'static,
    ) -> Self {
        let references = ReferenceGraph::new(config.collect_references);
        Self {
            config,
            scanner: Box::new(scanner),
            analyzer: Box::new(analyzer),
            source: Box::new(source),
            cache: None,
            files: FileStore::new(),
            symbols: SymbolStore::new(),
            references,
            stubs: AHashMap::new(),
        }
    }

    /// Attach a cache; analyzed files are written through to it
    pub fn with_cache(mut self, cache: impl CacheStore + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Detach the cache, e.g. to hand it to a fresh model
    pub fn take_cache(&mut self) -> Option<Box<dyn CacheStore>> {
        self.cache.take()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Register the type of a stubbed constant for all later sessions
    pub fn stub_constant(&mut self, name: &str, ty: TypeDescriptor) {
        self.stubs.insert(crate::ingest::normalize_name(name), ty);
    }

    // ===== Files =====

    /// Start tracking a file
    ///
    /// # Behavior
    /// 1. Normalize the path into a key (no-op if already tracked)
    /// 2. Read its text (editor overlay first, then the source provider)
    /// 3. Restore it from the cache if the fingerprint matches
    /// 4. Otherwise leave it `Unscanned` for the next batch or query
    ///
    /// # Returns
    /// The file's key
    pub fn add_file(&mut self, path: &str) -> ModelResult<FileKey> {
        ops::add_file(self, path)
    }

    /// Start tracking several files
    ///
    /// A file that cannot be read gets a `Read` error and is left untracked;
    /// a file restored from the cache is reported as skipped (`CacheHit`).
    pub fn add_files(&mut self, paths: &[&str]) -> ReloadReport {
        ops::add_files(self, paths)
    }

    /// Scan, populate and analyze every file not yet ready, as one batch
    pub fn analyze_all(&mut self) -> ReloadReport {
        ops::analyze_pending(self)
    }

    /// Restore a tracked file from the cache without rescanning
    ///
    /// # Returns
    /// `true` if the file is now `Analyzed` from cached facts. A missing,
    /// unreadable or outdated entry is a miss (`false`).
    pub fn load_file(&mut self, file: &FileKey) -> ModelResult<bool> {
        ops::exhume(self, file)
    }

    /// Run the populate stage on an explicit batch
    ///
    /// Every member must already be scanned; otherwise the whole batch is
    /// rejected with `Inconsistent` and nothing is touched. Per-file
    /// resolution failures are returned, not raised.
    pub fn populate_files(&mut self, batch: &[FileKey]) -> ModelResult<Vec<(FileKey, ModelError)>> {
        populate::populate_batch(self, batch)
    }

    /// Run the scan stage for one file
    pub fn scan_file(&mut self, file: &FileKey) -> ModelResult<()> {
        ops::scan_file(self, file)
    }

    // ===== Editor events =====

    /// Apply new text for a file and reload everything it affects
    ///
    /// # Behavior
    /// 1. Record the text as the file's editor overlay
    /// 2. Diff the old declaration tree against the new one
    /// 3. DELETE: purge records, reference-graph entries and the declared set
    /// 4. ADD: mark the file stale
    /// 5. KEEP_SIGNATURE: drop body facts, keep signature facts
    /// 6. KEEP: re-anchor locations and maps through the diff map
    /// 7. Invalidate the affected set (this file, referencers of deleted or
    ///    added symbols, subclasses of changed class-likes, transitively)
    /// 8. Scan all, populate all, analyze all, as one batch
    ///
    /// An unknown path starts being tracked with the given text.
    pub fn on_edit(&mut self, path: &str, text: &str) -> ModelResult<ReloadReport> {
        invalidate::on_edit(self, path, text)
    }

    /// Drop the editor overlay and reload from disk if the text differs
    pub fn on_save(&mut self, file: &FileKey) -> ModelResult<ReloadReport> {
        invalidate::on_save(self, file)
    }

    /// Like [`on_save`](Self::on_save); a buffer never written to disk is
    /// removed from the model
    pub fn on_close(&mut self, file: &FileKey) -> ModelResult<ReloadReport> {
        invalidate::on_close(self, file)
    }

    /// Forget a file and reload every file that depended on it
    pub fn remove_file(&mut self, file: &FileKey) -> ModelResult<ReloadReport> {
        invalidate::remove_file(self, file)
    }

    // ===== Queries =====
    //
    // Queries never fail outward: errors are logged and become empty
    // results. A file below `Analyzed` is analyzed first.

    /// Declaration referenced at `offset`
    pub fn definition_at(&mut self, file: &FileKey, offset: usize) -> Option<Location> {
        query::log_failure("definition", file, query::definition_at(self, file, offset))
    }

    /// Symbol information (or inferred type) at `offset`
    pub fn hover_at(&mut self, file: &FileKey, offset: usize) -> Option<Hover> {
        query::log_failure("hover", file, query::hover_at(self, file, offset))
    }

    /// Members offered after `->` or `::` at `offset`
    pub fn completion_at(&mut self, file: &FileKey, offset: usize) -> Vec<CompletionItem> {
        query::log_failure("completion", file, query::completion_at(self, file, offset))
    }

    /// Every location referencing `symbol`
    ///
    /// Empty unless the model collects references.
    pub fn references_to(&mut self, symbol: &SymbolId) -> Vec<Location> {
        query::references_to(self, symbol)
    }

    /// Reference and type maps for a file, analyzing it first if needed
    pub fn get_maps_for_file(&mut self, file: &FileKey) -> ModelResult<(&ReferenceMap, &TypeMap)> {
        query::maps_for_file(self, file)
    }

    /// Compare the model's text for a file with the source provider's
    pub fn check_freshness(&self, file: &FileKey) -> ModelResult<FreshnessStatus> {
        freshness::check_freshness(self, file)
    }

    // ===== Inspection =====

    pub fn file(&self, file: &FileKey) -> Option<&FileRecord> {
        self.files.get(file)
    }

    pub fn file_state(&self, file: &FileKey) -> Option<FileState> {
        self.files.get(file).map(|r| r.state)
    }

    pub fn is_stale(&self, file: &FileKey) -> bool {
        self.files.get(file).map(|r| r.stale).unwrap_or(false)
    }

    /// Tracked files, in key order
    pub fn file_keys(&self) -> Vec<FileKey> {
        self.files.keys().cloned().collect()
    }

    pub fn declaration(&self, id: &SymbolId) -> Option<&DeclarationRecord> {
        self.symbols.get(id)
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn reference_graph(&self) -> &ReferenceGraph {
        &self.references
    }
}
