//! Pipeline stages for the codebase model
//!
//! Scan, analyze, cache write-through and the batch driver that runs
//! scan all → populate all → analyze all over a set of files.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::files::compute_fingerprint;
use super::populate::populate_batch;
use super::schema::{DeclarationRecord, FileRecord, FileState};
use super::side_tables::PositionMapBuilder;
use super::CodebaseModel;
use crate::diagnostics::{ReloadDiagnostic, ReloadReport, ReloadStage, SkipReason};
use crate::error::{ModelError, ModelResult};
use crate::error_codes::*;
use crate::ingest::{DeclKind, Declaration, Scope, SymbolId};
use crate::kv::{self, CachedFile, CACHE_FORMAT_VERSION};
use crate::session::{AnalysisInput, AnalysisOutput, AnalysisSession};
use crate::validation::FileKey;

/// Result of one batch: the report plus the first error per failed file
pub(crate) struct BatchOutcome {
    pub report: ReloadReport,
    pub failures: BTreeMap<FileKey, ModelError>,
}

impl BatchOutcome {
    fn new() -> Self {
        Self {
            report: ReloadReport::default(),
            failures: BTreeMap::new(),
        }
    }

    fn fail(&mut self, file: &FileKey, stage: ReloadStage, err: ModelError) {
        warn!(file = %file, stage = %stage, code = err.code(), "{}", err);
        self.report
            .diagnostics
            .push(ReloadDiagnostic::error(file, stage, &err));
        self.failures.entry(file.clone()).or_insert(err);
    }
}

/// Start tracking a file
pub(crate) fn add_file(model: &mut CodebaseModel, path: &str) -> ModelResult<FileKey> {
    register(model, path).map(|(key, _)| key)
}

/// Start tracking several files, reporting read failures and cache hits per file
pub(crate) fn add_files(model: &mut CodebaseModel, paths: &[&str]) -> ReloadReport {
    let mut report = ReloadReport::default();
    for path in paths {
        match register(model, path) {
            Ok((key, true)) => report
                .diagnostics
                .push(ReloadDiagnostic::skipped(&key, SkipReason::CacheHit)),
            Ok((_, false)) => {}
            Err(err) => {
                let key = FileKey::new(path);
                warn!(file = %key, code = err.code(), "{}", err);
                report
                    .diagnostics
                    .push(ReloadDiagnostic::error(&key, ReloadStage::Read, &err));
            }
        }
    }
    report.sort();
    report
}

/// Read and insert a file record; `true` if it was restored from the cache
fn register(model: &mut CodebaseModel, path: &str) -> ModelResult<(FileKey, bool)> {
    let key = FileKey::new(path);
    if model.files.contains(&key) {
        return Ok((key, false));
    }

    let text = model
        .files
        .read_text(&key, path, model.source.as_ref())
        .map_err(|e| ModelError::external(MER_IO_001_READ_FAILED, &key, e))?;
    let fingerprint = compute_fingerprint(&text);
    model
        .files
        .insert(FileRecord::new(key.clone(), path, text, fingerprint));

    let restored = exhume(model, &key)?;
    if restored {
        debug!(file = %key, "restored from cache");
    }
    Ok((key, restored))
}

/// Restore a file from the cache if the stored fingerprint matches
pub(crate) fn exhume(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<bool> {
    if !model.config.cache_enabled {
        return Ok(false);
    }
    let Some(cache) = model.cache.as_deref() else {
        return Ok(false);
    };
    let record = model
        .files
        .get(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;

    let entry = match kv::load_file(cache, key, &record.fingerprint) {
        Ok(Some(entry)) => entry,
        Ok(None) => return Ok(false),
        Err(err) => {
            debug!(file = %key, code = err.code(), "cache miss: {}", err);
            return Ok(false);
        }
    };

    let CachedFile {
        declarations,
        references,
        reference_map,
        type_map,
        diagnostics,
        ..
    } = entry;

    let restored: BTreeSet<SymbolId> = declarations.iter().map(|d| d.id.clone()).collect();
    let Some(record) = model.files.get_mut(key) else {
        return Err(ModelError::file_not_found(key));
    };
    for gone in record.declarations.difference(&restored) {
        model.symbols.remove_owned(gone, key);
    }
    for decl in declarations {
        model.symbols.insert(decl);
    }
    model.references.set_file_references(key, &references);

    record.declarations = restored;
    record.tree = None;
    record.pending_tree = None;
    record.reference_map = Some(reference_map);
    record.type_map = Some(type_map);
    record.references = references;
    record.diagnostics = diagnostics;
    record.state = FileState::Analyzed;
    record.stale = false;
    Ok(true)
}

/// Scan one file and register its declarations
///
/// # Behavior
/// 1. Use the tree produced during invalidation, or run the scanner
/// 2. Drop records this file no longer declares
/// 3. Insert fresh records, carrying body facts over from surviving ones
/// 4. Move the file to `Scanned`
pub(crate) fn scan_file(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<()> {
    let record = model
        .files
        .get_mut(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;

    let tree = match record.pending_tree.take() {
        Some(tree) => tree,
        None => model
            .scanner
            .scan(key, &record.text)
            .map_err(|e| ModelError::external(MER_P_002_COLLABORATOR_FAILED, key, e))?,
    };

    let mut fresh = Vec::new();
    collect_records(&tree, &Scope::default(), None, key, &record.text, &mut fresh);

    let new_ids: BTreeSet<SymbolId> = fresh.iter().map(|r| r.id.clone()).collect();
    for gone in record.declarations.difference(&new_ids) {
        model.symbols.remove_owned(gone, key);
    }

    for mut decl in fresh {
        if let Some(existing) = model.symbols.get(&decl.id) {
            if &existing.file == key {
                decl.body = existing.body.clone();
            } else {
                warn!(
                    symbol = %decl.id,
                    file = %key,
                    previous = %existing.file,
                    "duplicate declaration, latest scan wins"
                );
            }
        }
        model.symbols.insert(decl);
    }

    record.declarations = new_ids;
    record.tree = Some(tree);
    record.state = FileState::Scanned;
    Ok(())
}

fn collect_records(
    decl: &Declaration,
    scope: &Scope,
    owner: Option<&SymbolId>,
    file: &FileKey,
    text: &str,
    out: &mut Vec<DeclarationRecord>,
) {
    for child in &decl.children {
        let record = make_record(child, scope, owner, file, text);
        let next_owner = if child.kind.is_class_like() {
            record.as_ref().map(|r| r.id.clone())
        } else {
            owner.cloned()
        };
        if let Some(record) = record {
            out.push(record);
        }
        collect_records(child, &scope.enter(child), next_owner.as_ref(), file, text, out);
    }
}

fn make_record(
    decl: &Declaration,
    scope: &Scope,
    owner: Option<&SymbolId>,
    file: &FileKey,
    text: &str,
) -> Option<DeclarationRecord> {
    let is_member = match decl.kind {
        DeclKind::File | DeclKind::Namespace | DeclKind::Statement => return None,
        DeclKind::Class | DeclKind::Interface | DeclKind::Function => false,
        DeclKind::Method | DeclKind::Property | DeclKind::Constant => owner.is_some(),
    };

    let id = scope.symbol_id(decl)?;
    let display_name = scope.qualify(decl)?;

    let members = if decl.kind.is_class_like() {
        let inner = scope.enter(decl);
        decl.children
            .iter()
            .filter(|c| matches!(c.kind, DeclKind::Method | DeclKind::Property | DeclKind::Constant))
            .filter_map(|c| inner.symbol_id(c))
            .collect()
    } else {
        Vec::new()
    };

    let parent_candidates = decl
        .extends
        .as_deref()
        .map(|raw| parent_candidates(scope.namespace(), raw))
        .unwrap_or_default();

    Some(DeclarationRecord {
        id,
        kind: decl.kind,
        display_name,
        file: file.clone(),
        location: decl.span,
        signature: decl.signature_text(text).trim().to_string(),
        owner: if is_member { owner.cloned() } else { None },
        declared_parent: decl.extends.clone(),
        parent_candidates,
        ancestors: Vec::new(),
        members,
        body: None,
    })
}

/// Ids an `extends` clause may name, most specific first
fn parent_candidates(namespace: &str, raw: &str) -> Vec<SymbolId> {
    let raw = raw.trim();
    if let Some(absolute) = raw.strip_prefix('\\') {
        return vec![SymbolId::new(absolute)];
    }
    if namespace.is_empty() {
        vec![SymbolId::new(raw)]
    } else {
        vec![
            SymbolId::new(&format!("{}\\{}", namespace, raw)),
            SymbolId::new(raw),
        ]
    }
}

/// Run the analyzer over one populated file and store its output
pub(crate) fn analyze_file(
    model: &mut CodebaseModel,
    key: &FileKey,
    session: &mut AnalysisSession,
) -> ModelResult<()> {
    let record = model
        .files
        .get(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;
    if record.state < FileState::Populated {
        return Err(ModelError::inconsistent(
            MER_P_003_NOT_POPULATED,
            format!("{} is {}, expected populated", key, record.state),
        ));
    }
    let Some(tree) = record.tree.as_ref() else {
        return Err(ModelError::inconsistent(
            MER_P_003_NOT_POPULATED,
            format!("{} has no scanned tree", key),
        ));
    };

    let input = AnalysisInput {
        file: key,
        text: &record.text,
        tree,
        symbols: &model.symbols,
    };
    let AnalysisOutput {
        diagnostics,
        references,
        types,
        body_facts,
    } = model
        .analyzer
        .analyze(input, session)
        .map_err(|e| ModelError::external(MER_P_002_COLLABORATOR_FAILED, key, e))?;

    let reference_map = references
        .iter()
        .cloned()
        .collect::<PositionMapBuilder<_>>()
        .freeze();
    let type_map = types.into_iter().collect::<PositionMapBuilder<_>>().freeze();

    model.references.set_file_references(key, &references);
    for (id, facts) in body_facts {
        if !model.symbols.set_body(&id, key, facts) {
            debug!(file = %key, symbol = %id, "body facts for a symbol this file does not declare");
        }
    }

    let Some(record) = model.files.get_mut(key) else {
        return Err(ModelError::file_not_found(key));
    };
    record.reference_map = Some(reference_map);
    record.type_map = Some(type_map);
    record.references = references;
    record.diagnostics = diagnostics;
    record.state = FileState::Analyzed;
    record.stale = false;
    Ok(())
}

/// Write an analyzed file through to the cache
pub(crate) fn write_through(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<()> {
    if !model.config.cache_enabled {
        return Ok(());
    }
    let Some(cache) = model.cache.as_deref_mut() else {
        return Ok(());
    };
    let record = model
        .files
        .get(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;

    let declarations = record
        .declarations
        .iter()
        .filter_map(|id| model.symbols.get(id))
        .filter(|d| &d.file == key)
        .cloned()
        .collect();

    let entry = CachedFile {
        version: CACHE_FORMAT_VERSION,
        key: key.clone(),
        display_path: record.display_path.clone(),
        fingerprint: record.fingerprint.clone(),
        declarations,
        references: record.references.clone(),
        reference_map: record.reference_map.clone().unwrap_or_default(),
        type_map: record.type_map.clone().unwrap_or_default(),
        diagnostics: record.diagnostics.clone(),
    };

    kv::store_file(cache, &entry)
        .map_err(|e| ModelError::external(MER_IO_002_CACHE_WRITE_FAILED, key, e))
}

/// Scan all → populate all → analyze all
///
/// One file's failure at any stage only removes that file from the later
/// stages; the rest of the batch carries on.
pub(crate) fn run_batch(model: &mut CodebaseModel, batch: Vec<FileKey>) -> BatchOutcome {
    let mut outcome = BatchOutcome::new();
    let mut batch: Vec<FileKey> = batch
        .into_iter()
        .filter(|k| model.files.contains(k))
        .collect();
    batch.sort();
    batch.dedup();

    if batch.is_empty() {
        return outcome;
    }
    debug!(files = batch.len(), "reload batch");

    let mut scanned = Vec::with_capacity(batch.len());
    for key in &batch {
        match scan_file(model, key) {
            Ok(()) => scanned.push(key.clone()),
            Err(err) => {
                mark_stale(model, key);
                outcome.fail(key, ReloadStage::Scan, err);
            }
        }
    }

    let populated: Vec<FileKey> = match populate_batch(model, &scanned) {
        Ok(failures) => {
            let failed: BTreeSet<FileKey> = failures.iter().map(|(k, _)| k.clone()).collect();
            for (key, err) in failures {
                outcome.fail(&key, ReloadStage::Populate, err);
            }
            scanned.into_iter().filter(|k| !failed.contains(k)).collect()
        }
        Err(err) => {
            // Only reachable if a scanned file regressed mid-batch
            for key in &scanned {
                outcome.fail(
                    key,
                    ReloadStage::Populate,
                    ModelError::inconsistent(err.code(), err.to_string()),
                );
            }
            Vec::new()
        }
    };

    let mut session = AnalysisSession::new(batch.clone(), model.config.collect_references)
        .with_constants(&model.stubs);
    for key in &populated {
        match analyze_file(model, key, &mut session) {
            Ok(()) => {
                outcome.report.analyzed.push(key.clone());
                if let Err(err) = write_through(model, key) {
                    outcome.fail(key, ReloadStage::Cache, err);
                }
            }
            Err(err) => {
                mark_stale(model, key);
                outcome.fail(key, ReloadStage::Analyze, err);
            }
        }
    }

    outcome.report.sort();
    outcome
}

pub(crate) fn mark_stale(model: &mut CodebaseModel, key: &FileKey) {
    if let Some(record) = model.files.get_mut(key) {
        record.stale = true;
    }
}

/// Analyze every file that is not ready
pub(crate) fn analyze_pending(model: &mut CodebaseModel) -> ReloadReport {
    let mut pending = Vec::new();
    for key in model.files.keys() {
        match model.files.get(key) {
            Some(record) if record.is_ready() => {}
            Some(_) => pending.push(key.clone()),
            None => {}
        }
    }

    let mut outcome = run_batch(model, pending.clone());
    outcome.report.affected = pending;
    outcome.report
}

/// Escalate a query: analyze `key` together with every unscanned file
pub(crate) fn ensure_analyzed(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<()> {
    let record = model
        .files
        .get(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;
    if record.is_ready() {
        return Ok(());
    }

    let mut batch = vec![key.clone()];
    batch.extend(model.files.in_state(FileState::Unscanned));
    info!(file = %key, state = %record.state, batch = batch.len(), "query escalated to analysis");

    let mut outcome = run_batch(model, batch);
    if model.files.get(key).map(FileRecord::is_ready).unwrap_or(false) {
        return Ok(());
    }
    Err(outcome.failures.remove(key).unwrap_or_else(|| {
        ModelError::inconsistent(
            MER_P_003_NOT_POPULATED,
            format!("{} did not reach analyzed", key),
        )
    }))
}
