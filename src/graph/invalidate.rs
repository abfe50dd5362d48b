//! Invalidation and incremental reload
//!
//! Turns an editor event into the minimal set of files to re-run, using the
//! declaration diff plus the reference graph.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::files::compute_fingerprint;
use super::ops::{mark_stale, run_batch};
use super::schema::{FileRecord, FileState};
use super::CodebaseModel;
use crate::diagnostics::{ReloadDiagnostic, ReloadReport, ReloadStage, SkipReason};
use crate::diff::{diff_declarations, FileDiff};
use crate::error::{ModelError, ModelResult};
use crate::error_codes::{MER_IO_001_READ_FAILED, MER_IO_002_CACHE_WRITE_FAILED};
use crate::ingest::{Declaration, SymbolId};
use crate::kv;
use crate::validation::FileKey;

/// Apply new editor text for `path`
pub(crate) fn on_edit(model: &mut CodebaseModel, path: &str, text: &str) -> ModelResult<ReloadReport> {
    let key = FileKey::new(path);
    info!(file = %key, bytes = text.len(), "edit received");
    model.files.set_temporary(&key, text);

    if !model.files.contains(&key) {
        let record = FileRecord::new(key.clone(), path, text.to_string(), compute_fingerprint(text));
        model.files.insert(record);
        let mut batch = vec![key.clone()];
        batch.extend(model.files.in_state(FileState::Unscanned));
        let mut report = run_batch(model, batch).report;
        report.affected = vec![key];
        return Ok(report);
    }

    apply_text(model, &key, text)
}

/// Drop the overlay and reload from disk
pub(crate) fn on_save(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<ReloadReport> {
    let display_path = model
        .files
        .get(key)
        .map(|r| r.display_path.clone())
        .ok_or_else(|| ModelError::file_not_found(key))?;
    model.files.clear_temporary(key);

    let disk = model
        .source
        .read(&display_path)
        .map_err(|e| ModelError::external(MER_IO_001_READ_FAILED, key, e))?;
    apply_text(model, key, &disk)
}

/// Drop the overlay; a buffer with no file behind it is forgotten
pub(crate) fn on_close(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<ReloadReport> {
    let Some(display_path) = model.files.get(key).map(|r| r.display_path.clone()) else {
        return Ok(ReloadReport::default());
    };
    if !model.files.clear_temporary(key) {
        return Ok(ReloadReport::default());
    }

    match model.source.read(&display_path) {
        Ok(disk) => apply_text(model, key, &disk),
        Err(err) => {
            debug!(file = %key, "closed buffer has no source on disk: {:#}", err);
            remove_file(model, key)
        }
    }
}

/// Forget a file and reload its dependents
pub(crate) fn remove_file(model: &mut CodebaseModel, key: &FileKey) -> ModelResult<ReloadReport> {
    let record = model
        .files
        .remove(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;
    info!(file = %key, declarations = record.declarations.len(), "file removed");

    let declared: Vec<SymbolId> = record.declarations.iter().cloned().collect();
    let mut report = ReloadReport::default();
    let mut affected = affected_files(model, key, &declared, &mut report);
    affected.remove(key);

    for id in &declared {
        model.symbols.remove_owned(id, key);
        model.references.purge_symbol(id);
    }
    model.references.remove_file(key);

    if let Some(cache) = model.cache.as_deref_mut() {
        if let Err(e) = kv::forget_file(cache, key) {
            let err = ModelError::external(MER_IO_002_CACHE_WRITE_FAILED, key, e);
            warn!(file = %key, code = err.code(), "{}", err);
            report
                .diagnostics
                .push(ReloadDiagnostic::error(key, ReloadStage::Cache, &err));
        }
    }

    Ok(reload_affected(model, affected, report))
}

/// Diff `key`'s current text against `text` and reload what it affects
fn apply_text(model: &mut CodebaseModel, key: &FileKey, text: &str) -> ModelResult<ReloadReport> {
    let record = model
        .files
        .get_mut(key)
        .ok_or_else(|| ModelError::file_not_found(key))?;

    if record.text == text && record.is_ready() {
        let mut report = ReloadReport::default();
        report
            .diagnostics
            .push(ReloadDiagnostic::skipped(key, SkipReason::Unchanged));
        return Ok(report);
    }

    let old_text = std::mem::replace(&mut record.text, text.to_string());
    record.fingerprint = compute_fingerprint(text);

    let old_tree = match record.tree.take() {
        Some(tree) => tree,
        None => model.scanner.scan(key, &old_text).unwrap_or_else(|e| {
            debug!(file = %key, "previous text no longer scans: {:#}", e);
            Declaration::file(old_text.len(), Vec::new())
        }),
    };
    let new_tree = match model.scanner.scan(key, text) {
        Ok(tree) => Some(tree),
        Err(e) => {
            warn!(file = %key, "new text does not scan: {:#}", e);
            None
        }
    };

    let empty = Declaration::file(text.len(), Vec::new());
    let FileDiff {
        keep,
        keep_signature,
        delete,
        add,
        diff_map,
        ..
    } = diff_declarations(&old_tree, &old_text, new_tree.as_ref().unwrap_or(&empty), text);
    debug!(
        file = %key,
        keep = keep.len(),
        keep_signature = keep_signature.len(),
        delete = delete.len(),
        add = add.len(),
        "declaration diff"
    );

    let changed: Vec<SymbolId> = delete.iter().chain(add.iter()).cloned().collect();
    let mut report = ReloadReport::default();
    let affected = affected_files(model, key, &changed, &mut report);

    for id in &delete {
        model.symbols.remove_owned(id, key);
        model.references.purge_symbol(id);
    }
    for id in &keep_signature {
        model.symbols.clear_body(id);
    }
    for id in &keep {
        if let Some(decl) = model.symbols.get_mut(id) {
            if &decl.file == key {
                if let Some(span) = diff_map.translate_span(decl.location) {
                    decl.location = span;
                }
            }
        }
    }

    if let Some(record) = model.files.get_mut(key) {
        for id in &delete {
            record.declarations.remove(id);
        }
        record.reference_map = record.reference_map.as_ref().map(|m| m.translate(&diff_map));
        record.type_map = record.type_map.as_ref().map(|m| m.translate(&diff_map));
        record.pending_tree = new_tree;
        if !add.is_empty() {
            record.stale = true;
        }
    }

    Ok(reload_affected(model, affected, report))
}

/// Invalidate `affected` and run it (plus any unscanned file) as one batch
fn reload_affected(
    model: &mut CodebaseModel,
    affected: BTreeSet<FileKey>,
    mut report: ReloadReport,
) -> ReloadReport {
    for key in &affected {
        if let Some(record) = model.files.get_mut(key) {
            record.invalidate();
        }
    }

    let mut batch: Vec<FileKey> = affected.iter().cloned().collect();
    batch.extend(model.files.in_state(FileState::Unscanned));
    let outcome = run_batch(model, batch);

    report.affected = affected.into_iter().collect();
    report.analyzed = outcome.report.analyzed;
    report.diagnostics.extend(outcome.report.diagnostics);
    report.sort();
    report
}

/// Files whose analysis may depend on `changed`
///
/// {`origin`} ∪ files referencing a changed symbol or the owner of a changed
/// member, closed over class-likes whose ancestor chain contains a changed
/// symbol (or such an owner), and over the files referencing those
/// class-likes.
fn affected_files(
    model: &mut CodebaseModel,
    origin: &FileKey,
    changed: &[SymbolId],
    report: &mut ReloadReport,
) -> BTreeSet<FileKey> {
    let owners: Vec<SymbolId> = changed.iter().filter_map(SymbolId::owner).collect();
    let mut roots: Vec<SymbolId> = changed.to_vec();
    roots.extend(owners.iter().cloned());
    let descendants = model.symbols.descendants_of(roots.iter());

    let mut files = BTreeSet::new();
    files.insert(origin.clone());
    // A member that did not exist had no edge of its own; its callers hang off the owner
    for symbol in changed.iter().chain(owners.iter()).chain(descendants.iter()) {
        files.extend(model.references.files_referencing(symbol));
    }
    for class in &descendants {
        if let Some(decl) = model.symbols.get(class) {
            files.insert(decl.file.clone());
        }
    }
    files.retain(|f| f == origin || model.files.contains(f));

    if let Some(limit) = model.config.max_transitive_files {
        if files.len() > limit {
            let overflow: Vec<FileKey> = files
                .iter()
                .filter(|f| *f != origin)
                .skip(limit.saturating_sub(1))
                .cloned()
                .collect();
            warn!(
                file = %origin,
                affected = files.len(),
                limit,
                "affected set capped; remaining files marked stale"
            );
            for key in overflow {
                files.remove(&key);
                mark_stale(model, &key);
                report
                    .diagnostics
                    .push(ReloadDiagnostic::skipped(&key, SkipReason::TransitiveLimit));
            }
        }
    }

    debug!(file = %origin, affected = files.len(), "affected set");
    files
}
