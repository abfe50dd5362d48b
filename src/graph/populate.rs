//! Populate stage: resolve inheritance chains for a scanned batch

use ahash::AHashSet;
use tracing::warn;

use super::schema::FileState;
use super::symbols::SymbolStore;
use super::CodebaseModel;
use crate::error::{ModelError, ModelResult};
use crate::error_codes::{MER_P_001_UNSCANNED_IN_BATCH, MER_REF_003_INHERITANCE_CYCLE};
use crate::ingest::SymbolId;
use crate::validation::FileKey;

/// Populate every file in `batch`
///
/// # Behavior
/// 1. Reject the whole batch if any member is unknown or unscanned
/// 2. For each class-like, resolve its `extends` chain against storage
/// 3. Files that resolve move `Scanned → Populated`
/// 4. A file with an unresolved parent stays `Scanned`, is marked stale
///    and is returned with its `NotFound` error
pub(crate) fn populate_batch(
    model: &mut CodebaseModel,
    batch: &[FileKey],
) -> ModelResult<Vec<(FileKey, ModelError)>> {
    for key in batch {
        let record = model
            .files
            .get(key)
            .ok_or_else(|| ModelError::file_not_found(key))?;
        if record.state == FileState::Unscanned {
            return Err(ModelError::inconsistent(
                MER_P_001_UNSCANNED_IN_BATCH,
                format!("{} is unscanned; populate needs the whole batch scanned", key),
            ));
        }
    }

    let mut failures = Vec::new();
    for key in batch {
        let Some(record) = model.files.get_mut(key) else {
            continue;
        };

        let mut first_error = None;
        for id in &record.declarations {
            let is_class_like = model
                .symbols
                .get(id)
                .map(|d| d.kind.is_class_like() && &d.file == key)
                .unwrap_or(false);
            if !is_class_like {
                continue;
            }
            match resolve_ancestors(&model.symbols, id) {
                Ok(chain) => model.symbols.set_ancestors(id, chain),
                Err(err) => {
                    model.symbols.set_ancestors(id, Vec::new());
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => {
                if record.state == FileState::Scanned {
                    record.state = FileState::Populated;
                }
            }
            Some(err) => {
                record.stale = true;
                failures.push((key.clone(), err));
            }
        }
    }

    Ok(failures)
}

/// Ancestor chain of `id`, nearest first
fn resolve_ancestors(symbols: &SymbolStore, id: &SymbolId) -> ModelResult<Vec<SymbolId>> {
    let mut chain = Vec::new();
    let mut seen: AHashSet<SymbolId> = AHashSet::new();
    seen.insert(id.clone());

    let Some(mut current) = symbols.get(id) else {
        return Err(ModelError::symbol_not_found(id.as_str()));
    };

    while !current.parent_candidates.is_empty() {
        let Some(parent) = symbols.resolve(&current.parent_candidates) else {
            let declared = current.declared_parent.as_deref().unwrap_or("?");
            return Err(ModelError::parent_not_found(&current.display_name, declared));
        };
        if !seen.insert(parent.id.clone()) {
            warn!(
                class = %id,
                code = MER_REF_003_INHERITANCE_CYCLE,
                "inheritance cycle through {}; chain truncated",
                parent.id
            );
            break;
        }
        chain.push(parent.id.clone());
        current = parent;
    }

    Ok(chain)
}
