//! Point queries against analyzed files

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ops::ensure_analyzed;
use super::schema::Location;
use super::side_tables::{ReferenceMap, TypeMap};
use super::CodebaseModel;
use crate::error::{ModelError, ModelResult};
use crate::ingest::{DeclKind, Span, SymbolId};
use crate::validation::FileKey;

/// Member-access operators after which completion is offered
const MEMBER_ACCESS: &[&str] = &["->", "::"];

/// Hover contents for one position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hover {
    pub contents: String,
    /// Referenced symbol, when the hover came from the reference map
    pub symbol: Option<SymbolId>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: DeclKind,
    /// Signature text
    pub detail: String,
    pub symbol: SymbolId,
}

/// Turn a query error into an empty result
pub(crate) fn log_failure<T: Default>(query: &str, file: &FileKey, result: ModelResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(file = %file, code = err.code(), "{} query failed: {}", query, err);
            T::default()
        }
    }
}

/// Maps for `file`, analyzing it first if they are missing
pub(crate) fn maps_for_file<'m>(
    model: &'m mut CodebaseModel,
    file: &FileKey,
) -> ModelResult<(&'m ReferenceMap, &'m TypeMap)> {
    ensure_analyzed(model, file)?;
    let record = model
        .files
        .get(file)
        .ok_or_else(|| ModelError::file_not_found(file))?;
    match (record.reference_map.as_ref(), record.type_map.as_ref()) {
        (Some(references), Some(types)) => Ok((references, types)),
        _ => Err(ModelError::inconsistent(
            crate::error_codes::MER_P_003_NOT_POPULATED,
            format!("{} analyzed without maps", file),
        )),
    }
}

fn check_offset(model: &CodebaseModel, file: &FileKey, offset: usize) -> ModelResult<()> {
    let len = model.files.get(file).map(|r| r.text.len()).unwrap_or(0);
    if offset > len {
        return Err(ModelError::offset_out_of_range(file, offset, len));
    }
    Ok(())
}

/// Symbol referenced at `offset`, if any
///
/// `strict` excludes a cursor sitting just past the end of a reference.
fn symbol_at(
    model: &mut CodebaseModel,
    file: &FileKey,
    offset: usize,
    strict: bool,
) -> ModelResult<Option<(SymbolId, Span)>> {
    let (references, _) = maps_for_file(model, file)?;
    let entry = if strict {
        references.containing(offset)
    } else {
        references.lookup(offset)
    };
    let hit = entry.map(|entry| (entry.value.clone(), entry.span()));
    check_offset(model, file, offset)?;
    Ok(hit)
}

pub(crate) fn definition_at(
    model: &mut CodebaseModel,
    file: &FileKey,
    offset: usize,
) -> ModelResult<Option<Location>> {
    let Some((symbol, _)) = symbol_at(model, file, offset, false)? else {
        return Ok(None);
    };
    let decl = model
        .symbols
        .get(&symbol)
        .ok_or_else(|| ModelError::symbol_not_found(symbol.as_str()))?;
    Ok(Some(decl.location_in_file()))
}

/// Symbol information from the reference map, else the inferred type
///
/// Unlike definition lookup, hover needs the cursor inside the span.
pub(crate) fn hover_at(model: &mut CodebaseModel, file: &FileKey, offset: usize) -> ModelResult<Option<Hover>> {
    if let Some((symbol, span)) = symbol_at(model, file, offset, true)? {
        if let Some(decl) = model.symbols.get(&symbol) {
            return Ok(Some(Hover {
                contents: decl.symbol_information(),
                symbol: Some(symbol),
                span,
            }));
        }
    }

    let (_, types) = maps_for_file(model, file)?;
    Ok(types.containing(offset).map(|entry| Hover {
        contents: entry.value.to_string(),
        symbol: None,
        span: entry.span(),
    }))
}

/// Members of the type preceding a `->`/`::` that ends at `offset`
///
/// # Behavior
/// 1. Find the nearest type entry starting at or before `offset`
/// 2. The text between its end and `offset` must be exactly `->` or `::`
/// 3. The type must name a known class-like (`mixed` yields nothing)
/// 4. Offer its methods and properties, inherited ones included
pub(crate) fn completion_at(
    model: &mut CodebaseModel,
    file: &FileKey,
    offset: usize,
) -> ModelResult<Vec<CompletionItem>> {
    check_offset(model, file, offset)?;
    let (_, types) = maps_for_file(model, file)?;
    let Some(entry) = types.nearest_preceding(offset) else {
        return Ok(Vec::new());
    };
    if entry.end > offset {
        return Ok(Vec::new());
    }
    let ty = entry.value.clone();
    let gap_start = entry.end;

    let text = model
        .files
        .get(file)
        .map(|r| r.text.as_str())
        .unwrap_or("");
    let gap = text.get(gap_start..offset).unwrap_or("");
    if !MEMBER_ACCESS.contains(&gap) || ty.is_mixed() {
        return Ok(Vec::new());
    }
    let Some(class) = ty.as_class() else {
        return Ok(Vec::new());
    };

    let items = model
        .symbols
        .members_with_inherited(&class)
        .into_iter()
        .map(|member| CompletionItem {
            label: member.short_name().to_string(),
            kind: member.kind,
            detail: member.signature.clone(),
            symbol: member.id.clone(),
        })
        .collect();
    Ok(items)
}

/// Every recorded reference to `symbol`
///
/// Pending files are analyzed first so the answer covers the whole model.
pub(crate) fn references_to(model: &mut CodebaseModel, symbol: &SymbolId) -> Vec<Location> {
    if !model.references.is_collecting() {
        warn!(symbol = %symbol, "find-references needs reference collection enabled");
        return Vec::new();
    }

    let pending = model
        .files
        .keys()
        .filter_map(|k| model.files.get(k))
        .any(|r| !r.is_ready());
    if pending {
        super::ops::analyze_pending(model);
    }

    model.references.locations_of(symbol).unwrap_or_default()
}
