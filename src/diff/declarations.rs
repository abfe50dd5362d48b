//! Hierarchical diff of two versions of a file's declaration tree
//!
//! The top-level sequence is diffed with [`diff_sequences`]; matched
//! containers (namespaces, classes, interfaces) whose text changed are
//! recursed into. Every declaration ends up in exactly one bucket per side:
//!
//! | Bucket         | Meaning                                              |
//! |----------------|------------------------------------------------------|
//! | KEEP           | byte-identical; every cached fact is reusable         |
//! | KEEP_SIGNATURE | same kind/name/signature, body changed                |
//! | ADD            | only in the new tree                                 |
//! | DELETE         | only in the old tree                                 |
//!
//! Two declarations match only when kind, normalized name and signature text
//! agree. Signature text is compared with whitespace runs collapsed and the
//! declared name case-folded. A rename or kind change is therefore
//! DELETE+ADD, and so is a parameter-list change, since cache and index keys
//! hang off the signature.

use serde::{Deserialize, Serialize};

use super::sequence::{diff_sequences, Edit};
use crate::ingest::{normalize_name, DeclKind, Declaration, Scope, Span, SymbolId};

/// Classification of one declaration pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffElement<'a> {
    Keep {
        old: &'a Declaration,
        new: &'a Declaration,
    },
    KeepSignature {
        old: &'a Declaration,
        new: &'a Declaration,
        /// Classification of the children, for containers
        children: Vec<DiffElement<'a>>,
    },
    Add {
        new: &'a Declaration,
    },
    Delete {
        old: &'a Declaration,
    },
}

impl<'a> DiffElement<'a> {
    pub fn old(&self) -> Option<&'a Declaration> {
        match self {
            DiffElement::Keep { old, .. }
            | DiffElement::KeepSignature { old, .. }
            | DiffElement::Delete { old } => Some(old),
            DiffElement::Add { .. } => None,
        }
    }

    pub fn new(&self) -> Option<&'a Declaration> {
        match self {
            DiffElement::Keep { new, .. }
            | DiffElement::KeepSignature { new, .. }
            | DiffElement::Add { new } => Some(new),
            DiffElement::Delete { .. } => None,
        }
    }
}

/// Coordinate translation for one KEEP span
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffMapEntry {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

impl DiffMapEntry {
    fn shift(&self) -> isize {
        self.new_start as isize - self.old_start as isize
    }
}

/// Ordered (by old offset) KEEP span translations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffMap {
    entries: Vec<DiffMapEntry>,
}

impl DiffMap {
    pub fn entries(&self) -> &[DiffMapEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry maps a span onto itself
    pub fn is_identity(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.old_start == e.new_start && e.old_end == e.new_end)
    }

    fn push(&mut self, old: Span, new: Span) {
        self.entries.push(DiffMapEntry {
            old_start: old.start,
            old_end: old.end,
            new_start: new.start,
            new_end: new.end,
        });
    }

    fn entry_covering(&self, span: Span) -> Option<&DiffMapEntry> {
        let idx = self.entries.partition_point(|e| e.old_start <= span.start);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        (span.end <= entry.old_end).then_some(entry)
    }

    /// Re-anchor an old-text span, if it lies inside a KEEP span
    pub fn translate_span(&self, span: Span) -> Option<Span> {
        let entry = self.entry_covering(span)?;
        let shift = entry.shift();
        Some(Span::new(
            (span.start as isize + shift) as usize,
            (span.end as isize + shift) as usize,
        ))
    }

    /// Re-anchor an old-text offset, if it lies inside a KEEP span
    pub fn translate_offset(&self, offset: usize) -> Option<usize> {
        self.translate_span(Span::new(offset, offset)).map(|s| s.start)
    }
}

/// Result of diffing one file
#[derive(Debug, Clone, Default)]
pub struct FileDiff<'a> {
    /// Classification tree, in document order
    pub elements: Vec<DiffElement<'a>>,
    /// Fully reusable declarations
    pub keep: Vec<SymbolId>,
    /// Declarations whose signature facts are reusable but body facts are not
    pub keep_signature: Vec<SymbolId>,
    /// Declarations present only in the old tree
    pub delete: Vec<SymbolId>,
    /// Declarations present only in the new tree
    pub add: Vec<SymbolId>,
    pub diff_map: DiffMap,
}

impl FileDiff<'_> {
    /// No declaration was added, deleted or had its body touched
    pub fn is_unchanged(&self) -> bool {
        self.keep_signature.is_empty() && self.delete.is_empty() && self.add.is_empty()
    }
}

/// Diff two versions of a file's declaration tree
///
/// Namespaces appear in `elements` but not in the id lists: a namespace has
/// no storage of its own and may span many files.
pub fn diff_declarations<'a>(
    old_root: &'a Declaration,
    old_text: &str,
    new_root: &'a Declaration,
    new_text: &str,
) -> FileDiff<'a> {
    let mut diff = FileDiff::default();
    let texts = Texts {
        old: old_text,
        new: new_text,
    };
    let scope = Scope::default();
    diff.elements = diff_level(
        &old_root.children,
        &new_root.children,
        &texts,
        &scope,
        &scope,
        &mut diff,
    );
    diff
}

struct Texts<'t> {
    old: &'t str,
    new: &'t str,
}

fn diff_level<'a>(
    old: &'a [Declaration],
    new: &'a [Declaration],
    texts: &Texts<'_>,
    old_scope: &Scope,
    new_scope: &Scope,
    acc: &mut FileDiff<'a>,
) -> Vec<DiffElement<'a>> {
    let edits = diff_sequences(old, new, |a, b| candidate_equal(a, texts.old, b, texts.new));
    let mut elements = Vec::with_capacity(edits.len());

    for edit in edits {
        match edit {
            Edit::Keep { old: o, new: n } => {
                let a = &old[o];
                let b = &new[n];
                if a.full_text(texts.old) == b.full_text(texts.new) {
                    collect_ids(a, old_scope, &mut acc.keep);
                    acc.diff_map.push(a.span, b.span);
                    elements.push(DiffElement::Keep { old: a, new: b });
                } else {
                    if let Some(id) = stored_id(a, old_scope) {
                        acc.keep_signature.push(id);
                    }
                    let children = if a.kind.is_container() {
                        diff_level(
                            &a.children,
                            &b.children,
                            texts,
                            &old_scope.enter(a),
                            &new_scope.enter(b),
                            acc,
                        )
                    } else {
                        Vec::new()
                    };
                    elements.push(DiffElement::KeepSignature {
                        old: a,
                        new: b,
                        children,
                    });
                }
            }
            Edit::Delete { old: o } => {
                let a = &old[o];
                collect_ids(a, old_scope, &mut acc.delete);
                elements.push(DiffElement::Delete { old: a });
            }
            Edit::Add { new: n } => {
                let b = &new[n];
                collect_ids(b, new_scope, &mut acc.add);
                elements.push(DiffElement::Add { new: b });
            }
        }
    }

    elements
}

/// Candidate-equality predicate for the sequence diff
fn candidate_equal(a: &Declaration, a_text: &str, b: &Declaration, b_text: &str) -> bool {
    if a.kind != b.kind {
        return false;
    }

    if a.is_anonymous() || b.is_anonymous() {
        // No identity to carry over; only an untouched copy is the same thing
        return a.is_anonymous()
            && b.is_anonymous()
            && a.full_text(a_text) == b.full_text(b_text);
    }

    a.normalized_name() == b.normalized_name() && signature_key(a, a_text) == signature_key(b, b_text)
}

/// Signature text with whitespace runs collapsed and the declared name
/// case-folded, so layout and casing edits keep the declaration's identity
fn signature_key(decl: &Declaration, text: &str) -> String {
    match decl.kind {
        // Containers without a recorded body start are identified by name alone
        DeclKind::Namespace | DeclKind::Class | DeclKind::Interface if decl.body_start.is_none() => {
            String::new()
        }
        _ => {
            let collapsed = decl
                .signature_text(text)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            match decl.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => fold_name(&collapsed, name),
                _ => collapsed,
            }
        }
    }
}

/// Replace the first whole-word occurrence of `name` with its normalized form
fn fold_name(signature: &str, name: &str) -> String {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '\\';
    let mut from = 0;
    while let Some(pos) = signature[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        let before_ok = !signature[..start].chars().next_back().is_some_and(is_ident);
        let after_ok = !signature[end..].chars().next().is_some_and(is_ident);
        if before_ok && after_ok {
            return format!("{}{}{}", &signature[..start], normalize_name(name), &signature[end..]);
        }
        from = end;
    }
    signature.to_string()
}

fn stored_id(decl: &Declaration, scope: &Scope) -> Option<SymbolId> {
    match decl.kind {
        DeclKind::File | DeclKind::Namespace | DeclKind::Statement => None,
        DeclKind::Class
        | DeclKind::Interface
        | DeclKind::Method
        | DeclKind::Property
        | DeclKind::Function
        | DeclKind::Constant => scope.symbol_id(decl),
    }
}

fn collect_ids(decl: &Declaration, scope: &Scope, out: &mut Vec<SymbolId>) {
    if let Some(id) = stored_id(decl, scope) {
        out.push(id);
    }
    let inner = scope.enter(decl);
    for child in &decl.children {
        collect_ids(child, &inner, out);
    }
}
