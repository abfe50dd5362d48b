//! Record definitions for the codebase model
//!
//! Defines per-file and per-declaration records held in memory and written
//! through to the cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::graph::side_tables::{ReferenceMap, TypeDescriptor, TypeMap};
use crate::ingest::{DeclKind, Declaration, Span, SymbolId};
use crate::validation::FileKey;

/// Pipeline state of one file
///
/// Ordered: a file at `Populated` has also been scanned, and so on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileState {
    Unscanned,
    Scanned,
    Populated,
    Analyzed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Unscanned => "unscanned",
            FileState::Scanned => "scanned",
            FileState::Populated => "populated",
            FileState::Analyzed => "analyzed",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position in one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub file: FileKey,
    pub span: Span,
}

/// Body-level facts written by the analyzer
///
/// Dropped whenever the declaration's body changes; the signature facts on
/// the owning [`DeclarationRecord`] survive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BodyFacts {
    /// Inferred return type, for callables
    #[serde(default)]
    pub return_type: Option<TypeDescriptor>,
    /// Symbols the body refers to
    #[serde(default)]
    pub uses: Vec<SymbolId>,
}

/// Stored facts for one named declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclarationRecord {
    pub id: SymbolId,
    pub kind: DeclKind,
    /// Fully-qualified name in original casing
    pub display_name: String,
    pub file: FileKey,
    pub location: Span,
    /// Signature text, trimmed
    pub signature: String,
    /// Owning class-like, for members
    #[serde(default)]
    pub owner: Option<SymbolId>,
    /// `extends` as written
    #[serde(default)]
    pub declared_parent: Option<String>,
    /// Ids the declared parent may resolve to, most specific first
    #[serde(default)]
    pub parent_candidates: Vec<SymbolId>,
    /// Resolved ancestor chain, nearest first; filled by populate
    #[serde(default)]
    pub ancestors: Vec<SymbolId>,
    /// Member ids, for class-likes
    #[serde(default)]
    pub members: Vec<SymbolId>,
    #[serde(default)]
    pub body: Option<BodyFacts>,
}

impl DeclarationRecord {
    /// Short member name (`A::getName` → `getName`, `A::$x` → `x`)
    pub fn short_name(&self) -> &str {
        let tail = match self.display_name.rsplit_once("::") {
            Some((_, member)) => member,
            None => self
                .display_name
                .rsplit_once('\\')
                .map(|(_, name)| name)
                .unwrap_or(&self.display_name),
        };
        tail.trim_start_matches('$').trim_end_matches("()")
    }

    /// Text shown on hover
    ///
    /// Class-likes render as `class Name` / `interface Name`; everything
    /// else shows its signature.
    pub fn symbol_information(&self) -> String {
        match self.kind {
            DeclKind::Class | DeclKind::Interface => {
                format!("{} {}", self.kind, self.display_name)
            }
            DeclKind::File
            | DeclKind::Namespace
            | DeclKind::Method
            | DeclKind::Property
            | DeclKind::Function
            | DeclKind::Constant
            | DeclKind::Statement => {
                if self.signature.is_empty() {
                    self.display_name.clone()
                } else {
                    self.signature.clone()
                }
            }
        }
    }

    pub fn location_in_file(&self) -> Location {
        Location {
            file: self.file.clone(),
            span: self.location,
        }
    }
}

/// Everything the model knows about one file
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub key: FileKey,
    /// Path as first given, for display
    pub display_path: String,
    /// Current text (editor overlay if one is open)
    pub text: String,
    /// SHA-256 of `text`, hex encoded
    pub fingerprint: String,
    pub state: FileState,
    pub stale: bool,
    /// Ids declared by this file
    pub declarations: BTreeSet<SymbolId>,
    /// Tree from the last successful scan
    pub tree: Option<Declaration>,
    /// Tree for the current text, produced during invalidation
    pub pending_tree: Option<Declaration>,
    pub reference_map: Option<ReferenceMap>,
    pub type_map: Option<TypeMap>,
    /// References reported by the last analysis, in analyzer order
    pub references: Vec<(Span, SymbolId)>,
    pub diagnostics: Vec<String>,
}

impl FileRecord {
    pub fn new(key: FileKey, display_path: &str, text: String, fingerprint: String) -> Self {
        Self {
            key,
            display_path: display_path.to_string(),
            text,
            fingerprint,
            state: FileState::Unscanned,
            stale: false,
            declarations: BTreeSet::new(),
            tree: None,
            pending_tree: None,
            reference_map: None,
            type_map: None,
            references: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Analyzed, not stale, maps present
    pub fn is_ready(&self) -> bool {
        self.state == FileState::Analyzed
            && !self.stale
            && self.reference_map.is_some()
            && self.type_map.is_some()
    }

    /// Back to `Unscanned`; declarations and maps are kept until rescan
    pub fn invalidate(&mut self) {
        self.state = FileState::Unscanned;
    }
}
