//! Position-indexed side tables for point queries
//!
//! Each analyzed file carries two maps from byte ranges to facts:
//! - `ReferenceMap`: range → referenced [`SymbolId`] (hover, definition)
//! - `TypeMap`: range → inferred [`TypeDescriptor`] (completion)
//!
//! Entries are collected unordered in a [`PositionMapBuilder`] and frozen
//! into a [`PositionMap`], which is strictly ascending by start offset and
//! pairwise non-overlapping. Lookups are binary searches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diff::DiffMap;
use crate::ingest::{Span, SymbolId};

/// Type names that never resolve to a class-like
const NON_CLASS_TYPES: &[&str] = &[
    "mixed", "int", "float", "string", "bool", "array", "null", "void", "callable", "iterable",
    "object", "never", "false", "true",
];

/// Inferred type at a position, as rendered by the analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub display: String,
}

impl TypeDescriptor {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }

    pub fn mixed() -> Self {
        Self::new("mixed")
    }

    /// Unknown type; completion offers nothing
    pub fn is_mixed(&self) -> bool {
        self.display.trim().eq_ignore_ascii_case("mixed")
    }

    /// The class-like this type names, if it is a single class type
    pub fn as_class(&self) -> Option<SymbolId> {
        let name = self.display.trim().trim_start_matches('\\');
        if name.is_empty() || name.contains('|') || name.contains('&') {
            return None;
        }
        if NON_CLASS_TYPES.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            return None;
        }
        Some(SymbolId::new(name))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// One frozen entry: `[start, end]` maps to `value`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionEntry<T> {
    pub start: usize,
    pub end: usize,
    pub value: T,
}

impl<T> PositionEntry<T> {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Unordered entry collector
#[derive(Debug, Clone)]
pub struct PositionMapBuilder<T> {
    entries: Vec<PositionEntry<T>>,
}

impl<T> Default for PositionMapBuilder<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> PositionMapBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, span: Span, value: T) {
        self.entries.push(PositionEntry {
            start: span.start,
            end: span.end,
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort by start and drop every entry overlapping an earlier kept one
    ///
    /// On equal starts the wider span sorts first and wins.
    pub fn freeze(mut self) -> PositionMap<T> {
        self.entries
            .sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut kept: Vec<PositionEntry<T>> = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            match kept.last() {
                Some(last) if entry.start < last.end || entry.start == last.start => continue,
                _ => kept.push(entry),
            }
        }

        PositionMap { entries: kept }
    }
}

impl<T> FromIterator<(Span, T)> for PositionMapBuilder<T> {
    fn from_iter<I: IntoIterator<Item = (Span, T)>>(iter: I) -> Self {
        let mut builder = Self::new();
        for (span, value) in iter {
            builder.insert(span, value);
        }
        builder
    }
}

/// Frozen, sorted, non-overlapping position map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionMap<T> {
    entries: Vec<PositionEntry<T>>,
}

impl<T> Default for PositionMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

pub type ReferenceMap = PositionMap<SymbolId>;
pub type TypeMap = PositionMap<TypeDescriptor>;

impl<T> PositionMap<T> {
    pub fn entries(&self) -> &[PositionEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the last entry starting at or before `offset`
    fn preceding_index(&self, offset: usize) -> Option<usize> {
        self.entries
            .partition_point(|e| e.start <= offset)
            .checked_sub(1)
    }

    /// Entry covering `offset`; a cursor touching the end still hits
    pub fn lookup(&self, offset: usize) -> Option<&PositionEntry<T>> {
        let entry = &self.entries[self.preceding_index(offset)?];
        (offset <= entry.end).then_some(entry)
    }

    /// Entry strictly containing `offset` (`start <= offset < end`)
    pub fn containing(&self, offset: usize) -> Option<&PositionEntry<T>> {
        let entry = &self.entries[self.preceding_index(offset)?];
        (offset < entry.end).then_some(entry)
    }

    /// Last entry starting at or before `offset`, covering it or not
    pub fn nearest_preceding(&self, offset: usize) -> Option<&PositionEntry<T>> {
        self.preceding_index(offset).map(|idx| &self.entries[idx])
    }

    /// Whether entries are strictly ascending and pairwise disjoint
    pub fn is_well_formed(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].start < w[1].start && w[0].end <= w[1].start)
    }
}

impl<T: Clone> PositionMap<T> {
    /// Re-anchor onto new text; entries outside every KEEP span are dropped
    pub fn translate(&self, diff_map: &DiffMap) -> PositionMap<T> {
        let entries = self
            .entries
            .iter()
            .filter_map(|e| {
                diff_map.translate_span(e.span()).map(|span| PositionEntry {
                    start: span.start,
                    end: span.end,
                    value: e.value.clone(),
                })
            })
            .collect();
        PositionMap { entries }
    }
}
