//! Global reference graph
//!
//! Records which files reference which symbols. The symbol → files index is
//! always kept because it drives the affected-file set on every edit; the
//! symbol → locations index only exists in reference-collection mode and
//! backs find-references.

use ahash::AHashMap;
use std::collections::BTreeSet;

use crate::graph::schema::Location;
use crate::ingest::{Span, SymbolId};
use crate::validation::FileKey;

/// Symbol ⇄ file reference index
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    by_symbol: AHashMap<SymbolId, BTreeSet<FileKey>>,
    /// Reverse index so a file's outgoing edges can be dropped in one go
    by_file: AHashMap<FileKey, BTreeSet<SymbolId>>,
    locations: Option<AHashMap<SymbolId, BTreeSet<Location>>>,
}

impl ReferenceGraph {
    pub fn new(collect_locations: bool) -> Self {
        Self {
            by_symbol: AHashMap::new(),
            by_file: AHashMap::new(),
            locations: collect_locations.then(AHashMap::new),
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.locations.is_some()
    }

    /// Replace every reference originating in `file`
    ///
    /// # Behavior
    /// 1. Drop the file's previous outgoing edges (and locations)
    /// 2. Record one edge per distinct referenced symbol
    /// 3. In collection mode, record every location
    pub fn set_file_references(&mut self, file: &FileKey, references: &[(Span, SymbolId)]) {
        self.remove_file(file);

        let mut targets = BTreeSet::new();
        for (span, symbol) in references {
            targets.insert(symbol.clone());
            if let Some(locations) = self.locations.as_mut() {
                locations.entry(symbol.clone()).or_default().insert(Location {
                    file: file.clone(),
                    span: *span,
                });
            }
        }

        for symbol in &targets {
            self.by_symbol
                .entry(symbol.clone())
                .or_default()
                .insert(file.clone());
        }
        if !targets.is_empty() {
            self.by_file.insert(file.clone(), targets);
        }
    }

    /// Drop every reference originating in `file`
    pub fn remove_file(&mut self, file: &FileKey) {
        let Some(targets) = self.by_file.remove(file) else {
            return;
        };

        for symbol in &targets {
            if let Some(files) = self.by_symbol.get_mut(symbol) {
                files.remove(file);
                if files.is_empty() {
                    self.by_symbol.remove(symbol);
                }
            }
            if let Some(locations) = self.locations.as_mut() {
                if let Some(locs) = locations.get_mut(symbol) {
                    locs.retain(|l| &l.file != file);
                    if locs.is_empty() {
                        locations.remove(symbol);
                    }
                }
            }
        }
    }

    /// Drop a deleted symbol's incoming edges
    ///
    /// Referencing files keep it in their reverse entry until they are
    /// re-analyzed, which is always the case for an affected file.
    pub fn purge_symbol(&mut self, symbol: &SymbolId) {
        self.by_symbol.remove(symbol);
        if let Some(locations) = self.locations.as_mut() {
            locations.remove(symbol);
        }
    }

    /// Files holding at least one reference to `symbol`, in key order
    pub fn files_referencing(&self, symbol: &SymbolId) -> Vec<FileKey> {
        self.by_symbol
            .get(symbol)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every location referencing `symbol`; `None` when not collecting
    pub fn locations_of(&self, symbol: &SymbolId) -> Option<Vec<Location>> {
        let locations = self.locations.as_ref()?;
        Some(
            locations
                .get(symbol)
                .map(|locs| locs.iter().cloned().collect())
                .unwrap_or_default(),
        )
    }

    /// Symbols referenced from `file`
    pub fn symbols_referenced_by(&self, file: &FileKey) -> Vec<SymbolId> {
        self.by_file
            .get(file)
            .map(|symbols| symbols.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn symbol_count(&self) -> usize {
        self.by_symbol.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(items: &[(usize, &str)]) -> Vec<(Span, SymbolId)> {
        items
            .iter()
            .map(|(at, s)| (Span::new(*at, *at + 1), SymbolId::new(s)))
            .collect()
    }

    #[test]
    fn test_set_replaces_previous_edges() {
        let mut graph = ReferenceGraph::new(false);
        let a = FileKey::new("a.php");

        graph.set_file_references(&a, &refs(&[(0, "X"), (5, "Y")]));
        assert_eq!(graph.files_referencing(&SymbolId::new("x")), vec![a.clone()]);

        graph.set_file_references(&a, &refs(&[(0, "Y")]));
        assert!(graph.files_referencing(&SymbolId::new("x")).is_empty());
        assert_eq!(graph.files_referencing(&SymbolId::new("y")), vec![a.clone()]);
        assert_eq!(graph.symbol_count(), 1);
    }

    #[test]
    fn test_files_referencing_is_sorted_and_deduplicated() {
        let mut graph = ReferenceGraph::new(false);
        let b = FileKey::new("b.php");
        let a = FileKey::new("a.php");
        graph.set_file_references(&b, &refs(&[(0, "X"), (9, "X")]));
        graph.set_file_references(&a, &refs(&[(0, "X")]));

        assert_eq!(graph.files_referencing(&SymbolId::new("X")), vec![a, b]);
    }

    #[test]
    fn test_locations_only_when_collecting() {
        let file = FileKey::new("a.php");

        let mut plain = ReferenceGraph::new(false);
        plain.set_file_references(&file, &refs(&[(3, "X")]));
        assert!(plain.locations_of(&SymbolId::new("x")).is_none());

        let mut collecting = ReferenceGraph::new(true);
        collecting.set_file_references(&file, &refs(&[(3, "X"), (8, "X")]));
        let locs = collecting.locations_of(&SymbolId::new("x")).unwrap();
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[0].span, Span::new(3, 4));

        collecting.remove_file(&file);
        assert!(collecting.locations_of(&SymbolId::new("x")).unwrap().is_empty());
    }

    #[test]
    fn test_purge_symbol_drops_incoming_edges() {
        let mut graph = ReferenceGraph::new(true);
        let file = FileKey::new("a.php");
        graph.set_file_references(&file, &refs(&[(0, "X"), (2, "Y")]));

        graph.purge_symbol(&SymbolId::new("x"));

        assert!(graph.files_referencing(&SymbolId::new("x")).is_empty());
        assert_eq!(graph.files_referencing(&SymbolId::new("y")).len(), 1);

        // Re-analysis of the file cleans the reverse entry without panicking
        graph.set_file_references(&file, &refs(&[(2, "Y")]));
        assert_eq!(graph.symbols_referenced_by(&file), vec![SymbolId::new("y")]);
    }
}
