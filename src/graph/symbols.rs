//! Declaration storage
//!
//! One [`DeclarationRecord`] per normalized [`SymbolId`], plus a
//! parent → children index over resolved inheritance links so the affected
//! set can be closed over subclasses without scanning every record.

use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

use crate::graph::schema::{BodyFacts, DeclarationRecord};
use crate::ingest::{DeclKind, SymbolId};
use crate::validation::FileKey;

#[derive(Debug, Default)]
pub struct SymbolStore {
    records: AHashMap<SymbolId, DeclarationRecord>,
    children: AHashMap<SymbolId, BTreeSet<SymbolId>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SymbolId) -> Option<&DeclarationRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &SymbolId) -> Option<&mut DeclarationRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record; returns the replaced one
    pub fn insert(&mut self, record: DeclarationRecord) -> Option<DeclarationRecord> {
        let id = record.id.clone();
        let parent = record.ancestors.first().cloned();
        let previous = self.records.insert(id.clone(), record);
        if let Some(prev) = &previous {
            self.unlink_parent(prev);
        }
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().insert(id);
        }
        previous
    }

    /// Remove `id` if it is declared by `file`
    ///
    /// A record owned by another file (duplicate declaration) is left alone.
    pub fn remove_owned(&mut self, id: &SymbolId, file: &FileKey) -> Option<DeclarationRecord> {
        if self.records.get(id).map(|r| &r.file) != Some(file) {
            return None;
        }
        let removed = self.records.remove(id)?;
        self.unlink_parent(&removed);
        Some(removed)
    }

    fn unlink_parent(&mut self, record: &DeclarationRecord) {
        let Some(parent) = record.ancestors.first() else {
            return;
        };
        if let Some(kids) = self.children.get_mut(parent) {
            kids.remove(&record.id);
            if kids.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    /// Store a resolved ancestor chain and index the direct parent link
    pub fn set_ancestors(&mut self, id: &SymbolId, ancestors: Vec<SymbolId>) {
        let Some(record) = self.records.get_mut(id) else {
            return;
        };
        let old_parent = record.ancestors.first().cloned();
        record.ancestors = ancestors;
        let new_parent = record.ancestors.first().cloned();

        if old_parent == new_parent {
            if let Some(parent) = new_parent {
                self.children.entry(parent).or_default().insert(id.clone());
            }
            return;
        }
        if let Some(parent) = old_parent {
            if let Some(kids) = self.children.get_mut(&parent) {
                kids.remove(id);
                if kids.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
        if let Some(parent) = new_parent {
            self.children.entry(parent).or_default().insert(id.clone());
        }
    }

    /// Drop body facts, keeping signature facts
    pub fn clear_body(&mut self, id: &SymbolId) {
        if let Some(record) = self.records.get_mut(id) {
            record.body = None;
        }
    }

    pub fn set_body(&mut self, id: &SymbolId, file: &FileKey, facts: BodyFacts) -> bool {
        match self.records.get_mut(id) {
            Some(record) if &record.file == file => {
                record.body = Some(facts);
                true
            }
            _ => false,
        }
    }

    /// Resolve the first existing candidate
    pub fn resolve(&self, candidates: &[SymbolId]) -> Option<&DeclarationRecord> {
        candidates.iter().find_map(|c| self.records.get(c))
    }

    /// Class-likes whose ancestor chain contains any of `roots`, transitively
    pub fn descendants_of<'a, I>(&self, roots: I) -> BTreeSet<SymbolId>
    where
        I: IntoIterator<Item = &'a SymbolId>,
    {
        let mut seen: AHashSet<SymbolId> = AHashSet::new();
        let mut worklist: Vec<SymbolId> = roots.into_iter().cloned().collect();
        let mut out = BTreeSet::new();

        while let Some(current) = worklist.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(kids) = self.children.get(&current) {
                for kid in kids {
                    out.insert(kid.clone());
                    worklist.push(kid.clone());
                }
            }
        }

        out
    }

    /// Methods and properties visible on `class`, nearest declaration wins
    pub fn members_with_inherited(&self, class: &SymbolId) -> Vec<&DeclarationRecord> {
        let Some(root) = self.records.get(class) else {
            return Vec::new();
        };

        let mut chain = vec![root];
        chain.extend(root.ancestors.iter().filter_map(|a| self.records.get(a)));

        let mut seen_names: AHashSet<String> = AHashSet::new();
        let mut out = Vec::new();
        for class_like in chain {
            for member_id in &class_like.members {
                let Some(member) = self.records.get(member_id) else {
                    continue;
                };
                if !matches!(member.kind, DeclKind::Method | DeclKind::Property) {
                    continue;
                }
                let name = member.short_name().to_lowercase();
                if seen_names.insert(format!("{}:{}", member.kind, name)) {
                    out.push(member);
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclarationRecord> {
        self.records.values()
    }
}
