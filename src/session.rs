//! Analysis session and the analyzer contract
//!
//! One [`AnalysisSession`] is created per reload batch and handed to the
//! analyzer for every file in it. Stubbed constant types live here rather
//! than in process-wide state, so one batch never sees another's stubs.

use ahash::AHashMap;

use crate::graph::schema::BodyFacts;
use crate::graph::side_tables::TypeDescriptor;
use crate::graph::symbols::SymbolStore;
use crate::ingest::{normalize_name, Declaration, Span, SymbolId};
use crate::validation::FileKey;

/// Per-batch analysis context
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    constants: AHashMap<String, TypeDescriptor>,
    batch: Vec<FileKey>,
    collect_references: bool,
}

impl AnalysisSession {
    pub fn new(batch: Vec<FileKey>, collect_references: bool) -> Self {
        Self {
            constants: AHashMap::new(),
            batch,
            collect_references,
        }
    }

    /// Seed the session with stubbed constants
    pub fn with_constants(mut self, constants: &AHashMap<String, TypeDescriptor>) -> Self {
        self.constants = constants.clone();
        self
    }

    /// Register the type of a constant for the rest of this session
    pub fn stub_constant(&mut self, name: &str, ty: TypeDescriptor) {
        self.constants.insert(normalize_name(name), ty);
    }

    pub fn constant_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.constants.get(&normalize_name(name))
    }

    /// Files analyzed together in this session
    pub fn batch(&self) -> &[FileKey] {
        &self.batch
    }

    pub fn collect_references(&self) -> bool {
        self.collect_references
    }
}

/// Read-only view handed to the analyzer for one file
pub struct AnalysisInput<'a> {
    pub file: &'a FileKey,
    pub text: &'a str,
    pub tree: &'a Declaration,
    /// Every populated declaration in the model
    pub symbols: &'a SymbolStore,
}

/// Facts the analyzer reports for one file
///
/// Overwrites the file's previous maps and body facts wholesale.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub diagnostics: Vec<String>,
    pub references: Vec<(Span, SymbolId)>,
    pub types: Vec<(Span, TypeDescriptor)>,
    pub body_facts: Vec<(SymbolId, BodyFacts)>,
}

/// External inference and rule checking
pub trait Analyzer: Send {
    fn analyze(
        &mut self,
        input: AnalysisInput<'_>,
        session: &mut AnalysisSession,
    ) -> anyhow::Result<AnalysisOutput>;
}
