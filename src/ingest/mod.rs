//! Declaration trees handed to the model by an external scanner
//!
//! Parsing is not done here. A [`Scanner`] turns source text into a tree of
//! [`Declaration`] nodes tagged with byte spans; everything downstream
//! (diffing, storage keys, side tables) works on that tree.
//!
//! # Position Conventions
//!
//! - **Byte offsets**: 0-indexed from file start
//! - **Spans**: half-open `[start, end)`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::validation::FileKey;

/// Half-open byte range `[start, end)` within one file's text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {} after end {}", start, end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this span
    pub fn covers(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Slice `text` by this span, or `None` when out of bounds
    pub fn text<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// Kind of declaration node
///
/// Closed set: adding a kind forces every exhaustive match in the differ and
/// the model to be revisited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// Root of a file's tree
    File,
    /// Namespace container
    Namespace,
    /// Class definition
    Class,
    /// Interface definition
    Interface,
    /// Method inside a class-like body
    Method,
    /// Property inside a class-like body
    Property,
    /// Free function
    Function,
    /// Constant (top-level or class constant)
    Constant,
    /// Any other statement; never named
    Statement,
}

impl DeclKind {
    /// Containers whose children are diffed recursively
    pub fn is_container(&self) -> bool {
        match self {
            DeclKind::File | DeclKind::Namespace | DeclKind::Class | DeclKind::Interface => true,
            DeclKind::Method
            | DeclKind::Property
            | DeclKind::Function
            | DeclKind::Constant
            | DeclKind::Statement => false,
        }
    }

    pub fn is_class_like(&self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Interface)
    }

    /// Whether members of this kind hang off a class-like (`A::member`)
    pub fn is_member(&self) -> bool {
        matches!(self, DeclKind::Method | DeclKind::Property)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::File => "file",
            DeclKind::Namespace => "namespace",
            DeclKind::Class => "class",
            DeclKind::Interface => "interface",
            DeclKind::Method => "method",
            DeclKind::Property => "property",
            DeclKind::Function => "function",
            DeclKind::Constant => "constant",
            DeclKind::Statement => "statement",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a file's declaration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    /// Name as written (original casing); `None` for anonymous constructs
    pub name: Option<String>,
    /// Full extent of the declaration
    pub span: Span,
    /// Offset where the body begins; the signature is `[span.start, body_start)`
    pub body_start: Option<usize>,
    /// Declared parent for class-likes (`extends`)
    pub extends: Option<String>,
    pub children: Vec<Declaration>,
}

impl Declaration {
    pub fn new(kind: DeclKind, name: Option<&str>, span: Span) -> Self {
        Self {
            kind,
            name: name.map(str::to_string),
            span,
            body_start: None,
            extends: None,
            children: Vec::new(),
        }
    }

    /// Root node covering a whole file
    pub fn file(len: usize, children: Vec<Declaration>) -> Self {
        Self {
            kind: DeclKind::File,
            name: None,
            span: Span::new(0, len),
            body_start: Some(0),
            extends: None,
            children,
        }
    }

    pub fn with_body_start(mut self, body_start: usize) -> Self {
        self.body_start = Some(body_start);
        self
    }

    pub fn with_extends(mut self, parent: &str) -> Self {
        self.extends = Some(parent.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<Declaration>) -> Self {
        self.children = children;
        self
    }

    /// Anonymous nodes have no stable identity across versions
    pub fn is_anonymous(&self) -> bool {
        self.kind == DeclKind::Statement || self.name.is_none()
    }

    /// Name normalized for identity comparisons
    pub fn normalized_name(&self) -> Option<String> {
        self.name.as_deref().map(normalize_name)
    }

    /// Span of the signature (everything before the body)
    pub fn signature_span(&self) -> Span {
        let end = self
            .body_start
            .filter(|b| *b >= self.span.start && *b <= self.span.end)
            .unwrap_or(self.span.end);
        Span::new(self.span.start, end)
    }

    pub fn signature_text<'a>(&self, text: &'a str) -> &'a str {
        self.signature_span().text(text).unwrap_or("")
    }

    pub fn full_text<'a>(&self, text: &'a str) -> &'a str {
        self.span.text(text).unwrap_or("")
    }

    /// Depth-first visit of this node and all descendants
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Declaration)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Lower-case a name once at the boundary
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalized fully-qualified symbol identifier
///
/// Forms:
/// - `ns\class` for class-likes
/// - `ns\class::member` for methods and properties (`::$prop` for properties)
/// - `ns\function()` for free functions
/// - `ns\CONST` for constants (normalized like every other key)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn new(raw: &str) -> Self {
        SymbolId(normalize_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Class-like half of a member id (`a\b::f` → `a\b`)
    pub fn owner(&self) -> Option<SymbolId> {
        self.0
            .split_once("::")
            .map(|(owner, _)| SymbolId(owner.to_string()))
    }

    pub fn is_member(&self) -> bool {
        self.0.contains("::")
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join_namespace(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}\\{}", scope, name)
    }
}

/// Enclosing scope while walking a tree
#[derive(Debug, Clone, Default)]
pub struct Scope {
    namespace: String,
    class: Option<String>,
}

impl Scope {
    /// Scope for the children of `decl` (which sits in `self`)
    pub fn enter(&self, decl: &Declaration) -> Scope {
        match decl.kind {
            DeclKind::Namespace => Scope {
                namespace: self.qualify(decl).unwrap_or_else(|| self.namespace.clone()),
                class: None,
            },
            DeclKind::Class | DeclKind::Interface => Scope {
                namespace: self.namespace.clone(),
                class: self.qualify(decl),
            },
            _ => self.clone(),
        }
    }

    /// Display-cased fully-qualified name of `decl` in this scope
    pub fn qualify(&self, decl: &Declaration) -> Option<String> {
        let name = decl.name.as_deref()?;
        match (decl.kind, &self.class) {
            (DeclKind::Method, Some(class)) => Some(format!("{}::{}", class, name)),
            (DeclKind::Property, Some(class)) => {
                Some(format!("{}::${}", class, name.trim_start_matches('$')))
            }
            (DeclKind::Constant, Some(class)) => Some(format!("{}::{}", class, name)),
            (DeclKind::Function, _) => Some(join_namespace(&self.namespace, &format!("{}()", name))),
            (DeclKind::Method, None) => Some(join_namespace(&self.namespace, &format!("{}()", name))),
            (DeclKind::Property, None) => None,
            (DeclKind::Namespace, _)
            | (DeclKind::Class, _)
            | (DeclKind::Interface, _)
            | (DeclKind::Constant, None) => Some(join_namespace(&self.namespace, name)),
            (DeclKind::File, _) | (DeclKind::Statement, _) => None,
        }
    }

    /// Normalized identifier of `decl` in this scope
    pub fn symbol_id(&self, decl: &Declaration) -> Option<SymbolId> {
        if decl.kind == DeclKind::Statement {
            return None;
        }
        self.qualify(decl).map(|q| SymbolId::new(&q))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// External parser contract
///
/// Must be deterministic: identical text yields an identical tree. The
/// returned root has kind [`DeclKind::File`]. Containers should report
/// `body_start`; one that does not is matched by name alone.
pub trait Scanner: Send {
    fn scan(&self, path: &FileKey, text: &str) -> anyhow::Result<Declaration>;
}
