//! Shared test fixtures
//!
//! A small brace language stands in for real sources:
//!
//! ```text
//! namespace App {
//!   class User extends Base {
//!     var $name: string;
//!     function getName(): string { return $this->name; }
//!   }
//!   function make() { $u = new User(); $u->getName(); }
//! }
//! ```
//!
//! `BraceScanner` turns it into declaration trees; `RecordingAnalyzer`
//! emits references to known classes, functions and members plus a type for
//! every variable occurrence, and records which files it was asked about.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use meridian::graph::{BodyFacts, SymbolStore};
use meridian::ingest::Scope;
use meridian::{
    AnalysisInput, AnalysisOutput, AnalysisSession, Analyzer, CodebaseModel, DeclKind,
    Declaration, FileKey, ModelConfig, Scanner, SourceProvider, Span, SymbolId, TypeDescriptor,
};

// ===== Tokens =====

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Word(String),
    Punct(&'static str),
    Other,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
}

impl Token {
    fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    fn word(&self) -> Option<&str> {
        match &self.tok {
            Tok::Word(w) => Some(w),
            _ => None,
        }
    }

    fn is(&self, punct: &str) -> bool {
        matches!(&self.tok, Tok::Punct(p) if *p == punct)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'\\' || b == b'$'
}

fn rest(text: &str, at: usize) -> &str {
    text.get(at..).unwrap_or("")
}

fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if rest(text, i).starts_with("//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if rest(text, i).starts_with("/*") {
            i = rest(text, i + 2)
                .find("*/")
                .map(|p| i + 2 + p + 2)
                .unwrap_or(bytes.len());
            continue;
        }
        if b == b'"' || b == b'\'' {
            let close = rest(text, i + 1)
                .find(b as char)
                .map(|p| i + 1 + p + 1)
                .unwrap_or(bytes.len());
            out.push(Token {
                tok: Tok::Other,
                start: i,
                end: close,
            });
            i = close;
            continue;
        }
        if is_word_byte(b) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            out.push(Token {
                tok: Tok::Word(text[start..i].to_string()),
                start,
                end: i,
            });
            continue;
        }
        if let Some(op) = ["->", "::"].into_iter().find(|p| rest(text, i).starts_with(p)) {
            out.push(Token {
                tok: Tok::Punct(op),
                start: i,
                end: i + 2,
            });
            i += 2;
            continue;
        }
        let tok = match b {
            b'{' => Tok::Punct("{"),
            b'}' => Tok::Punct("}"),
            b'(' => Tok::Punct("("),
            b')' => Tok::Punct(")"),
            b';' => Tok::Punct(";"),
            b':' => Tok::Punct(":"),
            b'=' => Tok::Punct("="),
            b',' => Tok::Punct(","),
            _ => Tok::Other,
        };
        out.push(Token {
            tok,
            start: i,
            end: i + 1,
        });
        i += 1;
    }
    out
}

// ===== Scanner =====

/// Declaration scanner for the brace language; unbalanced braces fail
#[derive(Debug, Clone, Default)]
pub struct BraceScanner;

impl Scanner for BraceScanner {
    fn scan(&self, path: &FileKey, text: &str) -> Result<Declaration> {
        let tokens = tokenize(text);
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
        };
        let children = parser.items(false)?;
        if let Some(tok) = parser.peek() {
            bail!("{}: unexpected '}}' at {}", path, tok.start);
        }
        Ok(Declaration::file(text.len(), children))
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, punct: &str) -> bool {
        self.peek().map(|t| t.is(punct)).unwrap_or(false)
    }

    fn peek_word_is(&self, word: &str) -> bool {
        self.peek()
            .and_then(Token::word)
            .map(|w| w.eq_ignore_ascii_case(word))
            .unwrap_or(false)
    }

    fn bump(&mut self) -> Result<&'t Token> {
        let tok = self.peek().ok_or_else(|| anyhow!("unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_word(&mut self) -> Result<&'t str> {
        let tok = self.bump()?;
        tok.word()
            .ok_or_else(|| anyhow!("expected a name at {}", tok.start))
    }

    fn expect(&mut self, punct: &str) -> Result<&'t Token> {
        let tok = self.bump()?;
        if !tok.is(punct) {
            bail!("expected '{}' at {}", punct, tok.start);
        }
        Ok(tok)
    }

    /// Consume a balanced `{ ... }`, returning the offset after `}`
    fn skip_block(&mut self) -> Result<usize> {
        self.expect("{")?;
        let mut depth = 1usize;
        while depth > 0 {
            let tok = self.bump()?;
            if tok.is("{") {
                depth += 1;
            } else if tok.is("}") {
                depth -= 1;
                if depth == 0 {
                    return Ok(tok.end);
                }
            }
        }
        bail!("unbalanced block")
    }

    fn items(&mut self, in_class: bool) -> Result<Vec<Declaration>> {
        let mut out = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.is("}") {
                break;
            }
            if tok.is("{") {
                self.skip_block()?;
                continue;
            }
            let keyword = tok.word().map(str::to_ascii_lowercase);
            match keyword.as_deref() {
                Some("namespace") => out.push(self.container(DeclKind::Namespace)?),
                Some("class") => out.push(self.container(DeclKind::Class)?),
                Some("interface") => out.push(self.container(DeclKind::Interface)?),
                Some("function") => out.push(self.function(in_class)?),
                Some("var") => out.push(self.property()?),
                _ => self.pos += 1,
            }
        }
        Ok(out)
    }

    fn container(&mut self, kind: DeclKind) -> Result<Declaration> {
        let start = self.bump()?.start;
        let name = self.expect_word()?;
        let mut extends = None;
        if kind.is_class_like() && self.peek_word_is("extends") {
            self.pos += 1;
            extends = Some(self.expect_word()?);
        }
        let open = self.expect("{")?;
        let children = self.items(kind.is_class_like())?;
        let close = self.expect("}")?;

        let mut decl = Declaration::new(kind, Some(name), Span::new(start, close.end))
            .with_body_start(open.start)
            .with_children(children);
        if let Some(parent) = extends {
            decl = decl.with_extends(parent);
        }
        Ok(decl)
    }

    fn function(&mut self, in_class: bool) -> Result<Declaration> {
        let start = self.bump()?.start;
        let name = self.expect_word()?;
        self.expect("(")?;
        while !self.peek_is(")") {
            self.bump()?;
        }
        self.expect(")")?;
        if self.peek_is(":") {
            self.pos += 1;
            self.expect_word()?;
        }

        let kind = if in_class {
            DeclKind::Method
        } else {
            DeclKind::Function
        };
        if self.peek_is(";") {
            let end = self.bump()?.end;
            return Ok(Declaration::new(kind, Some(name), Span::new(start, end)));
        }
        let body_start = self
            .peek()
            .map(|t| t.start)
            .ok_or_else(|| anyhow!("function {} has no body", name))?;
        let end = self.skip_block()?;
        Ok(Declaration::new(kind, Some(name), Span::new(start, end)).with_body_start(body_start))
    }

    fn property(&mut self) -> Result<Declaration> {
        let start = self.bump()?.start;
        let name = self.expect_word()?;
        if self.peek_is(":") {
            self.pos += 1;
            self.expect_word()?;
        }
        let end = self.expect(";")?.end;
        Ok(Declaration::new(DeclKind::Property, Some(name), Span::new(start, end)))
    }
}

// ===== Analyzer =====

const KEYWORDS: &[&str] = &[
    "namespace", "class", "interface", "function", "var", "extends", "new", "return",
];

const DECLARING: &[&str] = &["namespace", "class", "interface", "function"];

/// Analyzer that records every file it is asked to analyze
#[derive(Debug, Clone, Default)]
pub struct RecordingAnalyzer {
    calls: Arc<Mutex<Vec<FileKey>>>,
    refuse: Arc<Mutex<BTreeSet<FileKey>>>,
}

impl RecordingAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files analyzed so far, in call order
    pub fn calls(&self) -> Vec<FileKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Fail every later analysis of `path`
    pub fn refuse(&self, path: &str) {
        self.refuse.lock().unwrap().insert(FileKey::new(path));
    }
}

impl Analyzer for RecordingAnalyzer {
    fn analyze(&mut self, input: AnalysisInput<'_>, session: &mut AnalysisSession) -> Result<AnalysisOutput> {
        self.calls.lock().unwrap().push(input.file.clone());
        if self.refuse.lock().unwrap().contains(input.file) {
            bail!("analyzer refused {}", input.file);
        }
        Ok(analyze_text(&input, session))
    }
}

fn analyze_text(input: &AnalysisInput<'_>, session: &AnalysisSession) -> AnalysisOutput {
    let tokens = tokenize(input.text);
    let namespace = first_namespace(input.tree);
    let class_spans = class_spans(input.tree);
    let symbols = input.symbols;

    let mut vars: BTreeMap<String, TypeDescriptor> = BTreeMap::new();
    let mut references = Vec::new();
    let mut types = Vec::new();

    let word_at = |i: usize| tokens.get(i).and_then(Token::word);
    let punct_at = |i: usize, p: &str| tokens.get(i).map(|t| t.is(p)).unwrap_or(false);

    for (i, tok) in tokens.iter().enumerate() {
        let Some(word) = tok.word() else {
            continue;
        };

        if word.starts_with('$') {
            let declared = if punct_at(i + 1, "=") && word_at(i + 2) == Some("new") {
                word_at(i + 3)
            } else if punct_at(i + 1, ":") {
                word_at(i + 2)
            } else {
                None
            };
            if let Some(class_name) = declared {
                let ty = resolve_class(symbols, &namespace, class_name)
                    .and_then(|id| symbols.get(&id))
                    .map(|d| TypeDescriptor::new(d.display_name.clone()))
                    .unwrap_or_else(|| TypeDescriptor::new(class_name));
                vars.insert(word.to_string(), ty);
            }

            let ty = if word == "$this" {
                class_spans
                    .iter()
                    .filter(|(span, _)| span.start <= tok.start && tok.end <= span.end)
                    .last()
                    .and_then(|(_, id)| symbols.get(id))
                    .map(|d| TypeDescriptor::new(d.display_name.clone()))
                    .unwrap_or_else(TypeDescriptor::mixed)
            } else {
                vars.get(word).cloned().unwrap_or_else(TypeDescriptor::mixed)
            };

            if punct_at(i + 1, "->") {
                if let (Some(class), Some(member)) = (ty.as_class(), word_at(i + 2)) {
                    if let Some(id) = find_member(symbols, &class, member) {
                        references.push((tokens[i + 2].span(), id));
                    }
                }
            }
            types.push((tok.span(), ty));
            continue;
        }

        if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
            continue;
        }
        if i > 0 && (punct_at(i - 1, "->") || punct_at(i - 1, "::")) {
            continue;
        }
        // Declared names are not references
        let declares = i > 0
            && word_at(i - 1)
                .map(|w| DECLARING.iter().any(|k| k.eq_ignore_ascii_case(w)))
                .unwrap_or(false);
        if declares {
            continue;
        }

        if let Some(ty) = session.constant_type(word) {
            types.push((tok.span(), ty.clone()));
            continue;
        }

        if let Some(class) = resolve_class(symbols, &namespace, word) {
            if punct_at(i + 1, "::") {
                if let Some(member) = word_at(i + 2).and_then(|m| find_member(symbols, &class, m)) {
                    references.push((tokens[i + 2].span(), member));
                }
            }
            references.push((tok.span(), class));
            continue;
        }

        if punct_at(i + 1, "(") {
            if let Some(function) = resolve_function(symbols, &namespace, word) {
                references.push((tok.span(), function));
            }
        }
    }

    let body_facts = body_facts(input, &references);
    AnalysisOutput {
        diagnostics: Vec::new(),
        references,
        types,
        body_facts,
    }
}

fn first_namespace(tree: &Declaration) -> String {
    tree.children
        .iter()
        .find(|d| d.kind == DeclKind::Namespace)
        .and_then(|d| d.name.clone())
        .unwrap_or_default()
}

fn candidates(namespace: &str, name: &str) -> Vec<SymbolId> {
    let name = name.trim();
    if let Some(absolute) = name.strip_prefix('\\') {
        return vec![SymbolId::new(absolute)];
    }
    let mut out = Vec::new();
    if !namespace.is_empty() {
        out.push(SymbolId::new(&format!("{}\\{}", namespace, name)));
    }
    out.push(SymbolId::new(name));
    out
}

fn resolve_class(symbols: &SymbolStore, namespace: &str, name: &str) -> Option<SymbolId> {
    candidates(namespace, name)
        .into_iter()
        .find(|id| symbols.get(id).map(|d| d.kind.is_class_like()).unwrap_or(false))
}

fn resolve_function(symbols: &SymbolStore, namespace: &str, name: &str) -> Option<SymbolId> {
    candidates(namespace, &format!("{}()", name))
        .into_iter()
        .find(|id| symbols.contains(id))
}

fn find_member(symbols: &SymbolStore, class: &SymbolId, name: &str) -> Option<SymbolId> {
    let name = name.trim_start_matches('$');
    symbols
        .members_with_inherited(class)
        .into_iter()
        .find(|d| d.short_name().eq_ignore_ascii_case(name))
        .map(|d| d.id.clone())
}

/// Spans and ids of every class-like, outermost first
fn class_spans(tree: &Declaration) -> Vec<(Span, SymbolId)> {
    fn walk(decl: &Declaration, scope: &Scope, out: &mut Vec<(Span, SymbolId)>) {
        for child in &decl.children {
            if child.kind.is_class_like() {
                if let Some(id) = scope.symbol_id(child) {
                    out.push((child.span, id));
                }
            }
            walk(child, &scope.enter(child), out);
        }
    }
    let mut out = Vec::new();
    walk(tree, &Scope::default(), &mut out);
    out
}

/// Return type and used symbols for every function and method
fn body_facts(input: &AnalysisInput<'_>, references: &[(Span, SymbolId)]) -> Vec<(SymbolId, BodyFacts)> {
    fn walk(
        decl: &Declaration,
        scope: &Scope,
        text: &str,
        references: &[(Span, SymbolId)],
        out: &mut Vec<(SymbolId, BodyFacts)>,
    ) {
        for child in &decl.children {
            if matches!(child.kind, DeclKind::Function | DeclKind::Method) {
                if let Some(id) = scope.symbol_id(child) {
                    let return_type = child
                        .signature_text(text)
                        .rsplit_once("):")
                        .map(|(_, ret)| TypeDescriptor::new(ret.trim()));
                    let uses = references
                        .iter()
                        .filter(|(span, _)| child.span.covers(span))
                        .map(|(_, symbol)| symbol.clone())
                        .collect();
                    out.push((id, BodyFacts { return_type, uses }));
                }
            }
            walk(child, &scope.enter(child), text, references, out);
        }
    }
    let mut out = Vec::new();
    walk(input.tree, &Scope::default(), input.text, references, &mut out);
    out
}

// ===== Source and model setup =====

/// In-memory "disk" shared between a test and its model
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    files: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, path: &str, text: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), text.to_string());
    }

    pub fn delete(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }
}

impl SourceProvider for MapSource {
    fn read(&self, path: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{} not found", path))
    }
}

pub struct Fixture {
    pub model: CodebaseModel,
    pub disk: MapSource,
    pub analyzer: RecordingAnalyzer,
}

/// Model over `files` (path, text), every file added but none analyzed
pub fn fixture(config: ModelConfig, files: &[(&str, &str)]) -> Fixture {
    let disk = MapSource::new();
    for (path, text) in files {
        disk.write(path, text);
    }
    let analyzer = RecordingAnalyzer::new();
    let mut model = CodebaseModel::new(config, BraceScanner, analyzer.clone(), disk.clone());
    for (path, _) in files {
        model.add_file(path).unwrap();
    }
    Fixture {
        model,
        disk,
        analyzer,
    }
}

/// Byte offset of the `nth` (0-based) occurrence of `needle`
pub fn offset_of(text: &str, needle: &str, nth: usize) -> usize {
    text.match_indices(needle)
        .nth(nth)
        .map(|(at, _)| at)
        .unwrap_or_else(|| panic!("{:?} occurs fewer than {} times", needle, nth + 1))
}

pub fn key(path: &str) -> FileKey {
    FileKey::new(path)
}

pub fn id(raw: &str) -> SymbolId {
    SymbolId::new(raw)
}
