//! Diagnostic types reported by the parser and the classfile generator.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable diagnostic codes, grouped by the stage that raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Parse (P)
    /// Syntax error reported by SWC
    ParseError,

    // Hierarchy (H)
    /// `super` used outside of a class body
    SuperOutsideClass,
    /// Enclosing class has no resolvable superclass
    UnresolvedSuperclass,
    /// Superclass name is known but has no registered type info
    UnresolvedSuperclassInfo,
    /// Field not declared anywhere in the searched hierarchy
    FieldNotFound,

    // Unsupported (U)
    UnsupportedExpression,
    UnsupportedStatement,
    /// Malformed or unsupported destructuring pattern
    UnsupportedPattern,
    UnsupportedFeature,

    // Types (T)
    /// Value cannot be converted to the expected type
    TypeMismatch,

    // Internal (I)
    InternalError,
}

impl DiagnosticCode {
    /// All codes, in documentation order.
    pub const ALL: &'static [DiagnosticCode] = &[
        DiagnosticCode::ParseError,
        DiagnosticCode::SuperOutsideClass,
        DiagnosticCode::UnresolvedSuperclass,
        DiagnosticCode::UnresolvedSuperclassInfo,
        DiagnosticCode::FieldNotFound,
        DiagnosticCode::UnsupportedExpression,
        DiagnosticCode::UnsupportedStatement,
        DiagnosticCode::UnsupportedPattern,
        DiagnosticCode::UnsupportedFeature,
        DiagnosticCode::TypeMismatch,
        DiagnosticCode::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "P001",
            Self::SuperOutsideClass => "H001",
            Self::UnresolvedSuperclass => "H002",
            Self::UnresolvedSuperclassInfo => "H003",
            Self::FieldNotFound => "H004",
            Self::UnsupportedExpression => "U001",
            Self::UnsupportedStatement => "U002",
            Self::UnsupportedPattern => "U003",
            Self::UnsupportedFeature => "U004",
            Self::TypeMismatch => "T001",
            Self::InternalError => "I001",
        }
    }

    /// Look up a code from its string form (case-insensitive).
    pub fn parse(code: &str) -> Option<DiagnosticCode> {
        let code = code.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Single-line message
    pub message: String,
    /// Optional help line
    pub help: Option<String>,
    /// Primary location
    pub span: Span,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Error, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Warning, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// Fluent construction of a [`Diagnostic`].
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                help: None,
                span: Span::DUMMY,
            },
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.inner.span = span;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.help = Some(help.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        self.inner
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_warning()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
