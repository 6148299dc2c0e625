//! Diagnostic infrastructure for the Javelin classfile compiler.
//!
//! Diagnostics carry a stable code, a severity, a primary [`Span`] and
//! an optional help line. They are rendered by one of the emitters against a
//! [`SourceCache`] holding the original source text.
//!
//! # Example
//!
//! ```
//! use javelin_diagnostics::{
//!     Diagnostic, DiagnosticCode, DiagnosticEmitter, SimpleEmitter, SourceCache, Span,
//! };
//!
//! let mut cache = SourceCache::new();
//! let file_id = cache.add_file("shape.ts", "class Square extends Shape {}".to_string());
//!
//! let diag = Diagnostic::error(DiagnosticCode::UnresolvedSuperclassInfo, "Cannot resolve Shape")
//!     .with_span(Span::new(file_id, 21, 26))
//!     .build();
//!
//! let mut out = Vec::new();
//! SimpleEmitter::new(&mut out).emit(&diag, &cache).unwrap();
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod source_cache;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Diagnostics, Severity};
pub use emitter::{DiagnosticEmitter, JsonEmitter, SimpleEmitter, TerminalEmitter};
pub use source_cache::{SourceCache, SourceFile};
pub use span::{FileId, Location, Span};
