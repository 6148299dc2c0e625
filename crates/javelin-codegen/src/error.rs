//! Code generation errors.

use javelin_diagnostics::{Diagnostic, DiagnosticCode, FileId, Span};
use javelin_types::DescriptorError;
use swc_common::Span as SwcSpan;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("super property {action} outside of class context")]
    SuperOutsideClass { action: &'static str, span: SwcSpan },

    #[error("Cannot resolve superclass for {class}")]
    UnresolvedSuperclass { class: String, span: SwcSpan },

    #[error("Cannot resolve superclass type info for {superclass}")]
    UnresolvedSuperclassInfo { superclass: String, span: SwcSpan },

    #[error("Field not found in {scope}: {field}")]
    FieldNotFound {
        field: String,
        /// "super hierarchy" or the class that was searched
        scope: String,
        span: SwcSpan,
    },

    #[error("Rest pattern argument must be a binding identifier")]
    InvalidRestTarget { span: SwcSpan },

    #[error("Unsupported pattern: {what}")]
    UnsupportedPattern { what: String, span: SwcSpan },

    #[error("Unsupported expression: {what}")]
    UnsupportedExpression { what: String, span: SwcSpan },

    #[error("Unsupported statement: {what}")]
    UnsupportedStatement { what: String, span: SwcSpan },

    #[error("{message}")]
    UnsupportedFeature { message: String, span: SwcSpan },

    #[error("Variable not found: {name}")]
    UnknownVariable { name: String, span: SwcSpan },

    #[error("Type mismatch: cannot convert {from} to {to}")]
    TypeMismatch { from: String, to: String, span: SwcSpan },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CodegenError {
    pub fn unsupported_expression(what: impl Into<String>, span: SwcSpan) -> Self {
        CodegenError::UnsupportedExpression {
            what: what.into(),
            span,
        }
    }

    pub fn unsupported_statement(what: impl Into<String>, span: SwcSpan) -> Self {
        CodegenError::UnsupportedStatement {
            what: what.into(),
            span,
        }
    }

    pub fn unsupported_pattern(what: impl Into<String>, span: SwcSpan) -> Self {
        CodegenError::UnsupportedPattern {
            what: what.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<SwcSpan> {
        match self {
            CodegenError::SuperOutsideClass { span, .. }
            | CodegenError::UnresolvedSuperclass { span, .. }
            | CodegenError::UnresolvedSuperclassInfo { span, .. }
            | CodegenError::FieldNotFound { span, .. }
            | CodegenError::InvalidRestTarget { span }
            | CodegenError::UnsupportedPattern { span, .. }
            | CodegenError::UnsupportedExpression { span, .. }
            | CodegenError::UnsupportedStatement { span, .. }
            | CodegenError::UnsupportedFeature { span, .. }
            | CodegenError::UnknownVariable { span, .. }
            | CodegenError::TypeMismatch { span, .. } => Some(*span),
            CodegenError::Internal(_) => None,
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            CodegenError::SuperOutsideClass { .. } => DiagnosticCode::SuperOutsideClass,
            CodegenError::UnresolvedSuperclass { .. } => DiagnosticCode::UnresolvedSuperclass,
            CodegenError::UnresolvedSuperclassInfo { .. } => {
                DiagnosticCode::UnresolvedSuperclassInfo
            }
            CodegenError::FieldNotFound { .. } => DiagnosticCode::FieldNotFound,
            CodegenError::InvalidRestTarget { .. } | CodegenError::UnsupportedPattern { .. } => {
                DiagnosticCode::UnsupportedPattern
            }
            CodegenError::UnsupportedExpression { .. } | CodegenError::UnknownVariable { .. } => {
                DiagnosticCode::UnsupportedExpression
            }
            CodegenError::UnsupportedStatement { .. } => DiagnosticCode::UnsupportedStatement,
            CodegenError::UnsupportedFeature { .. } => DiagnosticCode::UnsupportedFeature,
            CodegenError::TypeMismatch { .. } => DiagnosticCode::TypeMismatch,
            CodegenError::Internal(_) => DiagnosticCode::InternalError,
        }
    }

    /// Suggested fix shown under the diagnostic.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            CodegenError::UnresolvedSuperclassInfo { .. } => {
                Some("classes declared outside this module have no known fields")
            }
            CodegenError::FieldNotFound { .. } => Some("declare the field with a type annotation"),
            CodegenError::InvalidRestTarget { .. } => Some("bind the rest element to a plain name"),
            CodegenError::TypeMismatch { .. } => Some("add an explicit `as` cast"),
            _ => None,
        }
    }

    /// Convert to a diagnostic, mapping the SWC span into `file_id`.
    /// `base_pos` is the position SWC assigned to the file's first byte.
    pub fn to_diagnostic(&self, file_id: FileId, base_pos: u32) -> Diagnostic {
        let mut builder = Diagnostic::error(self.code(), self.to_string());
        if let Some(help) = self.help() {
            builder = builder.with_help(help);
        }
        match self.span() {
            Some(span) if !span.is_dummy() => builder
                .with_span(Span::from_positions(file_id, base_pos, span.lo.0, span.hi.0))
                .build(),
            _ => builder.build(),
        }
    }
}

impl From<DescriptorError> for CodegenError {
    fn from(e: DescriptorError) -> Self {
        CodegenError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_common::BytePos;

    #[test]
    fn test_messages() {
        let span = SwcSpan::new(BytePos(1), BytePos(2));
        let e = CodegenError::UnresolvedSuperclass {
            class: "com/x/A".to_string(),
            span,
        };
        assert_eq!(e.to_string(), "Cannot resolve superclass for com/x/A");

        let e = CodegenError::FieldNotFound {
            field: "x".to_string(),
            scope: "super hierarchy".to_string(),
            span,
        };
        assert_eq!(e.to_string(), "Field not found in super hierarchy: x");
        assert_eq!(e.code(), DiagnosticCode::FieldNotFound);
    }

    #[test]
    fn test_to_diagnostic_maps_span() {
        let e = CodegenError::InvalidRestTarget {
            span: SwcSpan::new(BytePos(11), BytePos(15)),
        };
        let d = e.to_diagnostic(FileId(3), 1);
        assert_eq!(d.code, DiagnosticCode::UnsupportedPattern);
        assert_eq!(d.span.file_id, FileId(3));
        assert_eq!(d.span.start, 10);
        assert_eq!(d.span.end, 14);
        assert_eq!(d.help.as_deref(), Some("bind the rest element to a plain name"));
    }

    #[test]
    fn test_internal_has_no_span() {
        let e: CodegenError = DescriptorError::MalformedMethod("(I".to_string()).into();
        assert!(e.span().is_none());
        assert_eq!(e.code(), DiagnosticCode::InternalError);
    }
}
