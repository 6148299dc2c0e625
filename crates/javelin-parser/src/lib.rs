//! TypeScript front end for Javelin.
//!
//! Wraps the SWC parser and records the parsed file in a [`SourceCache`]
//! so that code generation errors can point back into the source.

use anyhow::Result;
use javelin_diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, FileId, SourceCache, Span};
use swc_common::{input::StringInput, sync::Lrc, FileName, SourceMap};
use swc_ecma_ast::Module;
use swc_ecma_parser::{lexer::Lexer, Parser, Syntax, TsSyntax};

// Re-exported so consumers can walk the tree without depending on SWC directly
pub use swc_ecma_ast;
pub use swc_common::Spanned;

/// A parsed module together with where its text lives.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Module,
    pub file_id: FileId,
    /// Recoverable parse errors, reported as warnings
    pub diagnostics: Diagnostics,
    /// Position SWC assigned to the first byte of the file
    pub base_pos: u32,
}

fn ts_lexer<'a>(source_file: &'a swc_common::SourceFile) -> Lexer<'a> {
    Lexer::new(
        Syntax::Typescript(TsSyntax {
            tsx: false,
            decorators: true,
            dts: false,
            no_early_errors: false,
            disallow_ambiguous_jsx_like: false,
        }),
        swc_ecma_ast::EsVersion::Es2022,
        StringInput::from(source_file),
        None,
    )
}

/// Parse a file and register it in `cache`.
///
/// A fatal syntax error is returned as `Err`; the matching diagnostic is
/// pushed to `sink` first so the caller can render it.
pub fn parse_typescript_with_cache(
    source: &str,
    filename: &str,
    cache: &mut SourceCache,
    sink: &mut Diagnostics,
) -> Result<ParseResult> {
    let file_id = cache.add_file(filename, source.to_string());

    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );
    let base_pos = source_file.start_pos.0;
    let to_span = |s: swc_common::Span| Span::from_positions(file_id, base_pos, s.lo.0, s.hi.0);

    let mut parser = Parser::new_from(ts_lexer(&source_file));

    let module = match parser.parse_module() {
        Ok(module) => module,
        Err(e) => {
            let message = e.kind().msg().to_string();
            sink.push(
                Diagnostic::error(DiagnosticCode::ParseError, message.clone())
                    .with_span(to_span(e.span()))
                    .build(),
            );
            return Err(anyhow::anyhow!("Parse error in {}: {}", filename, message));
        }
    };

    let mut diagnostics = Diagnostics::new();
    for error in parser.take_errors() {
        diagnostics.push(
            Diagnostic::warning(DiagnosticCode::ParseError, error.kind().msg().to_string())
                .with_span(to_span(error.span()))
                .build(),
        );
    }
    log::debug!(
        "parsed {} ({} items, {} recoverable errors)",
        filename,
        module.body.len(),
        diagnostics.len()
    );

    Ok(ParseResult {
        module,
        file_id,
        diagnostics,
        base_pos,
    })
}

/// Parse without a cache. Used by tests and tools that only need the tree.
pub fn parse_typescript(source: &str, filename: &str) -> Result<Module> {
    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let mut parser = Parser::new_from(ts_lexer(&source_file));
    let module = parser
        .parse_module()
        .map_err(|e| anyhow::anyhow!("Parse error: {:?}", e))?;

    for error in parser.take_errors() {
        log::warn!("Parse warning: {:?}", error);
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_with_super_access() {
        let source = r#"
            class Base { x: int = 1; }
            class Derived extends Base {
                read(): int { return super.x; }
            }
        "#;

        let module = parse_typescript(source, "test.ts").unwrap();
        assert_eq!(module.body.len(), 2);
    }

    #[test]
    fn test_parse_destructuring_params() {
        let source = "function f([a, ...rest]: List<int>, {k, ...others}: Map<String, int>) {}";
        let module = parse_typescript(source, "test.ts").unwrap();
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn test_parse_with_cache() {
        let source = "let x: number = 42;";
        let mut cache = SourceCache::new();
        let mut sink = Diagnostics::new();

        let result = parse_typescript_with_cache(source, "test.ts", &mut cache, &mut sink).unwrap();

        assert_eq!(result.module.body.len(), 1);
        assert!(result.diagnostics.is_empty());
        assert!(sink.is_empty());
        assert!(cache.get_file(result.file_id).is_some());
    }

    #[test]
    fn test_parse_error_reports_diagnostic() {
        let mut cache = SourceCache::new();
        let mut sink = Diagnostics::new();

        let result = parse_typescript_with_cache("let x: number = ;", "test.ts", &mut cache, &mut sink);

        assert!(result.is_err());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::ParseError);
    }
}
