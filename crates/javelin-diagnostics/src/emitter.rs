//! Rendering of diagnostics to terminals, JSON streams and plain logs.

use crate::diagnostic::{Diagnostic, Diagnostics, Severity};
use crate::source_cache::SourceCache;
use std::io::Write;

pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()>;

    fn emit_all(&mut self, diagnostics: &Diagnostics, cache: &SourceCache) -> std::io::Result<()> {
        for diag in diagnostics.iter() {
            self.emit(diag, cache)?;
        }
        Ok(())
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()>;
}

/// Human-oriented output with an annotated source line.
pub struct TerminalEmitter<W: Write> {
    writer: W,
    colored: bool,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, colored: bool) -> Self {
        Self { writer, colored }
    }

    fn paint(&self, code: &'static str) -> &'static str {
        if self.colored {
            code
        } else {
            ""
        }
    }

    fn severity_color(&self, severity: Severity) -> &'static str {
        self.paint(match severity {
            Severity::Error => "\x1b[31m",
            Severity::Warning => "\x1b[33m",
        })
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()> {
        let color = self.severity_color(diagnostic.severity);
        let bold = self.paint("\x1b[1m");
        let cyan = self.paint("\x1b[36m");
        let reset = self.paint("\x1b[0m");

        writeln!(
            self.writer,
            "{bold}{color}{}[{}]{reset}: {}",
            diagnostic.severity, diagnostic.code, diagnostic.message
        )?;

        if let (Some(loc), Some(file)) = (
            cache.location(diagnostic.span),
            cache.get_file(diagnostic.span.file_id),
        ) {
            writeln!(self.writer, "  {cyan}-->{reset} {}", loc)?;
            if let Some(text) = file.line_text(loc.line) {
                let gutter = loc.line.to_string();
                let pad = " ".repeat(gutter.len());
                let indent = " ".repeat((loc.column - 1) as usize);
                let room = text.len().saturating_sub((loc.column - 1) as usize).max(1);
                let marks = "^".repeat((diagnostic.span.len() as usize).clamp(1, room));

                writeln!(self.writer, "{pad} {cyan}|{reset}")?;
                writeln!(self.writer, "{cyan}{gutter} |{reset} {text}")?;
                writeln!(self.writer, "{pad} {cyan}|{reset} {indent}{color}{marks}{reset}")?;
            }
        }

        if let Some(help) = &diagnostic.help {
            writeln!(self.writer, "  {cyan}= help:{reset} {}", help)?;
        }

        writeln!(self.writer)
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        let errors = diagnostics.error_count();
        let warnings = diagnostics.warning_count();
        if errors == 0 && warnings == 0 {
            return Ok(());
        }

        let color = if errors > 0 {
            self.severity_color(Severity::Error)
        } else {
            self.severity_color(Severity::Warning)
        };
        let reset = self.paint("\x1b[0m");
        let plural = |n: usize| if n == 1 { "" } else { "s" };

        let mut parts = Vec::new();
        if errors > 0 {
            parts.push(format!("{} error{}", errors, plural(errors)));
        }
        if warnings > 0 {
            parts.push(format!("{} warning{}", warnings, plural(warnings)));
        }
        writeln!(self.writer, "{color}{} emitted{reset}", parts.join(" and "))
    }
}

/// One JSON object per line, for editor and CI integration.
pub struct JsonEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for JsonEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()> {
        let json = serde_json::json!({
            "code": diagnostic.code.as_str(),
            "severity": diagnostic.severity.as_str(),
            "message": diagnostic.message,
            "location": cache.location(diagnostic.span).map(|l| serde_json::json!({
                "file": l.file,
                "line": l.line,
                "column": l.column,
            })),
            "text": cache.source_text(diagnostic.span),
            "help": diagnostic.help,
        });
        serde_json::to_writer(&mut self.writer, &json)?;
        writeln!(self.writer)
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        let summary = serde_json::json!({
            "type": "summary",
            "errors": diagnostics.error_count(),
            "warnings": diagnostics.warning_count(),
            "total": diagnostics.len(),
        });
        serde_json::to_writer(&mut self.writer, &summary)?;
        writeln!(self.writer)
    }
}

/// `file:line:col: severity: message [code]`, one per line.
pub struct SimpleEmitter<W: Write> {
    writer: W,
}

impl<W: Write> SimpleEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for SimpleEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()> {
        if let Some(loc) = cache.location(diagnostic.span) {
            write!(self.writer, "{}: ", loc)?;
        }
        writeln!(
            self.writer,
            "{}: {} [{}]",
            diagnostic.severity, diagnostic.message, diagnostic.code
        )
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{} error(s), {} warning(s)",
            diagnostics.error_count(),
            diagnostics.warning_count()
        )
    }
}
