//! CLI command implementations

pub mod check;
pub mod compile;
pub mod explain;
pub mod init;

use anyhow::{Context, Result};
use javelin_codegen::{ClassFile, CompilerOptions, ModuleCompiler};
use javelin_diagnostics::{
    DiagnosticEmitter, Diagnostics, JsonEmitter, SourceCache, TerminalEmitter,
};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::OutputFormat;

/// Collect all TypeScript files under `path`, skipping declaration files
/// and `node_modules`. The result is sorted so output is deterministic.
pub fn collect_ts_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return if is_source_file(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn is_source_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "ts") && !path.to_string_lossy().ends_with(".d.ts")
}

/// Parse and compile one file. Problems are recorded in `diagnostics`;
/// `Ok(None)` means the file produced errors.
pub fn compile_file(
    path: &Path,
    options: CompilerOptions,
    cache: &mut SourceCache,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Vec<ClassFile>>> {
    let source = fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let filename = path.to_string_lossy().to_string();

    let parsed = match javelin_parser::parse_typescript_with_cache(&source, &filename, cache, diagnostics) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("{}", e);
            return Ok(None);
        }
    };
    diagnostics.extend(parsed.diagnostics);

    let mut compiler = ModuleCompiler::new(options);
    match compiler.compile_module(&parsed.module) {
        Ok(classes) => {
            log::info!("{}: {} class(es)", filename, classes.len());
            Ok(Some(classes))
        }
        Err(e) => {
            diagnostics.push(e.to_diagnostic(parsed.file_id, parsed.base_pos));
            Ok(None)
        }
    }
}

/// Render collected diagnostics: terminal output on stderr, or one JSON
/// object per line on stdout.
pub fn emit_diagnostics(
    diagnostics: &Diagnostics,
    cache: &SourceCache,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let stderr = std::io::stderr();
            let mut emitter = TerminalEmitter::new(stderr.lock(), use_color);
            emitter.emit_all(diagnostics, cache)?;
            emitter.emit_summary(diagnostics)?;
        }
        OutputFormat::Json => {
            JsonEmitter::new(std::io::stdout().lock()).emit_all(diagnostics, cache)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("javelin-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_collect_ts_files() {
        let dir = scratch_dir("collect");
        fs::create_dir_all(dir.join("src/shapes")).unwrap();
        fs::create_dir_all(dir.join("node_modules/lib")).unwrap();
        fs::write(dir.join("src/main.ts"), "").unwrap();
        fs::write(dir.join("src/shapes/point.ts"), "").unwrap();
        fs::write(dir.join("src/types.d.ts"), "").unwrap();
        fs::write(dir.join("src/notes.md"), "").unwrap();
        fs::write(dir.join("node_modules/lib/index.ts"), "").unwrap();

        let files = collect_ts_files(&dir);
        let relative: Vec<_> = files.iter().map(|f| f.strip_prefix(&dir).unwrap().to_path_buf()).collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("src/main.ts"), PathBuf::from("src/shapes/point.ts")]
        );

        assert_eq!(collect_ts_files(&dir.join("src/main.ts")).len(), 1);
        assert!(collect_ts_files(&dir.join("src/types.d.ts")).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compile_file_reports_codegen_error() {
        let dir = scratch_dir("codegen-error");
        let path = dir.join("enums.ts");
        fs::write(&path, "enum Color { Red }\n").unwrap();

        let mut cache = SourceCache::new();
        let mut diagnostics = Diagnostics::new();
        let result = compile_file(&path, CompilerOptions::default(), &mut cache, &mut diagnostics).unwrap();

        assert!(result.is_none());
        assert_eq!(diagnostics.error_count(), 1);
        let diag = diagnostics.iter().next().unwrap();
        assert_eq!(diag.code.as_str(), "U002");
        assert!(!diag.span.is_dummy());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compile_file_reports_parse_error() {
        let dir = scratch_dir("parse-error");
        let path = dir.join("broken.ts");
        fs::write(&path, "class {\n").unwrap();

        let mut cache = SourceCache::new();
        let mut diagnostics = Diagnostics::new();
        let result = compile_file(&path, CompilerOptions::default(), &mut cache, &mut diagnostics).unwrap();

        assert!(result.is_none());
        assert!(diagnostics.iter().any(|d| d.code.as_str() == "P001" && d.is_error()));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_compile_file_classes() {
        let dir = scratch_dir("classes");
        let path = dir.join("point.ts");
        fs::write(&path, "class Point { x: number = 0; }\nfunction origin(): Point { return new Point(); }\n").unwrap();

        let options = CompilerOptions {
            package: Some("geo".to_string()),
            module_class: "PointModule".to_string(),
            ..Default::default()
        };
        let mut cache = SourceCache::new();
        let mut diagnostics = Diagnostics::new();
        let classes = compile_file(&path, options, &mut cache, &mut diagnostics)
            .unwrap()
            .unwrap();

        let names: Vec<_> = classes.iter().map(|c| c.internal_name.as_str()).collect();
        assert_eq!(names, vec!["geo/Point", "geo/PointModule"]);
        assert!(!diagnostics.has_errors());
        fs::remove_dir_all(&dir).unwrap();
    }
}
