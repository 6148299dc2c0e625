//! Compile command - compiles TypeScript to JVM classfiles

use anyhow::{anyhow, Context, Result};
use clap::Args;
use javelin_diagnostics::{Diagnostics, SourceCache};
use std::fs;
use std::path::{Path, PathBuf};

use super::{collect_ts_files, compile_file, emit_diagnostics};
use crate::config::ProjectConfig;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Input TypeScript file or directory (default: the project entry)
    pub input: Option<PathBuf>,

    /// Output directory for .class files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Java package of the generated classes, e.g. com.example
    #[arg(long)]
    pub package: Option<String>,

    /// Classfile major version
    #[arg(long)]
    pub class_version: Option<u16>,
}

/// Where the input, output and settings of a run come from once flags and
/// `javelin.toml` are merged.
pub struct Invocation {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub config: ProjectConfig,
}

impl Invocation {
    pub fn resolve(input: Option<PathBuf>, output: Option<PathBuf>, class_version: Option<u16>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let search_from = match &input {
            Some(path) if path.is_dir() => path.clone(),
            Some(path) => path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone()),
            None => cwd.clone(),
        };
        let (root, mut config) = match ProjectConfig::discover(&search_from)? {
            Some((file, config)) => (file.parent().map(Path::to_path_buf).unwrap_or(cwd), config),
            None => (cwd, ProjectConfig::default()),
        };
        if let Some(version) = class_version {
            config.build.class_version = version;
        }

        let input = match input {
            Some(input) => input,
            None => config
                .project
                .entry
                .as_ref()
                .map(|entry| root.join(entry))
                .ok_or_else(|| anyhow!("No input given and no entry in javelin.toml"))?,
        };
        let out_dir = output.unwrap_or_else(|| root.join(&config.build.out_dir));

        Ok(Self { input, out_dir, config })
    }
}

pub fn run(args: CompileArgs, format: OutputFormat, use_color: bool, quiet: bool) -> Result<()> {
    let invocation = Invocation::resolve(args.input, args.output, args.class_version)?;
    let files = collect_ts_files(&invocation.input);
    if files.is_empty() {
        return Err(anyhow!("No TypeScript files found in {}", invocation.input.display()));
    }

    if !quiet && matches!(format, OutputFormat::Text) {
        println!("Compiling {} file(s)...", files.len());
    }

    let mut cache = SourceCache::new();
    let mut diagnostics = Diagnostics::new();
    let mut written = Vec::new();

    for file in &files {
        let options = invocation.config.compiler_options(args.package.as_deref(), file);
        let Some(classes) = compile_file(file, options, &mut cache, &mut diagnostics)? else {
            continue;
        };
        for class in classes {
            let path = invocation.out_dir.join(class.relative_path());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create {}", parent.display()))?;
            }
            fs::write(&path, &class.bytes).with_context(|| format!("Could not write {}", path.display()))?;
            log::debug!("wrote {} ({} bytes)", path.display(), class.bytes.len());
            written.push(path);
        }
    }

    emit_diagnostics(&diagnostics, &cache, format, use_color)?;
    let errors = diagnostics.error_count();

    match format {
        OutputFormat::Text => {
            if errors > 0 {
                if use_color {
                    println!(
                        "{}: {} error(s), {} warning(s)",
                        console::style("Compilation failed").red().bold(),
                        errors,
                        diagnostics.warning_count()
                    );
                } else {
                    println!("Compilation failed: {} error(s), {} warning(s)", errors, diagnostics.warning_count());
                }
            } else if !quiet {
                let summary = format!("Wrote {} class file(s) to {}", written.len(), invocation.out_dir.display());
                if use_color {
                    println!("{}", console::style(summary).green().bold());
                } else {
                    println!("{}", summary);
                }
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "type": "summary",
                "success": errors == 0,
                "files": files.len(),
                "errors": errors,
                "warnings": diagnostics.warning_count(),
                "classes": written.iter().map(|p| p.to_string_lossy()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    if errors > 0 {
        Err(anyhow!("Compilation failed with errors"))
    } else {
        Ok(())
    }
}
