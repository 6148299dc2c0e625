//! Check command - runs code generation without writing classfiles

use anyhow::{anyhow, Result};
use clap::Args;
use javelin_diagnostics::{Diagnostics, SourceCache};
use std::path::PathBuf;

use super::compile::Invocation;
use super::{collect_ts_files, compile_file, emit_diagnostics};
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Input TypeScript file or directory (default: the project entry)
    pub input: Option<PathBuf>,

    /// Java package the classes would be generated in
    #[arg(long)]
    pub package: Option<String>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: CheckArgs, format: OutputFormat, use_color: bool, quiet: bool) -> Result<()> {
    let invocation = Invocation::resolve(args.input, None, None)?;
    let files = collect_ts_files(&invocation.input);

    if files.is_empty() {
        match format {
            OutputFormat::Text => println!("No TypeScript files found."),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "files": 0,
                        "errors": 0,
                        "warnings": 0,
                    })
                );
            }
        }
        return Ok(());
    }

    if !quiet && matches!(format, OutputFormat::Text) {
        println!("Checking {} file(s)...", files.len());
    }

    let mut cache = SourceCache::new();
    let mut diagnostics = Diagnostics::new();
    let mut classes = 0;
    for file in &files {
        let options = invocation.config.compiler_options(args.package.as_deref(), file);
        if let Some(compiled) = compile_file(file, options, &mut cache, &mut diagnostics)? {
            classes += compiled.len();
        }
    }

    emit_diagnostics(&diagnostics, &cache, format, use_color)?;
    let errors = diagnostics.error_count();
    let warnings = diagnostics.warning_count();

    match format {
        OutputFormat::Text => {
            if errors > 0 {
                if use_color {
                    println!(
                        "{}: {} error(s), {} warning(s)",
                        console::style("Check failed").red().bold(),
                        errors,
                        warnings
                    );
                } else {
                    println!("Check failed: {} error(s), {} warning(s)", errors, warnings);
                }
            } else if warnings > 0 && args.strict {
                if use_color {
                    println!(
                        "{}: {} warning(s) (strict mode)",
                        console::style("Check failed").yellow().bold(),
                        warnings
                    );
                } else {
                    println!("Check failed: {} warning(s) (strict mode)", warnings);
                }
            } else if !quiet {
                if use_color {
                    println!(
                        "{} - {} file(s), {} class(es)",
                        console::style("All checks passed!").green().bold(),
                        files.len(),
                        classes
                    );
                } else {
                    println!("All checks passed! - {} file(s), {} class(es)", files.len(), classes);
                }
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "type": "summary",
                "success": errors == 0 && (!args.strict || warnings == 0),
                "files_checked": files.len(),
                "classes": classes,
                "errors": errors,
                "warnings": warnings,
            });
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    if errors > 0 || (args.strict && warnings > 0) {
        Err(anyhow!("Check failed with errors"))
    } else {
        Ok(())
    }
}
