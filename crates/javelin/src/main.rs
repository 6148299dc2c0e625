//! Javelin - TypeScript to JVM classfile compiler
//!
//! CLI driver for compiling TypeScript classes to `.class` files.

mod commands;
mod config;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

/// TypeScript to JVM Compiler
#[derive(Parser, Debug)]
#[command(name = "javelin")]
#[command(author, version, about = "Compile TypeScript to JVM classfiles")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile TypeScript file(s) to JVM classfiles
    Compile(commands::compile::CompileArgs),

    /// Run code generation without writing classfiles
    Check(commands::check::CheckArgs),

    /// Initialize a new javelin project
    Init(commands::init::InitArgs),

    /// Explain a diagnostic code
    Explain(commands::explain::ExplainArgs),
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(cli.verbose, cli.quiet)))
        .init();

    let use_color = !cli.no_color && !cli.quiet && atty::is(atty::Stream::Stdout);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Compile(args) => commands::compile::run(args, cli.format, use_color, cli.quiet),
        Commands::Check(args) => commands::check::run(args, cli.format, use_color, cli.quiet),
        Commands::Init(args) => commands::init::run(args, cli.format, use_color),
        Commands::Explain(args) => commands::explain::run(args, cli.format, use_color),
    }
}
