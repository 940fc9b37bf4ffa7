//! Check schema files and generate message definitions.
//!
//! Usage:
//!   scopeidl check [--human] PATH...
//!   scopeidl msg-defs [SRC] [DEST]
//!
//! Directories are searched recursively for `*.proto` files. `check` parses
//! every file, resolves every type reference and the service version, and
//! exits with code 1 if anything fails. `msg-defs` writes one `.def` file per
//! command request, command response and event into DEST.
//!
//! Log output is controlled with `RUST_LOG` (default `warn`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use scopeidl::{msgdefs, parse, ParseError, SchemaError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "scopeidl", version, about = "Scope service interface definition tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse schema files and resolve every type reference.
    Check {
        /// Schema files or directories containing them.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Human-readable output.
        #[arg(short = 'H', long)]
        human: bool,
    },
    /// Write message definition files.
    MsgDefs {
        /// Schema file or directory.
        #[arg(default_value = ".")]
        src: PathBuf,
        /// Destination directory.
        #[arg(default_value = "msg-defs")]
        dest: PathBuf,
    },
}

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

/// `path` itself if it is a file, else every `*.proto` below it, sorted.
fn proto_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |e| e == "proto") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn print_parse_error(path: &str, e: &ParseError, style: OutputStyle) {
    match style {
        OutputStyle::Compact => println!("{}:{}:{}: error: {}", path, e.line, e.column, e),
        OutputStyle::Human => {
            println!("  {} line {}:", path, e.line);
            println!("    {}", e.text.trim());
            println!("    {}^", " ".repeat(e.column.saturating_sub(1 + e.text.len() - e.text.trim_start().len())));
        }
    }
}

fn print_schema_error(path: &str, e: &SchemaError, style: OutputStyle) {
    match style {
        OutputStyle::Compact => println!("{}: error: {}", path, e),
        OutputStyle::Human => println!("  {}: {}", path, e),
    }
}

fn check(paths: &[PathBuf], style: OutputStyle) -> anyhow::Result<bool> {
    let mut total_errors = 0usize;
    let mut total_files = 0usize;
    for root in paths {
        for path in proto_files(root)? {
            total_files += 1;
            let display_path = path.display().to_string();
            let src = std::fs::read_to_string(&path).with_context(|| format!("reading {}", display_path))?;
            let schema = match parse(&src) {
                Ok(s) => s,
                Err(e) => {
                    total_errors += 1;
                    print_parse_error(&display_path, &e, style);
                    continue;
                }
            };
            let errors = schema.reference_errors();
            for e in &errors {
                print_schema_error(&display_path, e, style);
            }
            total_errors += errors.len();
        }
    }
    eprintln!("check: {} file(s), {} error(s)", total_files, total_errors);
    Ok(total_errors == 0)
}

fn msg_defs(src: &Path, dest: &Path) -> anyhow::Result<()> {
    for path in proto_files(src)? {
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let schema = parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        let written = msgdefs::write_definitions(&schema, dest)
            .with_context(|| format!("writing definitions for {}", path.display()))?;
        eprintln!("{}: {} definition(s)", path.display(), written.len());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Check { paths, human } => {
            let style = if human { OutputStyle::Human } else { OutputStyle::Compact };
            if !check(&paths, style)? {
                std::process::exit(1);
            }
        }
        Command::MsgDefs { src, dest } => msg_defs(&src, &dest)?,
    }
    Ok(())
}
