//! refremap CLI tool
//!
//! Renames reference designators of a KiCad project according to `<project>.refRemap`.
//!
//! ```text
//! refremap boards/amp --dryrun --verbose
//! ```
//!
//! Every check runs in memory first; the changed sheets (and a backup of each, named
//! `<sheet>.orgRefMap.sch`) are only written once all checks passed. The process exit code
//! tells which check failed, see [refremap::RemapError::exit_code].

use clap::{error::ErrorKind, Parser};
use refremap::{config::RemapConfig, remap::Remapper, RemapError};
use std::path::PathBuf;

/// Exit code for a malformed command line.
const USAGE_EXIT_CODE: i32 = -1;

#[derive(Parser)]
#[command(name = "refremap")]
#[command(author, version, about = "Remap reference designators across a KiCad schematic hierarchy", long_about = None)]
struct Cli {
    /// Project name without extension: reads <project>.sch and <project>.refRemap
    project: PathBuf,

    /// Replace backups left by a previous run
    #[arg(short, long)]
    overwrite: bool,

    /// Run every check but write nothing
    #[arg(short, long)]
    dryrun: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (default: refremap.toml next to the project, if any)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => USAGE_EXIT_CODE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    if cli.verbose {
        println!("Return code: {code}");
    }
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<(), RemapError> {
    let mut config = match &cli.config {
        Some(path) => RemapConfig::from_toml_file(&cli.project, path)?,
        None => RemapConfig::discover(&cli.project)?,
    };
    config.overwrite_backup |= cli.overwrite;
    config.dry_run |= cli.dryrun;

    let report = Remapper::new(config).run()?;
    for rename in &report.renames {
        tracing::debug!(
            "{}:{} {} -> {}",
            rename.path.display(),
            rename.line,
            rename.old,
            rename.new
        );
    }
    if report.dry_run {
        println!("Only a dry-run: no file was created or altered in any way");
    } else {
        for path in &report.kept_backups {
            println!("Kept existing backup {}", path.display());
        }
        println!(
            "{} designator(s) replaced, {} file(s) written",
            report.renames.len(),
            report.written.len()
        );
    }
    Ok(())
}
