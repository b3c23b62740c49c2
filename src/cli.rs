//
// cli.rs
// dicom-curator
//
// Defines the CLI surface with Clap and maps the pipeline outcome onto the
// process exit-code contract (0 success, 2 when no DICOM content was found).
//

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::curate::{curate, CurateRequest};
use crate::error::CurateError;

#[derive(Parser)]
#[command(name = "dicom-curate")]
#[command(about = "Extract DICOM files from a ZIP or ISO export archive", long_about = None)]
pub struct Cli {
    /// Path to the export archive (.zip or .iso)
    pub archive: PathBuf,

    /// Destination directory for curated DICOM files
    pub out_dir: PathBuf,

    /// Overwrite existing files in the output directory and re-extract
    #[arg(long)]
    pub overwrite: bool,

    /// Convert each curated file to an annotated PNG preview
    #[arg(long)]
    pub png: bool,

    /// Directory for PNG previews and the gallery index (default: <out_dir>/export)
    #[arg(long, requires = "png")]
    pub export_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let request = CurateRequest {
        input: cli.archive,
        out_dir: cli.out_dir,
        overwrite: cli.overwrite,
        convert_to_png: cli.png,
        png_export_dir: cli.export_dir,
    };

    let curated = curate(&request).map_err(|e| match e {
        CurateError::Archive(archive) => {
            anyhow::Error::new(archive).context("failed to read input archive")
        }
        other => anyhow::Error::new(other),
    })?;

    if curated.is_empty() {
        eprintln!("No DICOM files found in archive.");
        return Ok(ExitCode::from(2));
    }

    println!(
        "Extracted {} DICOM file(s) to: {}",
        curated.len(),
        request.out_dir.display()
    );
    for path in &curated {
        println!(" - {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse arguments from an explicit iterator; lets tests drive the surface
/// without a process.
pub fn parse_from<I, T>(args: I) -> anyhow::Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args).context("invalid arguments")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_dir_requires_png() {
        assert!(parse_from(["dicom-curate", "a.zip", "out", "--export-dir", "x"]).is_err());
        assert!(parse_from(["dicom-curate", "a.zip", "out", "--png", "--export-dir", "x"]).is_ok());
    }

    #[test]
    fn defaults_are_off() {
        let cli = parse_from(["dicom-curate", "a.zip", "out"]).expect("parse");
        assert!(!cli.overwrite);
        assert!(!cli.png);
        assert!(cli.export_dir.is_none());
        assert_eq!(cli.archive, PathBuf::from("a.zip"));
    }
}
