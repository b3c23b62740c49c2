//
// main.rs
// dicom-curator
//
// Binary entry point; all argument handling and orchestration lives in the
// CLI module.
//

use std::process::ExitCode;

use dicom_curator::cli;

fn main() -> anyhow::Result<ExitCode> {
    cli::run()
}
