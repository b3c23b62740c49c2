//
// archive.rs
// dicom-curator
//
// Normalizes ZIP and ISO inputs into one extracted tree under a deterministic
// temp directory, so repeated runs against the same archive can detect and
// reuse prior work without persisted state.
//

use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::iso::{self, CdfsVolume};

/// Archive container formats accepted at the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Iso,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Result<Self, ArchiveError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("zip") => Ok(Self::Zip),
            Some("iso") => Ok(Self::Iso),
            _ => Err(ArchiveError::Unsupported(path.to_path_buf())),
        }
    }

    fn temp_suffix(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Iso => "iso",
        }
    }
}

/// Deterministic extraction target: `<root>/<archive base name>_<format>`.
/// A pure function of the input path and format, which is what makes re-run
/// detection possible without any persisted state.
pub fn temp_extraction_dir(root: &Path, input: &Path, kind: ArchiveKind) -> PathBuf {
    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    root.join(format!("{}_{}", base, kind.temp_suffix()))
}

/// Extract `input` into its deterministic temp directory under the system
/// temp root, returning the populated directory.
///
/// If the temp directory already exists: with `overwrite` it is destroyed and
/// recreated before extraction, otherwise extraction is skipped entirely and
/// the existing tree is reused as-is.
pub fn extract_archive(input: &Path, overwrite: bool) -> Result<PathBuf, ArchiveError> {
    extract_archive_under(&env::temp_dir(), input, overwrite)
}

pub(crate) fn extract_archive_under(
    temp_root: &Path,
    input: &Path,
    overwrite: bool,
) -> Result<PathBuf, ArchiveError> {
    let kind = ArchiveKind::from_path(input)?;
    let tmpdir = temp_extraction_dir(temp_root, input, kind);
    debug!(tmpdir = %tmpdir.display(), "extraction target temporary directory");

    if tmpdir.exists() {
        if overwrite {
            info!(tmpdir = %tmpdir.display(), "overwriting existing temp dir");
            fs::remove_dir_all(&tmpdir)?;
        } else {
            info!(
                tmpdir = %tmpdir.display(),
                "temp dir already exists and overwrite is off; skipping extraction"
            );
            return Ok(tmpdir);
        }
    }
    fs::create_dir_all(&tmpdir)?;

    match kind {
        ArchiveKind::Zip => {
            info!(input = %input.display(), "extracting ZIP archive");
            extract_zip(input, &tmpdir)?;
        }
        ArchiveKind::Iso => {
            info!(input = %input.display(), "extracting ISO archive");
            let mut volume = CdfsVolume::open(input)?;
            let scheme = iso::extract_tree(&mut volume, &tmpdir)?;
            debug!(?scheme, "ISO traversal complete");
        }
    }

    Ok(tmpdir)
}

fn extract_zip(input: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(input)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    // Format-native full-tree extraction; the zip crate already refuses
    // entries that would escape the destination.
    archive.extract(dest)?;
    Ok(())
}
