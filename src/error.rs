//
// error.rs
// dicom-curator
//
// Error taxonomy for the curation pipeline: fatal archive failures, per-file
// classification outcomes, and the top-level curation error.
//

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or extracting an input archive. These are
/// fatal to the run: no output is produced beyond the creation of the
/// destination directory.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid ZIP archive: {0}")]
    InvalidZip(#[from] zip::result::ZipError),

    #[error("Failed to open ISO image {}: {detail}", path.display())]
    IsoOpen { path: PathBuf, detail: String },

    #[error("No usable path-addressing scheme found at ISO root")]
    NoUsableScheme,

    #[error("Unsupported archive type: {0:?}")]
    Unsupported(PathBuf),
}

/// Outcome of the DICOM validity probe on a single file. `NotDicom` covers
/// every parse-level failure (wrong magic, malformed header, truncated
/// stream); `Io` is a filesystem-level failure that happened before parsing
/// could start. Both are collapsed to "not DICOM" at the `is_dicom` boundary.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("not a DICOM file: {0}")]
    NotDicom(String),

    #[error("IO error while probing file")]
    Io(#[from] io::Error),
}

/// Top-level pipeline error returned by `curate`.
#[derive(Debug, Error)]
pub enum CurateError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("IO error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CurateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
