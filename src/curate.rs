//
// curate.rs
// dicom-curator
//
// Orchestrates one curation run: archive extraction to the temp tree, DICOM
// validity filtering, collision-safe placement into the output directory,
// idempotent reconciliation against prior output, and the optional PNG
// conversion and gallery index fan-out.
//

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive;
use crate::convert;
use crate::error::{ClassificationError, CurateError};
use crate::gallery;
use crate::metadata;
use crate::models::DicomRecord;

/// One curation invocation. `png_export_dir` defaults to `<out_dir>/export`.
#[derive(Debug, Clone)]
pub struct CurateRequest {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub overwrite: bool,
    pub convert_to_png: bool,
    pub png_export_dir: Option<PathBuf>,
}

impl CurateRequest {
    pub fn new(input: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            out_dir: out_dir.into(),
            overwrite: false,
            convert_to_png: false,
            png_export_dir: None,
        }
    }

    fn export_dir(&self) -> PathBuf {
        self.png_export_dir
            .clone()
            .unwrap_or_else(|| self.out_dir.join("export"))
    }
}

/// Curate DICOM files out of a ZIP or ISO archive into the output directory.
///
/// Returns the curated file paths; an empty list means the archive held no
/// DICOM content. Archive-level failures abort the run with no output
/// mutation beyond the creation of the output directory; a single
/// unclassifiable or unconvertible file only costs that file.
pub fn curate(request: &CurateRequest) -> Result<Vec<PathBuf>, CurateError> {
    let _span = tracing::info_span!("curate", input = %request.input.display()).entered();
    fs::create_dir_all(&request.out_dir).map_err(|e| CurateError::io(&request.out_dir, e))?;

    // Pre-existing output short-circuits the whole extraction: the run
    // converges on what is already there instead of redoing work.
    if !request.overwrite {
        let existing = list_output_files(&request.out_dir)?;
        if !existing.is_empty() {
            warn!(
                count = existing.len(),
                out_dir = %request.out_dir.display(),
                "output directory already contains files and overwrite is off; skipping extraction"
            );
            if request.convert_to_png {
                catch_up_previews(&existing, &request.export_dir())?;
            }
            return Ok(existing);
        }
    }

    let tmpdir = archive::extract_archive(&request.input, request.overwrite)?;

    let export_dir = request.export_dir();
    let font = if request.convert_to_png {
        fs::create_dir_all(&export_dir).map_err(|e| CurateError::io(&export_dir, e))?;
        convert::load_overlay_font()
    } else {
        None
    };

    let mut placed = Vec::new();
    let mut converted_any = false;

    for entry in WalkDir::new(&tmpdir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let src = entry.path();
        match metadata::classify(src) {
            Ok(_) => {
                let dest = place_file(src, &request.out_dir, request.overwrite)?;
                info!(file = %dest.display(), "extracted");
                if request.convert_to_png
                    && convert::convert(&dest, &export_dir, font.as_ref()).is_some()
                {
                    converted_any = true;
                }
                placed.push(dest);
            }
            Err(ClassificationError::NotDicom(reason)) => {
                debug!(file = %src.display(), reason = %reason, "skipping non-DICOM file");
            }
            Err(ClassificationError::Io(e)) => {
                // Probe IO failures are not classification verdicts; keep
                // them visible instead of burying them with the rejects.
                warn!(file = %src.display(), error = %e, "unreadable file during scan; skipping");
            }
        }
    }

    // The index always reflects the full accumulated output set, not just
    // this run's additions.
    if request.convert_to_png && converted_any {
        refresh_index(&request.out_dir, &export_dir)?;
    }

    Ok(placed)
}

/// Top-level regular files of the output directory, in name order.
fn list_output_files(out_dir: &Path) -> Result<Vec<PathBuf>, CurateError> {
    let mut files = Vec::new();
    let entries = fs::read_dir(out_dir).map_err(|e| CurateError::io(out_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CurateError::io(out_dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Place one accepted file at `out_dir/<basename>`. Under overwrite an
/// existing file is replaced in place; otherwise a `_1`, `_2`, … suffix is
/// appended before the extension until the name is free, so distinct files
/// sharing a basename never silently clobber each other.
fn place_file(src: &Path, out_dir: &Path, overwrite: bool) -> Result<PathBuf, CurateError> {
    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed.dcm");
    let mut dest = out_dir.join(name);

    if dest.exists() && !overwrite {
        dest = unique_path(out_dir, name);
        info!(file = %dest.display(), "name collision; renamed");
    }

    fs::copy(src, &dest).map_err(|e| CurateError::io(&dest, e))?;
    Ok(dest)
}

fn unique_path(out_dir: &Path, filename: &str) -> PathBuf {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut i = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, i, ext),
            None => format!("{}_{}", stem, i),
        };
        let path = out_dir.join(&candidate);
        if !path.exists() {
            return path;
        }
        i += 1;
    }
}

/// Incremental preview reconciliation for the short-circuit path: convert
/// only the DICOM files whose artifact is missing from the export directory,
/// then regenerate the index unconditionally so it always reflects current
/// directory contents.
fn catch_up_previews(existing: &[PathBuf], export_dir: &Path) -> Result<(), CurateError> {
    fs::create_dir_all(export_dir).map_err(|e| CurateError::io(export_dir, e))?;

    let present: HashSet<String> = fs::read_dir(export_dir)
        .map_err(|e| CurateError::io(export_dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "png"))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();

    let missing: Vec<&PathBuf> = existing
        .iter()
        .filter(|path| metadata::is_dicom(path))
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(convert::sanitize_filename)
                .map_or(false, |stem| !present.contains(&format!("{}.png", stem)))
        })
        .collect();

    if missing.is_empty() {
        debug!("previews already up to date");
    } else {
        info!(count = missing.len(), "converting missing previews");
        let font = convert::load_overlay_font();
        for path in missing {
            convert::convert(path, export_dir, font.as_ref());
        }
    }

    refresh_index_from(existing, export_dir)
}

fn refresh_index(out_dir: &Path, export_dir: &Path) -> Result<(), CurateError> {
    let files = list_output_files(out_dir)?;
    refresh_index_from(&files, export_dir)
}

fn refresh_index_from(files: &[PathBuf], export_dir: &Path) -> Result<(), CurateError> {
    let sources: Vec<(PathBuf, DicomRecord)> = files
        .iter()
        .filter_map(|path| match metadata::classify(path) {
            Ok(record) => Some((path.clone(), record)),
            Err(_) => None,
        })
        .collect();
    gallery::build_index(export_dir, &sources)?;
    Ok(())
}
