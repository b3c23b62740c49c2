//
// iso.rs
// dicom-curator
//
// ISO9660 side of the archive adapter: probes the image's path-addressing
// scheme at the root and materializes the full tree with an iterative
// work-list walk. Byte-level decoding of the image is delegated to cdfs.
//

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use cdfs::{DirectoryEntry, ISO9660};
use tracing::{debug, warn};

use crate::error::ArchiveError;

/// The three path-addressing schemes an optical image may carry. An image is
/// traversed under exactly one scheme; they are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScheme {
    Primary,
    Joliet,
    RockRidge,
}

/// Fixed probe priority. The first scheme whose root listing succeeds is
/// adopted for the entire traversal.
pub const SCHEME_PROBE_ORDER: [PathScheme; 3] =
    [PathScheme::Primary, PathScheme::Joliet, PathScheme::RockRidge];

/// One directory child as listed under a scheme. `name` is the raw file
/// identifier; any trailing `;1` version suffix is stripped on the
/// destination side only.
#[derive(Debug, Clone)]
pub struct IsoEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Reading collaborator for an opened ISO image. The traversal logic is
/// generic over this trait so the scheme fallback and work-list semantics can
/// be exercised without real optical media.
pub trait IsoVolume {
    fn list_children(&mut self, scheme: PathScheme, path: &str) -> io::Result<Vec<IsoEntry>>;
    fn copy_file(&mut self, scheme: PathScheme, path: &str, dest: &Path) -> io::Result<()>;
}

/// Probe the root under each scheme in [`SCHEME_PROBE_ORDER`] and adopt the
/// first that lists without error.
pub fn probe_scheme<V: IsoVolume>(volume: &mut V) -> Result<PathScheme, ArchiveError> {
    for scheme in SCHEME_PROBE_ORDER {
        match volume.list_children(scheme, "/") {
            Ok(_) => {
                debug!(?scheme, "adopted ISO path-addressing scheme");
                return Ok(scheme);
            }
            Err(e) => debug!(?scheme, error = %e, "root listing failed under scheme"),
        }
    }
    Err(ArchiveError::NoUsableScheme)
}

fn join_iso_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

fn strip_version_suffix(name: &str) -> &str {
    name.strip_suffix(";1").unwrap_or(name)
}

/// Materialize the whole image tree under `dest`, preserving internal
/// structure. A child that fails to list or extract is logged and skipped;
/// partial extraction of slightly malformed media is expected and not an
/// error. Traversal is an explicit work-list walk, so nesting depth never
/// grows the native call stack.
pub fn extract_tree<V: IsoVolume>(volume: &mut V, dest: &Path) -> Result<PathScheme, ArchiveError> {
    let scheme = probe_scheme(volume)?;

    let mut pending: Vec<(String, PathBuf)> = vec![("/".to_string(), dest.to_path_buf())];

    while let Some((iso_dir, out_dir)) = pending.pop() {
        let children = match volume.list_children(scheme, &iso_dir) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %iso_dir, error = %e, "failed to list ISO directory; skipping");
                continue;
            }
        };

        for child in children {
            if child.name == "." || child.name == ".." {
                continue;
            }
            let src = join_iso_path(&iso_dir, &child.name);
            let dst = out_dir.join(strip_version_suffix(&child.name));

            if child.is_dir {
                fs::create_dir_all(&dst)?;
                pending.push((src, dst));
            } else if let Err(e) = volume.copy_file(scheme, &src, &dst) {
                warn!(path = %src, error = %e, "failed to extract ISO entry; skipping");
            }
        }
    }

    Ok(scheme)
}

/// Production volume backed by the cdfs reader. cdfs serves ISO9660 primary
/// descriptors and applies Rock Ridge extensions when present; it has no
/// Joliet support, so Joliet listings fail the probe and the fallback order
/// moves on.
pub struct CdfsVolume {
    iso: ISO9660<File>,
}

impl CdfsVolume {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let iso = ISO9660::new(file).map_err(|e| ArchiveError::IsoOpen {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self { iso })
    }
}

fn cdfs_to_io(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

impl IsoVolume for CdfsVolume {
    fn list_children(&mut self, scheme: PathScheme, path: &str) -> io::Result<Vec<IsoEntry>> {
        if scheme == PathScheme::Joliet {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Joliet directory records are not served by this reader",
            ));
        }

        match self.iso.open(path).map_err(cdfs_to_io)? {
            Some(DirectoryEntry::Directory(dir)) => {
                let mut children = Vec::new();
                for child in dir.contents() {
                    let child = child.map_err(cdfs_to_io)?;
                    match child {
                        DirectoryEntry::Directory(d) => children.push(IsoEntry {
                            name: d.identifier.clone(),
                            is_dir: true,
                        }),
                        DirectoryEntry::File(f) => children.push(IsoEntry {
                            name: f.identifier.clone(),
                            is_dir: false,
                        }),
                        // Symlinks and other special records are not
                        // materialized into the temp tree.
                        _ => {}
                    }
                }
                Ok(children)
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} is not a directory"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{path} not found in image"),
            )),
        }
    }

    fn copy_file(&mut self, _scheme: PathScheme, path: &str, dest: &Path) -> io::Result<()> {
        match self.iso.open(path).map_err(cdfs_to_io)? {
            Some(DirectoryEntry::File(f)) => {
                let mut reader = f.read();
                let mut out = File::create(dest)?;
                io::copy(&mut reader, &mut out)?;
                Ok(())
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} is not a regular file"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{path} not found in image"),
            )),
        }
    }
}
