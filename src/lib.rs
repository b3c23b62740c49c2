//
// lib.rs
// dicom-curator
//
// Exposes the crate's modules and re-exports the pipeline entry point for
// both the binary and library consumers.
//

pub mod archive;
pub mod cli;
pub mod convert;
pub mod curate;
pub mod error;
pub mod gallery;
pub mod iso;
pub mod metadata;
pub mod models;

pub use curate::{curate, CurateRequest};
pub use error::{ArchiveError, ClassificationError, CurateError};
