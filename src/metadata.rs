use std::fs;
use std::path::Path;

use dicom::core::Tag;
use dicom::object::{DefaultDicomObject, OpenFileOptions};

use crate::error::ClassificationError;
use crate::models::DicomRecord;

const TAG_PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
const TAG_PATIENT_ID: Tag = Tag(0x0010, 0x0020);
const TAG_STUDY_DATE: Tag = Tag(0x0008, 0x0020);
const TAG_MODALITY: Tag = Tag(0x0008, 0x0060);
const TAG_SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
const TAG_SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
const TAG_INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
const TAG_SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);
const TAG_PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

fn text_for_tag(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn int_for_tag(obj: &DefaultDicomObject, tag: Tag) -> Option<i64> {
    text_for_tag(obj, tag).and_then(|s| s.parse().ok())
}

fn float_for_tag(obj: &DefaultDicomObject, tag: Tag) -> Option<f64> {
    text_for_tag(obj, tag).and_then(|s| s.parse().ok())
}

pub fn extract_record(obj: &DefaultDicomObject) -> DicomRecord {
    DicomRecord {
        patient_name: text_for_tag(obj, TAG_PATIENT_NAME),
        patient_id: text_for_tag(obj, TAG_PATIENT_ID),
        study_date: text_for_tag(obj, TAG_STUDY_DATE),
        modality: text_for_tag(obj, TAG_MODALITY),
        series_number: int_for_tag(obj, TAG_SERIES_NUMBER),
        series_description: text_for_tag(obj, TAG_SERIES_DESCRIPTION),
        instance_number: int_for_tag(obj, TAG_INSTANCE_NUMBER),
        slice_location: float_for_tag(obj, TAG_SLICE_LOCATION),
    }
}

/// Probe a file for DICOM validity with a header-only read that stops before
/// pixel data. Filesystem-level failures are reported as `Io`; everything the
/// parser rejects (wrong magic bytes, malformed header, truncated stream) is
/// `NotDicom`.
pub fn classify(path: &Path) -> Result<DicomRecord, ClassificationError> {
    // A stat failure is a real IO problem, not a malformed file.
    fs::metadata(path)?;

    let obj = OpenFileOptions::new()
        .read_until(TAG_PIXEL_DATA)
        .open_file(path)
        .map_err(|e| ClassificationError::NotDicom(e.to_string()))?;

    Ok(extract_record(&obj))
}

/// Compatibility boundary: any failure at all, including IO, collapses to
/// `false`. Callers that want diagnostics use [`classify`] directly.
pub fn is_dicom(path: &Path) -> bool {
    classify(path).is_ok()
}
