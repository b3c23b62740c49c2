//
// convert.rs
// dicom-curator
//
// Renders a DICOM instance's pixel data into an annotated PNG preview: full
// pixel decode, per-image min-max normalization to 8-bit, three-channel
// output, and a burned-in metadata overlay. Every failure is logged and
// reported as "no artifact produced"; conversion never aborts the run.
//

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use dicom::object::open_file;
use dicom::pixeldata::PixelDecoder;
use dicom_pixeldata::{ConvertOptions, VoiLutOption};
use image::Rgb;
use imageproc::drawing::draw_text_mut;
use tracing::{debug, warn};

use crate::metadata::extract_record;
use crate::models::DicomRecord;

/// System font candidates tried in order for the overlay text.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const OVERLAY_SCALE: f32 = 14.0;
const OVERLAY_MARGIN: i32 = 8;
const OVERLAY_LINE_HEIGHT: i32 = 16;
const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Walk the candidate list and load the first font that parses. Absence of
/// every candidate disables the overlay; it is never fatal.
pub fn load_overlay_font() -> Option<FontVec> {
    for candidate in FONT_CANDIDATES {
        let Ok(bytes) = fs::read(candidate) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                debug!(font = candidate, "loaded overlay font");
                return Some(font);
            }
            Err(e) => debug!(font = candidate, error = %e, "font candidate failed to parse"),
        }
    }
    warn!("no overlay font available; previews will be rendered without annotations");
    None
}

/// Fixed ordered overlay lines, one per metadata field present on the source.
fn overlay_lines(record: &DicomRecord) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = &record.patient_name {
        lines.push(format!("Patient: {}", name));
    }
    if let Some(id) = &record.patient_id {
        lines.push(format!("ID: {}", id));
    }
    if let Some(date) = &record.study_date {
        lines.push(format!("Study Date: {}", date));
    }
    if let Some(series) = record.series_number {
        lines.push(format!("Series: {}", series));
    }
    if let Some(modality) = &record.modality {
        lines.push(format!("Modality: {}", modality));
    }
    if let Some(slice) = record.slice_location {
        lines.push(format!("Slice: {}", slice));
    }
    if let Some(instance) = record.instance_number {
        lines.push(format!("Instance: {}", instance));
    }
    lines
}

/// Keep only characters that are safe in a filename on every platform the
/// exports travel to.
pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect()
}

fn artifact_path(input: &Path, export_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_filename)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "dicom".to_string());
    export_dir.join(format!("{}.png", stem))
}

/// Convert one DICOM file into an annotated PNG under `export_dir`. Returns
/// the artifact path, or `None` when the file has no renderable pixel data or
/// any step of the rendering fails.
pub fn convert(input: &Path, export_dir: &Path, font: Option<&FontVec>) -> Option<PathBuf> {
    let obj = match open_file(input) {
        Ok(obj) => obj,
        Err(e) => {
            warn!(file = %input.display(), error = %e, "cannot open file for conversion");
            return None;
        }
    };
    let record = extract_record(&obj);

    let decoded = match obj.decode_pixel_data() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(file = %input.display(), error = %e, "no decodable pixel data; skipping");
            return None;
        }
    };

    // Per-image min-max rescale of observed sample values to [0, 255]; this
    // is deliberately not a DICOM windowing transform.
    let options = ConvertOptions::new()
        .with_voi_lut(VoiLutOption::Normalize)
        .force_8bit();
    let rendered = match decoded.to_dynamic_image_with_options(0, &options) {
        Ok(img) => img,
        Err(e) => {
            warn!(file = %input.display(), error = %e, "pixel data rendering failed; skipping");
            return None;
        }
    };

    // Three channels so the overlay text can be colored.
    let mut canvas = rendered.to_rgb8();
    if let Some(font) = font {
        let scale = PxScale::from(OVERLAY_SCALE);
        for (idx, line) in overlay_lines(&record).iter().enumerate() {
            draw_text_mut(
                &mut canvas,
                OVERLAY_COLOR,
                OVERLAY_MARGIN,
                OVERLAY_MARGIN + idx as i32 * OVERLAY_LINE_HEIGHT,
                scale,
                font,
                line,
            );
        }
    }

    let output = artifact_path(input, export_dir);
    if let Err(e) = canvas.save(&output) {
        warn!(file = %output.display(), error = %e, "failed to write PNG artifact");
        return None;
    }
    debug!(file = %output.display(), "wrote PNG artifact");
    Some(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_lines_follow_fixed_order_and_skip_absent_fields() {
        let record = DicomRecord {
            patient_name: Some("Doe^Jane".into()),
            modality: Some("MR".into()),
            instance_number: Some(7),
            ..Default::default()
        };
        assert_eq!(
            overlay_lines(&record),
            vec!["Patient: Doe^Jane", "Modality: MR", "Instance: 7"]
        );
    }

    #[test]
    fn sanitize_strips_path_hostile_characters() {
        assert_eq!(sanitize_filename("../weird name 123.dcm"), "..weirdname123.dcm");
        assert_eq!(sanitize_filename("IM_0001"), "IM_0001");
    }

    #[test]
    fn artifact_path_is_deterministic_from_the_source_stem() {
        let path = artifact_path(Path::new("/tmp/out/IM 0001.dcm"), Path::new("/tmp/export"));
        assert_eq!(path, PathBuf::from("/tmp/export/IM0001.png"));
    }
}
