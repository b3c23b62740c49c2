//
// gallery.rs
// dicom-curator
//
// Builds the static series-grouped gallery over the converted PNG artifacts.
// The document is fully self-contained (inline CSS, no external fetches) so
// it renders from a plain filesystem path.
//

use std::fs;
use std::path::{Path, PathBuf};

use maud::{html, Markup, DOCTYPE};
use tracing::{debug, info};

use crate::convert::sanitize_filename;
use crate::error::CurateError;
use crate::models::{DicomRecord, SeriesKey};

const CSS_STATIC: &str = include_str!("../static/gallery.css");

struct GalleryItem {
    image: String,
    record: DicomRecord,
}

fn artifact_name_for(dicom_path: &Path) -> Option<String> {
    let stem = dicom_path.file_stem()?.to_str()?;
    let sanitized = sanitize_filename(stem);
    if sanitized.is_empty() {
        None
    } else {
        Some(format!("{}.png", sanitized))
    }
}

/// Sort by (series number, slice location, instance number), ascending,
/// absent values last. This ordering is what produces a coherent anatomical
/// scroll order within a series.
fn sort_items(items: &mut [GalleryItem]) {
    items.sort_by(|a, b| {
        let ka = a.record.sort_key();
        let kb = b.record.sort_key();
        ka.0.cmp(&kb.0)
            .then(ka.1.total_cmp(&kb.1))
            .then(ka.2.cmp(&kb.2))
            .then_with(|| a.image.cmp(&b.image))
    });
}

/// Group already-sorted items by series key, preserving the established
/// order both across and within groups.
fn group_items(items: Vec<GalleryItem>) -> Vec<(SeriesKey, Vec<GalleryItem>)> {
    let mut groups: Vec<(SeriesKey, Vec<GalleryItem>)> = Vec::new();
    for item in items {
        let key = item.record.series_key();
        match groups.last_mut() {
            Some((last, members)) if *last == key => members.push(item),
            _ => groups.push((key, vec![item])),
        }
    }
    groups
}

fn caption(item: &GalleryItem) -> String {
    let mut parts = Vec::new();
    if let Some(modality) = &item.record.modality {
        parts.push(modality.clone());
    }
    if let Some(instance) = item.record.instance_number {
        parts.push(format!("Instance {}", instance));
    }
    if let Some(slice) = item.record.slice_location {
        parts.push(format!("Slice {}", slice));
    }
    if parts.is_empty() {
        item.image.clone()
    } else {
        parts.join(" | ")
    }
}

fn render(groups: &[(SeriesKey, Vec<GalleryItem>)], total: usize) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "DICOM Gallery" }
                style { (CSS_STATIC) }
            }
            body {
                header {
                    h1 { "DICOM Gallery" }
                    p.summary { (total) " image(s) in " (groups.len()) " series" }
                }
                @for (key, items) in groups {
                    section.series {
                        h2 { (key.label()) }
                        div.grid {
                            @for item in items {
                                figure {
                                    a href=(item.image) {
                                        img src=(item.image) alt=(item.image) loading="lazy";
                                    }
                                    figcaption { (caption(item)) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Build `index.html` inside `export_dir` over every source record whose PNG
/// artifact is present there. Returns the index path.
pub fn build_index(
    export_dir: &Path,
    sources: &[(PathBuf, DicomRecord)],
) -> Result<PathBuf, CurateError> {
    let mut items = Vec::new();
    for (dicom_path, record) in sources {
        let Some(image) = artifact_name_for(dicom_path) else {
            continue;
        };
        if export_dir.join(&image).is_file() {
            items.push(GalleryItem {
                image,
                record: record.clone(),
            });
        } else {
            debug!(source = %dicom_path.display(), "no artifact for source; excluded from index");
        }
    }

    sort_items(&mut items);
    let total = items.len();
    let groups = group_items(items);

    let index_path = export_dir.join("index.html");
    fs::write(&index_path, render(&groups, total).into_string())
        .map_err(|e| CurateError::io(&index_path, e))?;
    info!(index = %index_path.display(), images = total, "gallery index written");
    Ok(index_path)
}
