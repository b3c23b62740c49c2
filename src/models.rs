//
// models.rs
// dicom-curator
//
// Data structures shared across the pipeline: the per-instance metadata
// record and the series grouping key used by the gallery.
//

use serde::{Deserialize, Serialize};

/// Sentinel shown wherever an optional attribute is absent from the source.
pub const ABSENT: &str = "N/A";

/// Metadata subset carried for every curated DICOM instance. Every field is
/// optional; absence is decided once at parse time and rendered as [`ABSENT`]
/// downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DicomRecord {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_date: Option<String>,
    pub modality: Option<String>,
    pub series_number: Option<i64>,
    pub series_description: Option<String>,
    pub instance_number: Option<i64>,
    pub slice_location: Option<f64>,
}

impl DicomRecord {
    /// Composite ordering key: series number, then slice location, then
    /// instance number, each ascending with absent values last.
    pub fn sort_key(&self) -> (i64, f64, i64) {
        (
            self.series_number.unwrap_or(i64::MAX),
            self.slice_location.unwrap_or(f64::INFINITY),
            self.instance_number.unwrap_or(i64::MAX),
        )
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            number: self.series_number,
            description: self.series_description.clone(),
        }
    }
}

/// Grouping key for gallery sections. Used only for presentation ordering,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub number: Option<i64>,
    pub description: Option<String>,
}

impl SeriesKey {
    pub fn label(&self) -> String {
        let number = self
            .number
            .map_or_else(|| ABSENT.to_string(), |n| n.to_string());
        match self.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("Series {} - {}", number, desc),
            _ => format!("Series {}", number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sort_fields_order_last() {
        let complete = DicomRecord {
            series_number: Some(2),
            slice_location: Some(10.5),
            instance_number: Some(1),
            ..Default::default()
        };
        let missing_slice = DicomRecord {
            series_number: Some(2),
            slice_location: None,
            instance_number: Some(1),
            ..Default::default()
        };
        assert!(complete.sort_key() < missing_slice.sort_key());
    }

    #[test]
    fn series_label_includes_description_when_present() {
        let key = SeriesKey {
            number: Some(3),
            description: Some("AX T2".into()),
        };
        assert_eq!(key.label(), "Series 3 - AX T2");

        let bare = SeriesKey {
            number: None,
            description: None,
        };
        assert_eq!(bare.label(), "Series N/A");
    }
}
