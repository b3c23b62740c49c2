//
// curation_workflows.rs
// dicom-curator
//
// Integration-style tests covering archive curation end to end: validity
// filtering, collision-safe placement, idempotent re-runs, incremental PNG
// catch-up, and gallery index content.
//

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use dicom_curator::archive::{temp_extraction_dir, ArchiveKind};
use dicom_curator::{curate, CurateError, CurateRequest};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

/// Instance-level knobs for fixture files; everything else is fixed.
struct Fixture {
    patient: &'static str,
    series: i64,
    series_desc: &'static str,
    instance: i64,
    slice: f64,
}

fn write_test_dicom(path: &Path, fixture: &Fixture) {
    // Tiny Secondary Capture instance with predictable 2x2 pixel values.
    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        Tag(0x0010, 0x0010),
        VR::PN,
        PrimitiveValue::from(fixture.patient),
    ));
    obj.put(DataElement::new(
        Tag(0x0010, 0x0020),
        VR::LO,
        PrimitiveValue::from("PAT123"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0020),
        VR::DA,
        PrimitiveValue::from("20240101"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0060),
        VR::CS,
        PrimitiveValue::from("OT"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0016),
        VR::UI,
        PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.7"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0018),
        VR::UI,
        PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.1"),
    ));
    obj.put(DataElement::new(
        Tag(0x0020, 0x0011),
        VR::IS,
        PrimitiveValue::from(fixture.series.to_string()),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x103E),
        VR::LO,
        PrimitiveValue::from(fixture.series_desc),
    ));
    obj.put(DataElement::new(
        Tag(0x0020, 0x0013),
        VR::IS,
        PrimitiveValue::from(fixture.instance.to_string()),
    ));
    obj.put(DataElement::new(
        Tag(0x0020, 0x1041),
        VR::DS,
        PrimitiveValue::from(fixture.slice.to_string()),
    ));

    obj.put(DataElement::new(
        Tag(0x0028, 0x0010),
        VR::US,
        PrimitiveValue::from(2_u16),
    )); // Rows
    obj.put(DataElement::new(
        Tag(0x0028, 0x0011),
        VR::US,
        PrimitiveValue::from(2_u16),
    )); // Columns
    obj.put(DataElement::new(
        Tag(0x0028, 0x0002),
        VR::US,
        PrimitiveValue::from(1_u16),
    )); // Samples per pixel
    obj.put(DataElement::new(
        Tag(0x0028, 0x0100),
        VR::US,
        PrimitiveValue::from(8_u16),
    )); // Bits Allocated
    obj.put(DataElement::new(
        Tag(0x0028, 0x0101),
        VR::US,
        PrimitiveValue::from(8_u16),
    )); // Bits Stored
    obj.put(DataElement::new(
        Tag(0x0028, 0x0102),
        VR::US,
        PrimitiveValue::from(7_u16),
    )); // High Bit
    obj.put(DataElement::new(
        Tag(0x0028, 0x0103),
        VR::US,
        PrimitiveValue::from(0_u16),
    )); // Pixel Representation
    obj.put(DataElement::new(
        Tag(0x0028, 0x0004),
        VR::CS,
        PrimitiveValue::from("MONOCHROME2"),
    ));
    obj.put(DataElement::new(
        Tag(0x7FE0, 0x0010),
        VR::OB,
        PrimitiveValue::from(vec![0u8, 64, 128, 255]),
    ));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
        .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1")
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    file_obj.write_to_file(path).expect("write test dicom");
}

fn default_fixture() -> Fixture {
    Fixture {
        patient: "Test^Patient",
        series: 1,
        series_desc: "AX T1",
        instance: 1,
        slice: 0.0,
    }
}

/// Archive names must be unique per test: the extraction temp directory is a
/// pure function of the archive base name, shared under the system temp root.
fn unique_zip_path(dir: &Path, tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    dir.join(format!("{}_{}_{}.zip", tag, std::process::id(), nanos))
}

fn write_zip(path: &Path, entries: &[(&str, &Path)]) {
    let file = File::create(path).expect("create zip");
    let mut writer = zip::ZipWriter::new(file);
    for (name, source) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        let bytes = fs::read(source).expect("read entry source");
        writer.write_all(&bytes).expect("write entry");
    }
    writer.finish().expect("finish zip");
}

fn cleanup_temp_tree(zip_path: &Path) {
    let tmpdir = temp_extraction_dir(&std::env::temp_dir(), zip_path, ArchiveKind::Zip);
    let _ = fs::remove_dir_all(tmpdir);
}

#[test]
fn non_dicom_files_never_reach_the_output() {
    let dir = tempdir().expect("tempdir");
    let dicom = dir.path().join("img1.dcm");
    write_test_dicom(&dicom, &default_fixture());
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, b"not a dicom").expect("notes");

    let zip_path = unique_zip_path(dir.path(), "filter");
    write_zip(&zip_path, &[("img1.dcm", &dicom), ("notes.txt", &notes)]);

    let out_dir = dir.path().join("out");
    let curated = curate(&CurateRequest::new(&zip_path, &out_dir)).expect("curate");

    assert_eq!(curated.len(), 1);
    assert!(curated[0].ends_with("img1.dcm"));
    assert!(out_dir.join("img1.dcm").is_file());
    assert!(!out_dir.join("notes.txt").exists());

    cleanup_temp_tree(&zip_path);
}

#[test]
fn shared_basenames_get_distinct_output_names() {
    let dir = tempdir().expect("tempdir");
    let first = dir.path().join("first.dcm");
    write_test_dicom(&first, &default_fixture());
    let second = dir.path().join("second.dcm");
    write_test_dicom(
        &second,
        &Fixture {
            instance: 2,
            slice: 5.0,
            ..default_fixture()
        },
    );

    let zip_path = unique_zip_path(dir.path(), "collision");
    write_zip(
        &zip_path,
        &[("a/image.dcm", &first), ("b/image.dcm", &second)],
    );

    let out_dir = dir.path().join("out");
    let curated = curate(&CurateRequest::new(&zip_path, &out_dir)).expect("curate");

    assert_eq!(curated.len(), 2);
    assert!(out_dir.join("image.dcm").is_file());
    assert!(out_dir.join("image_1.dcm").is_file());

    cleanup_temp_tree(&zip_path);
}

#[test]
fn second_run_converges_without_duplicating_output() {
    let dir = tempdir().expect("tempdir");
    let dicom = dir.path().join("img1.dcm");
    write_test_dicom(&dicom, &default_fixture());

    let zip_path = unique_zip_path(dir.path(), "idempotent");
    write_zip(&zip_path, &[("img1.dcm", &dicom)]);

    let out_dir = dir.path().join("out");
    let request = CurateRequest::new(&zip_path, &out_dir);
    let first = curate(&request).expect("first run");
    let second = curate(&request).expect("second run");

    assert_eq!(first, second);
    let entries: Vec<_> = fs::read_dir(&out_dir)
        .expect("read out dir")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(entries.len(), 1);

    cleanup_temp_tree(&zip_path);
}

#[test]
fn empty_result_when_archive_has_no_dicom_content() {
    let dir = tempdir().expect("tempdir");
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, b"plain text").expect("notes");

    let zip_path = unique_zip_path(dir.path(), "empty");
    write_zip(&zip_path, &[("notes.txt", &notes)]);

    let out_dir = dir.path().join("out");
    let curated = curate(&CurateRequest::new(&zip_path, &out_dir)).expect("curate");
    assert!(curated.is_empty());

    cleanup_temp_tree(&zip_path);
}

#[test]
fn corrupt_archive_is_a_fatal_error_not_an_empty_result() {
    let dir = tempdir().expect("tempdir");
    let zip_path = unique_zip_path(dir.path(), "corrupt");
    fs::write(&zip_path, b"not a zip at all").expect("write");

    let out_dir = dir.path().join("out");
    let result = curate(&CurateRequest::new(&zip_path, &out_dir));
    assert!(matches!(result, Err(CurateError::Archive(_))));

    cleanup_temp_tree(&zip_path);
}

#[test]
fn png_catch_up_converts_only_missing_previews_and_rebuilds_index() {
    let dir = tempdir().expect("tempdir");

    // An output directory from a prior run: 3 curated files, no export dir.
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).expect("out dir");
    let fixtures = [
        ("a.dcm", 1, "AX T1", 1, 0.0),
        ("b.dcm", 1, "AX T1", 2, 5.0),
        ("c.dcm", 2, "SAG T2", 1, 0.0),
    ];
    for (name, series, desc, instance, slice) in fixtures {
        write_test_dicom(
            &out_dir.join(name),
            &Fixture {
                patient: "Test^Patient",
                series,
                series_desc: desc,
                instance,
                slice,
            },
        );
    }

    // The archive is never read on the short-circuit path, but must exist as
    // a request input.
    let dicom = dir.path().join("seed.dcm");
    write_test_dicom(&dicom, &default_fixture());
    let zip_path = unique_zip_path(dir.path(), "catchup");
    write_zip(&zip_path, &[("seed.dcm", &dicom)]);

    let request = CurateRequest {
        input: zip_path.clone(),
        out_dir: out_dir.clone(),
        overwrite: false,
        convert_to_png: true,
        png_export_dir: None,
    };
    let curated = curate(&request).expect("curate");
    assert_eq!(curated.len(), 3);

    let export = out_dir.join("export");
    for name in ["a.png", "b.png", "c.png"] {
        assert!(export.join(name).is_file(), "missing preview {name}");
    }
    assert!(!export.join("seed.png").exists(), "archive must not be read");

    let index = fs::read_to_string(export.join("index.html")).expect("index");
    for name in ["a.png", "b.png", "c.png"] {
        assert!(index.contains(name), "index missing {name}");
    }
    assert!(index.contains("AX T1"));
    assert!(index.contains("SAG T2"));

    // A second catch-up run converts nothing new and keeps the index.
    let before: Vec<_> = fs::read_dir(&export)
        .expect("read export")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    curate(&request).expect("second catch-up");
    let after: Vec<_> = fs::read_dir(&export)
        .expect("read export")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(before.len(), after.len());

    cleanup_temp_tree(&zip_path);
}

#[test]
fn fresh_run_with_png_produces_previews_and_index() {
    let dir = tempdir().expect("tempdir");
    let dicom = dir.path().join("scan.dcm");
    write_test_dicom(&dicom, &default_fixture());

    let zip_path = unique_zip_path(dir.path(), "freshpng");
    write_zip(&zip_path, &[("scan.dcm", &dicom)]);

    let out_dir = dir.path().join("out");
    let export_dir = dir.path().join("previews");
    let request = CurateRequest {
        input: zip_path.clone(),
        out_dir: out_dir.clone(),
        overwrite: false,
        convert_to_png: true,
        png_export_dir: Some(export_dir.clone()),
    };
    let curated = curate(&request).expect("curate");

    assert_eq!(curated.len(), 1);
    let png = export_dir.join("scan.png");
    assert!(png.is_file());
    let bytes = fs::read(&png).expect("png bytes");
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    assert!(export_dir.join("index.html").is_file());

    cleanup_temp_tree(&zip_path);
}
