//! EV01 coded against the fixture tables must produce exactly these triples.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use image::{ImageOutputFormat, Rgb, RgbImage};

use vlphoto::code_table::CodeTable;
use vlphoto::models::{code_item_from_dataset, to_dataset, Metadata};
use vlphoto::pixel::ImageCrateDecoder;
use vlphoto::{Engine, EngineSettings, ImageInput};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn png() -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 8, Rgb([180, 120, 90]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn ev01_dataset() -> InMemDicomObject {
    let codes = CodeTable::from_csv_files(&fixture("views.csv"), &fixture("codes.csv")).unwrap();
    let engine = Engine::new(
        Arc::new(codes),
        Arc::new(ImageCrateDecoder),
        EngineSettings::default(),
    );
    let mut meta = Metadata::new();
    meta.insert("image_type".into(), "EV-01".into());
    meta.insert("patient_id".into(), "P-1".into());

    let at = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 31, 10, 15, 30)
        .unwrap();
    let bytes = png();
    let record = engine
        .build_record(&ImageInput::new(&bytes, &meta).captured_at(at))
        .unwrap();
    to_dataset(&record).unwrap()
}

fn triples(obj: &InMemDicomObject, tag: dicom_core::Tag) -> Vec<(String, String, String)> {
    obj.element(tag)
        .unwrap()
        .items()
        .unwrap()
        .iter()
        .map(|item| {
            let code = code_item_from_dataset(item).unwrap();
            let (v, s, m) = code.triple();
            (v.to_string(), s.to_string(), m.to_string())
        })
        .collect()
}

fn t(v: &str, s: &str, m: &str) -> (String, String, String) {
    (v.to_string(), s.to_string(), m.to_string())
}

fn text(obj: &InMemDicomObject, tag: dicom_core::Tag) -> String {
    obj.element(tag).unwrap().to_str().unwrap().trim().to_string()
}

#[test]
fn ev01_device_and_anatomy() {
    let obj = ev01_dataset();
    assert_eq!(
        triples(&obj, tags::DEVICE_SEQUENCE),
        vec![t("A-00FBE", "SRT", "Camera")]
    );
    assert_eq!(
        triples(&obj, tags::ANATOMIC_REGION_SEQUENCE),
        vec![t("T-D1200", "SRT", "Face")]
    );
    assert!(obj.element(tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE).is_err());
}

#[test]
fn ev01_view_code_carries_private_marker_last() {
    let obj = ev01_dataset();
    assert_eq!(
        triples(&obj, tags::VIEW_CODE_SEQUENCE),
        vec![
            t("R-1025A", "SRT", "Frontal"),
            t(
                "EV01",
                "99OPOR",
                "Extraoral, Full Face, Full Smile, Centric Occlusion"
            ),
        ]
    );

    let items = obj.element(tags::VIEW_CODE_SEQUENCE).unwrap().items().unwrap();
    let marker = code_item_from_dataset(&items[1]).unwrap();
    let ext = marker.private().unwrap();
    assert_eq!(ext.context_identifier, "4063");
    assert!(ext.extension_flag);
    assert!(code_item_from_dataset(&items[0]).unwrap().private().is_none());
}

#[test]
fn ev01_acquisition_context() {
    let obj = ev01_dataset();
    let items = obj
        .element(tags::ACQUISITION_CONTEXT_SEQUENCE)
        .unwrap()
        .items()
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(text(&items[0], tags::VALUE_TYPE), "CODE");
    assert_eq!(
        triples(&items[0], tags::CONCEPT_NAME_CODE_SEQUENCE),
        vec![t("OPOR-PT", "99OPOR", "Type of photography")]
    );
    assert_eq!(
        triples(&items[0], tags::CONCEPT_CODE_SEQUENCE),
        vec![t("OPOR-CP", "99OPOR", "Clinical photograph")]
    );
}

#[test]
fn ev01_view_attributes() {
    let obj = ev01_dataset();
    assert_eq!(
        text(&obj, tags::IMAGE_COMMENTS),
        "EV01^Extraoral Full Face Portrait"
    );
    assert_eq!(text(&obj, tags::SERIES_DESCRIPTION), "Extraoral photographs");
    assert_eq!(
        obj.element(tags::PATIENT_ORIENTATION).unwrap().to_multi_str().unwrap().to_vec(),
        vec!["A".to_string(), "F".to_string()]
    );
    assert!(obj.element(tags::IMAGE_LATERALITY).is_err());
}
