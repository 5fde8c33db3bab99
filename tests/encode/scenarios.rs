use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use image::{ImageOutputFormat, Rgb, RgbImage};

use vlphoto::code_table::CodeTable;
use vlphoto::coding::CodeInjector;
use vlphoto::identity::IdentityManager;
use vlphoto::models::{
    code_item_from_dataset, to_dataset, ClinicalImageRecord, Metadata, PhotoSeries, PhotoStudy,
    SequenceRole,
};
use vlphoto::pixel::ImageCrateDecoder;
use vlphoto::{Engine, EngineSettings, ImageInput};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn codes() -> CodeTable {
    CodeTable::from_csv_files(&fixture("views.csv"), &fixture("codes.csv")).unwrap()
}

fn engine() -> Engine {
    Engine::new(
        Arc::new(codes()),
        Arc::new(ImageCrateDecoder),
        EngineSettings::default(),
    )
}

fn rgb_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn meta(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn captured() -> chrono::DateTime<FixedOffset> {
    FixedOffset::west_opt(4 * 3600)
        .unwrap()
        .with_ymd_and_hms(2023, 11, 2, 14, 0, 5)
        .unwrap()
}

fn text(obj: &InMemDicomObject, tag: dicom_core::Tag) -> String {
    obj.element(tag).unwrap().to_str().unwrap().trim().to_string()
}

fn int(obj: &InMemDicomObject, tag: dicom_core::Tag) -> u16 {
    obj.element(tag).unwrap().to_int::<u16>().unwrap()
}

#[test]
fn iv06_rgb_portrait_of_michael_jackson() {
    let bytes = rgb_png(512, 512);
    let m = meta(&[
        ("image_type", "IV06"),
        ("patient_firstname", "Michael"),
        ("patient_lastname", "Jackson"),
        ("patient_id", "MJ-1958"),
        ("patient_sex", "m"),
        ("patient_birthdate", "1958-08-29"),
    ]);
    let record = engine()
        .build_record(&ImageInput::new(&bytes, &m).captured_at(captured()))
        .unwrap();
    let obj = to_dataset(&record).unwrap();

    assert_eq!(text(&obj, tags::PATIENT_NAME), "Jackson^Michael");
    assert_eq!(text(&obj, tags::PATIENT_SEX), "M");
    assert_eq!(text(&obj, tags::PATIENT_BIRTH_DATE), "19580829");
    assert_eq!(int(&obj, tags::SAMPLES_PER_PIXEL), 3);
    assert_eq!(text(&obj, tags::PHOTOMETRIC_INTERPRETATION), "RGB");
    assert_eq!(int(&obj, tags::ROWS), 512);
    assert_eq!(int(&obj, tags::COLUMNS), 512);
    assert_eq!(int(&obj, tags::PLANAR_CONFIGURATION), 0);
    assert_eq!(int(&obj, tags::BITS_ALLOCATED), 8);

    let view = obj.element(tags::VIEW_CODE_SEQUENCE).unwrap().items().unwrap();
    assert!(!view.is_empty());
    assert_eq!(text(&obj, tags::IMAGE_LATERALITY), "R");
    assert_eq!(text(&obj, tags::TIMEZONE_OFFSET_FROM_UTC), "-0400");
}

#[test]
fn iv06_modifiers_nest_in_first_region_item() {
    let bytes = rgb_png(8, 8);
    let m = meta(&[("image_type", "IV06")]);
    let record = engine()
        .build_record(&ImageInput::new(&bytes, &m).captured_at(captured()))
        .unwrap();
    let obj = to_dataset(&record).unwrap();

    let region = obj.element(tags::ANATOMIC_REGION_SEQUENCE).unwrap().items().unwrap();
    assert_eq!(region.len(), 1);
    let modifiers: Vec<String> = region[0]
        .element(tags::ANATOMIC_REGION_MODIFIER_SEQUENCE)
        .unwrap()
        .items()
        .unwrap()
        .iter()
        .map(|item| code_item_from_dataset(item).unwrap().meaning().to_string())
        .collect();
    assert_eq!(modifiers, vec!["Right", "Buccal"]);

    let devices = obj.element(tags::DEVICE_SEQUENCE).unwrap().items().unwrap();
    assert_eq!(devices.len(), 2);
    let structures = obj
        .element(tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE)
        .unwrap()
        .items()
        .unwrap();
    assert_eq!(structures.len(), 2);
}

#[test]
fn unresolved_tokens_are_reported_and_skipped() {
    let table = codes();
    let ids = IdentityManager::default();
    let mut record = ClinicalImageRecord::new(ids.new_identity().unwrap(), captured());

    let report = CodeInjector::default().inject(&mut record, "IV-06", &table);
    assert!(report.view_found);
    assert!(!report.is_complete());
    assert_eq!(report.unresolved, vec!["UnknownToken".to_string()]);
    assert_eq!(record.acquisition_context.len(), 1);
}

#[test]
fn treatment_progress_adds_two_context_items() {
    let bytes = rgb_png(8, 8);
    let m = meta(&[
        ("image_type", "EV01"),
        ("treatment_event_type", "Debond"),
        ("days_after_event", "14"),
    ]);
    let record = engine()
        .build_record(&ImageInput::new(&bytes, &m).captured_at(captured()))
        .unwrap();
    let obj = to_dataset(&record).unwrap();

    let items = obj
        .element(tags::ACQUISITION_CONTEXT_SEQUENCE)
        .unwrap()
        .items()
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(text(&items[1], tags::VALUE_TYPE), "CODE");
    assert_eq!(text(&items[2], tags::VALUE_TYPE), "NUMERIC");
    assert_eq!(text(&items[2], tags::NUMERIC_VALUE), "14");
}

#[test]
fn worklist_order_fills_gaps_and_sets_study() {
    let bytes = rgb_png(8, 8);
    let m = meta(&[("image_type", "EV01"), ("patient_id", "LOCAL-1")]);
    let order: HashMap<String, String> = [
        ("AccessionNumber", "ACC-77"),
        ("PatientID", "MWL-1"),
        ("PatientName", "Doe^Jane"),
        ("StudyInstanceUID", "1.2.3.4.5"),
        ("RequestedProcedureDescription", "Ortho records"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let record = engine()
        .build_record(
            &ImageInput::new(&bytes, &m)
                .with_order(&order)
                .captured_at(captured()),
        )
        .unwrap();
    assert_eq!(record.identity.study.as_str(), "1.2.3.4.5");
    assert_eq!(record.patient.id, "LOCAL-1");
    assert_eq!(record.patient.name.to_dicom(), "Doe^Jane");

    let obj = to_dataset(&record).unwrap();
    assert_eq!(text(&obj, tags::ACCESSION_NUMBER), "ACC-77");
    assert_eq!(
        text(&obj, tags::PERFORMED_PROCEDURE_STEP_DESCRIPTION),
        "Ortho records"
    );
    let request = obj
        .element(tags::REQUEST_ATTRIBUTES_SEQUENCE)
        .unwrap()
        .items()
        .unwrap();
    assert_eq!(
        text(&request[0], tags::REQUESTED_PROCEDURE_DESCRIPTION),
        "Ortho records"
    );
}

#[test]
fn series_share_uids_within_a_study() {
    let engine = engine();
    let bytes = rgb_png(8, 8);
    let front = meta(&[("image_type", "EV01")]);
    let side = meta(&[("image_type", "IV06")]);

    let mut study = PhotoStudy::new(engine.identities()).unwrap();
    let series = study.add_series(
        PhotoSeries::new(engine.identities(), Some("Initial records".into())).unwrap(),
    );
    for m in [&front, &side] {
        series.push(engine.build_record(&ImageInput::new(&bytes, m)).unwrap());
    }

    let records: Vec<_> = study.records().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].identity.series, records[1].identity.series);
    assert_eq!(&records[0].identity.study, study.study_uid());
    assert_ne!(records[0].identity.sop_instance, records[1].identity.sop_instance);
    assert!(records
        .iter()
        .all(|r| r.series_description.as_deref() == Some("Initial records")));
    assert!(records[0].sequence(SequenceRole::ViewCode).is_some());
}
