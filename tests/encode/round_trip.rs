//! Serialize, read back, compare: every uncompressed syntax must preserve
//! the attributes and pixels the record produced.

use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_pixeldata::PixelDecoder;
use part10::UncompressedSyntax;

use vlphoto::code_table::{CodeEntry, CodeTable, ViewDefinition};
use vlphoto::models::{to_dataset, ClinicalImageRecord, Metadata};
use vlphoto::pixel::{ColorMode, DecodedImage, ImageDecoder, PixelError};
use vlphoto::{Engine, EngineSettings, ImageInput};

struct Gradient;

impl ImageDecoder for Gradient {
    fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage, PixelError> {
        let (width, height) = (6u32, 3u32);
        let pixels = (0..width * height * 3).map(|i| (i * 7 % 251) as u8).collect();
        Ok(DecodedImage {
            width,
            height,
            mode: ColorMode::Rgb,
            pixels,
        })
    }
}

fn engine(syntax: UncompressedSyntax) -> Engine {
    let mut codes = CodeTable::new();
    codes.insert_view(
        ViewDefinition::new("EV02")
            .with_column("ImageComments", "Profile")
            .with_column("ViewCodeSequence", "Lateral")
            .with_column("AnatomicRegionSequence", "Face")
            .with_column("AnatomicRegionModifierSequence", "Right"),
    );
    codes.insert_code("Lateral", CodeEntry::new("R-10236", "SRT", "Right lateral"));
    codes.insert_code("Face", CodeEntry::new("T-D1200", "SRT", "Face"));
    codes.insert_code("Right", CodeEntry::new("G-A100", "SRT", "Right"));
    codes.insert_code("EV02", CodeEntry::new("EV02", "99OPOR", "Extraoral, Right Profile"));

    let settings = EngineSettings {
        syntax,
        ..EngineSettings::default()
    };
    Engine::new(Arc::new(codes), Arc::new(Gradient), settings)
}

fn record(engine: &Engine) -> ClinicalImageRecord {
    let meta: Metadata = [
        ("image_type", "EV02"),
        ("patient_firstname", "Ada"),
        ("patient_lastname", "Lovelace"),
        ("patient_id", "AL-1815"),
        ("study_description", "Records"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let at = FixedOffset::east_opt(5 * 3600 + 1800)
        .unwrap()
        .with_ymd_and_hms(2022, 6, 30, 23, 59, 1)
        .unwrap();
    engine
        .build_record(&ImageInput::new(b"not read", &meta).captured_at(at))
        .unwrap()
}

const COMPARED: [Tag; 20] = [
    tags::SOP_CLASS_UID,
    tags::SOP_INSTANCE_UID,
    tags::STUDY_INSTANCE_UID,
    tags::SERIES_INSTANCE_UID,
    tags::MODALITY,
    tags::IMAGE_TYPE,
    tags::PATIENT_NAME,
    tags::PATIENT_ID,
    tags::STUDY_DATE,
    tags::STUDY_TIME,
    tags::ACQUISITION_DATE_TIME,
    tags::TIMEZONE_OFFSET_FROM_UTC,
    tags::IMAGE_COMMENTS,
    tags::STUDY_DESCRIPTION,
    tags::ROWS,
    tags::COLUMNS,
    tags::SAMPLES_PER_PIXEL,
    tags::PHOTOMETRIC_INTERPRETATION,
    tags::BITS_STORED,
    tags::BURNED_IN_ANNOTATION,
];

fn assert_same(expected: &InMemDicomObject, actual: &InMemDicomObject) {
    for tag in COMPARED {
        let want = expected.element(tag).unwrap().to_str().unwrap();
        let got = actual.element(tag).unwrap().to_str().unwrap();
        assert_eq!(
            want.trim_end_matches(['\0', ' ']),
            got.trim_end_matches(['\0', ' ']),
            "{}",
            tag
        );
    }

    let pixels = |obj: &InMemDicomObject| obj.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap().to_vec();
    assert_eq!(pixels(expected), pixels(actual));

    let region = |obj: &InMemDicomObject| {
        let items = obj.element(tags::ANATOMIC_REGION_SEQUENCE).unwrap().items().unwrap().to_vec();
        let nested = items[0]
            .element(tags::ANATOMIC_REGION_MODIFIER_SEQUENCE)
            .unwrap()
            .items()
            .unwrap()
            .len();
        (items.len(), nested)
    };
    assert_eq!(region(expected), region(actual));
    assert_eq!(region(actual), (1, 1));

    let view = actual.element(tags::VIEW_CODE_SEQUENCE).unwrap().items().unwrap();
    assert_eq!(view.len(), 2);
}

fn round_trip(syntax: UncompressedSyntax) {
    let engine = engine(syntax);
    let record = record(&engine);
    let expected = to_dataset(&record).unwrap();

    let bytes = engine.serialize(&record).unwrap();
    assert_eq!(&bytes[128..132], b"DICM");
    let back = part10::read_part10_bytes(&bytes).unwrap();
    assert_eq!(
        back.meta().transfer_syntax().trim_end_matches('\0'),
        syntax.uid()
    );
    assert_same(&expected, &back);
}

#[test]
fn implicit_vr_little_endian() {
    round_trip(UncompressedSyntax::ImplicitVrLittleEndian);
}

#[test]
fn explicit_vr_little_endian() {
    round_trip(UncompressedSyntax::ExplicitVrLittleEndian);
}

#[test]
fn explicit_vr_big_endian() {
    round_trip(UncompressedSyntax::ExplicitVrBigEndian);
}

#[test]
fn native_pixels_decode_to_the_source_samples() {
    let engine = engine(UncompressedSyntax::ExplicitVrLittleEndian);
    let bytes = engine.serialize(&record(&engine)).unwrap();
    let back = part10::read_part10_bytes(&bytes).unwrap();

    let decoded = back.decode_pixel_data().unwrap();
    assert_eq!(decoded.rows(), 3);
    assert_eq!(decoded.columns(), 6);
    assert_eq!(decoded.samples_per_pixel(), 3);
    let source = Gradient.decode(&[]).unwrap().pixels;
    assert_eq!(decoded.data(), source.as_slice());
}
