use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};

use super::{
    checked_dimensions, jpeg2000_dimensions, CompressionMethod, Photometric, PixelAttributes,
    PixelBlock, PixelData, PixelError, PixelSyntax,
};

/// Encapsulated fragments must have even length; a JPEG or JPEG 2000
/// stream ends at its EOC/EOI marker so a trailing zero is ignored by
/// decoders.
fn fragment(bytes: Vec<u8>) -> Vec<u8> {
    let mut bytes = bytes;
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn jpeg_dimensions(bytes: &[u8]) -> Result<(u32, u32), PixelError> {
    image::io::Reader::with_format(Cursor::new(bytes), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| PixelError::Decode(e.to_string()))
}

fn recompress(bytes: &[u8], quality: u8) -> Result<(Vec<u8>, u32, u32), PixelError> {
    let rgb = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| PixelError::Decode(e.to_string()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| PixelError::Recompress(e.to_string()))?;
    tracing::info!(
        "Recompressed JPEG at quality {}: {} -> {} bytes",
        quality,
        bytes.len(),
        out.len()
    );
    Ok((out, width, height))
}

/// JPEG strategy. By default the original stream is carried unchanged;
/// `recompress_quality` re-encodes it first.
pub fn encode_jpeg(bytes: &[u8], recompress_quality: Option<u8>) -> Result<PixelBlock, PixelError> {
    let (stream, width, height) = match recompress_quality {
        Some(quality) => recompress(bytes, quality)?,
        None => {
            let (width, height) = jpeg_dimensions(bytes)?;
            (bytes.to_vec(), width, height)
        }
    };
    let (rows, columns) = checked_dimensions(width, height)?;

    Ok(PixelBlock {
        attributes: PixelAttributes {
            rows,
            columns,
            samples_per_pixel: 3,
            photometric: Photometric::YbrFull422,
            planar_configuration: Some(0),
            bits_allocated: 8,
            bits_stored: 8,
            high_bit: 7,
            lossy: Some(CompressionMethod::Iso10918_1),
            compression: Some(CompressionMethod::Iso10918_1),
        },
        data: PixelData::Encapsulated(vec![fragment(stream)]),
        syntax: PixelSyntax::JpegBaseline,
    })
}

/// JPEG 2000 strategy; the stream is always carried unchanged
pub fn encode_jpeg2000(bytes: &[u8]) -> Result<PixelBlock, PixelError> {
    let header = jpeg2000_dimensions(bytes)?;
    let (rows, columns) = checked_dimensions(header.width, header.height)?;
    let bits_stored = u16::from(header.precision);
    let bits_allocated = if bits_stored <= 8 { 8 } else { 16 };

    let (samples_per_pixel, photometric, planar_configuration) = match header.components {
        1 => (1, Photometric::Monochrome2, None),
        3 => (3, Photometric::Rgb, Some(0)),
        n => {
            return Err(PixelError::UnsupportedMode(format!(
                "JPEG 2000 with {} components",
                n
            )))
        }
    };

    Ok(PixelBlock {
        attributes: PixelAttributes {
            rows,
            columns,
            samples_per_pixel,
            photometric,
            planar_configuration,
            bits_allocated,
            bits_stored,
            high_bit: bits_stored - 1,
            lossy: None,
            compression: Some(CompressionMethod::Iso15444_1),
        },
        data: PixelData::Encapsulated(vec![fragment(bytes.to_vec())]),
        syntax: PixelSyntax::Jpeg2000,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::j2k::tests::codestream;
    use image::{Rgb, RgbImage};

    pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode(img.as_raw(), width, height, ColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_jpeg_passthrough_keeps_bytes() {
        let jpeg = sample_jpeg(64, 48);
        let block = encode_jpeg(&jpeg, None).unwrap();
        let attrs = block.attributes();
        assert_eq!((attrs.rows(), attrs.columns()), (48, 64));
        assert_eq!(attrs.photometric(), Photometric::YbrFull422);
        assert_eq!(attrs.samples_per_pixel(), 3);
        assert_eq!(attrs.planar_configuration(), Some(0));
        assert_eq!(attrs.lossy_image_compression(), Some("01"));
        assert_eq!(attrs.compression_method(), Some(CompressionMethod::Iso10918_1));
        assert_eq!(block.syntax(), PixelSyntax::JpegBaseline);

        match block.data() {
            PixelData::Encapsulated(fragments) => {
                assert_eq!(fragments.len(), 1);
                assert_eq!(&fragments[0][..jpeg.len()], jpeg.as_slice());
                assert!(fragments[0].len() - jpeg.len() <= 1);
                assert_eq!(fragments[0].len() % 2, 0);
            }
            other => panic!("expected fragments, got {:?}", other),
        }
    }

    #[test]
    fn test_jpeg_recompress_changes_bytes() {
        let jpeg = sample_jpeg(64, 48);
        let block = encode_jpeg(&jpeg, Some(20)).unwrap();
        assert_eq!(block.attributes().columns(), 64);
        match block.data() {
            PixelData::Encapsulated(fragments) => {
                assert_ne!(fragments[0], fragment(jpeg));
                assert!(fragments[0].starts_with(&[0xFF, 0xD8]));
            }
            other => panic!("expected fragments, got {:?}", other),
        }
    }

    #[test]
    fn test_jpeg2000_attributes() {
        let block = encode_jpeg2000(&codestream(300, 200, 3, 8)).unwrap();
        let attrs = block.attributes();
        assert_eq!((attrs.rows(), attrs.columns()), (200, 300));
        assert_eq!(attrs.photometric(), Photometric::Rgb);
        assert_eq!(attrs.lossy_image_compression(), Some("00"));
        assert!(!attrs.is_lossy());
        assert_eq!(attrs.compression_method(), Some(CompressionMethod::Iso15444_1));
        assert_eq!(block.syntax(), PixelSyntax::Jpeg2000);
        assert_eq!(attrs.malformed_reason(), None);
    }

    #[test]
    fn test_jpeg2000_gray_has_no_planar_configuration() {
        let block = encode_jpeg2000(&codestream(10, 10, 1, 12)).unwrap();
        let attrs = block.attributes();
        assert_eq!(attrs.samples_per_pixel(), 1);
        assert_eq!(attrs.planar_configuration(), None);
        assert_eq!(attrs.bits_allocated(), 16);
        assert_eq!(attrs.high_bit(), 11);
    }

    #[test]
    fn test_jpeg2000_rejects_other_component_counts() {
        for components in [2, 4] {
            match encode_jpeg2000(&codestream(16, 16, components, 8)) {
                Err(PixelError::UnsupportedMode(msg)) => {
                    assert!(msg.contains(&components.to_string()))
                }
                other => panic!("{} components: {:?}", components, other.map(|b| b.syntax())),
            }
        }
    }
}
