use image::DynamicImage;

use super::{ColorMode, PixelError};

/// Decoded pixels: row-major, samples interleaved (R1,G1,B1,R2,...).
/// Bilevel images carry one byte per pixel, zero for black.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub mode: ColorMode,
    pub pixels: Vec<u8>,
}

/// The image decoding capability the encoder relies on
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PixelError>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PixelError> {
        let img = image::load_from_memory(bytes).map_err(|e| PixelError::Decode(e.to_string()))?;
        let (width, height) = (img.width(), img.height());

        let (mode, pixels) = match img {
            DynamicImage::ImageLuma8(buf) => (ColorMode::Gray8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (ColorMode::Rgb, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (ColorMode::Rgba, buf.into_raw()),
            DynamicImage::ImageLuma16(buf) => (
                ColorMode::Int32,
                buf.into_raw()
                    .into_iter()
                    .flat_map(|v| i32::from(v).to_le_bytes())
                    .collect(),
            ),
            DynamicImage::ImageRgb32F(buf) => (
                ColorMode::Float32,
                buf.into_raw().into_iter().flat_map(f32::to_le_bytes).collect(),
            ),
            DynamicImage::ImageLumaA8(_) => return Err(PixelError::UnsupportedMode("LA".to_string())),
            other => {
                return Err(PixelError::UnsupportedMode(format!("{:?}", other.color())));
            }
        };

        Ok(DecodedImage {
            width,
            height,
            mode,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decodes_rgb_png() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(1, 0, Rgb([10, 20, 30]));
        let decoded = ImageCrateDecoder
            .decode(&png_bytes(DynamicImage::ImageRgb8(img)))
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.mode, ColorMode::Rgb);
        assert_eq!(decoded.pixels.len(), 18);
        // second pixel of the first row
        assert_eq!(&decoded.pixels[3..6], &[10, 20, 30]);
    }

    #[test]
    fn test_reports_rgba() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let decoded = ImageCrateDecoder
            .decode(&png_bytes(DynamicImage::ImageRgba8(img)))
            .unwrap();
        assert_eq!(decoded.mode, ColorMode::Rgba);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            ImageCrateDecoder.decode(b"definitely not an image"),
            Err(PixelError::Decode(_))
        ));
    }
}
