//! Pixel encoding: decoded pixels or original compressed bytes in, a
//! [`PixelBlock`] out. The block's attribute set is produced by the same
//! strategy that produced its bytes and cannot be edited afterwards.

mod color_mode;
mod compressed;
mod decoder;
mod j2k;
mod raw;

use thiserror::Error;

pub use color_mode::{ColorMode, RawMode};
pub use compressed::{encode_jpeg, encode_jpeg2000};
pub use decoder::{DecodedImage, ImageCrateDecoder, ImageDecoder};
pub use j2k::jpeg2000_dimensions;
pub use raw::encode_raw;

#[derive(Debug, Error)]
pub enum PixelError {
    #[error("Unsupported color mode: {0}")]
    UnsupportedMode(String),

    #[error("Pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Image dimensions {width}x{height} are not representable")]
    Dimensions { width: u32, height: u32 },

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("JPEG 2000 header could not be parsed: {0}")]
    Jpeg2000Header(String),

    #[error("JPEG recompression failed: {0}")]
    Recompress(String),
}

/// Container format of the source bytes, sniffed from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Jpeg2000,
    /// Anything else the decoder understands (PNG, BMP, ...)
    Bitmap,
}

impl SourceFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        const JP2_SIGNATURE: [u8; 12] = [0, 0, 0, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A];
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            SourceFormat::Jpeg
        } else if bytes.starts_with(&[0xFF, 0x4F, 0xFF, 0x51]) || bytes.starts_with(&JP2_SIGNATURE) {
            SourceFormat::Jpeg2000
        } else {
            SourceFormat::Bitmap
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Photometric {
    Monochrome2,
    Rgb,
    YbrFull422,
}

impl Photometric {
    pub fn as_str(self) -> &'static str {
        match self {
            Photometric::Monochrome2 => "MONOCHROME2",
            Photometric::Rgb => "RGB",
            Photometric::YbrFull422 => "YBR_FULL_422",
        }
    }
}

/// Lossy Image Compression Method (0028,2114) values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Iso10918_1,
    Iso15444_1,
}

impl CompressionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionMethod::Iso10918_1 => "ISO_10918_1",
            CompressionMethod::Iso15444_1 => "ISO_15444_1",
        }
    }
}

/// Transfer syntax the pixel data forces on the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelSyntax {
    /// Uncompressed; the caller picks the byte order and VR encoding
    Native,
    JpegBaseline,
    Jpeg2000,
}

impl PixelSyntax {
    /// Fixed transfer syntax UID for encapsulated data
    pub fn encapsulated_uid(self) -> Option<&'static str> {
        match self {
            PixelSyntax::Native => None,
            PixelSyntax::JpegBaseline => Some("1.2.840.10008.1.2.4.50"),
            PixelSyntax::Jpeg2000 => Some("1.2.840.10008.1.2.4.91"),
        }
    }
}

/// Image Pixel module attributes, set only by the encoding strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelAttributes {
    rows: u16,
    columns: u16,
    samples_per_pixel: u16,
    photometric: Photometric,
    planar_configuration: Option<u16>,
    bits_allocated: u16,
    bits_stored: u16,
    high_bit: u16,
    lossy: Option<CompressionMethod>,
    compression: Option<CompressionMethod>,
}

impl PixelAttributes {
    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn photometric(&self) -> Photometric {
        self.photometric
    }

    /// Present exactly when more than one sample per pixel
    pub fn planar_configuration(&self) -> Option<u16> {
        self.planar_configuration
    }

    pub fn bits_allocated(&self) -> u16 {
        self.bits_allocated
    }

    pub fn bits_stored(&self) -> u16 {
        self.bits_stored
    }

    pub fn high_bit(&self) -> u16 {
        self.high_bit
    }

    /// Lossy Image Compression (0028,2110): "01" or "00" when compressed
    pub fn lossy_image_compression(&self) -> Option<&'static str> {
        self.compression
            .map(|_| if self.lossy.is_some() { "01" } else { "00" })
    }

    pub fn compression_method(&self) -> Option<CompressionMethod> {
        self.compression
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy.is_some()
    }

    /// Combinations no strategy produces and no reader would accept
    pub fn malformed_reason(&self) -> Option<&'static str> {
        match (self.samples_per_pixel, self.planar_configuration) {
            (1, Some(_)) => Some("PlanarConfiguration present with SamplesPerPixel 1"),
            (n, None) if n > 1 => Some("PlanarConfiguration missing with SamplesPerPixel > 1"),
            _ if self.bits_stored > self.bits_allocated => Some("BitsStored exceeds BitsAllocated"),
            _ if self.high_bit + 1 != self.bits_stored => Some("HighBit is not BitsStored - 1"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    /// Uncompressed, even length
    Native(Vec<u8>),
    /// Encapsulated fragments, written with undefined length
    Encapsulated(Vec<Vec<u8>>),
}

/// Pixel bytes together with the attributes that describe them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBlock {
    attributes: PixelAttributes,
    data: PixelData,
    syntax: PixelSyntax,
}

impl PixelBlock {
    pub fn attributes(&self) -> &PixelAttributes {
        &self.attributes
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn syntax(&self) -> PixelSyntax {
        self.syntax
    }
}

/// Caller choices for [`encode`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Re-encode JPEG input at this quality (1-100) instead of passing the
    /// original bytes through
    pub jpeg_recompress_quality: Option<u8>,
}

/// Pick the strategy from the source container and encode
pub fn encode(
    bytes: &[u8],
    decoder: &dyn ImageDecoder,
    options: &EncodeOptions,
) -> Result<PixelBlock, PixelError> {
    match SourceFormat::sniff(bytes) {
        SourceFormat::Jpeg => encode_jpeg(bytes, options.jpeg_recompress_quality),
        SourceFormat::Jpeg2000 => encode_jpeg2000(bytes),
        SourceFormat::Bitmap => encode_raw(&decoder.decode(bytes)?),
    }
}

fn checked_dimensions(width: u32, height: u32) -> Result<(u16, u16), PixelError> {
    match (u16::try_from(height), u16::try_from(width)) {
        (Ok(rows), Ok(columns)) if rows > 0 && columns > 0 => Ok((rows, columns)),
        _ => Err(PixelError::Dimensions { width, height }),
    }
}
