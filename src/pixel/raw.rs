use super::{
    checked_dimensions, DecodedImage, Photometric, PixelAttributes, PixelBlock, PixelData,
    PixelError, PixelSyntax, RawMode,
};

/// Uncompressed strategy. Only bilevel, 8-bit gray and RGB are accepted;
/// every other mode is [`PixelError::UnsupportedMode`].
///
/// Pixels stay in the decoder's row-major order (PS3.3 C.7.6.3.1.4:
/// left to right, top to bottom), samples interleaved for RGB.
pub fn encode_raw(image: &DecodedImage) -> Result<PixelBlock, PixelError> {
    let mode = image.mode.raw_mode()?;
    let (rows, columns) = checked_dimensions(image.width, image.height)?;
    let pixel_count = usize::from(rows) * usize::from(columns);

    let block = match mode {
        RawMode::Bilevel => encode_bilevel(image, rows, columns, pixel_count)?,
        RawMode::Gray8 => encode_gray8(image, rows, columns, pixel_count)?,
        RawMode::Rgb => encode_rgb(image, rows, columns, pixel_count)?,
    };
    tracing::debug!(
        "Raw pixel data {}x{} {} ({} bytes)",
        columns,
        rows,
        image.mode,
        match block.data() {
            PixelData::Native(bytes) => bytes.len(),
            PixelData::Encapsulated(_) => 0,
        }
    );
    Ok(block)
}

fn expect_len(pixels: &[u8], expected: usize) -> Result<(), PixelError> {
    if pixels.len() != expected {
        return Err(PixelError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

fn pad_even(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn native(attributes: PixelAttributes, bytes: Vec<u8>) -> PixelBlock {
    PixelBlock {
        attributes,
        data: PixelData::Native(pad_even(bytes)),
        syntax: PixelSyntax::Native,
    }
}

fn single_sample(rows: u16, columns: u16, bits: u16) -> PixelAttributes {
    PixelAttributes {
        rows,
        columns,
        samples_per_pixel: 1,
        photometric: Photometric::Monochrome2,
        planar_configuration: None,
        bits_allocated: bits,
        bits_stored: bits,
        high_bit: bits - 1,
        lossy: None,
        compression: None,
    }
}

/// One bit per pixel, consecutive pixels filling each byte from the least
/// significant bit (PS3.5 section 8.1.1). Rows are not padded.
fn encode_bilevel(
    image: &DecodedImage,
    rows: u16,
    columns: u16,
    pixel_count: usize,
) -> Result<PixelBlock, PixelError> {
    expect_len(&image.pixels, pixel_count)?;
    let mut packed = vec![0_u8; pixel_count.div_ceil(8)];
    for (i, _) in image.pixels.iter().enumerate().filter(|(_, p)| **p != 0) {
        packed[i / 8] |= 1 << (i % 8);
    }
    Ok(native(single_sample(rows, columns, 1), packed))
}

fn encode_gray8(
    image: &DecodedImage,
    rows: u16,
    columns: u16,
    pixel_count: usize,
) -> Result<PixelBlock, PixelError> {
    expect_len(&image.pixels, pixel_count)?;
    Ok(native(single_sample(rows, columns, 8), image.pixels.clone()))
}

fn encode_rgb(
    image: &DecodedImage,
    rows: u16,
    columns: u16,
    pixel_count: usize,
) -> Result<PixelBlock, PixelError> {
    expect_len(&image.pixels, pixel_count * 3)?;
    let attributes = PixelAttributes {
        rows,
        columns,
        samples_per_pixel: 3,
        photometric: Photometric::Rgb,
        planar_configuration: Some(0),
        bits_allocated: 8,
        bits_stored: 8,
        high_bit: 7,
        lossy: None,
        compression: None,
    };
    Ok(native(attributes, image.pixels.clone()))
}
