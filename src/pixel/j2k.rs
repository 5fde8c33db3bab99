//! Just enough JPEG 2000 parsing to describe a passthrough stream.

use super::PixelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct J2kHeader {
    pub width: u32,
    pub height: u32,
    pub components: u16,
    /// Bit depth of the first component
    pub precision: u8,
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(bytes: &[u8], at: usize) -> Option<u64> {
    bytes.get(at..at + 8).map(|b| {
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(b);
        u64::from_be_bytes(buf)
    })
}

fn header_error(msg: &str) -> PixelError {
    PixelError::Jpeg2000Header(msg.to_string())
}

/// Image size, component count and precision from either a raw codestream
/// (SIZ marker) or a JP2 file (ihdr box, falling back to the embedded
/// codestream).
pub fn jpeg2000_dimensions(bytes: &[u8]) -> Result<J2kHeader, PixelError> {
    if bytes.starts_with(&[0xFF, 0x4F]) {
        return parse_siz(bytes);
    }
    if bytes.get(4..8) == Some(&b"jP  "[..]) {
        return parse_jp2(bytes);
    }
    Err(header_error("neither a codestream nor a JP2 file"))
}

fn parse_siz(codestream: &[u8]) -> Result<J2kHeader, PixelError> {
    if be_u16(codestream, 2) != Some(0xFF51) {
        return Err(header_error("SIZ marker does not follow SOC"));
    }
    let field = |at| be_u32(codestream, at).ok_or_else(|| header_error("truncated SIZ segment"));
    let xsiz = field(8)?;
    let ysiz = field(12)?;
    let x_offset = field(16)?;
    let y_offset = field(20)?;
    let components = be_u16(codestream, 40).ok_or_else(|| header_error("truncated SIZ segment"))?;
    let ssiz = *codestream
        .get(42)
        .ok_or_else(|| header_error("truncated SIZ segment"))?;

    if xsiz <= x_offset || ysiz <= y_offset || components == 0 {
        return Err(header_error("empty image area"));
    }
    Ok(J2kHeader {
        width: xsiz - x_offset,
        height: ysiz - y_offset,
        components,
        precision: (ssiz & 0x7F) + 1,
    })
}

/// Walk the boxes in `bytes`, yielding (type, payload)
fn boxes(bytes: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut at = 0_usize;
    std::iter::from_fn(move || {
        let length = be_u32(bytes, at)? as u64;
        let kind: [u8; 4] = bytes.get(at + 4..at + 8)?.try_into().ok()?;
        let (header, total) = match length {
            0 => (8, (bytes.len() - at) as u64),
            1 => (16, be_u64(bytes, at + 8)?),
            n => (8, n),
        };
        let end = at.checked_add(usize::try_from(total).ok()?)?;
        let payload = bytes.get(at + header..end)?;
        at = end;
        Some((kind, payload))
    })
}

fn parse_jp2(bytes: &[u8]) -> Result<J2kHeader, PixelError> {
    for (kind, payload) in boxes(bytes) {
        match &kind {
            b"jp2h" => {
                if let Some((_, ihdr)) = boxes(payload).find(|(k, _)| k == b"ihdr") {
                    let height = be_u32(ihdr, 0).ok_or_else(|| header_error("truncated ihdr"))?;
                    let width = be_u32(ihdr, 4).ok_or_else(|| header_error("truncated ihdr"))?;
                    let components = be_u16(ihdr, 8).ok_or_else(|| header_error("truncated ihdr"))?;
                    let bpc = *ihdr.get(10).ok_or_else(|| header_error("truncated ihdr"))?;
                    if width == 0 || height == 0 || components == 0 {
                        return Err(header_error("empty image area"));
                    }
                    return Ok(J2kHeader {
                        width,
                        height,
                        components,
                        precision: (bpc & 0x7F) + 1,
                    });
                }
            }
            b"jp2c" => return parse_siz(payload),
            _ => {}
        }
    }
    Err(header_error("no ihdr box or codestream found"))
}
