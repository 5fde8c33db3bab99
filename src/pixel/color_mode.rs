use super::PixelError;

/// Every color mode a decoder may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// 1-bit bilevel
    Bilevel,
    /// 8-bit gray
    Gray8,
    Palette,
    Rgb,
    Rgba,
    Cmyk,
    YCbCr,
    Lab,
    Hsv,
    /// 32-bit signed integer
    Int32,
    /// 32-bit float
    Float32,
}

impl ColorMode {
    pub const ALL: [ColorMode; 11] = [
        ColorMode::Bilevel,
        ColorMode::Gray8,
        ColorMode::Palette,
        ColorMode::Rgb,
        ColorMode::Rgba,
        ColorMode::Cmyk,
        ColorMode::YCbCr,
        ColorMode::Lab,
        ColorMode::Hsv,
        ColorMode::Int32,
        ColorMode::Float32,
    ];

    /// Conventional short name ("1", "L", "RGB", ...)
    pub fn name(self) -> &'static str {
        match self {
            ColorMode::Bilevel => "1",
            ColorMode::Gray8 => "L",
            ColorMode::Palette => "P",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::Cmyk => "CMYK",
            ColorMode::YCbCr => "YCbCr",
            ColorMode::Lab => "LAB",
            ColorMode::Hsv => "HSV",
            ColorMode::Int32 => "I",
            ColorMode::Float32 => "F",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, PixelError> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == name)
            .ok_or_else(|| PixelError::UnsupportedMode(name.to_string()))
    }

    /// The uncompressed representation for this mode, if DICOM has one
    pub fn raw_mode(self) -> Result<RawMode, PixelError> {
        match self {
            ColorMode::Bilevel => Ok(RawMode::Bilevel),
            ColorMode::Gray8 => Ok(RawMode::Gray8),
            ColorMode::Rgb => Ok(RawMode::Rgb),
            ColorMode::Palette
            | ColorMode::Rgba
            | ColorMode::Cmyk
            | ColorMode::YCbCr
            | ColorMode::Lab
            | ColorMode::Hsv
            | ColorMode::Int32
            | ColorMode::Float32 => Err(PixelError::UnsupportedMode(self.name().to_string())),
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Modes the raw strategy can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMode {
    Bilevel,
    Gray8,
    Rgb,
}
