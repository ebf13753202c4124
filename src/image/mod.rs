//! Streaming image decoders that draw straight into a [`Paint`]
//!
//! Two codecs, picked by file suffix:
//!
//! | Suffix            | Codec                   |
//! |-------------------|-------------------------|
//! | `.bmp`, `.BMP`    | [`bmp`], 24-bit only    |
//! | `.png`            | [`png`], any bit depth  |
//!
//! Both stream from the [`Storage`] reader and never hold a whole image in
//! memory. A decode that fails part way leaves whatever was drawn so far in
//! the framebuffer; callers clear it before reuse.

use std::fmt;
use std::io;

use crate::paint::{Color, Paint};
use crate::storage::Storage;

pub mod bmp;
pub mod png;

/// Codec selected by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Uncompressed 24-bit Windows bitmap
    Bmp,
    /// Portable Network Graphics
    Png,
}

impl ImageKind {
    /// `.png` is matched case-sensitively, `.bmp` in lower or upper case only
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".png") {
            Some(ImageKind::Png)
        } else if name.ends_with(".bmp") || name.ends_with(".BMP") {
            Some(ImageKind::Bmp)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Bmp => write!(f, "BMP"),
            ImageKind::Png => write!(f, "PNG"),
        }
    }
}

/// How a color sample becomes one of the two panel colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarize {
    /// Integer luma `(299 R + 587 G + 114 B) / 1000` below `threshold` is black
    Luma {
        /// Luma cut-off, 0..=255
        threshold: u8,
    },
    /// Any non-zero RGB565 value is black, pure black is white
    NonZeroBlack,
    /// Any non-zero RGB565 value is white, pure black is black
    NonZeroWhite,
}

impl Binarize {
    /// Binarize an 8-bit RGB triple
    pub fn rgb(self, r: u8, g: u8, b: u8) -> Color {
        match self {
            Binarize::Luma { threshold } => {
                let luma = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
                if luma < u32::from(threshold) {
                    Color::Black
                } else {
                    Color::White
                }
            }
            Binarize::NonZeroBlack | Binarize::NonZeroWhite => self.rgb565(rgb565(r, g, b)),
        }
    }

    /// Binarize a packed RGB565 value
    pub fn rgb565(self, value: u16) -> Color {
        match self {
            Binarize::Luma { .. } => {
                let (r, g, b) = expand565(value);
                self.rgb(r, g, b)
            }
            Binarize::NonZeroBlack => {
                if value != 0 {
                    Color::Black
                } else {
                    Color::White
                }
            }
            Binarize::NonZeroWhite => Binarize::NonZeroBlack.rgb565(value).inverse(),
        }
    }
}

/// Pack 8-bit channels into RGB565
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

fn expand565(value: u16) -> (u8, u8, u8) {
    let r = ((value >> 11) & 0x1F) as u8;
    let g = ((value >> 5) & 0x3F) as u8;
    let b = (value & 0x1F) as u8;
    ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Binarization per codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binarization {
    /// Applied to bitmap pixels
    pub bmp: Binarize,
    /// Applied to PNG pixels after conversion to RGB565
    pub png: Binarize,
}

impl Default for Binarization {
    fn default() -> Self {
        Binarization {
            bmp: Binarize::Luma { threshold: 128 },
            png: Binarize::NonZeroBlack,
        }
    }
}

/// What a decode read and what it drew
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Codec used
    pub kind: ImageKind,
    /// Width stored in the file
    pub source_width: u32,
    /// Height stored in the file
    pub source_height: u32,
    /// Columns written after clipping
    pub drawn_width: u32,
    /// Rows written after clipping
    pub drawn_height: u32,
}

/// Errors raised while decoding an image
#[derive(Debug)]
pub enum ImageError {
    /// Reading or seeking the stream failed
    Io(io::Error),
    /// Stream ended inside the header or pixel data
    Truncated,
    /// Bitmap does not start with `BM`
    BadSignature(u16),
    /// Bitmap plane count other than 1
    UnsupportedPlanes(u16),
    /// Bitmap bit depth other than 24
    UnsupportedDepth(u16),
    /// Compressed bitmap
    UnsupportedCompression(u32),
    /// Zero or negative width, or zero height
    InvalidDimensions {
        /// Width from the header
        width: i32,
        /// Height from the header
        height: i32,
    },
    /// Interlaced PNG, which cannot be streamed row by row
    Interlaced,
    /// Malformed PNG
    Png(::png::DecodingError),
    /// File name has no supported suffix
    UnsupportedFormat(String),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io(e) => write!(f, "I/O error: {}", e),
            ImageError::Truncated => write!(f, "image data ended early"),
            ImageError::BadSignature(sig) => write!(f, "not a bitmap (signature 0x{:04X})", sig),
            ImageError::UnsupportedPlanes(planes) => {
                write!(f, "unsupported plane count {}", planes)
            }
            ImageError::UnsupportedDepth(depth) => {
                write!(f, "unsupported bit depth {}, only 24-bit is supported", depth)
            }
            ImageError::UnsupportedCompression(method) => {
                write!(f, "unsupported compression method {}", method)
            }
            ImageError::InvalidDimensions { width, height } => {
                write!(f, "invalid image size {}x{}", width, height)
            }
            ImageError::Interlaced => write!(f, "interlaced PNG is not supported"),
            ImageError::Png(e) => write!(f, "PNG decode error: {}", e),
            ImageError::UnsupportedFormat(name) => {
                write!(f, "unsupported image format: {}", name)
            }
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(e) => Some(e),
            ImageError::Png(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            ImageError::Truncated
        } else {
            ImageError::Io(error)
        }
    }
}

impl From<::png::DecodingError> for ImageError {
    fn from(error: ::png::DecodingError) -> Self {
        ImageError::Png(error)
    }
}

/// Open `name` from `storage` and draw it with its top-left corner at (x, y)
pub fn draw_image<S: Storage>(
    storage: &S,
    name: &str,
    paint: &mut Paint,
    x: u32,
    y: u32,
    binarization: Binarization,
) -> Result<DecodeSummary, ImageError> {
    let kind = ImageKind::from_name(name).ok_or_else(|| {
        log::warn!("No decoder for {}", name);
        ImageError::UnsupportedFormat(name.to_string())
    })?;

    let reader = storage.open(name).map_err(|e| {
        log::error!("File not found: {} ({})", name, e);
        ImageError::Io(e)
    })?;

    log::info!("Loading {} image '{}'", kind, name);
    let result = match kind {
        ImageKind::Bmp => bmp::decode(reader, paint, x, y, binarization.bmp),
        ImageKind::Png => png::decode(reader, paint, x, y, binarization.png),
    };
    if let Err(e) = &result {
        log::error!("Decoding '{}' failed: {}", name, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_rules() {
        assert_eq!(ImageKind::from_name("/a.png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_name("/a.PNG"), None);
        assert_eq!(ImageKind::from_name("/a.bmp"), Some(ImageKind::Bmp));
        assert_eq!(ImageKind::from_name("/a.BMP"), Some(ImageKind::Bmp));
        assert_eq!(ImageKind::from_name("/a.Bmp"), None);
        assert_eq!(ImageKind::from_name("/a.jpg"), None);
    }

    #[test]
    fn luma_threshold() {
        let policy = Binarize::Luma { threshold: 128 };
        assert_eq!(policy.rgb(0, 0, 0), Color::Black);
        assert_eq!(policy.rgb(255, 255, 255), Color::White);
        assert_eq!(policy.rgb(127, 127, 127), Color::Black);
        assert_eq!(policy.rgb(128, 128, 128), Color::White);
        // green dominates luma
        assert_eq!(policy.rgb(0, 255, 0), Color::White);
        assert_eq!(policy.rgb(0, 0, 255), Color::Black);
    }

    #[test]
    fn nonzero_polarities_are_opposite() {
        assert_eq!(Binarize::NonZeroBlack.rgb565(0), Color::White);
        assert_eq!(Binarize::NonZeroBlack.rgb565(0xFFFF), Color::Black);
        assert_eq!(Binarize::NonZeroWhite.rgb565(0), Color::Black);
        assert_eq!(Binarize::NonZeroWhite.rgb565(1), Color::White);
        // channels below the 565 resolution collapse to zero
        assert_eq!(Binarize::NonZeroBlack.rgb(3, 3, 7), Color::White);
        for value in [0, 1, 0x0020, 0x8000, 0xFFFF] {
            assert_eq!(
                Binarize::NonZeroWhite.rgb565(value),
                Binarize::NonZeroBlack.rgb565(value).inverse()
            );
        }
    }

    #[test]
    fn rgb565_packing() {
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
        assert_eq!(expand565(0xFFFF), (255, 255, 255));
    }
}
