//! QR code generation and rasterization
//!
//! Codes come from `qrcodegen` with a fixed version so the module count is
//! known up front. Each module is drawn as a `block` × `block` square.

use std::fmt;

use qrcodegen::{QrCode, QrCodeEcc, QrSegment, Version};

use crate::paint::{Color, Paint};

/// Error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ecc {
    /// About 7% recovery
    #[default]
    Low,
    /// About 15% recovery
    Medium,
    /// About 25% recovery
    Quartile,
    /// About 30% recovery
    High,
}

impl Ecc {
    /// Numeric level as used by the upload form, 0 (low) to 3 (high)
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Ecc::Low),
            1 => Some(Ecc::Medium),
            2 => Some(Ecc::Quartile),
            3 => Some(Ecc::High),
            _ => None,
        }
    }
}

impl From<Ecc> for QrCodeEcc {
    fn from(ecc: Ecc) -> Self {
        match ecc {
            Ecc::Low => QrCodeEcc::Low,
            Ecc::Medium => QrCodeEcc::Medium,
            Ecc::Quartile => QrCodeEcc::Quartile,
            Ecc::High => QrCodeEcc::High,
        }
    }
}

/// Errors raised while building or placing a QR code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    /// Version outside 1..=40
    InvalidVersion(u8),
    /// Text does not fit the requested version and ECC level
    DataTooLong {
        /// Requested version
        version: u8,
        /// Requested ECC level
        ecc: Ecc,
    },
    /// Module grid larger than the target area
    TooLarge {
        /// Modules per side
        size: u32,
        /// Target width
        width: u32,
        /// Target height
        height: u32,
    },
}

impl fmt::Display for QrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QrError::InvalidVersion(v) => write!(f, "QR version {} is not in 1..=40", v),
            QrError::DataTooLong { version, ecc } => {
                write!(f, "text does not fit a version {} QR code at {:?} ECC", version, ecc)
            }
            QrError::TooLarge {
                size,
                width,
                height,
            } => write!(
                f,
                "QR code of {} modules is too large for a {}x{} display",
                size, width, height
            ),
        }
    }
}

impl std::error::Error for QrError {}

/// A square grid of dark and light modules
pub trait ModuleGrid {
    /// Modules per side
    fn size(&self) -> u32;

    /// Whether the module at (x, y) is dark; out of range is light
    fn is_dark(&self, x: u32, y: u32) -> bool;
}

impl ModuleGrid for QrCode {
    fn size(&self) -> u32 {
        QrCode::size(self) as u32
    }

    fn is_dark(&self, x: u32, y: u32) -> bool {
        self.get_module(x as i32, y as i32)
    }
}

/// Encode `text` as a QR code of exactly `version`
pub fn generate(text: &str, version: u8, ecc: Ecc) -> Result<QrCode, QrError> {
    if !(1..=40).contains(&version) {
        return Err(QrError::InvalidVersion(version));
    }
    let segments = QrSegment::make_segments(text);
    let fixed = Version::new(version);
    QrCode::encode_segments_advanced(&segments, ecc.into(), fixed, fixed, None, false).map_err(
        |e| {
            log::warn!("QR generation failed: {}", e);
            QrError::DataTooLong { version, ecc }
        },
    )
}

/// Where a code lands on a full-screen canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Pixels per module side
    pub block: u32,
    /// Left edge of the code
    pub x: u32,
    /// Top edge of the code
    pub y: u32,
}

impl Placement {
    /// Center a `size` module code on a `width` × `height` canvas.
    ///
    /// With `scale` the block is the largest that fits, otherwise 1.
    pub fn centered(size: u32, width: u32, height: u32, scale: bool) -> Result<Self, QrError> {
        if size == 0 || size > width || size > height {
            return Err(QrError::TooLarge {
                size,
                width,
                height,
            });
        }
        let block = if scale { width.min(height) / size } else { 1 };
        let pixels = size * block;
        Ok(Placement {
            block,
            x: (width - pixels) / 2,
            y: (height - pixels) / 2,
        })
    }
}

/// Draw every module of `grid` as a filled square with its top-left at (x, y)
pub fn draw_qr<G: ModuleGrid + ?Sized>(paint: &mut Paint, grid: &G, x: u32, y: u32, block: u32) {
    if block == 0 {
        return;
    }
    for my in 0..grid.size() {
        for mx in 0..grid.size() {
            let color = if grid.is_dark(mx, my) {
                Color::Black
            } else {
                Color::White
            };
            let left = (x + mx * block) as i32;
            let top = (y + my * block) as i32;
            paint.draw_filled_rectangle(
                left,
                top,
                left + block as i32 - 1,
                top + block as i32 - 1,
                color,
            );
        }
    }
}
