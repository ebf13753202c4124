//! Packed 1-bit framebuffer
//!
//! [`Paint`] owns a fixed backing store sized for the full panel
//! (200×200 pixels, 5000 bytes). Generators reset it to a smaller logical
//! region, draw into it, and hand [`Paint::buffer`] to the display driver.
//! The backing array is never reallocated.
//!
//! ### Layout
//!
//! - Row-major, 8 pixels per byte, MSB is the leftmost pixel
//! - Width is rounded up to a whole byte so every row starts on a byte
//!   boundary, which is what the panel RAM window expects
//! - Bit set = white, bit cleared = black
//!
//! ### Clipping
//!
//! All drawing uses the *clip-silently* policy: a pixel outside the logical
//! area is dropped without error. [`Paint::set_pixel`] reports whether the
//! pixel landed so callers and tests can observe the policy.

use core::convert::Infallible;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

pub mod color;
mod text;

pub use color::Color;
pub use text::{draw_lines, font_for_line, line_height, LARGE_FONT, SMALL_FONT};

use crate::epd1in54::{FRAME_LEN, HEIGHT, WIDTH};

/// Size of the backing store in bytes
pub const BUFFER_LEN: usize = FRAME_LEN;

/// Logical rotation applied before bit addressing, in 90° steps clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0,
    /// Rotate by 90 degrees clockwise
    Rotate90,
    /// Rotate by 180 degrees clockwise
    Rotate180,
    /// Rotate by 270 degrees clockwise
    Rotate270,
}

/// Errors raised by framebuffer reconfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintError {
    /// The requested region does not fit in the backing store
    Capacity {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
}

impl std::fmt::Display for PaintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaintError::Capacity { width, height } => write!(
                f,
                "{}x{} does not fit in a {} byte framebuffer",
                width, height, BUFFER_LEN
            ),
        }
    }
}

impl std::error::Error for PaintError {}

/// Packed 1-bit framebuffer over a fixed backing store
pub struct Paint {
    buffer: [u8; BUFFER_LEN],
    width: u32,
    height: u32,
    rotation: Rotation,
}

impl Default for Paint {
    fn default() -> Self {
        Self::new()
    }
}

impl Paint {
    /// Full panel sized, all white, unrotated
    pub fn new() -> Self {
        Paint {
            buffer: [Color::White.get_byte_value(); BUFFER_LEN],
            width: WIDTH,
            height: HEIGHT,
            rotation: Rotation::Rotate0,
        }
    }

    /// Reconfigure the logical region without touching the backing store.
    ///
    /// `width` is rounded up to a multiple of 8. A region larger than the
    /// backing store is rejected and the previous dimensions are kept.
    pub fn reset(&mut self, width: u32, height: u32) -> Result<(), PaintError> {
        let aligned = width.div_ceil(8) * 8;
        let bits = u64::from(aligned) * u64::from(height);
        if bits > (BUFFER_LEN as u64) * 8 {
            log::warn!("Rejecting {}x{} framebuffer region", width, height);
            return Err(PaintError::Capacity { width, height });
        }
        self.width = aligned;
        self.height = height;
        Ok(())
    }

    /// Width of the stored region in pixels (always a multiple of 8)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the stored region in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per stored row
    pub fn row_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    /// Number of bytes in use for the current region
    pub fn len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// True when the region has no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packed bits of the current region, ready for the panel
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.len()]
    }

    /// The whole backing store, including bytes outside the current region
    pub fn backing(&self) -> &[u8] {
        &self.buffer
    }

    /// Current rotation
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Remap logical coordinates for subsequent drawing. The buffer is not touched.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Width and height as seen through the current rotation
    pub fn logical_size(&self) -> (u32, u32) {
        match self.rotation {
            Rotation::Rotate0 | Rotation::Rotate180 => (self.width, self.height),
            Rotation::Rotate90 | Rotation::Rotate270 => (self.height, self.width),
        }
    }

    /// Fill the current region with one color
    pub fn clear(&mut self, color: Color) {
        let len = self.len();
        self.buffer[..len].fill(color.get_byte_value());
    }

    /// Set one pixel in logical coordinates.
    ///
    /// Returns `false` when the pixel was clipped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> bool {
        match self.to_absolute(x, y) {
            Some((ax, ay)) => self.set_absolute_pixel(ax, ay, color),
            None => false,
        }
    }

    /// Read one pixel in logical coordinates
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        let (ax, ay) = self.to_absolute(x, y)?;
        self.absolute_pixel(ax, ay)
    }

    /// Read one pixel in stored (unrotated) coordinates
    pub fn absolute_pixel(&self, x: u32, y: u32) -> Option<Color> {
        let (index, mask) = self.bit_address(x, y)?;
        Some(Color::from_bit(self.buffer[index] & mask != 0))
    }

    fn set_absolute_pixel(&mut self, x: u32, y: u32, color: Color) -> bool {
        let Some((index, mask)) = self.bit_address(x, y) else {
            return false;
        };
        match color {
            Color::White => self.buffer[index] |= mask,
            Color::Black => self.buffer[index] &= !mask,
        }
        true
    }

    fn bit_address(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * self.row_bytes() + (x / 8) as usize;
        Some((index, 0x80 >> (x % 8)))
    }

    fn to_absolute(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        let (lw, lh) = self.logical_size();
        let x = u32::try_from(x).ok().filter(|&x| x < lw)?;
        let y = u32::try_from(y).ok().filter(|&y| y < lh)?;
        let (w, h) = (self.width, self.height);
        Some(match self.rotation {
            Rotation::Rotate0 => (x, y),
            Rotation::Rotate90 => (w - 1 - y, x),
            Rotation::Rotate180 => (w - 1 - x, h - 1 - y),
            Rotation::Rotate270 => (y, h - 1 - x),
        })
    }

    /// Straight line between two points, inclusive
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let line = Line::new(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_stroke(color, 1));
        infallible(line.draw(self));
    }

    /// One pixel wide outline with inclusive corners
    pub fn draw_rectangle(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let rect = Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_stroke(color, 1));
        infallible(rect.draw(self));
    }

    /// Solid rectangle with inclusive corners
    pub fn draw_filled_rectangle(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let rect = Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_fill(color));
        infallible(rect.draw(self));
    }

    /// Render `text` with its top-left corner at (x, y).
    ///
    /// Returns the x position after the last glyph.
    pub fn draw_text(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        font: &MonoFont<'_>,
        color: Color,
    ) -> i32 {
        let style = MonoTextStyle::new(font, color);
        match Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(self) {
            Ok(next) => next.x,
            Err(never) => match never {},
        }
    }
}

fn infallible(result: Result<(), Infallible>) {
    if let Err(never) = result {
        match never {}
    }
}

impl DrawTarget for Paint {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color);
        }
        Ok(())
    }
}

impl OriginDimensions for Paint {
    fn size(&self) -> Size {
        let (w, h) = self.logical_size();
        Size::new(w, h)
    }
}
