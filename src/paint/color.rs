//! Two-color pixel type for the packed framebuffer

use embedded_graphics::pixelcolor::{BinaryColor, PixelColor};

/// Pixel color of a 1-bit e-paper framebuffer.
///
/// The bit encoding matches the panel RAM: a set bit is white, a cleared bit is black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Bit value 0
    Black,
    /// Bit value 1
    #[default]
    White,
}

impl Color {
    /// Byte with all eight pixels set to this color
    pub const fn get_byte_value(self) -> u8 {
        match self {
            Color::Black => 0x00,
            Color::White => 0xFF,
        }
    }

    /// Color encoded by a single bit
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Color::White
        } else {
            Color::Black
        }
    }

    /// The other color
    pub const fn inverse(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl PixelColor for Color {
    type Raw = ();
}

/// `On` draws ink, so it maps to black.
impl From<BinaryColor> for Color {
    fn from(color: BinaryColor) -> Self {
        match color {
            BinaryColor::On => Color::Black,
            BinaryColor::Off => Color::White,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Black => write!(f, "black"),
            Color::White => write!(f, "white"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_and_byte_values_agree() {
        for color in [Color::Black, Color::White] {
            let byte = color.get_byte_value();
            assert_eq!(Color::from_bit(byte & 0x01 == 1), color);
            assert_eq!(Color::from_bit(byte & 0x80 != 0), color);
        }
    }

    #[test]
    fn binary_on_is_ink() {
        assert_eq!(Color::from(BinaryColor::On), Color::Black);
        assert_eq!(Color::from(BinaryColor::Off), Color::White);
        assert_eq!(Color::Black.inverse(), Color::White);
        assert_eq!(Color::White.inverse().inverse(), Color::White);
    }
}
