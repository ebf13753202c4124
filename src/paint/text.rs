//! Multi-line status text
// https://docs.rs/embedded-graphics/0.8.1/embedded_graphics/mono_font/index.html#modules
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_7X14};
use embedded_graphics::mono_font::MonoFont;

use super::{Color, Paint};

/// Font for the first line of a status message
pub const LARGE_FONT: &MonoFont<'static> = &FONT_10X20;

/// Font for every following line
pub const SMALL_FONT: &MonoFont<'static> = &FONT_7X14;

/// First line large, the rest small
pub fn font_for_line(index: usize) -> &'static MonoFont<'static> {
    if index == 0 {
        LARGE_FONT
    } else {
        SMALL_FONT
    }
}

/// Vertical space taken by `count` lines drawn with [`draw_lines`]
pub fn line_height(count: usize) -> u32 {
    (0..count)
        .map(|i| font_for_line(i).character_size.height)
        .sum()
}

/// Draw `lines` from the left edge starting at `y`, one below the other.
///
/// Returns the y coordinate just below the last line.
pub fn draw_lines(paint: &mut Paint, y: i32, lines: &[&str], color: Color) -> i32 {
    let mut offset = y;
    for (index, line) in lines.iter().enumerate() {
        let font = font_for_line(index);
        paint.draw_text(0, offset, line, font, color);
        offset += font.character_size.height as i32;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_uses_large_font() {
        assert_eq!(line_height(0), 0);
        assert_eq!(line_height(1), 20);
        assert_eq!(line_height(3), 20 + 14 + 14);
    }

    #[test]
    fn lines_stack_by_font_height() {
        let mut paint = Paint::new();
        paint.clear(Color::White);
        let bottom = draw_lines(&mut paint, 4, &["Ready", "Connect to", "10.0.0.2"], Color::Black);
        assert_eq!(bottom, 4 + line_height(3) as i32);
        // nothing below the last line
        let row_bytes = paint.row_bytes();
        let below = &paint.buffer()[bottom as usize * row_bytes..];
        assert!(below.iter().all(|&b| b == 0xFF));
    }
}
