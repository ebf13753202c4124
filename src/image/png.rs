//! Row-streaming PNG decoder
//!
//! Rows are decoded one at a time, converted to RGB565 over a white
//! background into a fixed row buffer of [`ROW_CAPACITY`] entries and then
//! binarized into the framebuffer. Columns past the row buffer or the
//! framebuffer are dropped, rows past the framebuffer stop the decode.

use std::io::Read;
use std::time::Instant;

use png::{ColorType, Decoder, Transformations};

use super::{rgb565, Binarize, DecodeSummary, ImageError, ImageKind};
use crate::paint::Paint;

/// Pixels held per decoded row
pub const ROW_CAPACITY: usize = 320;

/// Composite one 8-bit channel over white
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u32::from(channel), u32::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Convert one expanded 8-bit sample to RGB565
fn pixel_rgb565(color_type: ColorType, sample: &[u8]) -> u16 {
    let (r, g, b, a) = match color_type {
        // indexed is expanded to RGB before it gets here
        ColorType::Grayscale | ColorType::Indexed => (sample[0], sample[0], sample[0], 255),
        ColorType::GrayscaleAlpha => (sample[0], sample[0], sample[0], sample[1]),
        ColorType::Rgb => (sample[0], sample[1], sample[2], 255),
        ColorType::Rgba => (sample[0], sample[1], sample[2], sample[3]),
    };
    rgb565(over_white(r, a), over_white(g, a), over_white(b, a))
}

/// Decode a PNG into `paint` with its top-left corner at (x, y)
pub fn decode<R: Read>(
    reader: R,
    paint: &mut Paint,
    x: u32,
    y: u32,
    binarize: Binarize,
) -> Result<DecodeSummary, ImageError> {
    let started = Instant::now();

    let mut decoder = Decoder::new(reader);
    // palette and low bit depths to 8-bit samples, 16-bit down to 8
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
    let mut rows = decoder.read_info()?;

    let (source_width, source_height, interlaced) = {
        let info = rows.info();
        (info.width, info.height, info.interlaced)
    };
    if interlaced {
        log::warn!("Refusing interlaced {}x{} PNG", source_width, source_height);
        return Err(ImageError::Interlaced);
    }
    let (color_type, _) = rows.output_color_type();
    let samples = color_type.samples();
    log::debug!(
        "PNG {}x{} {:?}, {} samples per pixel",
        source_width,
        source_height,
        color_type,
        samples
    );

    let (paint_width, paint_height) = paint.logical_size();
    let columns = (source_width as usize)
        .min(ROW_CAPACITY)
        .min(paint_width.saturating_sub(x) as usize);
    let max_rows = source_height.min(paint_height.saturating_sub(y));
    if columns < source_width as usize || max_rows < source_height {
        log::warn!(
            "Cropping {}x{} PNG to {}x{}",
            source_width,
            source_height,
            columns,
            max_rows
        );
    }

    let mut line = [0u16; ROW_CAPACITY];
    let mut drawn_rows = 0;
    while drawn_rows < max_rows {
        let Some(row) = rows.next_row()? else {
            break;
        };
        for (slot, sample) in line
            .iter_mut()
            .zip(row.data().chunks_exact(samples))
            .take(columns)
        {
            *slot = pixel_rgb565(color_type, sample);
        }
        for (col, value) in line[..columns].iter().enumerate() {
            paint.set_pixel(
                (x as usize + col) as i32,
                (y + drawn_rows) as i32,
                binarize.rgb565(*value),
            );
        }
        drawn_rows += 1;
    }

    log::info!(
        "Loaded {}x{} PNG in {} ms",
        columns,
        drawn_rows,
        started.elapsed().as_millis()
    );
    Ok(DecodeSummary {
        kind: ImageKind::Png,
        source_width,
        source_height,
        drawn_width: columns as u32,
        drawn_height: drawn_rows,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::paint::Color;

    fn encode(width: u32, height: u32, color: ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    #[test]
    fn transparent_pixels_become_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(pixel_rgb565(ColorType::Rgba, &[0, 0, 0, 0]), 0xFFFF);
        assert_eq!(pixel_rgb565(ColorType::GrayscaleAlpha, &[0, 255]), 0);
    }

    #[test]
    fn nonzero_is_black_by_default_polarity() {
        // black, white, red
        let data = [0, 0, 0, 255, 255, 255, 255, 0, 0];
        let png = encode(3, 1, ColorType::Rgb, &data);
        let mut paint = Paint::new();
        paint.reset(8, 1).unwrap();
        paint.clear(Color::White);
        let summary = decode(Cursor::new(png), &mut paint, 0, 0, Binarize::NonZeroBlack).unwrap();
        assert_eq!(summary.drawn_width, 3);
        assert_eq!(paint.get_pixel(0, 0), Some(Color::White));
        assert_eq!(paint.get_pixel(1, 0), Some(Color::Black));
        assert_eq!(paint.get_pixel(2, 0), Some(Color::Black));
    }

    #[test]
    fn grayscale_with_luma_policy() {
        let data = [0u8, 64, 200, 255];
        let png = encode(4, 1, ColorType::Grayscale, &data);
        let mut paint = Paint::new();
        paint.reset(8, 1).unwrap();
        paint.clear(Color::White);
        decode(Cursor::new(png), &mut paint, 0, 0, Binarize::Luma { threshold: 128 }).unwrap();
        let pixels: Vec<_> = (0..4).map(|x| paint.get_pixel(x, 0)).collect();
        assert_eq!(
            pixels,
            vec![
                Some(Color::Black),
                Some(Color::Black),
                Some(Color::White),
                Some(Color::White)
            ]
        );
    }

    #[test]
    fn rows_and_columns_are_clipped() {
        let data = vec![0u8; 12 * 12];
        let png = encode(12, 12, ColorType::Grayscale, &data);
        let mut paint = Paint::new();
        paint.reset(8, 8).unwrap();
        paint.clear(Color::Black);
        let summary = decode(Cursor::new(png), &mut paint, 2, 3, Binarize::NonZeroBlack).unwrap();
        assert_eq!((summary.source_width, summary.source_height), (12, 12));
        assert_eq!((summary.drawn_width, summary.drawn_height), (6, 5));
        assert_eq!(paint.get_pixel(1, 3), Some(Color::Black));
        assert_eq!(paint.get_pixel(2, 3), Some(Color::White));
        assert_eq!(paint.get_pixel(7, 7), Some(Color::White));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut paint = Paint::new();
        let err = decode(Cursor::new(b"not a png".to_vec()), &mut paint, 0, 0, Binarize::NonZeroBlack)
            .unwrap_err();
        assert!(matches!(err, ImageError::Png(_) | ImageError::Truncated | ImageError::Io(_)));
    }
}
