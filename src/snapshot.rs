//! Framebuffer to 24-bit bitmap
//!
//! The inverse of [`crate::image::bmp`]: a 14-byte file header, a 40-byte
//! info header and bottom-up rows padded to 4 bytes, every pixel written as
//! three 0x00 (black) or 0xFF (white) bytes. The stored region of the
//! [`Paint`] is written as is, without rotation.

use std::io::{self, Write};

use crate::paint::{Color, Paint};
use crate::storage::Storage;

/// File header plus info header
pub const HEADER_LEN: u32 = 14 + 40;

/// Bytes per encoded row for `width` pixels
pub fn row_bytes(width: u32) -> u32 {
    (width * 3 + 3) & !3
}

/// Size of the encoded file for a `width` × `height` framebuffer
pub fn encoded_len(width: u32, height: u32) -> u32 {
    HEADER_LEN + row_bytes(width) * height
}

/// Write `paint` as a bitmap
pub fn encode_bmp<W: Write>(paint: &Paint, mut writer: W) -> io::Result<()> {
    let (width, height) = (paint.width(), paint.height());
    let stride = row_bytes(width);
    let image_size = stride * height;

    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    header.extend_from_slice(b"BM");
    header.extend_from_slice(&(HEADER_LEN + image_size).to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // reserved
    header.extend_from_slice(&HEADER_LEN.to_le_bytes());
    header.extend_from_slice(&40u32.to_le_bytes());
    header.extend_from_slice(&(width as i32).to_le_bytes());
    header.extend_from_slice(&(height as i32).to_le_bytes()); // positive: bottom-up
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(&24u16.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    header.extend_from_slice(&image_size.to_le_bytes());
    header.extend_from_slice(&0i32.to_le_bytes()); // x pixels per meter
    header.extend_from_slice(&0i32.to_le_bytes()); // y pixels per meter
    header.extend_from_slice(&0u32.to_le_bytes()); // palette colors
    header.extend_from_slice(&0u32.to_le_bytes()); // important colors
    writer.write_all(&header)?;

    let mut row = vec![0u8; stride as usize];
    for y in (0..height).rev() {
        for x in 0..width {
            let value = match paint.absolute_pixel(x, y) {
                Some(Color::Black) => 0x00,
                _ => 0xFF,
            };
            let at = x as usize * 3;
            row[at..at + 3].fill(value);
        }
        // padding stays zero
        writer.write_all(&row)?;
    }
    writer.flush()
}

/// Encode `paint` into `path` on `storage`, returning the file size
pub fn save<S: Storage>(storage: &S, path: &str, paint: &Paint) -> io::Result<u32> {
    let writer = storage.create(path).map_err(|e| {
        log::error!("Cannot create snapshot {}: {}", path, e);
        e
    })?;
    encode_bmp(paint, writer)?;
    let len = encoded_len(paint.width(), paint.height());
    log::info!(
        "Saved {}x{} snapshot to {} ({} bytes)",
        paint.width(),
        paint.height(),
        path,
        len
    );
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn rows_are_padded_to_four_bytes() {
        assert_eq!(row_bytes(1), 4);
        assert_eq!(row_bytes(8), 24);
        assert_eq!(row_bytes(11), 36);
        assert_eq!(row_bytes(200), 600);
        assert_eq!(encoded_len(200, 200), 54 + 600 * 200);
    }

    #[test]
    fn header_and_bottom_up_rows() {
        let mut paint = Paint::new();
        paint.reset(8, 2).unwrap();
        paint.clear(Color::White);
        paint.set_pixel(0, 0, Color::Black);

        let mut out = Vec::new();
        encode_bmp(&paint, &mut out).unwrap();
        assert_eq!(out.len(), encoded_len(8, 2) as usize);
        assert_eq!(&out[..2], b"BM");
        assert_eq!(u32::from_le_bytes(out[2..6].try_into().unwrap()), out.len() as u32);
        assert_eq!(u32::from_le_bytes(out[10..14].try_into().unwrap()), 54);
        assert_eq!(i32::from_le_bytes(out[18..22].try_into().unwrap()), 8);
        assert_eq!(i32::from_le_bytes(out[22..26].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(out[28..30].try_into().unwrap()), 24);

        // first stored row is the bottom one, all white
        assert!(out[54..78].iter().all(|&b| b == 0xFF));
        // top row starts with a black pixel
        assert_eq!(&out[78..81], &[0, 0, 0]);
        assert_eq!(&out[81..84], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn save_writes_to_storage() {
        let storage = MemStorage::new();
        let paint = Paint::new();
        let len = save(&storage, "/generated-qr-code.bmp", &paint).unwrap();
        let stored = storage.get("/generated-qr-code.bmp").unwrap();
        assert_eq!(stored.len() as u32, len);
    }
}
