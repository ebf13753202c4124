//! Uncompressed 24-bit bitmap decoder
//!
//! Only the fields the decoder needs are read from the 14-byte file header
//! and the start of the DIB header. Pixel data is pulled through a small
//! buffer of [`BUFFPIXEL`] pixels; the stream is only seeked when the next
//! row does not start where the stream already is or inside the buffer.

use std::io::{Read, Seek, SeekFrom};
use std::time::Instant;

use super::{Binarize, DecodeSummary, ImageError, ImageKind};
use crate::paint::Paint;

/// Pixels per read
pub const BUFFPIXEL: usize = 20;

/// Bytes per read
const CHUNK_LEN: usize = BUFFPIXEL * 3;

/// "BM", little endian
pub const SIGNATURE: u16 = 0x4D42;

/// Bytes consumed by [`BmpHeader::read`]
pub const HEADER_READ_LEN: usize = 34;

/// The parts of the bitmap headers the decoder uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    /// Total file size as recorded in the file
    pub file_size: u32,
    /// Offset of the first pixel row
    pub data_offset: u32,
    /// DIB header size
    pub header_size: u32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels; negative means rows are stored top-down
    pub height: i32,
    /// Must be 1
    pub planes: u16,
    /// Must be 24
    pub depth: u16,
    /// Must be 0 (uncompressed)
    pub compression: u32,
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl BmpHeader {
    /// Read and validate the header from the start of the stream
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ImageError> {
        let mut raw = [0u8; HEADER_READ_LEN];
        reader.read_exact(&mut raw)?;

        let signature = u16_at(&raw, 0);
        if signature != SIGNATURE {
            return Err(ImageError::BadSignature(signature));
        }

        // bytes 6..10 are the creator field
        let header = BmpHeader {
            file_size: u32_at(&raw, 2),
            data_offset: u32_at(&raw, 10),
            header_size: u32_at(&raw, 14),
            width: u32_at(&raw, 18) as i32,
            height: u32_at(&raw, 22) as i32,
            planes: u16_at(&raw, 26),
            depth: u16_at(&raw, 28),
            compression: u32_at(&raw, 30),
        };

        if header.planes != 1 {
            return Err(ImageError::UnsupportedPlanes(header.planes));
        }
        if header.depth != 24 {
            return Err(ImageError::UnsupportedDepth(header.depth));
        }
        if header.compression != 0 {
            return Err(ImageError::UnsupportedCompression(header.compression));
        }
        if header.width <= 0 || header.height == 0 || header.height == i32::MIN {
            return Err(ImageError::InvalidDimensions {
                width: header.width,
                height: header.height,
            });
        }
        Ok(header)
    }

    /// Stored width
    pub fn width(&self) -> u32 {
        self.width.unsigned_abs()
    }

    /// Stored height, regardless of row order
    pub fn height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    /// Rows stored first-row-first
    pub fn top_down(&self) -> bool {
        self.height < 0
    }

    /// Bytes per stored row, padded to a multiple of 4
    pub fn row_bytes(&self) -> u64 {
        (u64::from(self.width()) * 3 + 3) & !3
    }

    /// Stream offset of image row `row` (0 is the top of the picture)
    fn row_offset(&self, row: u32) -> u64 {
        let stored = if self.top_down() {
            row
        } else {
            self.height() - 1 - row
        };
        u64::from(self.data_offset) + u64::from(stored) * self.row_bytes()
    }
}

/// Pixel data window over the stream
struct ChunkReader<R> {
    reader: R,
    chunk: [u8; CHUNK_LEN],
    /// Stream offset of `chunk[0]`
    start: u64,
    /// Valid bytes in `chunk`
    filled: usize,
    /// Next unread byte in `chunk`
    index: usize,
    seeks: usize,
}

impl<R: Read + Seek> ChunkReader<R> {
    fn new(reader: R, position: u64) -> Self {
        ChunkReader {
            reader,
            chunk: [0; CHUNK_LEN],
            start: position,
            filled: 0,
            index: 0,
            seeks: 0,
        }
    }

    /// Stream position just after the buffered bytes
    fn stream_position(&self) -> u64 {
        self.start + self.filled as u64
    }

    /// Continue reading at `offset`, from the buffer when it is already there
    fn move_to(&mut self, offset: u64) -> Result<(), ImageError> {
        let end = self.stream_position();
        if offset >= self.start && offset < end {
            self.index = (offset - self.start) as usize;
            return Ok(());
        }
        if offset != end {
            self.reader.seek(SeekFrom::Start(offset))?;
            self.seeks += 1;
        }
        self.start = offset;
        self.filled = 0;
        self.index = 0;
        Ok(())
    }

    /// Next B, G, R triple
    fn next_pixel(&mut self) -> Result<[u8; 3], ImageError> {
        if self.filled - self.index < 3 {
            self.refill()?;
        }
        let at = self.index;
        self.index += 3;
        Ok([self.chunk[at], self.chunk[at + 1], self.chunk[at + 2]])
    }

    /// Keep the unread tail, then top the chunk up from the stream
    fn refill(&mut self) -> Result<(), ImageError> {
        let leftover = self.filled - self.index;
        self.chunk.copy_within(self.index..self.filled, 0);
        self.start += self.index as u64;
        self.filled = leftover;
        self.index = 0;

        while self.filled < CHUNK_LEN {
            let read = self.reader.read(&mut self.chunk[self.filled..])?;
            if read == 0 {
                break;
            }
            self.filled += read;
        }
        if self.filled < 3 {
            return Err(ImageError::Truncated);
        }
        Ok(())
    }
}

/// Decode a 24-bit bitmap into `paint` with its top-left corner at (x, y).
///
/// The picture is cropped to the logical size of `paint`. Each pixel is
/// reduced to black or white by `binarize`.
pub fn decode<R: Read + Seek>(
    mut reader: R,
    paint: &mut Paint,
    x: u32,
    y: u32,
    binarize: Binarize,
) -> Result<DecodeSummary, ImageError> {
    let started = Instant::now();
    let header = BmpHeader::read(&mut reader)?;
    log::debug!(
        "BMP {}x{} file size {} offset {} header {}",
        header.width,
        header.height,
        header.file_size,
        header.data_offset,
        header.header_size
    );

    let (paint_width, paint_height) = paint.logical_size();
    let width = header.width().min(paint_width.saturating_sub(x));
    let height = header.height().min(paint_height.saturating_sub(y));
    if width < header.width() || height < header.height() {
        log::warn!(
            "Cropping {}x{} bitmap to {}x{}",
            header.width(),
            header.height(),
            width,
            height
        );
    }

    let mut chunks = ChunkReader::new(reader, HEADER_READ_LEN as u64);
    for row in 0..height {
        chunks.move_to(header.row_offset(row))?;
        for col in 0..width {
            let [b, g, r] = chunks.next_pixel()?;
            paint.set_pixel((x + col) as i32, (y + row) as i32, binarize.rgb(r, g, b));
        }
    }

    log::info!(
        "Loaded {}x{} bitmap in {} ms ({} seeks)",
        width,
        height,
        started.elapsed().as_millis(),
        chunks.seeks
    );
    Ok(DecodeSummary {
        kind: ImageKind::Bmp,
        source_width: header.width(),
        source_height: header.height(),
        drawn_width: width,
        drawn_height: height,
    })
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::paint::Color;

    /// Top-down or bottom-up 24-bit bitmap from rows of RGB triples
    fn bitmap(width: u32, rows: &[Vec<[u8; 3]>], top_down: bool) -> Vec<u8> {
        let height = rows.len() as u32;
        let row_bytes = ((width * 3 + 3) & !3) as usize;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&((54 + row_bytes * rows.len()) as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        let h = if top_down { -(height as i32) } else { height as i32 };
        out.extend_from_slice(&h.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&[0u8; 24]);
        let ordered: Vec<&Vec<[u8; 3]>> = if top_down {
            rows.iter().collect()
        } else {
            rows.iter().rev().collect()
        };
        for row in ordered {
            let start = out.len();
            for [r, g, b] in row {
                out.extend_from_slice(&[*b, *g, *r]);
            }
            out.resize(start + row_bytes, 0);
        }
        out
    }

    struct CountingSeeks<R> {
        inner: R,
        seeks: usize,
    }

    impl<R: Read> Read for CountingSeeks<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl<R: Seek> Seek for CountingSeeks<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.seeks += 1;
            self.inner.seek(pos)
        }
    }

    const B: [u8; 3] = [0, 0, 0];
    const W: [u8; 3] = [255, 255, 255];

    #[test]
    fn header_fields() {
        let data = bitmap(3, &[vec![W, W, W]], false);
        let header = BmpHeader::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(header.width, 3);
        assert_eq!(header.height, 1);
        assert_eq!(header.data_offset, 54);
        assert_eq!(header.row_bytes(), 12);
        assert_eq!(header.file_size as usize, data.len());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = bitmap(1, &[vec![W]], false);
        data[0] = b'X';
        let err = BmpHeader::read(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, ImageError::BadSignature(_)));
    }

    #[test]
    fn rejects_other_depths_and_compression() {
        let mut data = bitmap(1, &[vec![W]], false);
        data[28] = 32;
        assert!(matches!(
            BmpHeader::read(&mut Cursor::new(&data)),
            Err(ImageError::UnsupportedDepth(32))
        ));

        let mut data = bitmap(1, &[vec![W]], false);
        data[30] = 1;
        assert!(matches!(
            BmpHeader::read(&mut Cursor::new(&data)),
            Err(ImageError::UnsupportedCompression(1))
        ));

        let mut data = bitmap(1, &[vec![W]], false);
        data[26] = 2;
        assert!(matches!(
            BmpHeader::read(&mut Cursor::new(&data)),
            Err(ImageError::UnsupportedPlanes(2))
        ));
    }

    #[test]
    fn short_header_is_truncated() {
        let data = bitmap(1, &[vec![W]], false);
        let err = BmpHeader::read(&mut Cursor::new(&data[..20])).unwrap_err();
        assert!(matches!(err, ImageError::Truncated));
    }

    #[test]
    fn bottom_up_and_top_down_agree() {
        let rows = vec![vec![B, W, W], vec![W, B, W], vec![W, W, B]];
        for top_down in [false, true] {
            let data = bitmap(3, &rows, top_down);
            let mut paint = Paint::new();
            paint.reset(8, 3).unwrap();
            paint.clear(Color::White);
            decode(Cursor::new(data), &mut paint, 0, 0, Binarize::Luma { threshold: 128 }).unwrap();
            for i in 0..3 {
                assert_eq!(paint.get_pixel(i, i), Some(Color::Black), "top_down={}", top_down);
                assert_eq!(paint.get_pixel((i + 1) % 3, i), Some(Color::White));
            }
        }
    }

    #[test]
    fn crops_to_paint_and_reports_sizes() {
        let rows = vec![vec![B; 20]; 12];
        let data = bitmap(20, &rows, false);
        let mut paint = Paint::new();
        paint.reset(16, 10).unwrap();
        paint.clear(Color::White);
        let summary =
            decode(Cursor::new(data), &mut paint, 4, 2, Binarize::Luma { threshold: 128 }).unwrap();
        assert_eq!((summary.source_width, summary.source_height), (20, 12));
        assert_eq!((summary.drawn_width, summary.drawn_height), (12, 8));
        assert_eq!(paint.get_pixel(3, 2), Some(Color::White));
        assert_eq!(paint.get_pixel(4, 2), Some(Color::Black));
        assert_eq!(paint.get_pixel(15, 9), Some(Color::Black));
    }

    #[test]
    fn origin_past_paint_draws_nothing() {
        let data = bitmap(2, &[vec![B, B]], false);
        let mut paint = Paint::new();
        paint.reset(8, 8).unwrap();
        paint.clear(Color::White);
        let summary =
            decode(Cursor::new(data), &mut paint, 8, 0, Binarize::Luma { threshold: 128 }).unwrap();
        assert_eq!(summary.drawn_width, 0);
        assert!(paint.buffer().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn top_down_rows_stream_without_seeking() {
        // 4 px rows are 12 bytes with no padding, so rows follow one another
        let rows = vec![vec![W, B, W, B]; 30];
        let data = bitmap(4, &rows, true);
        let mut reader = CountingSeeks {
            inner: Cursor::new(data),
            seeks: 0,
        };
        let mut paint = Paint::new();
        paint.reset(8, 30).unwrap();
        decode(&mut reader, &mut paint, 0, 0, Binarize::Luma { threshold: 128 }).unwrap();
        // only the jump from the end of the header to the pixel data
        assert_eq!(reader.seeks, 1);
        assert_eq!(paint.get_pixel(1, 29), Some(Color::Black));
    }

    #[test]
    fn bottom_up_rows_seek_per_row() {
        let rows = vec![vec![W; 40]; 3];
        let data = bitmap(40, &rows, false);
        let mut reader = CountingSeeks {
            inner: Cursor::new(data),
            seeks: 0,
        };
        let mut paint = Paint::new();
        paint.reset(40, 3).unwrap();
        decode(&mut reader, &mut paint, 0, 0, Binarize::Luma { threshold: 128 }).unwrap();
        assert_eq!(reader.seeks, 3);
    }

    #[test]
    fn truncated_pixels_abort_with_partial_draw() {
        let rows = vec![vec![B; 8]; 4];
        let mut data = bitmap(8, &rows, true);
        data.truncate(54 + 24 * 2 + 5);
        let mut paint = Paint::new();
        paint.reset(8, 4).unwrap();
        paint.clear(Color::White);
        let err = decode(Cursor::new(data), &mut paint, 0, 0, Binarize::Luma { threshold: 128 })
            .unwrap_err();
        assert!(matches!(err, ImageError::Truncated));
        assert_eq!(paint.get_pixel(7, 1), Some(Color::Black));
        assert_eq!(paint.get_pixel(0, 3), Some(Color::White));
    }
}
