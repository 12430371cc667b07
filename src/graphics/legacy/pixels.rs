//! Indexed pixel payload decoding for the four classic frame formats.
//!
//! * `0` - raw rows of palette indices
//! * `1` - u32 offset per row, rows of `(code, len - 1)` pairs, code `0xFF` marks literal bytes
//! * `2` - one u16 offset to a packed stream, segment byte holds a 3-bit code and 5-bit length,
//!   code `7` marks literal bytes
//! * `3` - like `2` but every row is located through a secondary u16 offset table

use std::io::{self, Cursor};

use image::RgbaImage;

use crate::binary_utils::{read_u16_le, read_u32_le, read_u8, seek_to};
use crate::graphics::palette::Palette;

const PACKED_LITERAL: u8 = 7;
const RLE_LITERAL: u8 = 0xFF;

struct IndexedCanvas<'p> {
    image: RgbaImage,
    palette: &'p Palette,
    x: u32,
    y: u32,
}

impl<'p> IndexedCanvas<'p> {
    fn new(width: u32, height: u32, palette: &'p Palette) -> Self {
        IndexedCanvas {
            image: RgbaImage::from_pixel(width, height, palette.colour(0)),
            palette,
            x: 0,
            y: 0,
        }
    }

    /// Writes past the row width are dropped.
    fn put(&mut self, index: u8) {
        if self.x < self.image.width() && self.y < self.image.height() {
            self.image.put_pixel(self.x, self.y, self.palette.colour(index));
        }
        self.x += 1;
    }

    fn end_line(&mut self) {
        self.y += 1;
        self.x = 0;
    }

    fn load_raw(&mut self, cursor: &mut Cursor<&[u8]>, count: u32) -> io::Result<()> {
        for _ in 0..count {
            let index = read_u8(cursor)?;
            self.put(index);
        }
        Ok(())
    }

    fn load_fill(&mut self, count: u32, index: u8) {
        for _ in 0..count {
            self.put(index);
        }
    }

    fn load_line(&mut self, cursor: &mut Cursor<&[u8]>, packed: bool) -> io::Result<()> {
        let width = self.image.width();
        let mut total = 0u32;
        while total < width {
            let (code, length, literal) = if packed {
                let segment = read_u8(cursor)?;
                let code = segment / 32;
                (code, (segment & 31) as u32 + 1, code == PACKED_LITERAL)
            } else {
                let code = read_u8(cursor)?;
                let length = read_u8(cursor)? as u32 + 1;
                (code, length, code == RLE_LITERAL)
            };

            if literal {
                self.load_raw(cursor, length)?;
            } else {
                self.load_fill(length, code);
            }
            total += length;
        }
        Ok(())
    }
}

/// Decodes a `width` x `height` frame whose payload starts at `base`.
///
/// Unknown formats produce a frame filled with palette entry 0.
pub fn decode_indexed(
    cursor: &mut Cursor<&[u8]>,
    base: u64,
    format: u32,
    width: u32,
    height: u32,
    palette: &Palette,
) -> io::Result<RgbaImage> {
    let mut canvas = IndexedCanvas::new(width, height, palette);

    match format {
        0 => {
            for _ in 0..height {
                canvas.load_raw(cursor, width)?;
                canvas.end_line();
            }
        }
        1 => {
            let mut offsets = Vec::new();
            for _ in 0..height {
                offsets.push(read_u32_le(cursor)?);
            }
            for offset in offsets {
                seek_to(cursor, base + offset as u64)?;
                canvas.load_line(cursor, false)?;
                canvas.end_line();
            }
        }
        2 => {
            let offset = read_u16_le(cursor)?;
            seek_to(cursor, base + offset as u64)?;
            for _ in 0..height {
                canvas.load_line(cursor, true)?;
                canvas.end_line();
            }
        }
        3 => {
            let row_stride = 2 * (width as u64 / 32);
            for row in 0..height as u64 {
                seek_to(cursor, base + row * row_stride)?;
                let line_offset = read_u16_le(cursor)?;
                seek_to(cursor, base + line_offset as u64)?;
                canvas.load_line(cursor, true)?;
                canvas.end_line();
            }
        }
        other => {
            log::warn!("Unknown frame pixel format {}, leaving frame blank", other);
        }
    }

    Ok(canvas.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn grey_palette() -> Palette {
        let data: Vec<u8> = (0..=255u8).flat_map(|i| [i, i, i]).collect();
        Palette::from_rgb(&data)
    }

    fn row(image: &RgbaImage, y: u32) -> Vec<u8> {
        (0..image.width()).map(|x| image.get_pixel(x, y)[0]).collect()
    }

    #[test]
    fn raw_rows() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut cursor = Cursor::new(&data[..]);
        let image = decode_indexed(&mut cursor, 0, 0, 3, 2, &grey_palette()).unwrap();
        assert_eq!(row(&image, 0), vec![1, 2, 3]);
        assert_eq!(row(&image, 1), vec![4, 5, 6]);
    }

    #[test]
    fn rle_rows_with_literal_segments() {
        // two row offsets, then row 0: fill 9 x2, literal [7, 8]; row 1: fill 3 x4
        let data = [
            8u8, 0, 0, 0, 14, 0, 0, 0, //
            9, 1, 0xFF, 1, 7, 8, //
            3, 3,
        ];
        let mut cursor = Cursor::new(&data[..]);
        let image = decode_indexed(&mut cursor, 0, 1, 4, 2, &grey_palette()).unwrap();
        assert_eq!(row(&image, 0), vec![9, 9, 7, 8]);
        assert_eq!(row(&image, 1), vec![3, 3, 3, 3]);
    }

    #[test]
    fn packed_stream_with_base_offset() {
        // offset 2 -> segments: code 1 len 3, literal len 1 [200]; code 2 len 4
        let data = [2u8, 0, 0x22, 0xE0, 200, 0x43];
        let mut cursor = Cursor::new(&data[..]);
        let image = decode_indexed(&mut cursor, 0, 2, 4, 2, &grey_palette()).unwrap();
        assert_eq!(row(&image, 0), vec![1, 1, 1, 200]);
        assert_eq!(row(&image, 1), vec![2, 2, 2, 2]);
    }

    #[test]
    fn secondary_offset_table() {
        // width 64 -> row stride 4 bytes; table entries at 0 and 4
        let mut data = vec![8u8, 0, 0, 0, 10, 0, 0, 0];
        data.extend_from_slice(&[0x3F, 0x3F]); // row 0: code 1, len 32 twice
        data.extend_from_slice(&[0x5F, 0x5F]); // row 1: code 2, len 32 twice
        let mut cursor = Cursor::new(&data[..]);
        let image = decode_indexed(&mut cursor, 0, 3, 64, 2, &grey_palette()).unwrap();
        assert!(row(&image, 0).iter().all(|&v| v == 1));
        assert!(row(&image, 1).iter().all(|&v| v == 2));
    }

    #[test]
    fn overlong_segments_are_clipped() {
        let data = [4u8, 0, 0, 0, 5, 9];
        let mut cursor = Cursor::new(&data[..]);
        let image = decode_indexed(&mut cursor, 0, 1, 3, 1, &grey_palette()).unwrap();
        assert_eq!(row(&image, 0), vec![5, 5, 5]);
    }

    #[test]
    fn unknown_format_is_blank() {
        let mut palette = grey_palette();
        palette.init(0x41);
        let mut cursor = Cursor::new(&[][..]);
        let image = decode_indexed(&mut cursor, 0, 9, 2, 2, &palette).unwrap();
        assert!(image.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let data = [1u8, 2];
        let mut cursor = Cursor::new(&data[..]);
        assert!(decode_indexed(&mut cursor, 0, 0, 3, 1, &grey_palette()).is_err());
    }
}
