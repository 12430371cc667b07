//! 32-bit container (`D32F` tag): one group of BGRA frames stored bottom-up.

use std::io::Cursor;

use image::{Rgba, RgbaImage};

use crate::binary_utils::{read_i32_le, read_u32_le, read_u8, seek_to, skip};
use crate::graphics::sprite::{SequenceParams, Sprite, SpriteBuilder};

use super::{LegacySpriteError, MAX_FRAME_DIMENSION};

pub const D32F_TAG: u32 = 0x4632_3344;

pub(super) fn decode_rgba(data: &[u8]) -> Result<Sprite, LegacySpriteError> {
    let mut cursor = Cursor::new(data);
    seek_to(&mut cursor, 4)?;

    let _version = read_u32_le(&mut cursor)?;
    let _header_count = read_u32_le(&mut cursor)?;
    let width = read_u32_le(&mut cursor)?;
    let height = read_u32_le(&mut cursor)?;
    skip(&mut cursor, 12)?;
    let _header_total = read_u32_le(&mut cursor)?;
    let _unknown = read_u32_le(&mut cursor)?;
    let frame_count = read_u32_le(&mut cursor)?;
    let _unknown = read_u32_le(&mut cursor)?;

    // frame names, then approximate frame offsets
    skip(&mut cursor, 13 * frame_count as i64)?;
    skip(&mut cursor, 4 * frame_count as i64)?;

    let mut builder = SpriteBuilder::new();
    let mut ids = Vec::new();
    for index in 0..frame_count as i32 {
        let _format = read_u32_le(&mut cursor)?;
        let _size = read_i32_le(&mut cursor)?;
        let _full_width = read_i32_le(&mut cursor)?;
        let _full_height = read_i32_le(&mut cursor)?;
        let frame_width = read_i32_le(&mut cursor)?.max(0) as u32;
        let frame_height = read_i32_le(&mut cursor)?.max(0) as u32;
        let left = read_i32_le(&mut cursor)?;
        let top = read_i32_le(&mut cursor)?;
        skip(&mut cursor, 8)?;

        if frame_width > MAX_FRAME_DIMENSION || frame_height > MAX_FRAME_DIMENSION {
            return Err(LegacySpriteError::Malformed(format!(
                "frame {} is {}x{}",
                index, frame_width, frame_height
            )));
        }

        let image = read_bgra_bottom_up(&mut cursor, frame_width, frame_height)?;
        builder.add_frame(index, image, (left, top));
        ids.push(index);
    }
    builder.add_group(0, &ids, (width, height), SequenceParams::default());
    Ok(builder.build())
}

/// Reads `width * height` BGRA pixels whose first row is the bottom of the image.
pub(super) fn read_bgra_bottom_up(
    cursor: &mut Cursor<&[u8]>,
    width: u32,
    height: u32,
) -> Result<RgbaImage, LegacySpriteError> {
    let mut image = RgbaImage::new(width, height);
    for row in 0..height {
        let y = height - row - 1;
        for x in 0..width {
            let b = read_u8(cursor)?;
            let g = read_u8(cursor)?;
            let r = read_u8(cursor)?;
            let a = read_u8(cursor)?;
            image.put_pixel(x, y, Rgba([r, g, b, a]));
        }
    }
    Ok(image)
}
