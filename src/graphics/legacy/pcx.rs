//! Raw-pixel images (`.pcx` / `.p32`) of the indexed archive.
//!
//! Three layouts share a 12-byte `size, width, height` header: the `P32F` BGRA variant,
//! packed 24-bit BGR rows, and 8-bit indices followed by a trailing RGB palette.

use std::io::Cursor;

use image::{Rgba, RgbaImage};

use crate::binary_utils::{read_bytes, read_u32_le, read_u8};
use crate::graphics::palette::{Palette, PALETTE_SIZE};
use crate::graphics::sprite::Sprite;

use super::{rgba::read_bgra_bottom_up, LegacySpriteError, MAX_FRAME_DIMENSION};

const P32F_TAG: u32 = 0x4632_3350;
const HEADER_SIZE: u64 = 12;

pub fn decode_pcx(data: &[u8]) -> Result<Sprite, LegacySpriteError> {
    let mut cursor = Cursor::new(data);
    let size = read_u32_le(&mut cursor)?;
    let width = read_u32_le(&mut cursor)?;
    let height = read_u32_le(&mut cursor)?;

    if size == P32F_TAG && width == 0 && height == 32 {
        let _size = read_u32_le(&mut cursor)?;
        let _unknown = read_u32_le(&mut cursor)?;
        let _unknown = read_u32_le(&mut cursor)?;
        let width = read_u32_le(&mut cursor)?;
        let height = read_u32_le(&mut cursor)?;
        let _unknown = read_u32_le(&mut cursor)?;
        let _unknown = read_u32_le(&mut cursor)?;
        check_dimensions(width, height)?;
        let image = read_bgra_bottom_up(&mut cursor, width, height)?;
        return Ok(Sprite::from_image(image));
    }

    if width == 0 || height == 0 {
        return Err(LegacySpriteError::EmptyImage);
    }
    check_dimensions(width, height)?;

    let pixel_count = width as u64 * height as u64;
    if pixel_count * 3 == size as u64 && data.len() as u64 == size as u64 + HEADER_SIZE {
        let mut image = RgbaImage::new(width, height);
        for row in 0..height {
            let y = height - row - 1;
            for x in 0..width {
                let b = read_u8(&mut cursor)?;
                let g = read_u8(&mut cursor)?;
                let r = read_u8(&mut cursor)?;
                image.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
        return Ok(Sprite::from_image(image));
    }

    let indices = read_bytes(&mut cursor, pixel_count as usize)?;
    let palette = Palette::from_rgb(&read_bytes(&mut cursor, PALETTE_SIZE * 3)?);
    let image = RgbaImage::from_fn(width, height, |x, y| {
        palette.colour(indices[(y * width + x) as usize])
    });
    Ok(Sprite::from_image(image))
}

fn check_dimensions(width: u32, height: u32) -> Result<(), LegacySpriteError> {
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(LegacySpriteError::Malformed(format!(
            "image is {}x{}",
            width, height
        )));
    }
    Ok(())
}
