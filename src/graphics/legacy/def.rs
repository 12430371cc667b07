//! Classic indexed sprite container.
//!
//! Layout: type tag, 8 unused bytes, block count, 256 RGB palette entries, then per block a
//! group id, an entry count, 8 unused bytes, 13-byte entry names and u32 frame offsets.
//! Every distinct frame offset is decoded once per palette variant.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Cursor,
};

use crate::binary_utils::{read_bytes, read_i32_le, read_u32_le, seek_to, skip};
use crate::graphics::palette::{AnimationPaletteConfig, Palette, PALETTE_SIZE};
use crate::graphics::sprite::{SequenceParams, Sprite, SpriteBuilder};

use super::{pixels, LegacySpriteError, MAX_FRAME_DIMENSION};

const QUIRK_REWIND: i64 = 16;

struct FrameRef {
    offset: u32,
    variant: usize,
}

struct GroupRefs {
    group_id: i32,
    frames: Vec<FrameRef>,
}

struct ParsedFrame {
    image: image::RgbaImage,
    padding: (i32, i32),
    boundary_size: (u32, u32),
}

pub(super) fn decode_classic(
    data: &[u8],
    tag: u32,
    config: &AnimationPaletteConfig,
) -> Result<Sprite, LegacySpriteError> {
    let mut cursor = Cursor::new(data);
    seek_to(&mut cursor, 4)?;
    skip(&mut cursor, 8)?;
    let total_blocks = read_u32_le(&mut cursor)?;

    let mut palette = Palette::from_rgb(&read_bytes(&mut cursor, PALETTE_SIZE * 3)?);
    palette.init(tag);

    let mut all_offsets = BTreeSet::new();
    let mut groups = Vec::new();
    for _ in 0..total_blocks {
        let group_id = read_i32_le(&mut cursor)?;
        let total_entries = read_i32_le(&mut cursor)?;
        if total_entries < 0 {
            return Err(LegacySpriteError::Malformed(format!(
                "block {} has negative entry count {}",
                group_id, total_entries
            )));
        }
        skip(&mut cursor, 8)?;
        skip(&mut cursor, 13 * total_entries as i64)?;

        let mut frames = Vec::new();
        for _ in 0..total_entries {
            let offset = read_u32_le(&mut cursor)?;
            all_offsets.insert(offset);
            frames.push(FrameRef { offset, variant: 0 });
        }
        groups.push(GroupRefs { group_id, frames });
    }

    if config.needs_shift() {
        groups = expand_palette_variants(groups, config.variants_count);
    }

    let mut builder = SpriteBuilder::new();
    let mut frame_ids: BTreeMap<(usize, u32), i32> = BTreeMap::new();
    let mut boundaries: BTreeMap<i32, (u32, u32)> = BTreeMap::new();
    let mut next_id = 0i32;

    for variant in 0..config.variants_count.max(1) {
        for &offset in &all_offsets {
            let frame = load_frame(data, offset, &palette)?;
            frame_ids.insert((variant, offset), next_id);
            boundaries.insert(next_id, frame.boundary_size);
            builder.add_frame(next_id, frame.image, frame.padding);
            next_id += 1;
        }
        if config.needs_shift() {
            palette.shift(config);
        }
    }

    for group in &groups {
        let mut ids = Vec::with_capacity(group.frames.len());
        let mut boundary_size = (0, 0);
        for frame in &group.frames {
            let Some(&id) = frame_ids.get(&(frame.variant, frame.offset)) else {
                continue;
            };
            ids.push(id);
            if let Some(&size) = boundaries.get(&id) {
                boundary_size = size;
            }
        }
        builder.add_group(group.group_id, &ids, boundary_size, SequenceParams::default());
    }

    Ok(builder.build())
}

/// Regenerates the group table for palette cycling: one group per entry of the first
/// block, holding that entry under every palette variant.
fn expand_palette_variants(groups: Vec<GroupRefs>, variants_count: usize) -> Vec<GroupRefs> {
    if groups.len() > 1 {
        log::warn!(
            "Palette cycling expects a single block, found {}; using the first",
            groups.len()
        );
    }
    let Some(first) = groups.into_iter().next() else {
        return Vec::new();
    };
    first
        .frames
        .iter()
        .enumerate()
        .map(|(index, entry)| GroupRefs {
            group_id: index as i32,
            frames: (0..variants_count)
                .map(|variant| FrameRef {
                    offset: entry.offset,
                    variant,
                })
                .collect(),
        })
        .collect()
}

fn load_frame(
    data: &[u8],
    offset: u32,
    palette: &Palette,
) -> Result<ParsedFrame, LegacySpriteError> {
    let mut cursor = Cursor::new(data);
    seek_to(&mut cursor, offset as u64)?;

    let _size = read_u32_le(&mut cursor)?;
    let format = read_u32_le(&mut cursor)?;
    let full_width = read_u32_le(&mut cursor)?;
    let full_height = read_u32_le(&mut cursor)?;
    let mut width = read_u32_le(&mut cursor)?;
    let mut height = read_u32_le(&mut cursor)?;
    let mut left = read_i32_le(&mut cursor)?;
    let mut top = read_i32_le(&mut cursor)?;

    // Some early containers store format 1 frames without margins; the pixel box then
    // overruns the full size and the row table starts 16 bytes earlier.
    if format == 1 && width > full_width && height > full_height {
        left = 0;
        top = 0;
        width = full_width;
        height = full_height;
        skip(&mut cursor, -QUIRK_REWIND)?;
    }

    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(LegacySpriteError::Malformed(format!(
            "frame at offset {} is {}x{}",
            offset, width, height
        )));
    }

    let base = cursor.position();
    let image = pixels::decode_indexed(&mut cursor, base, format, width, height, palette)?;

    Ok(ParsedFrame {
        image,
        padding: (left, top),
        boundary_size: (full_width, full_height),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    /// Builds a classic container with format 0 frames. `blocks` holds
    /// `(group id, frame indices)`; `frames` holds `(width, height, pixel indices)`.
    pub(crate) fn build_def(
        tag: u32,
        palette_rgb: &[[u8; 3]],
        blocks: &[(i32, Vec<usize>)],
        frames: &[(u32, u32, Vec<u8>)],
    ) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&tag.to_le_bytes());
        header.extend_from_slice(&[0u8; 8]);
        header.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        for i in 0..PALETTE_SIZE {
            let rgb = palette_rgb.get(i).copied().unwrap_or([i as u8, i as u8, i as u8]);
            header.extend_from_slice(&rgb);
        }
        let block_size: usize = blocks.iter().map(|(_, f)| 16 + 17 * f.len()).sum();
        let frames_start = header.len() + block_size;

        let mut frame_offsets = Vec::new();
        let mut payload = Vec::new();
        for (w, h, pixels) in frames {
            frame_offsets.push((frames_start + payload.len()) as u32);
            payload.extend_from_slice(&(32 + pixels.len() as u32).to_le_bytes());
            payload.extend_from_slice(&0u32.to_le_bytes());
            payload.extend_from_slice(&w.to_le_bytes());
            payload.extend_from_slice(&h.to_le_bytes());
            payload.extend_from_slice(&w.to_le_bytes());
            payload.extend_from_slice(&h.to_le_bytes());
            payload.extend_from_slice(&0i32.to_le_bytes());
            payload.extend_from_slice(&0i32.to_le_bytes());
            payload.extend_from_slice(pixels);
        }

        let mut out = header;
        for (group_id, indices) in blocks {
            out.extend_from_slice(&group_id.to_le_bytes());
            out.extend_from_slice(&(indices.len() as i32).to_le_bytes());
            out.extend_from_slice(&[0u8; 8]);
            out.extend(std::iter::repeat(0u8).take(13 * indices.len()));
            for &index in indices {
                out.extend_from_slice(&frame_offsets[index].to_le_bytes());
            }
        }
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn duplicate_offsets_share_frame_ids() {
        let data = build_def(
            0x41,
            &[],
            &[(0, vec![0, 1, 0]), (3, vec![1])],
            &[(2, 1, vec![10, 11]), (1, 1, vec![12])],
        );
        let sprite = decode_classic(&data, 0x41, &AnimationPaletteConfig::default()).unwrap();

        let ids: Vec<i32> = sprite.group(0).unwrap().frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0, 1, 0]);
        assert_eq!(sprite.group(3).unwrap().frames[0].id, 1);
        assert_eq!(sprite.group(3).unwrap().boundary_size, (1, 1));
        assert_eq!(
            *sprite.group(0).unwrap().frames[0].image.get_pixel(1, 0),
            Rgba([11, 11, 11, 255])
        );
    }

    #[test]
    fn key_slots_become_transparent() {
        let data = build_def(0x41, &[], &[(0, vec![0])], &[(2, 1, vec![0, 4])]);
        let sprite = decode_classic(&data, 0x41, &AnimationPaletteConfig::default()).unwrap();
        let image = &sprite.group(0).unwrap().frames[0].image;
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 0), Rgba([0, 0, 0, 128]));
    }

    #[test]
    fn single_variant_config_keeps_block_mapping() {
        let data = build_def(0x45, &[], &[(7, vec![0, 1])], &[(1, 1, vec![20]), (1, 1, vec![21])]);
        let plain = decode_classic(&data, 0x45, &AnimationPaletteConfig::default()).unwrap();
        let single = AnimationPaletteConfig {
            shifts: vec![crate::graphics::palette::PaletteShift { from: 20, count: 2 }],
            variants_count: 1,
        };
        assert_eq!(decode_classic(&data, 0x45, &single).unwrap(), plain);
        assert_eq!(plain.groups.keys().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn palette_cycling_builds_one_group_per_entry() {
        let data = build_def(0x45, &[], &[(0, vec![0, 1])], &[(1, 1, vec![20]), (1, 1, vec![21])]);
        let config = AnimationPaletteConfig {
            shifts: vec![crate::graphics::palette::PaletteShift { from: 20, count: 2 }],
            variants_count: 2,
        };
        let sprite = decode_classic(&data, 0x45, &config).unwrap();
        assert_eq!(sprite.groups.len(), 2);

        let first = sprite.group(0).unwrap();
        assert_eq!(first.frames.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(first.frames[0].image.get_pixel(0, 0)[0], 20);
        assert_eq!(first.frames[1].image.get_pixel(0, 0)[0], 21);

        let second = sprite.group(1).unwrap();
        assert_eq!(second.frames.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(second.frames[1].image.get_pixel(0, 0)[0], 20);
    }

    #[test]
    fn decoding_is_deterministic() {
        let data = build_def(
            0x42,
            &[],
            &[(2, vec![1, 0])],
            &[(3, 2, vec![9; 6]), (1, 2, vec![8; 2])],
        );
        let a = decode_classic(&data, 0x42, &AnimationPaletteConfig::default()).unwrap();
        let b = decode_classic(&data, 0x42, &AnimationPaletteConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wide_format_one_frame_is_clamped_to_full_size() {
        let mut data = build_def(0x41, &[], &[(0, vec![0])], &[(1, 1, vec![0])]);
        let frame_start = data.len() - 33;
        data.truncate(frame_start);
        // pixel box 16x9 overruns the 2x1 full size; after the rewind the row table is read
        // from the width field, so the single row sits at base + 16
        for value in [0u32, 1, 2, 1, 16, 9, 5, 5] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&[9, 1]);

        let sprite = decode_classic(&data, 0x41, &AnimationPaletteConfig::default()).unwrap();
        let frame = &sprite.group(0).unwrap().frames[0];
        assert_eq!(frame.image.dimensions(), (2, 1));
        assert_eq!(frame.padding, (0, 0));
        assert_eq!(*frame.image.get_pixel(1, 0), Rgba([9, 9, 9, 255]));
    }
}
