//! Atlas layout and image composition.
//!
//! Every group owns a horizontal band; its frames are packed left to right and bands are
//! stacked top to bottom in ascending group order. A band is as tall as its tallest frame.

use std::collections::BTreeSet;

use image::{imageops, RgbaImage};

use crate::graphics::sprite::Sprite;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlacement {
    /// Already stored under the same id; takes no atlas space.
    pub dup: bool,
    pub x: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlacement {
    pub group_id: i32,
    pub pix_height_offset: u32,
    pub band_height: u32,
    pub frames: Vec<FramePlacement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasLayout {
    pub dimensions: (u32, u32),
    pub groups: Vec<GroupPlacement>,
}

/// Computes band offsets, frame positions and duplicate flags for `sprite`.
pub fn create_atlas_layout(sprite: &Sprite, remove_duplicates: bool) -> AtlasLayout {
    let mut seen = BTreeSet::new();
    let mut total_width = 0u32;
    let mut total_height = 0u32;
    let mut groups = Vec::with_capacity(sprite.groups.len());

    for (&group_id, sequence) in &sprite.groups {
        let mut x = 0u32;
        let mut band_height = 0u32;
        let mut frames = Vec::with_capacity(sequence.frames.len());

        for frame in &sequence.frames {
            let first_use = seen.insert(frame.id);
            let dup = remove_duplicates && !first_use;
            frames.push(FramePlacement { dup, x });
            if dup {
                continue;
            }
            x += frame.image.width();
            band_height = band_height.max(frame.image.height());
        }

        groups.push(GroupPlacement {
            group_id,
            pix_height_offset: total_height,
            band_height,
            frames,
        });
        total_width = total_width.max(x);
        total_height += band_height;
    }

    AtlasLayout {
        dimensions: (total_width, total_height),
        groups,
    }
}

/// Composes the atlas image. An empty layout yields a 1x1 transparent image.
pub fn generate_atlas(sprite: &Sprite, layout: &AtlasLayout) -> RgbaImage {
    let (width, height) = layout.dimensions;
    let mut atlas = RgbaImage::new(width.max(1), height.max(1));

    for placement in &layout.groups {
        let Some(sequence) = sprite.groups.get(&placement.group_id) else {
            continue;
        };
        if placement.band_height == 0 {
            continue;
        }
        for (frame, frame_placement) in sequence.frames.iter().zip(&placement.frames) {
            if frame_placement.dup || frame.is_empty() {
                continue;
            }
            imageops::replace(
                &mut atlas,
                &frame.image,
                frame_placement.x as i64,
                placement.pix_height_offset as i64,
            );
        }
    }

    atlas
}

/// Cuts a frame out of the atlas; regions outside the atlas are clipped.
pub fn slice_frame(atlas: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
    if width == 0 || height == 0 {
        return RgbaImage::new(0, 0);
    }
    imageops::crop_imm(atlas, x, y, width, height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::sprite::{SequenceParams, SpriteBuilder};
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    fn sample() -> Sprite {
        let mut builder = SpriteBuilder::new();
        builder.add_frame(0, solid(2, 3, 10), (0, 0));
        builder.add_frame(1, solid(4, 1, 20), (0, 0));
        builder.add_frame(2, solid(1, 2, 30), (0, 0));
        builder.add_group(0, &[0, 1], (8, 8), SequenceParams::default());
        builder.add_group(5, &[1, 2, 0], (8, 8), SequenceParams::default());
        builder.build()
    }

    #[test]
    fn bands_stack_and_duplicates_take_no_space() {
        let layout = create_atlas_layout(&sample(), true);
        assert_eq!(layout.dimensions, (6, 5));

        let second = &layout.groups[1];
        assert_eq!(second.group_id, 5);
        assert_eq!(second.pix_height_offset, 3);
        assert_eq!(second.band_height, 2);
        assert_eq!(
            second.frames,
            vec![
                FramePlacement { dup: true, x: 0 },
                FramePlacement { dup: false, x: 0 },
                FramePlacement { dup: true, x: 1 },
            ]
        );
    }

    #[test]
    fn keeping_duplicates_widens_the_atlas() {
        let layout = create_atlas_layout(&sample(), false);
        assert_eq!(layout.dimensions, (7, 6));
        assert!(layout.groups.iter().flat_map(|g| &g.frames).all(|f| !f.dup));
    }

    #[test]
    fn composes_frames_at_their_positions() {
        let sprite = sample();
        let layout = create_atlas_layout(&sprite, true);
        let atlas = generate_atlas(&sprite, &layout);
        assert_eq!(atlas.dimensions(), (6, 5));
        assert_eq!(atlas.get_pixel(1, 2)[0], 10);
        assert_eq!(atlas.get_pixel(5, 0)[0], 20);
        assert_eq!(atlas.get_pixel(0, 4)[0], 30);
        assert_eq!(atlas.get_pixel(5, 4)[3], 0);
        assert_eq!(slice_frame(&atlas, 2, 0, 4, 1), solid(4, 1, 20));
    }

    #[test]
    fn empty_sprite_gives_single_pixel_atlas() {
        let sprite = Sprite::default();
        let layout = create_atlas_layout(&sprite, true);
        assert_eq!(generate_atlas(&sprite, &layout).dimensions(), (1, 1));
    }
}
