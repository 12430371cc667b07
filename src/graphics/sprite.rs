//! In-memory sprite model shared by the decoders, the transforms and the atlas writer.

use std::collections::BTreeMap;

use image::RgbaImage;

/// A decoded frame. Frames sharing an `id` hold the same pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteFrame {
    pub id: i32,
    pub image: RgbaImage,
    /// Offset of the pixel box inside the group boundary (left, top).
    pub padding: (i32, i32),
}

impl SpriteFrame {
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Per-group animation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceParams {
    pub scale_factor_percent: i32,
    pub animation_cycle_duration: i32,
    pub special_frame_index: i32,
    pub action_point: Option<(i32, i32)>,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            scale_factor_percent: 100,
            animation_cycle_duration: 1000,
            special_frame_index: -1,
            action_point: None,
        }
    }
}

impl SequenceParams {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One animation group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationSequence {
    pub frames: Vec<SpriteFrame>,
    pub boundary_size: (u32, u32),
    pub params: SequenceParams,
}

/// Group id to sequence, ordered by group id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sprite {
    pub groups: BTreeMap<i32, AnimationSequence>,
}

impl Sprite {
    /// A single-group, single-frame sprite bounded by the image itself.
    pub fn from_image(image: RgbaImage) -> Self {
        let boundary_size = image.dimensions();
        let mut sprite = Sprite::default();
        sprite.groups.insert(
            0,
            AnimationSequence {
                frames: vec![SpriteFrame {
                    id: 0,
                    image,
                    padding: (0, 0),
                }],
                boundary_size,
                params: SequenceParams::default(),
            },
        );
        sprite
    }

    pub fn group(&self, group_id: i32) -> Option<&AnimationSequence> {
        self.groups.get(&group_id)
    }

    pub fn frame_count(&self) -> usize {
        self.groups.values().map(|g| g.frames.len()).sum()
    }
}

/// Assembles a sprite from a frame pool and per-group id lists.
#[derive(Default)]
pub struct SpriteBuilder {
    frames: BTreeMap<i32, (RgbaImage, (i32, i32))>,
    groups: BTreeMap<i32, AnimationSequence>,
}

impl SpriteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self, id: i32, image: RgbaImage, padding: (i32, i32)) {
        self.frames.insert(id, (image, padding));
    }

    /// Adds a group referencing frames by id. Unknown ids become empty frames.
    pub fn add_group(
        &mut self,
        group_id: i32,
        frame_ids: &[i32],
        boundary_size: (u32, u32),
        params: SequenceParams,
    ) {
        let frames = frame_ids
            .iter()
            .map(|&id| match self.frames.get(&id) {
                Some((image, padding)) => SpriteFrame {
                    id,
                    image: image.clone(),
                    padding: *padding,
                },
                None => {
                    log::warn!("Group {} references unknown frame {}", group_id, id);
                    SpriteFrame {
                        id,
                        image: RgbaImage::new(0, 0),
                        padding: (0, 0),
                    }
                }
            })
            .collect();
        self.groups.insert(
            group_id,
            AnimationSequence {
                frames,
                boundary_size,
                params,
            },
        );
    }

    pub fn build(self) -> Sprite {
        Sprite {
            groups: self.groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn builder_shares_pixels_between_references() {
        let mut builder = SpriteBuilder::new();
        builder.add_frame(3, RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])), (5, 6));
        builder.add_group(0, &[3, 3], (10, 10), SequenceParams::default());
        builder.add_group(1, &[3], (10, 10), SequenceParams::default());
        let sprite = builder.build();

        assert_eq!(sprite.frame_count(), 3);
        let first = &sprite.group(0).unwrap().frames[0];
        let last = &sprite.group(1).unwrap().frames[0];
        assert_eq!(first, last);
        assert_eq!(first.padding, (5, 6));
    }

    #[test]
    fn from_image_uses_image_bounds() {
        let sprite = Sprite::from_image(RgbaImage::new(7, 3));
        let group = sprite.group(0).unwrap();
        assert_eq!(group.boundary_size, (7, 3));
        assert!(group.params.is_default());
    }
}
