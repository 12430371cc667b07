//! Frame geometry transforms: vertical flip, group transposition and boundary tightening.

use image::imageops;
use serde_json::Value;

use crate::graphics::sprite::{AnimationSequence, Sprite, SpriteFrame};

use super::{PostprocessContext, PostprocessError};

pub(super) fn flip_vertical(
    _group_id: i32,
    mut sequence: AnimationSequence,
    _params: &Value,
) -> AnimationSequence {
    for frame in sequence.frames.iter_mut().filter(|f| !f.is_empty()) {
        frame.image = imageops::flip_vertical(&frame.image);
    }
    sequence
}

/// Moves every frame into a group of its own. Group and frame ids run on across groups.
pub(super) fn transpose(
    sprite: Sprite,
    _params: &Value,
    _context: &PostprocessContext<'_>,
) -> Result<Sprite, PostprocessError> {
    let mut result = Sprite::default();
    let mut counter = 0i32;
    for (_, sequence) in sprite.groups {
        for frame in sequence.frames {
            result.groups.insert(
                counter,
                AnimationSequence {
                    frames: vec![SpriteFrame { id: counter, ..frame }],
                    boundary_size: sequence.boundary_size,
                    params: sequence.params,
                },
            );
            counter += 1;
        }
    }
    Ok(result)
}

/// Shrinks every group boundary to the tightest box holding all non-empty frames and
/// rebases paddings onto it.
pub(super) fn optimize_boundary(
    mut sprite: Sprite,
    _params: &Value,
    _context: &PostprocessContext<'_>,
) -> Result<Sprite, PostprocessError> {
    let frames = || {
        sprite
            .groups
            .values()
            .flat_map(|g| g.frames.iter())
            .filter(|f| !f.is_empty())
    };
    let Some(min_left) = frames().map(|f| f.padding.0).min() else {
        return Ok(sprite);
    };
    let min_top = frames().map(|f| f.padding.1).min().unwrap_or(0);
    let max_right = frames()
        .map(|f| f.padding.0 + f.image.width() as i32)
        .max()
        .unwrap_or(0);
    let max_bottom = frames()
        .map(|f| f.padding.1 + f.image.height() as i32)
        .max()
        .unwrap_or(0);

    let boundary = (
        (max_right - min_left).max(0) as u32,
        (max_bottom - min_top).max(0) as u32,
    );
    for sequence in sprite.groups.values_mut() {
        sequence.boundary_size = boundary;
        for frame in sequence.frames.iter_mut() {
            frame.padding.0 -= min_left;
            frame.padding.1 -= min_top;
        }
    }
    Ok(sprite)
}
