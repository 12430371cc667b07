//! Registry-driven sprite transforms
//!
//! Every transform is looked up by its directive name in [`TRANSFORMS`] and runs in one of
//! two stages: [`Stage::Conversion`] on the freshly decoded sprite before it is written, or
//! [`Stage::Postprocess`] on the sprite re-loaded from disk. Transforms take their input by
//! value and return the transformed copy.
//!
//! Within a stage, per-group transforms run first (in directive name order) and whole-sprite
//! transforms follow (also in name order).

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ResourceCatalog;
use crate::graphics::atlas::{AtlasError, SpriteSaveOptions};
use crate::graphics::sprite::{AnimationSequence, Sprite};
use crate::registry::Directives;

mod battle;
mod geometry;
mod transparency;
mod unpack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Conversion,
    Postprocess,
}

#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("atlas error: {0}")]
    Atlas(#[from] AtlasError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a whole-sprite transform may touch besides the sprite itself.
pub struct PostprocessContext<'a> {
    /// Manifest path of the sprite being processed.
    pub sprite_path: &'a Path,
    pub destination_root: &'a Path,
    pub catalog: Option<&'a dyn ResourceCatalog>,
    pub save_options: SpriteSaveOptions,
}

type SequenceTransform = fn(i32, AnimationSequence, &Value) -> AnimationSequence;
type SpriteTransform =
    fn(Sprite, &Value, &PostprocessContext<'_>) -> Result<Sprite, PostprocessError>;

enum TransformFn {
    Sequence(SequenceTransform),
    Sprite(SpriteTransform),
}

struct TransformEntry {
    name: &'static str,
    stage: Stage,
    apply: TransformFn,
}

const TRANSFORMS: &[TransformEntry] = &[
    TransformEntry {
        name: "battle_unit",
        stage: Stage::Conversion,
        apply: TransformFn::Sequence(battle::battle_unit),
    },
    TransformEntry {
        name: "flip_vertical",
        stage: Stage::Conversion,
        apply: TransformFn::Sequence(geometry::flip_vertical),
    },
    TransformEntry {
        name: "make_transparent",
        stage: Stage::Postprocess,
        apply: TransformFn::Sequence(transparency::make_transparent),
    },
    TransformEntry {
        name: "optimize_boundary",
        stage: Stage::Conversion,
        apply: TransformFn::Sprite(geometry::optimize_boundary),
    },
    TransformEntry {
        name: "transpose",
        stage: Stage::Conversion,
        apply: TransformFn::Sprite(geometry::transpose),
    },
    TransformEntry {
        name: "unpack",
        stage: Stage::Postprocess,
        apply: TransformFn::Sprite(unpack::unpack),
    },
];

fn find_transform(name: &str) -> Option<&'static TransformEntry> {
    TRANSFORMS.iter().find(|entry| entry.name == name)
}

/// True if any directive names a known transform of `stage`.
pub fn has_stage_directives(directives: &Directives, stage: Stage) -> bool {
    directives
        .keys()
        .filter_map(|name| find_transform(name))
        .any(|entry| entry.stage == stage)
}

/// Applies the directives belonging to `stage` to `sprite`.
pub fn apply_directives(
    sprite: Sprite,
    directives: &Directives,
    stage: Stage,
    context: &PostprocessContext<'_>,
) -> Result<Sprite, PostprocessError> {
    let mut sequence_steps = Vec::new();
    let mut sprite_steps = Vec::new();
    for (name, params) in directives {
        match find_transform(name) {
            Some(entry) if entry.stage == stage => match entry.apply {
                TransformFn::Sequence(f) => sequence_steps.push((f, params)),
                TransformFn::Sprite(f) => sprite_steps.push((name, f, params)),
            },
            Some(_) => {}
            None => {
                if stage == Stage::Conversion {
                    log::warn!(
                        "Unknown directive '{}' for {}, ignoring",
                        name,
                        context.sprite_path.display()
                    );
                }
            }
        }
    }

    let mut sprite = sprite;
    if !sequence_steps.is_empty() {
        sprite.groups = sprite
            .groups
            .into_iter()
            .map(|(group_id, sequence)| {
                let sequence = sequence_steps
                    .iter()
                    .fold(sequence, |seq, (f, params)| f(group_id, seq, params));
                (group_id, sequence)
            })
            .collect();
    }
    for (name, f, params) in sprite_steps {
        log::debug!("Applying '{}' to {}", name, context.sprite_path.display());
        sprite = f(sprite, params, context)?;
    }
    Ok(sprite)
}

/// Deserializes directive parameters, falling back to defaults when absent or malformed.
fn parse_params<T: DeserializeOwned + Default>(name: &str, params: &Value) -> T {
    if params.is_null() {
        return T::default();
    }
    match serde_json::from_value(params.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Bad parameters for '{}': {}; using defaults", name, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::sprite::{SequenceParams, SpriteBuilder};
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn context(path: &Path) -> PostprocessContext<'_> {
        PostprocessContext {
            sprite_path: path,
            destination_root: path,
            catalog: None,
            save_options: SpriteSaveOptions::default(),
        }
    }

    fn two_frame_sprite() -> Sprite {
        let mut builder = SpriteBuilder::new();
        let mut top = RgbaImage::from_pixel(1, 2, Rgba([9, 9, 9, 255]));
        top.put_pixel(0, 0, Rgba([1, 1, 1, 255]));
        builder.add_frame(0, top, (0, 0));
        builder.add_frame(1, RgbaImage::from_pixel(1, 1, Rgba([5, 5, 5, 255])), (0, 0));
        builder.add_group(2, &[0, 1], (4, 4), SequenceParams::default());
        builder.build()
    }

    fn directives(value: Value) -> Directives {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn stage_membership() {
        let d = directives(json!({"make_transparent": {}, "mystery": 1}));
        assert!(has_stage_directives(&d, Stage::Postprocess));
        assert!(!has_stage_directives(&d, Stage::Conversion));
        assert!(!has_stage_directives(&Directives::new(), Stage::Postprocess));
    }

    #[test]
    fn other_stage_and_unknown_directives_leave_sprite_untouched() {
        let path = Path::new("x.fh.json");
        let d = directives(json!({"make_transparent": {}, "mystery": [1, 2]}));
        let sprite = two_frame_sprite();
        let out = apply_directives(sprite.clone(), &d, Stage::Conversion, &context(path)).unwrap();
        assert_eq!(out, sprite);
    }

    #[test]
    fn sequence_steps_run_before_sprite_steps() {
        let path = Path::new("x.fh.json");
        let d = directives(json!({"flip_vertical": null, "transpose": {}}));
        let out =
            apply_directives(two_frame_sprite(), &d, Stage::Conversion, &context(path)).unwrap();
        assert_eq!(out.groups.len(), 2);
        let flipped = &out.group(0).unwrap().frames[0].image;
        assert_eq!(flipped.get_pixel(0, 1)[0], 1);
        assert_eq!(out.group(1).unwrap().frames[0].id, 1);
    }
}
