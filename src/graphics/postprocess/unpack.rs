//! `unpack`: saves selected frames of the first group as standalone sprites.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{normalize_subdir, ResourceKind, ResourceMedia};
use crate::graphics::atlas::{make_json_filename, save_sprite};
use crate::graphics::sprite::{SequenceParams, Sprite, SpriteBuilder};

use super::{PostprocessContext, PostprocessError};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UnpackTask {
    /// Output name; `%1` is replaced by the running id.
    template: String,
    subdir: String,
    id_offset: i32,
    start_frame: usize,
    end_frame: usize,
}

pub(super) fn unpack(
    sprite: Sprite,
    params: &Value,
    context: &PostprocessContext<'_>,
) -> Result<Sprite, PostprocessError> {
    let tasks: Vec<UnpackTask> = super::parse_params("unpack", params);
    let Some((_, sequence)) = sprite.groups.first_key_value() else {
        log::warn!("Nothing to unpack in {}", context.sprite_path.display());
        return Ok(sprite);
    };

    for task in &tasks {
        let subdir = normalize_subdir(&task.subdir);
        let folder: PathBuf = if subdir.is_empty() {
            context
                .sprite_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| context.destination_root.to_path_buf())
        } else {
            context.destination_root.join(&subdir)
        };

        for (i, frame_index) in (task.start_frame..=task.end_frame).enumerate() {
            let Some(frame) = sequence.frames.get(frame_index) else {
                log::warn!(
                    "Unpack of {} stops at frame {}: group has {} frames",
                    context.sprite_path.display(),
                    frame_index,
                    sequence.frames.len()
                );
                break;
            };
            let id = task.id_offset + i as i32;
            let name = task.template.replace("%1", &id.to_string());
            let filename = make_json_filename(&name);

            let mut builder = SpriteBuilder::new();
            builder.add_frame(0, frame.image.clone(), frame.padding);
            builder.add_group(0, &[0], sequence.boundary_size, SequenceParams::default());
            save_sprite(&builder.build(), &folder.join(&filename), &context.save_options)?;

            if let Some(catalog) = context.catalog {
                catalog.register_resource(ResourceMedia::new(
                    ResourceKind::Sprite,
                    &name,
                    &subdir,
                    &filename,
                ));
            }
        }
    }
    Ok(sprite)
}
