//! Sprite atlas serialization
//!
//! A converted sprite is a JSON manifest `<name>.fh.json` next to a PNG atlas `<name>.png`,
//! or next to a `<name>/` folder holding one PNG per frame when split mode is used.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use image::{ImageError, RgbaImage};
use thiserror::Error;

use crate::graphics::sprite::{AnimationSequence, Sprite, SpriteFrame};

pub mod generator;
pub mod metadata;

use metadata::{FrameEntry, GroupEntry, GroupExtra, SpriteManifest, MANIFEST_VERSION};

const SPRITE_JSON_EXTENSION: &str = ".fh.json";
const IMAGE_EXTENSION: &str = "png";

/// Options for writing a sprite
#[derive(Debug, Clone, Copy)]
pub struct SpriteSaveOptions {
    pub remove_duplicate_frames: bool,
    pub split_into_png_files: bool,
    /// Run the written PNGs through oxipng.
    pub optimize_png: bool,
}

impl Default for SpriteSaveOptions {
    fn default() -> Self {
        Self {
            remove_duplicate_frames: true,
            split_into_png_files: false,
            optimize_png: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid group id '{0}' in manifest")]
    InvalidGroupId(String),
    #[error("PNG optimisation failed: {0}")]
    Optimise(String),
}

pub fn make_json_filename(resource_name: &str) -> String {
    format!("{}{}", resource_name, SPRITE_JSON_EXTENSION)
}

/// Resource name of a manifest path (`a/b/name.fh.json` -> `name`).
pub fn resource_name(json_path: &Path) -> String {
    let file_name = json_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    match file_name.strip_suffix(SPRITE_JSON_EXTENSION) {
        Some(stem) => stem.to_string(),
        None => Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
    }
}

fn folder_of(json_path: &Path) -> PathBuf {
    json_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Writes `sprite` as a manifest plus atlas (or per-frame PNGs).
pub fn save_sprite(
    sprite: &Sprite,
    json_path: &Path,
    options: &SpriteSaveOptions,
) -> Result<(), AtlasError> {
    let folder = folder_of(json_path);
    let name = resource_name(json_path);
    if !folder.as_os_str().is_empty() {
        fs::create_dir_all(&folder)?;
    }

    let layout = generator::create_atlas_layout(sprite, options.remove_duplicate_frames);

    let mut groups = BTreeMap::new();
    for placement in &layout.groups {
        let Some(sequence) = sprite.groups.get(&placement.group_id) else {
            continue;
        };
        let frames = sequence
            .frames
            .iter()
            .zip(&placement.frames)
            .map(|(frame, frame_placement)| {
                let sized = !frame_placement.dup && !options.split_into_png_files;
                FrameEntry {
                    id: frame.id,
                    dup: frame_placement.dup,
                    pad_left: frame.padding.0,
                    pad_top: frame.padding.1,
                    w: sized.then(|| frame.image.width()),
                    h: sized.then(|| frame.image.height()),
                }
            })
            .collect();

        groups.insert(
            placement.group_id.to_string(),
            GroupEntry {
                boundary_size_width: sequence.boundary_size.0,
                boundary_size_height: sequence.boundary_size.1,
                extra: GroupExtra::from_params(&sequence.params),
                pix_height_offset: placement.pix_height_offset,
                frames,
            },
        );
    }

    if options.split_into_png_files {
        let frame_folder = folder.join(&name);
        for placement in &layout.groups {
            let Some(sequence) = sprite.groups.get(&placement.group_id) else {
                continue;
            };
            for (frame, frame_placement) in sequence.frames.iter().zip(&placement.frames) {
                if frame_placement.dup || frame.is_empty() {
                    continue;
                }
                fs::create_dir_all(&frame_folder)?;
                let frame_path = frame_folder.join(format!("{}.{}", frame.id, IMAGE_EXTENSION));
                save_png(&frame.image, &frame_path, options.optimize_png)?;
            }
        }
    } else {
        let atlas = generator::generate_atlas(sprite, &layout);
        let atlas_path = folder.join(format!("{}.{}", name, IMAGE_EXTENSION));
        save_png(&atlas, &atlas_path, options.optimize_png)?;
    }

    let manifest = SpriteManifest {
        version: MANIFEST_VERSION.to_string(),
        groups,
        split_to_folder: options.split_into_png_files,
    };
    metadata::save_manifest(&manifest, json_path)?;

    log::debug!(
        "Saved sprite {} ({} groups, {}x{} atlas)",
        json_path.display(),
        sprite.groups.len(),
        layout.dimensions.0,
        layout.dimensions.1
    );
    Ok(())
}

/// Reads a sprite written by [`save_sprite`]. Duplicate references resolve to the pixels
/// of the first stored occurrence of their id.
pub fn load_sprite(json_path: &Path) -> Result<Sprite, AtlasError> {
    let folder = folder_of(json_path);
    let name = resource_name(json_path);
    let manifest = metadata::load_manifest(json_path)?;

    let atlas = if manifest.split_to_folder {
        None
    } else {
        let atlas_path = folder.join(format!("{}.{}", name, IMAGE_EXTENSION));
        Some(image::open(atlas_path)?.to_rgba8())
    };

    let mut parsed_groups = Vec::with_capacity(manifest.groups.len());
    for (key, group) in &manifest.groups {
        let group_id: i32 = key
            .trim()
            .parse()
            .map_err(|_| AtlasError::InvalidGroupId(key.clone()))?;
        parsed_groups.push((group_id, group));
    }

    // Gather stored pixels first, so duplicates can point at frames of any group.
    let mut pixels: BTreeMap<i32, RgbaImage> = BTreeMap::new();
    for (_, group) in &parsed_groups {
        let mut x_offset = 0u32;
        for entry in &group.frames {
            if entry.dup {
                continue;
            }
            let width = entry.w.unwrap_or(0);
            let height = entry.h.unwrap_or(0);
            let image = match &atlas {
                Some(atlas) => {
                    generator::slice_frame(atlas, x_offset, group.pix_height_offset, width, height)
                }
                None => load_split_frame(&folder.join(&name), entry.id)?,
            };
            x_offset += width;
            pixels.entry(entry.id).or_insert(image);
        }
    }

    let mut sprite = Sprite::default();
    for (group_id, group) in parsed_groups {
        let frames = group
            .frames
            .iter()
            .map(|entry| SpriteFrame {
                id: entry.id,
                image: pixels
                    .get(&entry.id)
                    .cloned()
                    .unwrap_or_else(|| RgbaImage::new(0, 0)),
                padding: (entry.pad_left, entry.pad_top),
            })
            .collect();
        sprite.groups.insert(
            group_id,
            AnimationSequence {
                frames,
                boundary_size: (group.boundary_size_width, group.boundary_size_height),
                params: group
                    .extra
                    .as_ref()
                    .map(GroupExtra::to_params)
                    .unwrap_or_default(),
            },
        );
    }
    Ok(sprite)
}

/// Zero-size frames are never written in split mode, so a missing file is an empty frame.
fn load_split_frame(frame_folder: &Path, id: i32) -> Result<RgbaImage, AtlasError> {
    let path = frame_folder.join(format!("{}.{}", id, IMAGE_EXTENSION));
    if !path.exists() {
        return Ok(RgbaImage::new(0, 0));
    }
    Ok(image::open(path)?.to_rgba8())
}

/// Saves a PNG, optionally recompressing it with oxipng.
pub fn save_png(image: &RgbaImage, path: &Path, optimize: bool) -> Result<(), AtlasError> {
    if !optimize {
        image.save(path)?;
        return Ok(());
    }

    let temp_path = path.with_extension("temp.png");
    image.save(&temp_path)?;

    let options = oxipng::Options::from_preset(2);
    let result = oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    );

    if let Err(e) = fs::remove_file(&temp_path) {
        log::warn!("Failed to remove temporary file {}: {}", temp_path.display(), e);
    }
    result.map_err(|e| AtlasError::Optimise(e.to_string()))
}
