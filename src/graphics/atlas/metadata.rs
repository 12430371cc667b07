//! Sprite manifest (`<name>.fh.json`)
//!
//! Describes every group of a sprite and where each frame lives in the atlas image.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use crate::graphics::sprite::SequenceParams;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpriteManifest {
    pub version: String,
    /// Groups keyed by decimal group id.
    pub groups: BTreeMap<String, GroupEntry>,
    /// True when every frame is a separate PNG in `<name>/<frameId>.png`.
    #[serde(default)]
    pub split_to_folder: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub boundary_size_width: u32,
    pub boundary_size_height: u32,
    /// Only present when some parameter differs from its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<GroupExtra>,
    /// Top of this group's band in the atlas.
    #[serde(default)]
    pub pix_height_offset: u32,
    pub frames: Vec<FrameEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor_percent: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_cycle_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_frame_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_point_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_point_y: Option<i32>,
}

impl GroupExtra {
    /// Records only the parameters that differ from their defaults.
    pub fn from_params(params: &SequenceParams) -> Option<Self> {
        if params.is_default() {
            return None;
        }
        let defaults = SequenceParams::default();
        let differs = |value: i32, default: i32| (value != default).then_some(value);
        Some(GroupExtra {
            scale_factor_percent: differs(
                params.scale_factor_percent,
                defaults.scale_factor_percent,
            ),
            animation_cycle_duration: differs(
                params.animation_cycle_duration,
                defaults.animation_cycle_duration,
            ),
            special_frame_index: differs(params.special_frame_index, defaults.special_frame_index),
            action_point_x: params.action_point.map(|(x, _)| x),
            action_point_y: params.action_point.map(|(_, y)| y),
        })
    }

    pub fn to_params(&self) -> SequenceParams {
        let defaults = SequenceParams::default();
        SequenceParams {
            scale_factor_percent: self
                .scale_factor_percent
                .unwrap_or(defaults.scale_factor_percent),
            animation_cycle_duration: self
                .animation_cycle_duration
                .unwrap_or(defaults.animation_cycle_duration),
            special_frame_index: self
                .special_frame_index
                .unwrap_or(defaults.special_frame_index),
            action_point: self
                .action_point_x
                .map(|x| (x, self.action_point_y.unwrap_or(0))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameEntry {
    pub id: i32,
    pub dup: bool,
    pub pad_left: i32,
    pub pad_top: i32,
    /// Omitted for duplicates and in split mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
}

pub fn save_manifest(manifest: &SpriteManifest, path: &Path) -> Result<(), super::AtlasError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<SpriteManifest, super::AtlasError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
