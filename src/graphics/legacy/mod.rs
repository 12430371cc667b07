//! Legacy sprite decoding
//!
//! Turns the per-resource blobs extracted from the archives into [`Sprite`] values. The
//! container is selected by its leading 4-byte tag: `D32F` marks the 32-bit variant, any
//! other value is the palette type of the classic indexed container.

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::graphics::palette::AnimationPaletteConfig;
use crate::graphics::sprite::Sprite;

mod def;
mod pcx;
mod pixels;
mod rgba;

pub use pcx::decode_pcx;
pub use rgba::D32F_TAG;

/// Frames larger than this in either direction are treated as corrupt.
pub const MAX_FRAME_DIMENSION: u32 = 8192;

#[derive(Debug, Error)]
pub enum LegacySpriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("malformed sprite: {0}")]
    Malformed(String),
    #[error("image has no pixels")]
    EmptyImage,
    #[error("unsupported sprite file '{0}'")]
    Unsupported(String),
}

/// Decodes an animation container. `resource_name` selects the palette cycling table.
pub fn decode_sprite(data: &[u8], resource_name: &str) -> Result<Sprite, LegacySpriteError> {
    let tag = data
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| LegacySpriteError::Malformed("missing type tag".to_string()))?;

    if tag == D32F_TAG {
        rgba::decode_rgba(data)
    } else {
        let config = AnimationPaletteConfig::for_resource(resource_name);
        def::decode_classic(data, tag, &config)
    }
}

/// Loads a legacy sprite file, choosing the decoder by extension.
pub fn load_sprite_legacy(path: &Path) -> Result<Sprite, LegacySpriteError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let resource_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "def" | "d32" => decode_sprite(&fs::read(path)?, &resource_name),
        "pcx" | "p32" => decode_pcx(&fs::read(path)?),
        "bmp" | "png" => {
            let image = image::open(path)?.to_rgba8();
            Ok(Sprite::from_image(image))
        }
        _ => Err(LegacySpriteError::Unsupported(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn short_blob_is_malformed() {
        assert!(matches!(
            decode_sprite(&[0x41, 0], "x"),
            Err(LegacySpriteError::Malformed(_))
        ));
    }

    #[test]
    fn loads_by_extension() {
        let dir = TempDir::new().unwrap();
        let def_path = dir.path().join("TEST.DEF");
        let data = def::tests::build_def(0x47, &[], &[(0, vec![0])], &[(2, 2, vec![9; 4])]);
        fs::write(&def_path, data).unwrap();
        let sprite = load_sprite_legacy(&def_path).unwrap();
        assert_eq!(sprite.group(0).unwrap().boundary_size, (2, 2));

        let bmp_path = dir.path().join("pic.bmp");
        image::RgbaImage::new(3, 1).save(&bmp_path).unwrap();
        let sprite = load_sprite_legacy(&bmp_path).unwrap();
        assert_eq!(sprite.group(0).unwrap().frames[0].image.dimensions(), (3, 1));

        assert!(matches!(
            load_sprite_legacy(&dir.path().join("a.txt")),
            Err(LegacySpriteError::Unsupported(_))
        ));
    }
}
