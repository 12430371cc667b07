//! Sprite model, legacy decoders and the atlas format
//!
//! Decoders in [`legacy`] produce a [`Sprite`], [`postprocess`] transforms it and [`atlas`]
//! writes it as a manifest plus PNG atlas.

pub mod atlas;
pub mod legacy;
pub mod palette;
pub mod postprocess;
pub mod sprite;

pub use sprite::{AnimationSequence, Sprite, SpriteFrame};
