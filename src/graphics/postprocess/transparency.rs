//! `make_transparent`: keys out light backgrounds of frames that were stored opaque.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use image::{Rgba, RgbaImage};
use serde::Deserialize;
use serde_json::Value;

use crate::graphics::sprite::AnimationSequence;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BASE_KEY_COLOURS: [Rgba<u8>; 3] = [
    Rgba([255, 255, 255, 255]),
    Rgba([250, 250, 250, 255]),
    Rgba([245, 245, 245, 255]),
];

type ColourSet = BTreeSet<[u8; 4]>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MakeTransparentParams {
    /// Frame indices keyed by flood fill from the image edges.
    flood: Vec<usize>,
    /// Frame indices whose transparent pixels turn white first.
    tr_to_white: Vec<usize>,
}

/// Frame indices count only non-empty frames.
pub(super) fn make_transparent(
    _group_id: i32,
    mut sequence: AnimationSequence,
    params: &Value,
) -> AnimationSequence {
    let params: MakeTransparentParams = super::parse_params("make_transparent", params);
    let flood: BTreeSet<usize> = params.flood.into_iter().collect();
    let to_white: BTreeSet<usize> = params.tr_to_white.into_iter().collect();

    let mut frame_index = 0usize;
    for frame in sequence.frames.iter_mut() {
        if frame.is_empty() {
            continue;
        }
        let image = &mut frame.image;
        let mut keys: ColourSet = BASE_KEY_COLOURS.iter().map(|c| c.0).collect();
        if let Some(corner) = corner_key_colour(image) {
            keys.insert(corner.0);
        }

        if to_white.contains(&frame_index) {
            replace_colours(image, &[TRANSPARENT.0].into_iter().collect(), WHITE);
        }
        if flood.contains(&frame_index) {
            flood_fill_from_edges(image, &keys, TRANSPARENT);
        } else {
            replace_colours(image, &keys, TRANSPARENT);
        }
        frame_index += 1;
    }
    sequence
}

/// Background guess from the four corners: a single shared colour, the strict majority of
/// two colours, or the colour appearing twice among three.
fn corner_key_colour(image: &RgbaImage) -> Option<Rgba<u8>> {
    let (w, h) = image.dimensions();
    let corners = [
        *image.get_pixel(0, 0),
        *image.get_pixel(0, h - 1),
        *image.get_pixel(w - 1, 0),
        *image.get_pixel(w - 1, h - 1),
    ];
    let mut counts: BTreeMap<[u8; 4], usize> = BTreeMap::new();
    for corner in corners {
        *counts.entry(corner.0).or_default() += 1;
    }

    match counts.len() {
        1 => counts.keys().next().map(|c| Rgba(*c)),
        2 => {
            let mut entries = counts.into_iter();
            let (a, a_count) = entries.next()?;
            let (b, b_count) = entries.next()?;
            match a_count.cmp(&b_count) {
                std::cmp::Ordering::Greater => Some(Rgba(a)),
                std::cmp::Ordering::Less => Some(Rgba(b)),
                std::cmp::Ordering::Equal => None,
            }
        }
        3 => counts
            .into_iter()
            .find(|&(_, count)| count == 2)
            .map(|(c, _)| Rgba(c)),
        _ => None,
    }
}

fn replace_colours(image: &mut RgbaImage, keys: &ColourSet, dest: Rgba<u8>) {
    for pixel in image.pixels_mut() {
        if keys.contains(&pixel.0) {
            *pixel = dest;
        }
    }
}

/// 8-connected fill through key-coloured pixels, seeded from every key-coloured edge pixel.
fn flood_fill_from_edges(image: &mut RgbaImage, keys: &ColourSet, dest: Rgba<u8>) {
    let (w, h) = image.dimensions();
    let mut visited = vec![false; (w * h) as usize];
    let mut queue = VecDeque::new();

    let mut seed = |x: u32, y: u32, image: &RgbaImage, queue: &mut VecDeque<(u32, u32)>| {
        let index = (y * w + x) as usize;
        if !visited[index] && keys.contains(&image.get_pixel(x, y).0) {
            visited[index] = true;
            queue.push_back((x, y));
        }
    };
    for y in 0..h {
        seed(0, y, image, &mut queue);
        seed(w - 1, y, image, &mut queue);
    }
    for x in 0..w {
        seed(x, 0, image, &mut queue);
        seed(x, h - 1, image, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        image.put_pixel(x, y, dest);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                seed(nx as u32, ny as u32, image, &mut queue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::sprite::{SequenceParams, SpriteFrame};
    use serde_json::json;

    const RED: Rgba<u8> = Rgba([200, 0, 0, 255]);

    fn sequence(images: Vec<RgbaImage>) -> AnimationSequence {
        AnimationSequence {
            frames: images
                .into_iter()
                .enumerate()
                .map(|(id, image)| SpriteFrame {
                    id: id as i32,
                    image,
                    padding: (0, 0),
                })
                .collect(),
            boundary_size: (5, 5),
            params: SequenceParams::default(),
        }
    }

    /// White border, red ring, white centre pixel.
    fn ringed() -> RgbaImage {
        let mut image = RgbaImage::from_pixel(5, 5, WHITE);
        for x in 1..4 {
            for y in 1..4 {
                image.put_pixel(x, y, RED);
            }
        }
        image.put_pixel(2, 2, WHITE);
        image
    }

    #[test]
    fn replace_mode_clears_every_key_pixel() {
        let out = make_transparent(0, sequence(vec![ringed()]), &json!({}));
        let image = &out.frames[0].image;
        assert_eq!(*image.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*image.get_pixel(2, 2), TRANSPARENT);
        assert_eq!(*image.get_pixel(1, 1), RED);
    }

    #[test]
    fn flood_mode_keeps_enclosed_key_pixels() {
        let out = make_transparent(0, sequence(vec![ringed()]), &json!({"flood": [0]}));
        let image = &out.frames[0].image;
        assert_eq!(*image.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*image.get_pixel(4, 2), TRANSPARENT);
        assert_eq!(*image.get_pixel(2, 2), WHITE);
    }

    #[test]
    fn frame_indices_skip_empty_frames() {
        let out = make_transparent(
            0,
            sequence(vec![RgbaImage::new(0, 0), ringed()]),
            &json!({"flood": [0]}),
        );
        assert_eq!(*out.frames[1].image.get_pixel(2, 2), WHITE);
    }

    #[test]
    fn corner_majority_becomes_key() {
        let mut image = RgbaImage::from_pixel(3, 3, RED);
        image.put_pixel(0, 0, WHITE);
        assert_eq!(corner_key_colour(&image), Some(RED));

        image.put_pixel(2, 2, WHITE);
        assert_eq!(corner_key_colour(&image), None);

        image.put_pixel(2, 0, Rgba([1, 2, 3, 255]));
        assert_eq!(corner_key_colour(&image), Some(WHITE));
    }

    #[test]
    fn transparent_pixels_can_turn_white_first() {
        let mut image = RgbaImage::from_pixel(3, 3, RED);
        image.put_pixel(1, 1, TRANSPARENT);
        let out = make_transparent(0, sequence(vec![image]), &json!({"tr_to_white": [0]}));
        // red corners are keyed as background, the whitened centre is keyed as white
        assert!(out.frames[0].image.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn flood_fill_terminates_when_destination_is_a_key() {
        let image = RgbaImage::from_pixel(4, 4, TRANSPARENT);
        let out = make_transparent(0, sequence(vec![image]), &json!({"flood": [0]}));
        assert!(out.frames[0].image.pixels().all(|p| *p == TRANSPARENT));
    }
}
