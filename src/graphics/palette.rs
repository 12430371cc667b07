//! # Indexed Palette
//!
//! 256-entry palettes of the classic sprite container. The first eight entries are reserved
//! key slots whose meaning (transparency, shadow, owner colour) depends on the container type.
//! Animated terrain cycles configured palette ranges to produce extra colour variants.

use image::Rgba;

pub const PALETTE_SIZE: usize = 256;

/// Reserved key slot colours, all black with varying alpha.
const KEY_SLOTS: [Rgba<u8>; 8] = [
    Rgba([0, 0, 0, 0]),   // full transparency
    Rgba([0, 0, 0, 32]),  // shadow border
    Rgba([0, 0, 0, 64]),  // shadow border
    Rgba([0, 0, 0, 0]),   // transparency
    Rgba([0, 0, 0, 128]), // shadow body
    Rgba([0, 0, 0, 0]),   // selection highlight
    Rgba([0, 0, 0, 128]), // shadow body below selection
    Rgba([0, 0, 0, 64]),  // shadow border below selection
];

const OWNER_SLOT: Rgba<u8> = Rgba([0, 0, 0, 1]);

/// Container type tag of the classic sprite format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefType {
    Spell,
    Sprite,
    Creature,
    Map,
    MapHero,
    Terrain,
    Cursor,
    Interface,
    SpriteFrame,
    BattleHero,
}

impl DefType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0x40 => Some(DefType::Spell),
            0x41 => Some(DefType::Sprite),
            0x42 => Some(DefType::Creature),
            0x43 => Some(DefType::Map),
            0x44 => Some(DefType::MapHero),
            0x45 => Some(DefType::Terrain),
            0x46 => Some(DefType::Cursor),
            0x47 => Some(DefType::Interface),
            0x48 => Some(DefType::SpriteFrame),
            0x49 => Some(DefType::BattleHero),
            _ => None,
        }
    }

    fn key_slots(self) -> &'static [usize] {
        match self {
            DefType::Spell | DefType::Cursor => &[0],
            DefType::Sprite | DefType::SpriteFrame => &[0, 1, 2, 3, 4, 5, 6, 7],
            DefType::Creature => &[0, 1, 4, 5, 6, 7],
            DefType::Map | DefType::MapHero | DefType::Terrain => &[0, 1, 2, 3, 4],
            DefType::Interface | DefType::BattleHero => &[0, 1, 4],
        }
    }
}

/// A contiguous palette range rotated by one entry per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteShift {
    pub from: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationPaletteConfig {
    pub shifts: Vec<PaletteShift>,
    /// Number of palette variants to decode; 1 disables cycling.
    pub variants_count: usize,
}

impl Default for AnimationPaletteConfig {
    fn default() -> Self {
        Self {
            shifts: Vec::new(),
            variants_count: 1,
        }
    }
}

impl AnimationPaletteConfig {
    /// Cycling table of the animated terrain and river resources.
    pub fn for_resource(resource_name: &str) -> Self {
        let (ranges, variants_count): (&[(usize, usize)], usize) =
            match resource_name.to_lowercase().as_str() {
                "lavatl" => (&[(246, 9)], 9),
                "watrtl" => (&[(229, 12), (242, 14)], 84),
                "clrrvr" => (&[(183, 12), (195, 6)], 12),
                "mudrvr" => (&[(228, 12), (183, 6), (240, 6)], 12),
                "lavrvr" => (&[(240, 9)], 9),
                _ => return Self::default(),
            };
        Self {
            shifts: ranges
                .iter()
                .map(|&(from, count)| PaletteShift { from, count })
                .collect(),
            variants_count,
        }
    }

    pub fn needs_shift(&self) -> bool {
        self.variants_count >= 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub colours: Vec<Rgba<u8>>,
}

impl Palette {
    /// Builds an opaque palette from 256 packed RGB triples.
    pub fn from_rgb(data: &[u8]) -> Self {
        let mut colours = vec![Rgba([0, 0, 0, 255]); PALETTE_SIZE];
        for (colour, rgb) in colours.iter_mut().zip(data.chunks_exact(3)) {
            *colour = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        }
        Palette { colours }
    }

    /// Applies the reserved key slots for a container type tag.
    ///
    /// Unknown tags leave the palette untouched.
    pub fn init(&mut self, tag: u32) {
        let Some(def_type) = DefType::from_tag(tag) else {
            log::warn!("Unknown sprite type tag 0x{:X}, palette left as is", tag);
            return;
        };
        for &slot in def_type.key_slots() {
            self.colours[slot] = KEY_SLOTS[slot];
        }
        if matches!(def_type, DefType::Map | DefType::MapHero) {
            self.colours[5] = OWNER_SLOT;
        }
    }

    /// Rotates every configured range by one entry.
    pub fn shift(&mut self, config: &AnimationPaletteConfig) {
        let previous = self.colours.clone();
        for range in &config.shifts {
            if range.count == 0 || range.from + range.count > PALETTE_SIZE {
                log::warn!(
                    "Palette shift range {}+{} is out of bounds",
                    range.from,
                    range.count
                );
                continue;
            }
            for i in 0..range.count {
                self.colours[range.from + (i + 1) % range.count] = previous[range.from + i];
            }
        }
    }

    pub fn colour(&self, index: u8) -> Rgba<u8> {
        self.colours[index as usize]
    }
}
