//! Biome classification and glyph selection
//!
//! Heights map onto four biomes through an ascending threshold ladder. Each
//! tile then gets a glyph that depends on its biome, its height and, for
//! fields, on whether a forest is adjacent.

use rand::Rng;

use crate::tilemap::Tilemap;

/// Terrain category derived from height. Variants are ordered by height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Biome {
    #[default]
    Water,
    Field,
    Forest,
    Mountain,
}

impl Biome {
    pub const ALL: [Biome; 4] = [Biome::Water, Biome::Field, Biome::Forest, Biome::Mountain];

    pub fn name(&self) -> &'static str {
        match self {
            Biome::Water => "Water",
            Biome::Field => "Field",
            Biome::Forest => "Forest",
            Biome::Mountain => "Mountain",
        }
    }

    /// Glyph (foreground) color
    pub fn fg_color(&self) -> (u8, u8, u8) {
        match self {
            Biome::Water => (0x4d, 0xa6, 0xff),
            Biome::Field => (0x6f, 0xcc, 0x50),
            Biome::Forest => (0x1a, 0x5f, 0x1a),
            Biome::Mountain => (0xff, 0xff, 0xff),
        }
    }

    /// Cell background color
    pub fn bg_color(&self) -> (u8, u8, u8) {
        match self {
            Biome::Water => (0x16, 0x16, 0x64),
            Biome::Field => (0x0d, 0x2d, 0x0d),
            Biome::Forest => (0x0a, 0x1a, 0x0a),
            Biome::Mountain => (0x2a, 0x2a, 0x2a),
        }
    }
}

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Upper bounds (exclusive) of each biome band; anything above `forest` is mountain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeThresholds {
    pub water: f64,
    pub field: f64,
    pub forest: f64,
}

impl Default for BiomeThresholds {
    fn default() -> Self {
        Self {
            water: 0.23,
            field: 0.68,
            forest: 0.80,
        }
    }
}

impl BiomeThresholds {
    /// Same ladder with a different water line (some worlds use 0.20).
    pub fn with_water(water: f64) -> Self {
        Self { water, ..Self::default() }
    }

    pub fn classify(&self, height: f64) -> Biome {
        if height < self.water {
            Biome::Water
        } else if height < self.field {
            Biome::Field
        } else if height < self.forest {
            Biome::Forest
        } else {
            Biome::Mountain
        }
    }
}

// =============================================================================
// GLYPHS
// =============================================================================

pub const DEEP_WATER: char = '≈';
pub const SHALLOW_WATER: char = '~';
pub const PEAK: char = '^';
pub const SLOPE: char = 'А';
pub const DENSE_FOREST: [char; 2] = ['р', 'Р'];
pub const SPARSE_FOREST: [char; 2] = ['ф', 'Ф'];
pub const TALL_GRASS: char = ';';
pub const LOW_FIELD: char = '.';
pub const HIGH_FIELD: char = ',';

const DEEP_WATER_BELOW: f64 = 0.1;
const PEAK_ABOVE: f64 = 0.89;
const DENSE_FOREST_BELOW: f64 = 0.72;
const LOW_FIELD_BELOW: f64 = 0.4;

/// Check whether any in-bounds 8-neighbor of (x, y) classifies as `biome`.
pub fn is_adjacent_to(
    biome: Biome,
    heightmap: &Tilemap<f64>,
    x: usize,
    y: usize,
    thresholds: &BiomeThresholds,
) -> bool {
    heightmap
        .neighbors_8(x, y)
        .into_iter()
        .any(|(nx, ny)| thresholds.classify(*heightmap.get(nx, ny)) == biome)
}

/// Pick the display glyph for a tile. Forest tiles draw one 50/50 roll from `rng`,
/// so call this once per tile at world generation and store the result.
pub fn select_glyph<R: Rng>(
    biome: Biome,
    height: f64,
    heightmap: &Tilemap<f64>,
    x: usize,
    y: usize,
    thresholds: &BiomeThresholds,
    rng: &mut R,
) -> char {
    match biome {
        Biome::Water => {
            if height < DEEP_WATER_BELOW {
                DEEP_WATER
            } else {
                SHALLOW_WATER
            }
        }
        Biome::Mountain => {
            if height > PEAK_ABOVE {
                PEAK
            } else {
                SLOPE
            }
        }
        Biome::Forest => {
            let pair = if height < DENSE_FOREST_BELOW { DENSE_FOREST } else { SPARSE_FOREST };
            if rng.gen_bool(0.5) {
                pair[0]
            } else {
                pair[1]
            }
        }
        Biome::Field => {
            if is_adjacent_to(Biome::Forest, heightmap, x, y, thresholds) {
                TALL_GRASS
            } else if height < LOW_FIELD_BELOW {
                LOW_FIELD
            } else {
                HIGH_FIELD
            }
        }
    }
}
