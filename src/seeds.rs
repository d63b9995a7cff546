//! Seed management for world generation
//!
//! The terrain seed feeds the noise permutation table directly, so a master seed
//! always reproduces the same height map. Glyph variety (the forest density roll)
//! gets its own derived seed and can be rerolled without touching the terrain.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Seeds for each generation system.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Noise permutation table
    pub terrain: u64,
    /// Per-tile glyph variant rolls
    pub glyphs: u64,
}

impl WorldSeeds {
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            terrain: master,
            glyphs: derive_seed(master, "glyphs"),
        }
    }

    pub fn builder(master: u64) -> WorldSeedsBuilder {
        WorldSeedsBuilder::new(master)
    }
}

impl Default for WorldSeeds {
    fn default() -> Self {
        Self::from_master(rand::random())
    }
}

/// Builder for overriding individual seeds while deriving the rest from master
pub struct WorldSeedsBuilder {
    seeds: WorldSeeds,
}

impl WorldSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: WorldSeeds::from_master(master),
        }
    }

    pub fn terrain(mut self, seed: u64) -> Self {
        self.seeds.terrain = seed;
        self
    }

    pub fn glyphs(mut self, seed: u64) -> Self {
        self.seeds.glyphs = seed;
        self
    }

    pub fn build(self) -> WorldSeeds {
        self.seeds
    }
}

/// Derive a sub-seed from a master seed and a system name.
fn derive_seed(master: u64, system: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    system.hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Display for WorldSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorldSeeds {{ master: {}, terrain: {}, glyphs: {} }}",
            self.master, self.terrain, self.glyphs,
        )
    }
}
