//! Terrain layers
//!
//! Both animation variants of every tile are rendered once into two offscreen
//! surfaces. Each frame only copies one of them and clears the cells under
//! entities. The background layer is redrawn only when its option changes.

use std::time::Instant;

use log::debug;

use crate::biomes::{self, Biome};
use crate::display::{DisplayOptions, RenderParams};
use crate::entities::EntityIndex;
use crate::surface::{ColorSurface, Glyph, GlyphSurface, Rgb};
use crate::tilemap::Tilemap;
use crate::world::WorldData;

pub fn is_water_glyph(ch: char) -> bool {
    ch == biomes::SHALLOW_WATER || ch == biomes::DEEP_WATER
}

pub fn is_vegetation_glyph(ch: char) -> bool {
    ch == biomes::HIGH_FIELD
        || ch == biomes::TALL_GRASS
        || biomes::DENSE_FOREST.contains(&ch)
        || biomes::SPARSE_FOREST.contains(&ch)
}

/// Styled variant of a terrain glyph at an animation phase in [0,1).
/// Water flips horizontally and vegetation leans italic during the first half.
pub fn animated_glyph(ch: char, fg: Rgb, phase: f64) -> Glyph {
    let first_half = phase < 0.5;
    Glyph {
        ch,
        fg,
        italic: first_half && is_vegetation_glyph(ch),
        mirrored: first_half && is_water_glyph(ch),
    }
}

/// Which prerendered frame to show. Frame 1 is the rest pose when animation is off.
pub fn frame_index(timestamp_ms: f64, period_ms: f64, animate: bool) -> usize {
    let phase = (timestamp_ms / period_ms).rem_euclid(1.0);
    if animate && phase < 0.5 {
        0
    } else {
        1
    }
}

pub struct TerrainRenderer {
    period_ms: f64,
    biomes: Tilemap<Biome>,
    frames: [GlyphSurface; 2],
    background: ColorSurface,
    terrain: GlyphSurface,
    background_generation: u64,
}

impl TerrainRenderer {
    /// Prerender both animation frames and draw the initial background.
    pub fn new(world: &WorldData, options: &DisplayOptions) -> Self {
        Self::with_period(world, options, RenderParams::default().terrain_period_ms)
    }

    pub fn with_period(world: &WorldData, options: &DisplayOptions, period_ms: f64) -> Self {
        let start = Instant::now();
        let width = world.width;
        let height = world.height;

        let mut frames = [GlyphSurface::new(width, height), GlyphSurface::new(width, height)];
        let mut biome_map = Tilemap::new(width, height);

        for (x, y, tile) in world.tiles.iter() {
            let fg = tile.biome.fg_color();
            frames[0].put(x, y, animated_glyph(tile.glyph, fg, 0.0));
            frames[1].put(x, y, animated_glyph(tile.glyph, fg, 0.5));
            biome_map.set(x, y, tile.biome);
        }
        debug!("Prerendered both terrain animation frames in {:.2?}", start.elapsed());

        let mut renderer = TerrainRenderer {
            period_ms,
            biomes: biome_map,
            frames,
            background: ColorSurface::new(width, height),
            terrain: GlyphSurface::new(width, height),
            background_generation: 0,
        };
        renderer.render_background(options);
        renderer
    }

    /// Redraw the per-biome background layer. Only needed on init and when a
    /// static-layer option changes.
    pub fn render_background(&mut self, options: &DisplayOptions) {
        self.background.clear();
        if options.terrain_bg {
            for (x, y, biome) in self.biomes.iter() {
                self.background.put(x, y, biome.bg_color());
            }
        }
        self.background_generation += 1;
    }

    /// Compose the visible terrain glyph layer for this frame. Returns the frame shown,
    /// or `None` when terrain glyphs are hidden.
    pub fn render_terrain_chars(
        &mut self,
        timestamp_ms: f64,
        options: &DisplayOptions,
        index: &EntityIndex,
    ) -> Option<usize> {
        self.terrain.clear();
        if !options.terrain_chars {
            return None;
        }

        let frame = frame_index(timestamp_ms, self.period_ms, options.entity_animation);
        self.terrain.blit(&self.frames[frame]);

        if options.show_entities {
            // A one-pixel pad around the tile stays inside the cell at cell resolution
            for (x, y) in index.positions() {
                self.terrain.clear_rect(x as i64, y as i64, 1, 1);
            }
        }

        Some(frame)
    }

    pub fn background(&self) -> &ColorSurface {
        &self.background
    }

    pub fn terrain(&self) -> &GlyphSurface {
        &self.terrain
    }

    pub fn frame(&self, phase: usize) -> &GlyphSurface {
        &self.frames[phase]
    }

    pub fn background_generation(&self) -> u64 {
        self.background_generation
    }
}
