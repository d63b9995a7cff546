//! Frame driver
//!
//! Owns both renderers and runs them in order every frame: terrain glyphs
//! first, then entities on top.

use std::time::Instant;

use crate::display::{DisplayOptions, RenderParams};
use crate::entities::EntityIndex;
use crate::entity_render::EntityRenderer;
use crate::terrain::TerrainRenderer;
use crate::world::WorldData;

/// Monotonic frame timestamps in milliseconds since creation
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    start: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AnimationLoop {
    pub terrain: TerrainRenderer,
    pub entities: EntityRenderer,
    frames: u64,
}

impl AnimationLoop {
    pub fn new(world: &WorldData, options: &DisplayOptions, params: &RenderParams) -> Self {
        Self {
            terrain: TerrainRenderer::with_period(world, options, params.terrain_period_ms),
            entities: EntityRenderer::new(params),
            frames: 0,
        }
    }

    /// Render one frame of both dynamic layers.
    pub fn frame(&mut self, timestamp_ms: f64, index: &EntityIndex, options: &DisplayOptions) {
        self.terrain.render_terrain_chars(timestamp_ms, options, index);
        self.entities.render_entities(timestamp_ms, index, options);
        self.frames += 1;
    }

    /// Redraw after a static-layer option changed, without waiting for the next frame.
    pub fn redraw_static(&mut self, timestamp_ms: f64, index: &EntityIndex, options: &DisplayOptions) {
        self.terrain.render_background(options);
        self.terrain.render_terrain_chars(timestamp_ms, options, index);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomes::BiomeThresholds;
    use crate::display::DisplayToggle;
    use crate::entities::{parse_payload, EntitySync};
    use crate::interaction::InteractionController;
    use crate::seeds::WorldSeeds;
    use crate::surface::CellMetrics;
    use crate::world::{generate_world, WorldConfig};

    fn world() -> WorldData {
        let config = WorldConfig {
            width: 16,
            height: 12,
            thresholds: BiomeThresholds::default(),
            ..Default::default()
        };
        generate_world(&config, WorldSeeds::from_master(77))
    }

    #[test]
    fn test_frame_clock_is_monotonic() {
        let clock = FrameClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(a >= 0.0 && b >= a);
    }

    #[test]
    fn test_empty_payload_renders_plain_terrain() {
        let world = world();
        let options = DisplayOptions::default();
        let mut sync = EntitySync::new(world.width, world.height);
        let payload = parse_payload(r##"{"entities": [{"coordinates": [1, 1], "character": "x", "color": "#fff"}]}"##).unwrap();
        sync.apply_payload(&payload);
        assert_eq!(sync.index().len(), 1);

        sync.apply_payload(&parse_payload(r#"{"entities": []}"#).unwrap());
        assert!(sync.index().is_empty());

        let mut animation = AnimationLoop::new(&world, &options, &RenderParams::default());
        animation.frame(0.0, sync.index(), &options);
        assert!(animation.entities.ops().is_empty());
        assert_eq!(animation.terrain.terrain(), animation.terrain.frame(0));

        let mut controller = InteractionController::new(CellMetrics::TERMINAL, &RenderParams::default());
        for y in 0..world.height as i64 {
            for x in 0..world.width as i64 {
                controller.hit_test(x, y, sync.index(), world.width, world.height);
                assert!(controller.tooltip().is_none());
            }
        }
    }

    #[test]
    fn test_hiding_entities_restores_terrain_beneath_them() {
        let world = world();
        let mut options = DisplayOptions::default();
        let mut sync = EntitySync::new(world.width, world.height);
        let payload = parse_payload(
            r##"{"entities": [
                {"coordinates": [3, 4], "character": "D", "color": "#f00"},
                {"coordinates": [0, 0], "character": "C", "color": "#ff0",
                 "tiles": [[[7, 7], "#", "#ff0"], [[8, 7], "#", "#ff0"]]}
            ]}"##,
        )
        .unwrap();
        sync.apply_payload(&payload);
        assert_eq!(sync.index().len(), 3);

        let mut animation = AnimationLoop::new(&world, &options, &RenderParams::default());
        animation.frame(900.0, sync.index(), &options);
        for (x, y) in sync.index().positions() {
            assert!(animation.terrain.terrain().get(x, y).is_none());
            assert!(animation.entities.op_at(x, y).is_some());
        }

        assert!(InteractionController::toggle(&mut options, DisplayToggle::ShowEntities));
        animation.redraw_static(900.0, sync.index(), &options);
        for (x, y) in sync.index().positions() {
            let glyph = animation.terrain.terrain().get(x, y).unwrap();
            assert_eq!(glyph.ch, world.tile(x, y).glyph);
        }

        animation.frame(916.0, sync.index(), &options);
        assert!(animation.entities.ops().is_empty());
        assert_eq!(animation.frames_rendered(), 2);
    }

    #[test]
    fn test_background_is_not_redrawn_per_frame() {
        let world = world();
        let options = DisplayOptions::default();
        let mut animation = AnimationLoop::new(&world, &options, &RenderParams::default());
        let index = EntityIndex::new();
        for i in 0..30 {
            animation.frame(i as f64 * 16.0, &index, &options);
        }
        assert_eq!(animation.terrain.background_generation(), 1);
    }
}
