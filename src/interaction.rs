//! Pointer hit-testing and option toggles

use crate::display::{DisplayOptions, DisplayToggle, RenderParams};
use crate::entities::EntityIndex;
use crate::surface::CellMetrics;

/// Hover text and its absolute pixel position
#[derive(Clone, Debug, PartialEq)]
pub struct Tooltip {
    pub text: String,
    pub x: i64,
    pub y: i64,
}

pub struct InteractionController {
    metrics: CellMetrics,
    tooltip_offset: i64,
    tooltip: Option<Tooltip>,
    hovered_tile: Option<(usize, usize)>,
}

impl InteractionController {
    pub fn new(metrics: CellMetrics, params: &RenderParams) -> Self {
        Self {
            metrics,
            tooltip_offset: params.tooltip_offset,
            tooltip: None,
            hovered_tile: None,
        }
    }

    /// Resolve a pointer position to a tile and show or hide the tooltip.
    /// Returns the tile under the pointer when it lies inside the world.
    pub fn hit_test(
        &mut self,
        px: i64,
        py: i64,
        index: &EntityIndex,
        width: usize,
        height: usize,
    ) -> Option<(usize, usize)> {
        let (tx, ty) = self.metrics.tile_at(px, py);
        if tx < 0 || ty < 0 || tx as usize >= width || ty as usize >= height {
            self.hide();
            return None;
        }

        let tile = (tx as usize, ty as usize);
        self.hovered_tile = Some(tile);
        self.tooltip = index.get(tile.0, tile.1).map(|entity| Tooltip {
            text: entity.tooltip_text(),
            x: px + self.tooltip_offset,
            y: py + self.tooltip_offset,
        });
        Some(tile)
    }

    pub fn on_pointer_leave(&mut self) {
        self.hide();
    }

    fn hide(&mut self) {
        self.tooltip = None;
        self.hovered_tile = None;
    }

    /// Flip one display option. Returns true when the static layers must be
    /// redrawn immediately.
    pub fn toggle(options: &mut DisplayOptions, toggle: DisplayToggle) -> bool {
        options.flip(toggle);
        toggle.affects_static_layers()
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn hovered_tile(&self) -> Option<(usize, usize)> {
        self.hovered_tile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;

    fn index_with_dragon() -> EntityIndex {
        let mut index = EntityIndex::new();
        index.rebuild(
            &[Entity {
                coordinates: [2, 1],
                character: "D".into(),
                color: "#ff0000".into(),
                kind: Some("Dragon".into()),
                name: Some("Vermax".into()),
                life: None,
                state: None,
                rotation: None,
                debug_info: Some("Vermax the dragon, hungry".into()),
                tiles: None,
            }],
            5,
            5,
        );
        index
    }

    #[test]
    fn test_hit_test_shows_tooltip_with_offset() {
        let index = index_with_dragon();
        let mut controller = InteractionController::new(CellMetrics::square(12), &RenderParams::default());

        assert_eq!(controller.hit_test(30, 20, &index, 5, 5), Some((2, 1)));
        let tooltip = controller.tooltip().unwrap();
        assert_eq!(tooltip.text, "Vermax the dragon, hungry");
        assert_eq!((tooltip.x, tooltip.y), (45, 35));

        assert_eq!(controller.hit_test(5, 5, &index, 5, 5), Some((0, 0)));
        assert!(controller.tooltip().is_none());
    }

    #[test]
    fn test_outside_world_hides_tooltip() {
        let index = index_with_dragon();
        let mut controller = InteractionController::new(CellMetrics::TERMINAL, &RenderParams::default());
        controller.hit_test(2, 1, &index, 5, 5);
        assert!(controller.tooltip().is_some());

        assert_eq!(controller.hit_test(-1, 1, &index, 5, 5), None);
        assert!(controller.tooltip().is_none());
        assert_eq!(controller.hovered_tile(), None);

        controller.hit_test(2, 1, &index, 5, 5);
        controller.on_pointer_leave();
        assert!(controller.tooltip().is_none());
    }

    #[test]
    fn test_empty_index_never_shows_tooltip() {
        let index = EntityIndex::new();
        let mut controller = InteractionController::new(CellMetrics::TERMINAL, &RenderParams::default());
        for y in 0..5 {
            for x in 0..5 {
                controller.hit_test(x, y, &index, 5, 5);
                assert!(controller.tooltip().is_none());
            }
        }
    }

    #[test]
    fn test_toggle_reports_static_redraw() {
        let mut options = DisplayOptions::default();
        assert!(InteractionController::toggle(&mut options, DisplayToggle::TerrainBg));
        assert!(!options.terrain_bg);
        assert!(!InteractionController::toggle(&mut options, DisplayToggle::EntityGlow));
        assert!(!InteractionController::toggle(&mut options, DisplayToggle::EntityAnimation));
        assert!(InteractionController::toggle(&mut options, DisplayToggle::ShowEntities));
        assert!(InteractionController::toggle(&mut options, DisplayToggle::TerrainChars));
    }
}
