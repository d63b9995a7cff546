//! Layered drawing surfaces
//!
//! A surface holds at most one item per tile cell; `None` is transparent.
//! Layers are composited back to front: background colors, terrain glyphs,
//! entity glyphs.

use crate::tilemap::Tilemap;

pub type Rgb = (u8, u8, u8);

/// A styled character in one cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub fg: Rgb,
    pub italic: bool,
    /// Drawn horizontally flipped
    pub mirrored: bool,
}

impl Glyph {
    pub fn plain(ch: char, fg: Rgb) -> Self {
        Self { ch, fg, italic: false, mirrored: false }
    }
}

/// Pixel size of one tile on a given output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellMetrics {
    pub cell_width: u32,
    pub cell_height: u32,
}

impl CellMetrics {
    /// Terminal cells: one "pixel" per tile
    pub const TERMINAL: CellMetrics = CellMetrics { cell_width: 1, cell_height: 1 };

    pub fn square(size: u32) -> Self {
        let size = size.max(1);
        Self { cell_width: size, cell_height: size }
    }

    /// Tile containing a pixel position. Negative pixels map to negative tiles.
    pub fn tile_at(&self, px: i64, py: i64) -> (i64, i64) {
        (
            px.div_euclid(self.cell_width as i64),
            py.div_euclid(self.cell_height as i64),
        )
    }

    /// Pixel dimensions of a surface of `width` x `height` tiles
    pub fn surface_size(&self, width: usize, height: usize) -> (u32, u32) {
        (width as u32 * self.cell_width, height as u32 * self.cell_height)
    }
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self::square(12)
    }
}

/// Grid of optional cells, one per tile
#[derive(Clone, Debug, PartialEq)]
pub struct Surface<T> {
    cells: Tilemap<Option<T>>,
}

pub type GlyphSurface = Surface<Glyph>;
pub type ColorSurface = Surface<Rgb>;

impl<T: Clone> Surface<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: Tilemap::new_with(width, height, None),
        }
    }

    pub fn width(&self) -> usize {
        self.cells.width
    }

    pub fn height(&self) -> usize {
        self.cells.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.cells.get(x, y).as_ref()
    }

    pub fn put(&mut self, x: usize, y: usize, value: T) {
        self.cells.set(x, y, Some(value));
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Clear a rectangle of cells, clipped to the surface.
    pub fn clear_rect(&mut self, x: i64, y: i64, width: usize, height: usize) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(self.width() as i64);
        let y1 = (y + height as i64).min(self.height() as i64);
        for cy in y0..y1 {
            for cx in x0..x1 {
                self.cells.set(cx as usize, cy as usize, None);
            }
        }
    }

    /// Replace this surface's contents with `source` (same dimensions).
    pub fn blit(&mut self, source: &Surface<T>) {
        debug_assert_eq!((self.width(), self.height()), (source.width(), source.height()));
        self.cells.clone_from(&source.cells);
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|(_, _, c)| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.cells.iter().filter_map(|(x, y, c)| c.as_ref().map(|v| (x, y, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_rect_clips_to_bounds() {
        let mut surface = ColorSurface::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                surface.put(x, y, (1, 2, 3));
            }
        }
        surface.clear_rect(-1, -1, 3, 3);
        assert!(surface.get(0, 0).is_none());
        assert!(surface.get(1, 1).is_none());
        assert!(surface.get(2, 2).is_some());
        assert_eq!(surface.occupied(), 12);

        surface.clear_rect(3, 3, 5, 5);
        assert!(surface.get(3, 3).is_none());
        assert_eq!(surface.occupied(), 11);
    }

    #[test]
    fn test_blit_replaces_contents() {
        let mut source = GlyphSurface::new(3, 2);
        source.put(2, 1, Glyph::plain('x', (0, 0, 0)));
        let mut target = GlyphSurface::new(3, 2);
        target.put(0, 0, Glyph::plain('y', (0, 0, 0)));
        target.blit(&source);
        assert_eq!(target, source);
    }

    #[test]
    fn test_cell_metrics_tile_lookup() {
        let metrics = CellMetrics::square(12);
        assert_eq!(metrics.tile_at(0, 0), (0, 0));
        assert_eq!(metrics.tile_at(11, 23), (0, 1));
        assert_eq!(metrics.tile_at(12, 24), (1, 2));
        assert_eq!(metrics.tile_at(-1, 5), (-1, 0));
        assert_eq!(metrics.surface_size(200, 100), (2400, 1200));
        assert_eq!(CellMetrics::TERMINAL.tile_at(7, 9), (7, 9));
    }
}
