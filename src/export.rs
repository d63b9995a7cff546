use std::fs::File;
use std::io::{self, Write};

use chrono::Local;
use image::{ImageBuffer, RgbImage};

use crate::biomes::{self, Biome};
use crate::entities::EntityIndex;
use crate::entity_render::parse_hex_color;
use crate::surface::CellMetrics;
use crate::terrain::TerrainRenderer;
use crate::world::WorldData;

/// Export the current background layer as a PNG, one `cell_width` x `cell_height`
/// block per tile. Entities are drawn as filled squares inset in their cells.
pub fn export_png(
    world: &WorldData,
    terrain: &TerrainRenderer,
    index: &EntityIndex,
    metrics: CellMetrics,
    path: &str,
) -> Result<(), image::ImageError> {
    let (img_width, img_height) = metrics.surface_size(world.width, world.height);
    let mut img: RgbImage = ImageBuffer::new(img_width, img_height);

    for (x, y, _) in world.tiles.iter() {
        // Transparent background cells stay black
        let (r, g, b) = terrain.background().get(x, y).copied().unwrap_or((0, 0, 0));
        fill_cell(&mut img, metrics, x, y, 0, [r, g, b]);
    }

    let inset = metrics.cell_width.min(metrics.cell_height) / 4;
    for ((x, y), entity) in index.iter() {
        let (r, g, b) = parse_hex_color(&entity.color);
        fill_cell(&mut img, metrics, x, y, inset, [r, g, b]);
    }

    img.save(path)
}

fn fill_cell(img: &mut RgbImage, metrics: CellMetrics, x: usize, y: usize, inset: u32, color: [u8; 3]) {
    let cell_x = x as u32 * metrics.cell_width;
    let cell_y = y as u32 * metrics.cell_height;
    for py in inset..metrics.cell_height.saturating_sub(inset).max(inset + 1) {
        for px in inset..metrics.cell_width.saturating_sub(inset).max(inset + 1) {
            let (ix, iy) = (cell_x + px, cell_y + py);
            if ix < img.width() && iy < img.height() {
                img.put_pixel(ix, iy, image::Rgb(color));
            }
        }
    }
}

/// Glyph grid with entities overlaid, one line per row
pub fn render_ascii_map(world: &WorldData, index: Option<&EntityIndex>) -> String {
    let mut out = String::with_capacity((world.width + 1) * world.height * 2);
    for y in 0..world.height {
        for x in 0..world.width {
            let entity = index.and_then(|i| i.get(x, y));
            out.push(entity.map_or(world.tile(x, y).glyph, |e| e.glyph()));
        }
        out.push('\n');
    }
    out
}

pub fn glyph_legend() -> String {
    let mut legend = String::from("=== LEGEND ===\n");
    let rows = [
        (Biome::Water, format!("{} deep  {} shallow", biomes::DEEP_WATER, biomes::SHALLOW_WATER)),
        (
            Biome::Field,
            format!(
                "{} low  {} high  {} beside forest",
                biomes::LOW_FIELD,
                biomes::HIGH_FIELD,
                biomes::TALL_GRASS
            ),
        ),
        (
            Biome::Forest,
            format!(
                "{}{} dense  {}{} sparse",
                biomes::DENSE_FOREST[0],
                biomes::DENSE_FOREST[1],
                biomes::SPARSE_FOREST[0],
                biomes::SPARSE_FOREST[1]
            ),
        ),
        (Biome::Mountain, format!("{} slope  {} peak", biomes::SLOPE, biomes::PEAK)),
    ];
    for (biome, glyphs) in rows {
        legend.push_str(&format!("  {:<9} {}\n", biome.name(), glyphs));
    }
    legend
}

/// Export the world to a text file: header, glyph map, legend, statistics.
pub fn export_ascii(world: &WorldData, index: Option<&EntityIndex>, path: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    let stats = &world.stats;

    writeln!(file, "=== GLYPH WORLD FILE ===")?;
    writeln!(file, "Seed: {}", world.seed())?;
    writeln!(file, "Size: {}x{}", world.width, world.height)?;
    writeln!(file, "Water threshold: {:.2}", world.thresholds.water)?;
    writeln!(file, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file)?;

    writeln!(file, "=== MAP ===")?;
    write!(file, "{}", render_ascii_map(world, index))?;
    writeln!(file)?;

    write!(file, "{}", glyph_legend())?;
    writeln!(file)?;

    writeln!(file, "=== STATISTICS ===")?;
    writeln!(file, "Total tiles: {}", stats.total)?;
    for biome in Biome::ALL {
        writeln!(file, "  {:<9} {:>6} ({:>5.1}%)", biome.name(), stats.count(biome), stats.percent(biome))?;
    }
    writeln!(file, "Height: {:.3} to {:.3}", stats.min_height, stats.max_height)?;
    if let Some(index) = index {
        writeln!(file, "Entity tiles: {}", index.len())?;
    }

    Ok(())
}
