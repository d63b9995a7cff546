use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use noise::NoiseFn;
use rayon::prelude::*;

use crate::noise_engine::NoiseEngine;
use crate::tilemap::Tilemap;

// =============================================================================
// PARAMETERS
// =============================================================================

/// Parameters for height map synthesis
#[derive(Clone, Debug)]
pub struct HeightMapParams {
    /// Base sampling scale (lower = larger features)
    pub scale: f64,
    /// Number of noise octaves
    pub octaves: u32,
    /// Amplitude decay per octave
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    /// Number of 3x3 mean-filter passes
    pub smoothing_iterations: u32,
}

impl Default for HeightMapParams {
    fn default() -> Self {
        Self {
            scale: 0.09,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            smoothing_iterations: 5,
        }
    }
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generate a normalized height map from a seed.
pub fn generate_heightmap(width: usize, height: usize, seed: u64, params: &HeightMapParams) -> Tilemap<f64> {
    let engine = NoiseEngine::new(seed);
    generate_heightmap_with(&engine, width, height, params)
}

/// Generate a normalized height map from any 2D noise source:
/// 1. Multi-octave fractal sum, rescaled from [-1,1] to [0,1]
/// 2. `smoothing_iterations` passes of a 3x3 mean filter
/// 3. Min-max normalization to exactly [0,1]
pub fn generate_heightmap_with<N>(noise: &N, width: usize, height: usize, params: &HeightMapParams) -> Tilemap<f64>
where
    N: NoiseFn<f64, 2> + Sync,
{
    let mut heightmap = Tilemap::new_with(width, height, 0.0f64);

    heightmap
        .rows_mut()
        .enumerate()
        .par_bridge()
        .for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = fractal_noise(noise, x as f64, y as f64, params);
            }
        });

    for _ in 0..params.smoothing_iterations {
        heightmap = smooth_heightmap(&heightmap);
    }

    normalize_heightmap(&heightmap)
}

/// Sum `octaves` layers of noise and rescale the result to roughly [0,1].
pub fn fractal_noise<N: NoiseFn<f64, 2>>(noise: &N, x: f64, y: f64, params: &HeightMapParams) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..params.octaves {
        total += noise.get([x * params.scale * frequency, y * params.scale * frequency]) * amplitude;
        max_value += amplitude;
        amplitude *= params.persistence;
        frequency *= params.lacunarity;
    }

    if max_value == 0.0 {
        return 0.5;
    }

    (total / max_value + 1.0) / 2.0
}

/// One pass of a 3x3 mean filter. Edge cells average only their in-bounds neighbors.
pub fn smooth_heightmap(heightmap: &Tilemap<f64>) -> Tilemap<f64> {
    let width = heightmap.width;
    let height = heightmap.height;
    let mut result = Tilemap::new_with(width, height, 0.0f64);

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            let mut count = 0u32;

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if heightmap.in_bounds(nx, ny) {
                        sum += *heightmap.get(nx as usize, ny as usize);
                        count += 1;
                    }
                }
            }

            result.set(x, y, sum / count as f64);
        }
    }

    result
}

/// Min-max normalize to [0,1]. A flat (or non-finite) field becomes all zeros.
pub fn normalize_heightmap(heightmap: &Tilemap<f64>) -> Tilemap<f64> {
    let mut min_val = f64::MAX;
    let mut max_val = f64::MIN;

    for (_, _, &val) in heightmap.iter() {
        if val < min_val {
            min_val = val;
        }
        if val > max_val {
            max_val = val;
        }
    }

    let range = max_val - min_val;
    if !range.is_finite() || range <= 0.0 {
        warn!(
            "Degenerate height field ({}x{}, range {}), using flat zero map",
            heightmap.width, heightmap.height, range
        );
        return Tilemap::new_with(heightmap.width, heightmap.height, 0.0);
    }

    let mut result = heightmap.clone();
    for (_, _, val) in result.iter_mut() {
        *val = ((*val - min_val) / range).clamp(0.0, 1.0);
    }
    result
}

// =============================================================================
// LOADING
// =============================================================================

/// Errors that can occur when loading an external height map
#[derive(Debug)]
pub enum HeightMapError {
    Io(String),
    Parse(String),
    Shape(String),
}

impl fmt::Display for HeightMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeightMapError::Io(e) => write!(f, "I/O error: {}", e),
            HeightMapError::Parse(e) => write!(f, "Parse error: {}", e),
            HeightMapError::Shape(e) => write!(f, "Invalid height map: {}", e),
        }
    }
}

impl std::error::Error for HeightMapError {}

/// Load a height map stored as a JSON array of rows (as served by the world page).
pub fn load_heightmap_json(path: impl AsRef<Path>) -> Result<Tilemap<f64>, HeightMapError> {
    let text = fs::read_to_string(path.as_ref()).map_err(|e| HeightMapError::Io(e.to_string()))?;
    parse_heightmap_json(&text)
}

/// Parse a JSON array of rows into a normalized height map.
pub fn parse_heightmap_json(text: &str) -> Result<Tilemap<f64>, HeightMapError> {
    let rows: Vec<Vec<f64>> = serde_json::from_str(text).map_err(|e| HeightMapError::Parse(e.to_string()))?;

    let height = rows.len();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(HeightMapError::Shape("empty grid".to_string()));
    }

    let mut data = Vec::with_capacity(width * height);
    for (y, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(HeightMapError::Shape(format!(
                "row {} has {} cells, expected {}",
                y,
                row.len(),
                width
            )));
        }
        if let Some(x) = row.iter().position(|v| !v.is_finite()) {
            return Err(HeightMapError::Shape(format!("non-finite value at ({}, {})", x, y)));
        }
        data.extend(row);
    }

    debug!("Loaded {}x{} height map", width, height);
    let map = Tilemap::from_vec(width, height, data)
        .ok_or_else(|| HeightMapError::Shape("size mismatch".to_string()))?;
    Ok(normalize_heightmap(&map))
}
