//! Command line arguments and the typed configuration built from them

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::biomes::BiomeThresholds;
use crate::display::RenderParams;
use crate::entities::SyncConfig;
use crate::heightmap::HeightMapParams;
use crate::surface::CellMetrics;
use crate::world::WorldConfig;

#[derive(Parser, Debug)]
#[command(name = "glyphworld")]
#[command(about = "Explore a procedural glyph world with live entities")]
pub struct Args {
    /// Width of the world in tiles
    #[arg(short = 'W', long, default_value = "200")]
    pub width: usize,

    /// Height of the world in tiles
    #[arg(short = 'H', long, default_value = "200")]
    pub height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Heights below this are water
    #[arg(long, default_value = "0.23")]
    pub water_threshold: f64,

    /// Number of 3x3 smoothing passes
    #[arg(long, default_value = "5")]
    pub smoothing: u32,

    /// Noise sampling scale
    #[arg(long, default_value = "0.09")]
    pub scale: f64,

    /// Load the height map from a JSON array of rows instead of generating one
    #[arg(long)]
    pub heightmap: Option<PathBuf>,

    /// World state endpoint
    #[arg(long, default_value = "http://127.0.0.1:5000/api/world")]
    pub endpoint: String,

    /// Do not poll for entities
    #[arg(long)]
    pub offline: bool,

    /// Milliseconds between entity polls
    #[arg(long, default_value = "1000")]
    pub sync_interval_ms: u64,

    /// Pixel size of one tile in PNG exports
    #[arg(long, default_value = "12")]
    pub cell_size: u32,

    /// Export the world to PNG and exit
    #[arg(long)]
    pub export_png: Option<String>,

    /// Export the world to a text file and exit
    #[arg(long)]
    pub export_ascii: Option<String>,

    /// Log file (the terminal belongs to the explorer)
    #[arg(long, default_value = "glyphworld.log")]
    pub log_file: PathBuf,
}

/// Everything the application needs, grouped by the component that uses it
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub seed: Option<u64>,
    pub world: WorldConfig,
    pub heightmap_file: Option<PathBuf>,
    /// `None` when running offline
    pub sync: Option<SyncConfig>,
    pub render: RenderParams,
    pub export_metrics: CellMetrics,
    pub export_png: Option<String>,
    pub export_ascii: Option<String>,
    pub log_file: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: Args) -> Self {
        let world = WorldConfig {
            width: args.width.max(1),
            height: args.height.max(1),
            heightmap: HeightMapParams {
                scale: args.scale,
                smoothing_iterations: args.smoothing,
                ..Default::default()
            },
            thresholds: BiomeThresholds::with_water(args.water_threshold),
        };

        let sync = (!args.offline).then(|| SyncConfig {
            endpoint: args.endpoint,
            interval: Duration::from_millis(args.sync_interval_ms.max(1)),
            ..Default::default()
        });

        AppConfig {
            seed: args.seed,
            world,
            heightmap_file: args.heightmap,
            sync,
            render: RenderParams::default(),
            export_metrics: CellMetrics::square(args.cell_size),
            export_png: args.export_png,
            export_ascii: args.export_ascii,
            log_file: args.log_file,
        }
    }

    /// Export-and-exit mode
    pub fn is_export_only(&self) -> bool {
        self.export_png.is_some() || self.export_ascii.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_args(Args::try_parse_from(["glyphworld"]).unwrap());
        assert_eq!((config.world.width, config.world.height), (200, 200));
        assert_eq!(config.world.thresholds, BiomeThresholds::default());
        assert_eq!(config.world.heightmap.smoothing_iterations, 5);
        let sync = config.sync.as_ref().unwrap();
        assert_eq!(sync.endpoint, "http://127.0.0.1:5000/api/world");
        assert_eq!(sync.interval, Duration::from_secs(1));
        assert_eq!(config.export_metrics, CellMetrics::square(12));
        assert!(!config.is_export_only());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "glyphworld",
            "-W",
            "64",
            "--height",
            "32",
            "--seed",
            "42",
            "--water-threshold",
            "0.3",
            "--offline",
            "--export-ascii",
            "world.txt",
        ])
        .unwrap();
        let config = AppConfig::from_args(args);
        assert_eq!((config.world.width, config.world.height), (64, 32));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.world.thresholds.water, 0.3);
        assert!(config.sync.is_none());
        assert!(config.is_export_only());
    }
}
