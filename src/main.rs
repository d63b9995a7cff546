use std::fs::File;
use std::process;
use std::sync::mpsc;

use clap::Parser;
use log::info;

use glyphworld::config::{AppConfig, Args};
use glyphworld::display::DisplayOptions;
use glyphworld::entities::{spawn_sync_task, EntityIndex};
use glyphworld::explorer;
use glyphworld::export;
use glyphworld::heightmap;
use glyphworld::seeds::WorldSeeds;
use glyphworld::terrain::TerrainRenderer;
use glyphworld::world::{self, WorldData};

/// Send log output to a file; the explorer owns the terminal.
fn init_logging(config: &AppConfig) {
    match File::create(&config.log_file) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("Logging disabled, cannot open {}: {}", config.log_file.display(), e),
    }
}

fn build_world(config: &AppConfig, seeds: WorldSeeds) -> Result<WorldData, heightmap::HeightMapError> {
    match &config.heightmap_file {
        Some(path) => {
            println!("Loading height map from {}...", path.display());
            let map = heightmap::load_heightmap_json(path)?;
            let world = WorldData::from_heightmap(seeds, map, config.world.thresholds);
            world::log_stats(&world.stats);
            Ok(world)
        }
        None => {
            println!("Generating height map...");
            Ok(world::generate_world(&config.world, seeds))
        }
    }
}

fn print_stats(world: &WorldData) {
    let stats = &world.stats;
    println!("World: {}x{} ({} tiles)", world.width, world.height, stats.total);
    for biome in glyphworld::biomes::Biome::ALL {
        println!("  {:<9} {:>6} ({:.1}%)", biome.name(), stats.count(biome), stats.percent(biome));
    }
}

fn run_exports(config: &AppConfig, world: &WorldData) -> bool {
    let mut ok = true;

    if let Some(ref path) = config.export_png {
        let terrain = TerrainRenderer::new(world, &DisplayOptions::default());
        match export::export_png(world, &terrain, &EntityIndex::new(), config.export_metrics, path) {
            Ok(()) => println!("Exported PNG to {}", path),
            Err(e) => {
                eprintln!("Failed to export PNG: {}", e);
                ok = false;
            }
        }
    }

    if let Some(ref path) = config.export_ascii {
        match export::export_ascii(world, None, path) {
            Ok(()) => println!("Exported ASCII to {}", path),
            Err(e) => {
                eprintln!("Failed to export ASCII: {}", e);
                ok = false;
            }
        }
    }

    ok
}

fn main() {
    let config = AppConfig::from_args(Args::parse());
    init_logging(&config);

    let seeds = match config.seed {
        Some(seed) => WorldSeeds::from_master(seed),
        None => WorldSeeds::default(),
    };
    println!("Generating world with seed: {}", seeds.master);
    println!("Map size: {}x{}", config.world.width, config.world.height);

    let world = match build_world(&config, seeds) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("Failed to build world: {}", e);
            process::exit(1);
        }
    };
    print_stats(&world);

    if config.is_export_only() {
        if !run_exports(&config, &world) {
            process::exit(1);
        }
        return;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    let sync_rx = match config.sync.clone() {
        Some(sync_config) => {
            let (tx, rx) = mpsc::channel();
            info!("Polling {} every {:?}", sync_config.endpoint, sync_config.interval);
            match spawn_sync_task(runtime.handle(), sync_config, tx) {
                Ok(_) => Some(rx),
                Err(e) => {
                    eprintln!("Entity sync disabled: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    println!("Launching terminal explorer...");
    if let Err(e) = explorer::run_explorer(world, config, sync_rx) {
        eprintln!("Explorer error: {}", e);
    }

    // Dropping the runtime stops the poller
    runtime.shutdown_background();
}
