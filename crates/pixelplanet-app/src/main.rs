//! Headless launcher for the pixelplanet simulation.
//!
//! Builds (or loads) a world, spawns the founding population and runs the
//! tick loop for a fixed number of steps, recording yearly metrics and
//! optionally writing snapshots at the end.

use anyhow::{Context, Result};
use clap::Parser;
use pixelplanet_core::{PixelPlanetConfig, Population, Simulation};
use pixelplanet_storage::{MetricsRecorder, SharedRecorder, save_population, save_world};
use pixelplanet_world::{ResourceGrid, World};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pixelplanet", about = "Evolutive pixel simulator")]
struct Args {
    /// Number of initial pixels to spawn.
    #[arg(long, default_value_t = 300)]
    pixels: usize,

    /// Map size: width height.
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], default_values_t = [1024, 512])]
    size: Vec<u32>,

    /// Random seed for the generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Path to a cached field archive (reused when the shape matches).
    #[arg(long)]
    map: Option<PathBuf>,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 1000)]
    ticks: u64,

    /// Simulated time per tick.
    #[arg(long, default_value_t = 1.0)]
    dt: f32,

    /// Directory for metrics CSV output.
    #[arg(long, default_value = "data/metrics")]
    metrics_dir: PathBuf,

    /// Optional label embedded in the metrics file name.
    #[arg(long, default_value = "")]
    label: String,

    /// Write world/population snapshots here at the end of the run.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let (width, height) = (args.size[0], args.size[1]);
    info!(width, height, seed = args.seed, "creating world");
    let world = World::generate_or_load(args.seed, width, height, args.map.as_deref())
        .context("world generation failed")?;

    let config = PixelPlanetConfig {
        world_width: width,
        world_height: height,
        rng_seed: Some(args.seed),
        capacity: (args.pixels * 4).max(1024),
        initial_pixels: args.pixels,
        ..PixelPlanetConfig::default()
    };

    let resources = ResourceGrid::new(width, height, config.initial_atoms);

    let mut population = Population::new(config).context("population construction failed")?;
    info!(pixels = args.pixels, "spawning founding batch");
    population.spawn_random(&world, args.pixels);

    let recorder = Arc::new(Mutex::new(MetricsRecorder::new(
        args.metrics_dir.clone(),
        args.label.clone(),
        args.seed,
    )));
    let mut sim = Simulation::with_persistence(
        world,
        population,
        Some(resources),
        Box::new(SharedRecorder::new(Arc::clone(&recorder))),
    );

    for _ in 0..args.ticks {
        sim.step(Some(args.dt));
    }

    info!(
        ticks = args.ticks,
        alive = sim.population().alive_count(),
        time = sim.population().time(),
        "run complete"
    );

    if let Ok(guard) = recorder.lock() {
        if let Some(path) = guard.save().context("metrics save failed")? {
            info!(path = %path.display(), "metrics written");
        }
    }

    if let Some(dir) = args.snapshot_dir {
        save_world(sim.world(), &dir.join("world.pxw")).context("world snapshot failed")?;
        save_population(sim.population(), &dir.join("population.pxp"))
            .context("population snapshot failed")?;
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
