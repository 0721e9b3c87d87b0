//! Snapshot persistence and the CSV metrics recorder.
//!
//! Snapshots are the only bit-exact formats that matter for round-tripping:
//! a world archive (four f32 grids plus the biome id grid) and a population
//! archive (positions, energies, species labels). Both reuse the compressed
//! section container from the world crate. Older world archives without
//! slow-layer data load with zero-filled organic/mineral layers.

use pixelplanet_core::{MetricsRow, Population, SimPersistence};
use pixelplanet_world::archive::{self, ArchiveError};
use pixelplanet_world::{FieldMaps, World, WorldError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

const WORLD_MAGIC: &[u8; 4] = b"PXWD";
const POPULATION_MAGIC: &[u8; 4] = b"PXPP";
const SNAPSHOT_VERSION: u32 = 1;

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("world reconstruction failed: {0}")]
    World(#[from] WorldError),
    #[error("snapshot is missing section {0}")]
    MissingSection(&'static str),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
    #[error("species list is malformed: {0}")]
    Species(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct WorldHeader {
    version: u32,
    width: u32,
    height: u32,
    seed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PopulationHeader {
    version: u32,
    count: usize,
}

/// Write a world snapshot: elevation, temperature, humidity and pressure
/// grids as f32 sections plus the biome grid as one byte per cell.
pub fn save_world(world: &World, path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let header = WorldHeader {
        version: SNAPSHOT_VERSION,
        width: world.width(),
        height: world.height(),
        seed: world.seed(),
    };
    let fields = world.fields();
    let biome_ids: Vec<u8> = world.biomes().iter().map(|b| b.id()).collect();
    let writer = BufWriter::new(File::create(path)?);
    archive::write_archive(
        writer,
        WORLD_MAGIC,
        &header,
        &[
            &archive::floats_to_bytes(fields.elevation()),
            &archive::floats_to_bytes(fields.temperature()),
            &archive::floats_to_bytes(fields.humidity()),
            &archive::floats_to_bytes(fields.pressure()),
            &biome_ids,
        ],
    )?;
    info!(path = %path.display(), "world snapshot written");
    Ok(())
}

/// Load a world snapshot. Slow organic/mineral layers restart zero-filled
/// (older archives never carried them) and gases at their baselines.
pub fn load_world(path: &Path) -> Result<World, SnapshotError> {
    let reader = BufReader::new(File::open(path)?);
    let (header, sections): (WorldHeader, Vec<Vec<u8>>) =
        archive::read_archive(reader, WORLD_MAGIC)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version(header.version));
    }

    let mut sections = sections.into_iter();
    let elevation = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("elevation"))?,
    )?;
    let temperature = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("temperature"))?,
    )?;
    let humidity = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("humidity"))?,
    )?;
    let pressure = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("pressure"))?,
    )?;
    let biome_ids = sections.next().ok_or(SnapshotError::MissingSection("biomes"))?;

    let fields = FieldMaps::from_parts(
        header.width,
        header.height,
        elevation,
        temperature,
        humidity,
        pressure,
    )
    .map_err(WorldError::from)?;
    Ok(World::from_snapshot(fields, &biome_ids, header.seed)?)
}

/// Write a population snapshot: an N×2 position array, an N energy array
/// and an N-length species string array, covering every allocated slot.
pub fn save_population(population: &Population, path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let columns = population.columns();
    let count = columns.len();

    let mut positions = Vec::with_capacity(count * 2);
    for p in columns.positions() {
        positions.push(p.x);
        positions.push(p.y);
    }
    let species_json = serde_json::to_vec(&columns.species())?;

    let header = PopulationHeader {
        version: SNAPSHOT_VERSION,
        count,
    };
    let writer = BufWriter::new(File::create(path)?);
    archive::write_archive(
        writer,
        POPULATION_MAGIC,
        &header,
        &[
            &archive::floats_to_bytes(&positions),
            &archive::floats_to_bytes(columns.energies()),
            &species_json,
        ],
    )?;
    info!(path = %path.display(), agents = count, "population snapshot written");
    Ok(())
}

/// Load a population snapshot into `population`, replacing its current
/// agents. Loading truncates to the population's capacity when the archive
/// holds more rows; returns the number of restored agents.
pub fn load_population(population: &mut Population, path: &Path) -> Result<usize, SnapshotError> {
    let reader = BufReader::new(File::open(path)?);
    let (header, sections): (PopulationHeader, Vec<Vec<u8>>) =
        archive::read_archive(reader, POPULATION_MAGIC)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version(header.version));
    }

    let mut sections = sections.into_iter();
    let positions = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("positions"))?,
    )?;
    let energies = archive::floats_from_bytes(
        &sections.next().ok_or(SnapshotError::MissingSection("energies"))?,
    )?;
    let species: Vec<String> = serde_json::from_slice(
        &sections.next().ok_or(SnapshotError::MissingSection("species"))?,
    )?;

    let rows = header
        .count
        .min(positions.len() / 2)
        .min(energies.len())
        .min(species.len());

    population.reset();
    let mut restored = 0;
    for i in 0..rows {
        let x = positions[i * 2];
        let y = positions[i * 2 + 1];
        if population
            .spawn_at(x, y, energies[i], species[i].clone())
            .is_none()
        {
            warn!(restored, total = rows, "capacity reached while loading population");
            break;
        }
        restored += 1;
    }
    Ok(restored)
}

/// Buffering CSV metrics recorder.
///
/// Collects one row per sampled calendar year and writes a single CSV at
/// the end of the run, prefixed with `#` metadata comment lines.
#[derive(Debug)]
pub struct MetricsRecorder {
    out_dir: PathBuf,
    label: String,
    seed: u64,
    run_id: String,
    rows: Vec<MetricsRow>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, label: impl Into<String>, seed: u64) -> Self {
        Self {
            out_dir: out_dir.into(),
            label: label.into(),
            seed,
            run_id: format!("{:032x}", rand::random::<u128>()),
            rows: Vec::new(),
        }
    }

    pub fn record(&mut self, row: MetricsRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    /// Write collected rows to a CSV file. Returns the path when something
    /// was written, `None` for an empty run.
    pub fn save(&self) -> Result<Option<PathBuf>, SnapshotError> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.out_dir)?;

        let label = if self.label.is_empty() {
            "run"
        } else {
            self.label.as_str()
        };
        let file_name = format!(
            "metrics_{label}_{}_{}.csv",
            &self.run_id[..8],
            self.rows.len()
        );
        let path = self.out_dir.join(file_name);

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "# run_id={}", self.run_id)?;
        writeln!(writer, "# seed={}", self.seed)?;
        if !self.label.is_empty() {
            writeln!(writer, "# label={}", self.label)?;
        }
        writeln!(
            writer,
            "tick,time,year,population,avg_energy,var_energy,trait_diversity,avg_traits_per_agent,mean_info_order,global_o2,global_co2,seed,run_id"
        )?;
        for row in &self.rows {
            writeln!(
                writer,
                "{},{:.4},{},{},{:.6},{:.6},{},{:.4},{:.6},{:.6},{:.6},{},{}",
                row.tick,
                row.time,
                row.year,
                row.population,
                row.avg_energy,
                row.var_energy,
                row.trait_diversity,
                row.avg_traits_per_agent,
                row.mean_info_order,
                row.global_o2,
                row.global_co2,
                self.seed,
                self.run_id,
            )?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = self.rows.len(), "metrics saved");
        Ok(Some(path))
    }
}

/// Clonable handle passing driver samples into a shared [`MetricsRecorder`].
#[derive(Debug, Clone)]
pub struct SharedRecorder(Arc<Mutex<MetricsRecorder>>);

impl SharedRecorder {
    #[must_use]
    pub fn new(recorder: Arc<Mutex<MetricsRecorder>>) -> Self {
        Self(recorder)
    }
}

impl SimPersistence for SharedRecorder {
    fn on_sample(&mut self, row: &MetricsRow) {
        if let Ok(mut recorder) = self.0.lock() {
            recorder.record(row.clone());
        }
    }
}
