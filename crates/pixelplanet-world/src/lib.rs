//! Procedural planet model for the pixelplanet simulation.
//!
//! The [`World`] owns the generated climate fields, the derived biome grid,
//! global gas concentrations and two slow memory layers (organic and mineral
//! deposition). Biology feeds back through [`World::deposit_biomass`], which
//! dirties cells for lazy, bounded reclassification in
//! [`World::advance_environment`].

use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod archive;
pub mod biome;
pub mod environment;
pub mod fields;
pub mod noise;
pub mod resources;

pub use biome::{Biome, CellEnv, classify};
pub use environment::{ENV_CHANNELS, EnvChannel};
pub use fields::{FieldError, FieldMaps};
pub use resources::{ATOM_KINDS, AtomKind, ResourceGrid};

/// Baseline atmospheric O2 fraction the planet relaxes toward.
pub const BASE_O2: f32 = 0.02;
/// Baseline CO2 fraction.
pub const BASE_CO2: f32 = 0.0004;
/// Baseline CH4 fraction (methane decays to zero without sources).
pub const BASE_CH4: f32 = 0.0;

/// Maximum dirty cells reclassified per [`World::advance_environment`] call.
/// Bounds the worst-case per-tick cost no matter how much biomass landed in
/// a burst.
pub const RECLASSIFY_BATCH: usize = 512;

/// Errors fatal at world construction. There is no partial-world state.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("field generation failed: {0}")]
    Fields(#[from] FieldError),
    #[error("biome grid does not match world dimensions")]
    BiomeShape,
    #[error("unknown biome id {0}")]
    UnknownBiome(u8),
}

/// The planet: immutable climate fields plus the slowly co-evolving
/// biological memory, and the biome grid derived from both.
pub struct World {
    seed: u64,
    fields: FieldMaps,
    biomes: Vec<Biome>,
    organic: Vec<f32>,
    mineral: Vec<f32>,
    global_o2: f32,
    global_co2: f32,
    global_ch4: f32,
    dirty_queue: VecDeque<(u32, u32)>,
    dirty_members: HashSet<(u32, u32)>,
    rng: SmallRng,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("seed", &self.seed)
            .field("width", &self.fields.width())
            .field("height", &self.fields.height())
            .field("global_o2", &self.global_o2)
            .field("dirty_cells", &self.dirty_queue.len())
            .finish()
    }
}

impl World {
    /// Generate a fresh planet from a seed.
    pub fn generate(seed: u64, width: u32, height: u32) -> Result<Self, WorldError> {
        let fields = FieldMaps::generate(seed, width, height)?;
        Ok(Self::from_fields(fields, seed))
    }

    /// Generate, reusing a cached field archive when it matches the
    /// requested shape. Cache problems fall back to regeneration.
    pub fn generate_or_load(
        seed: u64,
        width: u32,
        height: u32,
        cache: Option<&Path>,
    ) -> Result<Self, WorldError> {
        let fields = FieldMaps::generate_or_load(seed, width, height, cache)?;
        Ok(Self::from_fields(fields, seed))
    }

    fn from_fields(fields: FieldMaps, seed: u64) -> Self {
        let len = (fields.width() as usize) * (fields.height() as usize);
        let mut world = Self {
            seed,
            fields,
            biomes: Vec::new(),
            organic: vec![0.0; len],
            mineral: vec![0.0; len],
            global_o2: BASE_O2,
            global_co2: BASE_CO2,
            global_ch4: BASE_CH4,
            dirty_queue: VecDeque::new(),
            dirty_members: HashSet::new(),
            rng: SmallRng::seed_from_u64(seed.wrapping_add(0x9E37_79B9)),
        };
        world.classify_all();
        world
    }

    /// Rebuild a world from snapshot parts. Slow layers restart zeroed and
    /// gases at their baselines; the biome grid is taken verbatim.
    pub fn from_snapshot(fields: FieldMaps, biome_ids: &[u8], seed: u64) -> Result<Self, WorldError> {
        let len = (fields.width() as usize) * (fields.height() as usize);
        if biome_ids.len() != len {
            return Err(WorldError::BiomeShape);
        }
        let mut biomes = Vec::with_capacity(len);
        for &id in biome_ids {
            biomes.push(Biome::from_id(id).ok_or(WorldError::UnknownBiome(id))?);
        }
        Ok(Self {
            seed,
            organic: vec![0.0; len],
            mineral: vec![0.0; len],
            global_o2: BASE_O2,
            global_co2: BASE_CO2,
            global_ch4: BASE_CH4,
            dirty_queue: VecDeque::new(),
            dirty_members: HashSet::new(),
            rng: SmallRng::seed_from_u64(seed.wrapping_add(0x9E37_79B9)),
            fields,
            biomes,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.fields.width()
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.fields.height()
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn fields(&self) -> &FieldMaps {
        &self.fields
    }

    #[must_use]
    pub fn biomes(&self) -> &[Biome] {
        &self.biomes
    }

    #[must_use]
    pub fn organic_layer(&self) -> &[f32] {
        &self.organic
    }

    #[must_use]
    pub fn mineral_layer(&self) -> &[f32] {
        &self.mineral
    }

    #[must_use]
    pub const fn global_o2(&self) -> f32 {
        self.global_o2
    }

    #[must_use]
    pub const fn global_co2(&self) -> f32 {
        self.global_co2
    }

    #[must_use]
    pub const fn global_ch4(&self) -> f32 {
        self.global_ch4
    }

    /// Override gas levels (scenario setup and future biology hooks).
    pub fn set_gas_levels(&mut self, o2: f32, co2: f32, ch4: f32) {
        self.global_o2 = o2.max(0.0);
        self.global_co2 = co2.max(0.0);
        self.global_ch4 = ch4.max(0.0);
    }

    /// Pending dirty cells awaiting reclassification.
    #[must_use]
    pub fn dirty_len(&self) -> usize {
        self.dirty_queue.len()
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width()) && y < i64::from(self.height())
    }

    /// Biome at tile coordinates; out-of-range reads resolve to ocean.
    #[must_use]
    pub fn biome_at(&self, x: i64, y: i64) -> Biome {
        if !self.in_bounds(x, y) {
            return Biome::Ocean;
        }
        self.biomes[self.fields.offset(x as u32, y as u32)]
    }

    fn cell_env(&self, x: u32, y: u32) -> CellEnv {
        let idx = self.fields.offset(x, y);
        CellEnv {
            elevation: self.fields.elevation()[idx],
            temperature: self.fields.temperature()[idx],
            humidity: self.fields.humidity()[idx],
            latitude: self.fields.pressure()[idx],
            global_o2: self.global_o2,
            organic: self.organic[idx],
            mineral: self.mineral[idx],
            local_noise: biome::local_noise(self.seed, x, y),
        }
    }

    /// Full classification of every cell, plus the river/lake second pass.
    /// Used at construction and on explicit global resets only; steady-state
    /// updates go through the dirty-cell queue.
    fn classify_all(&mut self) {
        let width = self.width();
        let height = self.height();
        let len = (width as usize) * (height as usize);

        let this = &*self;
        let mut grid: Vec<Biome> = (0..len)
            .into_par_iter()
            .map(|idx| {
                let x = (idx % width as usize) as u32;
                let y = (idx / width as usize) as u32;
                classify(&this.cell_env(x, y))
            })
            .collect();

        self.apply_hydrology(&mut grid);
        self.biomes = grid;
        self.dirty_queue.clear();
        self.dirty_members.clear();
    }

    /// Second pass: carve rivers next to existing water and pool interior
    /// lakes. Single sweep, never overwrites water or beach cells.
    fn apply_hydrology(&self, grid: &mut [Biome]) {
        let width = self.width() as i64;
        let height = self.height() as i64;

        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                let current = grid[idx];
                if current.is_water() || current == Biome::Beach {
                    continue;
                }

                let field_idx = self.fields.offset(x as u32, y as u32);
                let elev = self.fields.elevation()[field_idx];
                let hum = self.fields.humidity()[field_idx];

                let mut near_open_water = false;
                let mut near_water_or_shore = false;
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || nx >= width || ny < 0 || ny >= height {
                            continue;
                        }
                        let neighbor = grid[(ny * width + nx) as usize];
                        if matches!(neighbor, Biome::Ocean | Biome::Water) {
                            near_open_water = true;
                        }
                        if neighbor.is_water() || neighbor == Biome::Beach {
                            near_water_or_shore = true;
                        }
                    }
                }

                if elev > 0.16 && elev < 0.65 && hum > 0.6 && near_water_or_shore {
                    grid[idx] = Biome::River;
                    continue;
                }

                if elev < 0.32 && hum > 0.7 && !near_open_water {
                    grid[idx] = Biome::Lake;
                }
            }
        }
    }

    fn reclassify_cell(&mut self, x: u32, y: u32) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let biome = classify(&self.cell_env(x, y));
        let idx = self.fields.offset(x, y);
        self.biomes[idx] = biome;
    }

    fn mark_dirty(&mut self, x: u32, y: u32) {
        if self.dirty_members.insert((x, y)) {
            self.dirty_queue.push_back((x, y));
        }
    }

    /// Deposit organic/mineral matter at a tile (dying agents call this).
    /// The tile and its 8-neighborhood are queued for reclassification.
    /// Out-of-range coordinates are ignored.
    pub fn deposit_biomass(&mut self, x: i64, y: i64, organics: f32, minerals: f32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.fields.offset(x as u32, y as u32);
        self.organic[idx] += organics.max(0.0);
        self.mineral[idx] += minerals.max(0.0);

        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let nx = x + dx;
                let ny = y + dy;
                if self.in_bounds(nx, ny) {
                    self.mark_dirty(nx as u32, ny as u32);
                }
            }
        }
    }

    /// Advance the slow environmental dynamics: decay the memory layers,
    /// relax global gases toward their baselines, and reclassify a bounded
    /// batch of dirty cells.
    pub fn advance_environment(&mut self, dt: f32) {
        let decay_organic = 1.0 - (0.0001 * dt).min(0.05);
        for cell in &mut self.organic {
            *cell *= decay_organic;
        }
        let decay_mineral = 1.0 - (0.00002 * dt).min(0.02);
        for cell in &mut self.mineral {
            *cell *= decay_mineral;
        }

        let relax = (0.00005 * dt).min(0.01);
        self.global_o2 += (BASE_O2 - self.global_o2) * relax;
        self.global_co2 += (BASE_CO2 - self.global_co2) * relax;
        self.global_ch4 += (BASE_CH4 - self.global_ch4) * relax;

        let batch = RECLASSIFY_BATCH.min(self.dirty_queue.len());
        for _ in 0..batch {
            let Some((x, y)) = self.dirty_queue.pop_front() else {
                break;
            };
            self.dirty_members.remove(&(x, y));
            self.reclassify_cell(x, y);
        }
        if batch > 0 {
            debug!(reclassified = batch, pending = self.dirty_queue.len(), "dirty cells");
        }
    }

    /// Sample the raw environmental input channels at a tile for time `t`.
    /// Dissolved organics are scaled down while the local organic layer is
    /// still scarce, coupling biology into what agents can sense.
    pub fn environment_inputs(&mut self, x: i64, y: i64, t: f32) -> [f32; ENV_CHANNELS] {
        let biome = self.biome_at(x, y);
        let lat_frac = if self.in_bounds(x, y) {
            self.fields.pressure()[self.fields.offset(x as u32, y as u32)]
        } else {
            0.5
        };

        let mut env = environment::sample_environment(biome, lat_frac, t, &mut self.rng);

        if self.in_bounds(x, y) {
            let organic = self.organic[self.fields.offset(x as u32, y as u32)];
            let factor = (organic * 0.1).clamp(0.0, 1.0);
            env[EnvChannel::OrganicSoup as usize] *= factor;
        }
        env
    }

    /// Color-mapped biome grid for display, with gentle elevation
    /// brightening and a warm/cold temperature tint.
    #[must_use]
    pub fn color_map(&self) -> Vec<[u8; 3]> {
        let elevation = self.fields.elevation();
        let temperature = self.fields.temperature();
        self.biomes
            .iter()
            .enumerate()
            .map(|(idx, biome)| {
                let base = biome.color();
                let light = 0.75 + 0.35 * elevation[idx];
                let warm_cold = (temperature[idx] - 0.5) * 0.3;
                let tint = [40.0 * warm_cold, 10.0 * warm_cold, -30.0 * warm_cold];
                let mut shaded = [0u8; 3];
                for channel in 0..3 {
                    let value = f32::from(base[channel]) * light + tint[channel];
                    shaded[channel] = value.clamp(0.0, 255.0) as u8;
                }
                shaded
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_world() -> World {
        World::generate(1234, 48, 24).expect("world")
    }

    #[test]
    fn construction_classifies_every_cell() {
        let world = small_world();
        assert_eq!(
            world.biomes().len(),
            (world.width() * world.height()) as usize
        );
        assert_eq!(world.dirty_len(), 0);
    }

    #[test]
    fn biome_grid_matches_classifier_after_construction() {
        let world = small_world();
        // Cells untouched by the hydrology pass must agree with the pure
        // classifier applied to their current environment.
        let mut checked = 0;
        for y in 0..world.height() {
            for x in 0..world.width() {
                let idx = world.fields().offset(x, y);
                let biome = world.biomes()[idx];
                if matches!(biome, Biome::River | Biome::Lake) {
                    continue;
                }
                assert_eq!(biome, classify(&world.cell_env(x, y)));
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn out_of_range_reads_are_ocean() {
        let world = small_world();
        assert_eq!(world.biome_at(-1, 0), Biome::Ocean);
        assert_eq!(world.biome_at(0, 9999), Biome::Ocean);
    }

    #[test]
    fn deposit_marks_neighborhood_dirty() {
        let mut world = small_world();
        world.deposit_biomass(10, 10, 1.0, 0.5);
        assert_eq!(world.dirty_len(), 9);
        // Depositing again on the same tile must not duplicate queue entries.
        world.deposit_biomass(10, 10, 1.0, 0.5);
        assert_eq!(world.dirty_len(), 9);

        let idx = world.fields().offset(10, 10);
        assert!((world.organic_layer()[idx] - 2.0).abs() < 1e-6);
        assert!((world.mineral_layer()[idx] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_deposits_are_ignored() {
        let mut world = small_world();
        world.deposit_biomass(-5, 3, 1.0, 1.0);
        world.deposit_biomass(3, 10_000, 1.0, 1.0);
        assert_eq!(world.dirty_len(), 0);
    }

    #[test]
    fn reclassification_is_bounded_per_call() {
        let mut world = World::generate(77, 64, 48).expect("world");
        for y in 0..world.height() {
            for x in 0..world.width() {
                world.deposit_biomass(i64::from(x), i64::from(y), 0.5, 0.1);
            }
        }
        let marked = world.dirty_len();
        assert!(marked > RECLASSIFY_BATCH);

        world.advance_environment(1.0);
        assert_eq!(world.dirty_len(), marked - RECLASSIFY_BATCH);
    }

    #[test]
    fn layers_decay_and_gases_relax() {
        let mut world = small_world();
        world.deposit_biomass(5, 5, 10.0, 10.0);
        world.set_gas_levels(0.5, 0.1, 0.2);
        let idx = world.fields().offset(5, 5);
        let organic_before = world.organic_layer()[idx];
        let mineral_before = world.mineral_layer()[idx];

        world.advance_environment(100.0);

        assert!(world.organic_layer()[idx] < organic_before);
        assert!(world.mineral_layer()[idx] < mineral_before);
        assert!(world.mineral_layer()[idx] > world.organic_layer()[idx]);
        assert!(world.global_o2() < 0.5);
        assert!(world.global_ch4() < 0.2);
    }

    #[test]
    fn organic_soup_is_scarce_on_barren_ground() {
        let mut world = small_world();
        // Find a land tile with no deposits.
        let mut land = None;
        'outer: for y in 0..world.height() {
            for x in 0..world.width() {
                if !world.biome_at(i64::from(x), i64::from(y)).is_water() {
                    land = Some((i64::from(x), i64::from(y)));
                    break 'outer;
                }
            }
        }
        let (x, y) = land.expect("land tile");
        let env = world.environment_inputs(x, y, 0.0);
        assert_eq!(env[EnvChannel::OrganicSoup as usize], 0.0);

        world.deposit_biomass(x, y, 20.0, 0.0);
        let fed: f32 = (0..16)
            .map(|i| world.environment_inputs(x, y, i as f32)[EnvChannel::OrganicSoup as usize])
            .sum();
        assert!(fed > 0.0);
    }

    #[test]
    fn snapshot_parts_rebuild_identical_biomes() {
        let world = small_world();
        let ids: Vec<u8> = world.biomes().iter().map(|b| b.id()).collect();
        let rebuilt = World::from_snapshot(world.fields().clone(), &ids, world.seed())
            .expect("rebuild");
        assert_eq!(world.biomes(), rebuilt.biomes());
        assert!(rebuilt.organic_layer().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn color_map_covers_grid() {
        let world = small_world();
        assert_eq!(
            world.color_map().len(),
            (world.width() * world.height()) as usize
        );
    }
}
