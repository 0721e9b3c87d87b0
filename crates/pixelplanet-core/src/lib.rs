//! Core agent simulation for pixelplanet.
//!
//! The [`Population`] owns every agent as struct-of-arrays columns and runs
//! the per-tick state machine: stress accounting, movement and feeding,
//! metabolism, death with biomass deposition, then asexual division over
//! the agents that were alive at tick start. The [`driver`] module wraps it
//! with pause/speed control and metrics sampling.

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use pixelplanet_genome::{Genome, MOTILITY_GENE, Trait, TraitSet};
use pixelplanet_world::{ATOM_KINDS, ResourceGrid, World};

pub mod driver;
pub mod metabolism;
pub mod reproduction;

pub use driver::{
    ControlCommand, MetricsRow, NullPersistence, SimPersistence, Simulation, TickSummary,
    apply_control_command,
};
pub use metabolism::{
    EnergyModel, IDX_ENERGY, IDX_INFO, IDX_MEMBRANE, IDX_MINERALS, IDX_ORGANICS,
    INTERNAL_RESOURCES, InternalResource, MetabolismParams, Stocks, atom_energy_yield,
};
pub use reproduction::{DIVISION_STRESS_FLOOR, DivisionThresholds, division_allowed};

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Axis-aligned 2D position in tile units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Errors raised when validating the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a pixelplanet run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelPlanetConfig {
    /// Width of the world in tiles.
    pub world_width: u32,
    /// Height of the world in tiles.
    pub world_height: u32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Fixed agent capacity; slots are append-only until reset.
    pub capacity: usize,
    /// Agents spawned by the initial clustered batch.
    pub initial_pixels: usize,
    /// Genome vector length.
    pub genome_len: usize,
    /// Initial per-tile atom counts in the feeding grid.
    pub initial_atoms: u32,
    /// Per-step probability that an atom slot gains one unit back.
    pub atom_replenish_rate: f32,
    /// Exponential moving average factor for the energy statistics.
    pub ema_alpha: f32,
    /// Energy level below which the deficit signal starts rising.
    pub energy_target: f32,
    /// Energy level below which an agent tries to feed before moving.
    pub hunger_threshold: f32,
    /// Stress below which a fully motile agent idles instead of foraging.
    pub idle_stress_cutoff: f32,
    /// Square perception radius (in tiles) for directed foraging.
    pub perception_radius: i64,
    /// Metabolism constants.
    pub metabolism: MetabolismParams,
    /// Internal stock gates required for division.
    pub division: DivisionThresholds,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
    /// Minimum number of steps between two metrics samples.
    pub metrics_min_interval: u32,
}

impl Default for PixelPlanetConfig {
    fn default() -> Self {
        Self {
            world_width: 256,
            world_height: 128,
            rng_seed: None,
            capacity: 1024,
            initial_pixels: 300,
            genome_len: pixelplanet_genome::GENOME_LEN,
            initial_atoms: 8,
            atom_replenish_rate: 0.01,
            ema_alpha: 0.01,
            energy_target: 0.5,
            hunger_threshold: 0.4,
            idle_stress_cutoff: 0.05,
            perception_radius: 3,
            metabolism: MetabolismParams::default(),
            division: DivisionThresholds::default(),
            history_capacity: 256,
            metrics_min_interval: 1,
        }
    }
}

impl PixelPlanetConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_width == 0 || self.world_height == 0 {
            return Err(ConfigError::InvalidConfig(
                "world dimensions must be non-zero",
            ));
        }
        if self.capacity == 0 {
            return Err(ConfigError::InvalidConfig("capacity must be non-zero"));
        }
        if self.initial_pixels > self.capacity {
            return Err(ConfigError::InvalidConfig(
                "initial_pixels cannot exceed capacity",
            ));
        }
        if self.genome_len < 2 {
            return Err(ConfigError::InvalidConfig(
                "genome_len must cover the reserved replication and motility genes",
            ));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::InvalidConfig("ema_alpha must be in (0, 1]"));
        }
        if !(self.energy_target > 0.0 && self.energy_target <= 1.0) {
            return Err(ConfigError::InvalidConfig(
                "energy_target must be in (0, 1]",
            ));
        }
        if !(self.hunger_threshold > 0.0 && self.hunger_threshold < 1.0) {
            return Err(ConfigError::InvalidConfig(
                "hunger_threshold must be in (0, 1)",
            ));
        }
        if self.perception_radius < 0 {
            return Err(ConfigError::InvalidConfig(
                "perception_radius must be non-negative",
            ));
        }
        if self.atom_replenish_rate < 0.0
            || self.idle_stress_cutoff < 0.0
            || self.metabolism.basal_energy_cost < 0.0
            || self.metabolism.membrane_cost < 0.0
            || self.metabolism.flux_limit <= 0.0
            || self.division.energy < 0.0
            || self.division.organics < 0.0
            || self.division.membrane < 0.0
            || self.division.info_order < 0.0
        {
            return Err(ConfigError::InvalidConfig(
                "rates and thresholds must be non-negative, flux limit positive",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// The seed used for world generation.
    #[must_use]
    pub fn world_seed(&self) -> u64 {
        self.rng_seed.unwrap_or(0)
    }
}

/// Collection of per-agent columns for hot-path iteration. Slots are
/// allocated append-at-end only; a dead slot keeps its index forever
/// (until a full reset), so indices double as stable agent ids.
#[derive(Debug, Default)]
pub struct AgentColumns {
    positions: Vec<Position>,
    energies: Vec<f32>,
    alive: Vec<bool>,
    birth_time: Vec<f32>,
    energy_avg: Vec<f32>,
    energy_var: Vec<f32>,
    stress: Vec<f32>,
    species: Vec<String>,
    genomes: Vec<Genome>,
    traits: Vec<TraitSet>,
    stocks: Vec<Stocks>,
}

impl AgentColumns {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            energies: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            birth_time: Vec::with_capacity(capacity),
            energy_avg: Vec::with_capacity(capacity),
            energy_var: Vec::with_capacity(capacity),
            stress: Vec::with_capacity(capacity),
            species: Vec::with_capacity(capacity),
            genomes: Vec::with_capacity(capacity),
            traits: Vec::with_capacity(capacity),
            stocks: Vec::with_capacity(capacity),
        }
    }

    /// Number of allocated slots (live and dead).
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.energies.clear();
        self.alive.clear();
        self.birth_time.clear();
        self.energy_avg.clear();
        self.energy_var.clear();
        self.stress.clear();
        self.species.clear();
        self.genomes.clear();
        self.traits.clear();
        self.stocks.clear();
    }

    fn push(
        &mut self,
        position: Position,
        energy: f32,
        birth_time: f32,
        species: String,
        genome: Genome,
        traits: TraitSet,
        stocks: Stocks,
    ) -> usize {
        let idx = self.len();
        self.positions.push(position);
        self.energies.push(energy);
        self.alive.push(true);
        self.birth_time.push(birth_time);
        self.energy_avg.push(1.0);
        self.energy_var.push(0.0);
        self.stress.push(0.0);
        self.species.push(species);
        self.genomes.push(genome);
        self.traits.push(traits);
        self.stocks.push(stocks);
        idx
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    #[must_use]
    pub fn energies(&self) -> &[f32] {
        &self.energies
    }

    #[must_use]
    pub fn energies_mut(&mut self) -> &mut [f32] {
        &mut self.energies
    }

    #[must_use]
    pub fn alive(&self) -> &[bool] {
        &self.alive
    }

    #[must_use]
    pub fn birth_time(&self) -> &[f32] {
        &self.birth_time
    }

    #[must_use]
    pub fn energy_avg(&self) -> &[f32] {
        &self.energy_avg
    }

    #[must_use]
    pub fn energy_var(&self) -> &[f32] {
        &self.energy_var
    }

    #[must_use]
    pub fn energy_var_mut(&mut self) -> &mut [f32] {
        &mut self.energy_var
    }

    #[must_use]
    pub fn stress(&self) -> &[f32] {
        &self.stress
    }

    #[must_use]
    pub fn species(&self) -> &[String] {
        &self.species
    }

    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    #[must_use]
    pub fn genomes_mut(&mut self) -> &mut [Genome] {
        &mut self.genomes
    }

    #[must_use]
    pub fn traits(&self) -> &[TraitSet] {
        &self.traits
    }

    #[must_use]
    pub fn traits_mut(&mut self) -> &mut [TraitSet] {
        &mut self.traits
    }

    #[must_use]
    pub fn stocks(&self) -> &[Stocks] {
        &self.stocks
    }

    #[must_use]
    pub fn stocks_mut(&mut self) -> &mut [Stocks] {
        &mut self.stocks
    }
}

/// Lightweight per-agent view for UI layers.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub id: usize,
    pub species: String,
    pub x: f32,
    pub y: f32,
    pub energy: f32,
    pub alive: bool,
    pub traits: TraitSet,
}

/// Births and deaths produced by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub births: usize,
    pub deaths: usize,
}

/// The agent population manager: owns all agent columns and the per-tick
/// state machine.
pub struct Population {
    config: PixelPlanetConfig,
    energy_model: EnergyModel,
    columns: AgentColumns,
    time: f32,
    rng: SmallRng,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("count", &self.columns.len())
            .field("alive", &self.alive_count())
            .field("time", &self.time)
            .finish()
    }
}

impl Population {
    /// Create an empty population with genome-driven metabolism.
    pub fn new(config: PixelPlanetConfig) -> Result<Self, ConfigError> {
        let model = EnergyModel::Genomic(config.metabolism);
        Self::with_energy_model(config, model)
    }

    /// Create an empty population with an explicit energy model. Passing
    /// [`EnergyModel::flat`] runs the population without genomic
    /// metabolism, with a plain linear energy decay.
    pub fn with_energy_model(
        config: PixelPlanetConfig,
        energy_model: EnergyModel,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Ok(Self {
            columns: AgentColumns::with_capacity(config.capacity),
            energy_model,
            config,
            time: 0.0,
            rng,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PixelPlanetConfig {
        &self.config
    }

    #[must_use]
    pub fn columns(&self) -> &AgentColumns {
        &self.columns
    }

    #[must_use]
    pub fn columns_mut(&mut self) -> &mut AgentColumns {
        &mut self.columns
    }

    /// Allocated slots, live or dead.
    #[must_use]
    pub fn count(&self) -> usize {
        self.columns.len()
    }

    /// Currently live agents.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.columns.alive.iter().filter(|alive| **alive).count()
    }

    /// Accumulated simulation time.
    #[must_use]
    pub const fn time(&self) -> f32 {
        self.time
    }

    /// Drop every agent and restart the clock. Slots become reusable only
    /// through this full reset.
    pub fn reset(&mut self) {
        self.columns.clear();
        self.time = 0.0;
    }

    /// Append one agent, if capacity allows.
    fn push_agent(
        &mut self,
        x: f32,
        y: f32,
        species: String,
        genome: Genome,
        stocks: Stocks,
    ) -> Option<usize> {
        if self.columns.len() >= self.config.capacity {
            return None;
        }
        let traits = genome.decode_traits();
        let energy = stocks[IDX_ENERGY].clamp(0.0, 1.0);
        Some(self.columns.push(
            Position::new(x, y),
            energy,
            self.time,
            species,
            genome,
            traits,
            stocks,
        ))
    }

    /// Append a single agent at an explicit position with a fresh neutral
    /// genome. Used by snapshot loading and interactive placement; returns
    /// `None` when the population is at capacity.
    pub fn spawn_at(
        &mut self,
        x: f32,
        y: f32,
        energy: f32,
        species: String,
    ) -> Option<usize> {
        let genome = Genome::neutral_with_len(self.config.genome_len, &mut self.rng);
        let mut stocks = metabolism::initial_stocks();
        stocks[IDX_ENERGY] = energy.clamp(0.0, 1.0);
        self.push_agent(x, y, species, genome, stocks)
    }

    /// Spawn the founding batch: near-identical neutral genomes, clustered
    /// in one Gaussian patch around a randomly probed water-adjacent tile.
    pub fn spawn_random(&mut self, world: &World, n: usize) -> Vec<usize> {
        let w = world.width() as f32;
        let h = world.height() as f32;

        let mut center = None;
        for _ in 0..2000 {
            let tx = i64::from(self.rng.random_range(0..world.width()));
            let ty = i64::from(self.rng.random_range(0..world.height()));
            let biome = world.biome_at(tx, ty);
            if biome.is_water() || biome.is_shoreline() {
                center = Some((tx as f32, ty as f32));
                break;
            }
        }
        let (cx, cy) = center.unwrap_or_else(|| {
            (
                self.rng.random::<f32>() * (w - 1.0),
                self.rng.random::<f32>() * (h - 1.0),
            )
        });

        let sigma = (w.min(h) * 0.02).max(2.0);
        let spread = Normal::new(0.0f32, sigma).ok();

        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let (dx, dy) = spread
                .as_ref()
                .map_or((0.0, 0.0), |dist| (dist.sample(&mut self.rng), dist.sample(&mut self.rng)));
            let x = (cx + dx).clamp(0.0, w - 1.0);
            let y = (cy + dy).clamp(0.0, h - 1.0);
            let genome = Genome::neutral_with_len(self.config.genome_len, &mut self.rng);
            let Some(idx) = self.push_agent(
                x,
                y,
                "proto".to_string(),
                genome,
                metabolism::initial_stocks(),
            ) else {
                break;
            };
            ids.push(idx);
        }
        ids
    }

    /// Advance the population by `dt`: slow environment first, then the
    /// per-agent state machine, then one division pass over the agents
    /// alive at tick start.
    pub fn step(
        &mut self,
        dt: f32,
        world: &mut World,
        mut resources: Option<&mut ResourceGrid>,
    ) -> TickReport {
        self.time += dt;
        world.advance_environment(dt);
        if self.config.atom_replenish_rate > 0.0 {
            if let Some(grid) = resources.as_deref_mut() {
                grid.replenish(self.config.atom_replenish_rate, &mut self.rng);
            }
        }

        let mut deaths = 0;
        let count = self.columns.len();
        for i in 0..count {
            if !self.columns.alive[i] {
                continue;
            }

            let x = self.columns.positions[i].x;
            let y = self.columns.positions[i].y;
            let e = self.columns.energies[i];

            // Slow energy statistics drive the stress signal.
            let alpha = self.config.ema_alpha;
            let avg = self.columns.energy_avg[i];
            let var = self.columns.energy_var[i];
            let new_avg = (1.0 - alpha) * avg + alpha * e;
            let new_var = (1.0 - alpha) * var + alpha * (e - avg) * (e - avg);
            self.columns.energy_avg[i] = new_avg;
            self.columns.energy_var[i] = new_var;

            let deficit = (self.config.energy_target - e).max(0.0);
            let stress = deficit + new_var;
            self.columns.stress[i] = stress;

            let level = motility_level(&self.columns.genomes[i], self.columns.traits[i]);

            if e < self.config.hunger_threshold {
                let mut eaten = false;
                if let Some(grid) = resources.as_deref_mut() {
                    let tx = x.round() as i64;
                    let ty = y.round() as i64;
                    if let Some(best) = ATOM_KINDS
                        .iter()
                        .copied()
                        .max_by_key(|atom| OrderedFloat(atom_energy_yield(*atom)))
                    {
                        if grid.consume(tx, ty, best, 1) {
                            let gain = atom_energy_yield(best).max(0.0);
                            self.columns.energies[i] = (e + gain).min(1.0);
                            if let EnergyModel::Genomic(_) = self.energy_model {
                                self.columns.stocks[i][IDX_ENERGY] = self.columns.energies[i];
                            }
                            eaten = true;
                        }
                    }
                }
                if !eaten {
                    // Hungry with nothing to eat: movement scale depends on
                    // the motility tier.
                    let speed = match level {
                        0 => 0.01,
                        1 => 0.15,
                        _ => 0.8,
                    };
                    let (nx, ny) = random_step(&mut self.rng, x, y, speed * dt);
                    self.columns.positions[i] = Position::new(nx, ny);
                }
            } else {
                let (nx, ny) = match level {
                    0 => {
                        let speed = 0.01 + 0.04 * stress.min(1.0);
                        random_step(&mut self.rng, x, y, speed * dt)
                    }
                    1 => {
                        let speed = 0.05 + 0.2 * stress.min(1.0);
                        random_step(&mut self.rng, x, y, speed * dt)
                    }
                    _ => {
                        if stress < self.config.idle_stress_cutoff {
                            random_step(&mut self.rng, x, y, 0.1 * dt)
                        } else {
                            directed_forage(
                                &mut self.rng,
                                x,
                                y,
                                world,
                                resources.as_deref(),
                                self.config.perception_radius,
                            )
                        }
                    }
                };
                self.columns.positions[i] = Position::new(nx, ny);
            }

            // Metabolism samples the environment at the pre-movement tile.
            match self.energy_model {
                EnergyModel::Genomic(params) => {
                    let tx = x.round() as i64;
                    let ty = y.round() as i64;
                    let env = world.environment_inputs(tx, ty, self.time);
                    let outcome = metabolism::step(
                        &mut self.columns.stocks[i],
                        self.columns.genomes[i].data(),
                        &env,
                        dt,
                        &params,
                    );
                    if outcome == metabolism::StepOutcome::Degraded {
                        debug!(agent = i, "metabolism degraded to flat decay");
                    }
                    self.columns.energies[i] = self.columns.stocks[i][IDX_ENERGY];
                }
                EnergyModel::FlatDecay { rate } => {
                    self.columns.energies[i] =
                        (self.columns.energies[i] - rate * dt).max(0.0);
                }
            }

            // Keep positions inside the world.
            let pos = &mut self.columns.positions[i];
            pos.x = pos.x.clamp(0.0, world.width() as f32 - 1.0);
            pos.y = pos.y.clamp(0.0, world.height() as f32 - 1.0);

            // Death returns the body to the soil.
            if self.columns.energies[i] <= 0.0 {
                let tx = self.columns.positions[i].x.round() as i64;
                let ty = self.columns.positions[i].y.round() as i64;
                let stocks = self.columns.stocks[i];
                world.deposit_biomass(tx, ty, stocks[IDX_ORGANICS], stocks[IDX_MINERALS]);
                self.columns.alive[i] = false;
                deaths += 1;
            }
        }

        let births = self.attempt_division(world);
        TickReport { births, deaths }
    }

    /// One asexual division pass over the agents alive at the start of the
    /// pass. Children appended here are not revisited: the index range is
    /// snapshotted, never re-read.
    fn attempt_division(&mut self, world: &World) -> usize {
        let snapshot = self.columns.len();
        let mut births = 0;

        for i in 0..snapshot {
            if !self.columns.alive[i] {
                continue;
            }
            if self.columns.len() >= self.config.capacity {
                break;
            }

            let stress = self.columns.stress[i];
            if !division_allowed(
                &self.columns.genomes[i],
                &self.columns.stocks[i],
                stress,
                &self.config.division,
            ) {
                continue;
            }

            let child_genome = self.columns.genomes[i].mutated(stress, &mut self.rng);
            let cx = (self.columns.positions[i].x + (self.rng.random::<f32>() - 0.5) * 0.5)
                .clamp(0.0, world.width() as f32 - 1.0);
            let cy = (self.columns.positions[i].y + (self.rng.random::<f32>() - 0.5) * 0.5)
                .clamp(0.0, world.height() as f32 - 1.0);

            let child_stocks = reproduction::split_stocks(&mut self.columns.stocks[i]);
            self.columns.energies[i] = self.columns.stocks[i][IDX_ENERGY];

            let species = self.columns.species[i].clone();
            if let Some(child) = self.push_agent(cx, cy, species, child_genome, child_stocks) {
                births += 1;
                debug!(parent = i, child, "division");
            }
        }
        births
    }

    /// Nearest live agent within `radius` of a point, if any.
    #[must_use]
    pub fn find_nearest(&self, x: f32, y: f32, radius: f32) -> Option<usize> {
        let mut best = None;
        let mut best_dist = radius;
        for i in 0..self.columns.len() {
            if !self.columns.alive[i] {
                continue;
            }
            let dx = self.columns.positions[i].x - x;
            let dy = self.columns.positions[i].y - y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < best_dist {
                best_dist = dist;
                best = Some(i);
            }
        }
        best
    }

    /// Per-agent view for panels and debug overlays.
    #[must_use]
    pub fn agent_info(&self, idx: usize) -> Option<AgentInfo> {
        if idx >= self.columns.len() {
            return None;
        }
        Some(AgentInfo {
            id: idx,
            species: self.columns.species[idx].clone(),
            x: self.columns.positions[idx].x,
            y: self.columns.positions[idx].y,
            energy: self.columns.energies[idx],
            alive: self.columns.alive[idx],
            traits: self.columns.traits[idx],
        })
    }
}

/// Discrete motility tier: 0 = wind-jitter only, 1 = slow random walk,
/// 2 = directed foraging. Traits can raise the genome-implied tier but
/// never lower it.
#[must_use]
pub fn motility_level(genome: &Genome, traits: TraitSet) -> u8 {
    let gene = genome.gene(MOTILITY_GENE);
    let mut level = 0;
    if gene >= 0.2 {
        level = 1;
    }
    if gene >= 0.6 {
        level = 2;
    }
    if traits.contains_any(&[Trait::Cilia, Trait::Flagella]) {
        level = level.max(1);
    }
    if traits.contains_any(&[Trait::Muscle, Trait::Legs, Trait::Fins, Trait::Wings]) {
        level = level.max(2);
    }
    level
}

fn random_step(rng: &mut SmallRng, x: f32, y: f32, step: f32) -> (f32, f32) {
    let nx = x + (rng.random::<f32>() - 0.5) * 2.0 * step;
    let ny = y + (rng.random::<f32>() - 0.5) * 2.0 * step;
    (nx, ny)
}

/// Scan the square perception neighborhood for the richest atom tile and
/// take one bounded step toward it; jitter in place when nothing stands
/// out.
fn directed_forage(
    rng: &mut SmallRng,
    x: f32,
    y: f32,
    world: &World,
    resources: Option<&ResourceGrid>,
    perception: i64,
) -> (f32, f32) {
    let w = i64::from(world.width());
    let h = i64::from(world.height());
    let cx = x.round() as i64;
    let cy = y.round() as i64;

    let mut best_score = -1.0f32;
    let mut best = (x, y);
    for dy in -perception..=perception {
        for dx in -perception..=perception {
            let nx = cx + dx;
            let ny = cy + dy;
            if nx < 0 || nx >= w || ny < 0 || ny >= h {
                continue;
            }
            let score = resources.map_or(0.0, |grid| grid.tile_total(nx, ny) as f32);
            if score > best_score {
                best_score = score;
                best = (nx as f32 + 0.5, ny as f32 + 0.5);
            }
        }
    }

    let dx = best.0 - x;
    let dy = best.1 - y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < 1e-6 {
        (
            x + (rng.random::<f32>() - 0.5),
            y + (rng.random::<f32>() - 0.5),
        )
    } else {
        let step = dist.min(1.0);
        (x + dx / dist * step, y + dy / dist * step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelplanet_genome::REPLICATION_GENE;
    use pixelplanet_world::AtomKind;

    fn test_config() -> PixelPlanetConfig {
        PixelPlanetConfig {
            world_width: 48,
            world_height: 24,
            rng_seed: Some(7),
            capacity: 256,
            initial_pixels: 50,
            ..PixelPlanetConfig::default()
        }
    }

    fn test_world(config: &PixelPlanetConfig) -> World {
        World::generate(config.world_seed(), config.world_width, config.world_height)
            .expect("world")
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let mut config = test_config();
        config.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.initial_pixels = config.capacity + 1;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.genome_len = 1;
        assert!(config.validate().is_err());

        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn founding_batch_spawns_in_one_cluster() {
        let config = test_config();
        let world = test_world(&config);
        let mut population = Population::new(config).expect("population");
        let ids = population.spawn_random(&world, 50);
        assert_eq!(ids.len(), 50);
        assert_eq!(population.alive_count(), 50);

        let positions = population.columns().positions();
        let mean_x = positions.iter().map(|p| p.x).sum::<f32>() / positions.len() as f32;
        let mean_y = positions.iter().map(|p| p.y).sum::<f32>() / positions.len() as f32;
        for p in positions {
            assert!(p.x >= 0.0 && p.x <= world.width() as f32 - 1.0);
            assert!(p.y >= 0.0 && p.y <= world.height() as f32 - 1.0);
            // sigma is 2 tiles here; 25 tiles would be a 12-sigma outlier.
            assert!((p.x - mean_x).abs() < 25.0);
            assert!((p.y - mean_y).abs() < 25.0);
        }
    }

    #[test]
    fn founders_share_a_neutral_genome() {
        let config = test_config();
        let world = test_world(&config);
        let mut population = Population::new(config).expect("population");
        population.spawn_random(&world, 20);
        for genome in population.columns().genomes() {
            assert!(genome.data().iter().all(|g| g.abs() < 0.1));
            assert!(genome.decode_traits().is_empty());
        }
    }

    #[test]
    fn energy_stays_bounded_and_death_is_one_way() {
        let config = test_config();
        let mut world = test_world(&config);
        let mut resources = ResourceGrid::new(config.world_width, config.world_height, 4);
        let mut population = Population::new(config).expect("population");
        population.spawn_random(&world, 50);

        let mut was_dead = vec![false; population.count()];
        for _ in 0..200 {
            population.step(1.0, &mut world, Some(&mut resources));
            was_dead.resize(population.count(), false);
            for i in 0..population.count() {
                let energy = population.columns().energies()[i];
                assert!((0.0..=1.0).contains(&energy), "energy {energy} out of bounds");
                let alive = population.columns().alive()[i];
                if was_dead[i] {
                    assert!(!alive, "agent {i} resurrected");
                }
                if !alive {
                    was_dead[i] = true;
                }
            }
        }
    }

    #[test]
    fn starvation_is_pure_decay() {
        // Flat-decay energy model, no feeding grid: every live agent's
        // energy strictly decreases each tick, and nobody is born.
        let config = test_config();
        let mut world = test_world(&config);
        let mut population =
            Population::with_energy_model(config, EnergyModel::flat()).expect("population");
        population.spawn_random(&world, 50);
        let initial_count = population.count();

        let mut previous: Vec<f32> = population.columns().energies().to_vec();
        for _ in 0..100 {
            let report = population.step(1.0, &mut world, None);
            assert_eq!(report.births, 0);
            assert_eq!(population.count(), initial_count);
            for i in 0..population.count() {
                let energy = population.columns().energies()[i];
                if population.columns().alive()[i] {
                    assert!(
                        energy < previous[i],
                        "agent {i} energy did not strictly decrease"
                    );
                }
                previous[i] = energy;
            }
        }
    }

    #[test]
    fn forced_division_produces_exactly_one_child() {
        let config = test_config();
        let mut world = test_world(&config);
        let mut population =
            Population::with_energy_model(config, EnergyModel::flat()).expect("population");
        population.spawn_random(&world, 1);

        {
            let columns = population.columns_mut();
            columns.genomes_mut()[0].set_gene(REPLICATION_GENE, 0.9);
            columns.stocks_mut()[0][IDX_INFO] = 0.5;
            // Stress comes from homeostasis variance: energy sits at target
            // so the deficit term is zero.
            columns.energy_var_mut()[0] = 0.05;
        }
        let energy_before = population.columns().stocks()[0][IDX_ENERGY];

        let report = population.step(1.0, &mut world, None);
        assert_eq!(report.births, 1);
        assert_eq!(population.count(), 2);

        let parent_energy = population.columns().stocks()[0][IDX_ENERGY];
        let child_energy = population.columns().stocks()[1][IDX_ENERGY];
        assert!(parent_energy + child_energy <= energy_before + 1e-6);
        assert_eq!(population.columns().species()[1], "proto");

        // The fresh child must not divide in the same tick, and the parent
        // is now below the energy gate.
        let report = population.step(1.0, &mut world, None);
        assert_eq!(report.births, 0);
    }

    #[test]
    fn low_stress_agents_with_resources_never_divide() {
        // The deliberate population-control interaction: abundant stocks
        // but near-zero stress means no division.
        let config = test_config();
        let mut world = test_world(&config);
        let mut population =
            Population::with_energy_model(config, EnergyModel::flat()).expect("population");
        population.spawn_random(&world, 1);
        {
            let columns = population.columns_mut();
            columns.genomes_mut()[0].set_gene(REPLICATION_GENE, 0.9);
            columns.stocks_mut()[0][IDX_INFO] = 0.5;
            columns.energy_var_mut()[0] = 0.0;
        }
        for _ in 0..5 {
            let report = population.step(0.1, &mut world, None);
            assert_eq!(report.births, 0);
        }
    }

    #[test]
    fn dying_agents_deposit_biomass() {
        let config = test_config();
        let mut world = test_world(&config);
        let mut population =
            Population::with_energy_model(config, EnergyModel::FlatDecay { rate: 2.0 })
                .expect("population");
        population.spawn_random(&world, 5);

        assert_eq!(world.dirty_len(), 0);
        let report = population.step(1.0, &mut world, None);
        assert_eq!(report.deaths, 5);
        assert_eq!(population.alive_count(), 0);
        assert!(world.dirty_len() > 0);
        assert!(world.organic_layer().iter().sum::<f32>() > 0.0);
    }

    #[test]
    fn motility_tiers_follow_gene_and_traits() {
        let mut genome = Genome::from_data(vec![0.0; 8]);
        assert_eq!(motility_level(&genome, TraitSet::empty()), 0);

        genome.set_gene(MOTILITY_GENE, 0.3);
        assert_eq!(motility_level(&genome, TraitSet::empty()), 1);

        genome.set_gene(MOTILITY_GENE, 0.7);
        assert_eq!(motility_level(&genome, TraitSet::empty()), 2);

        // Traits upgrade but never downgrade.
        genome.set_gene(MOTILITY_GENE, 0.0);
        let mut cilia = TraitSet::empty();
        cilia.insert(Trait::Cilia);
        assert_eq!(motility_level(&genome, cilia), 1);

        let mut muscle = cilia;
        muscle.insert(Trait::Muscle);
        assert_eq!(motility_level(&genome, muscle), 2);

        genome.set_gene(MOTILITY_GENE, 0.7);
        assert_eq!(motility_level(&genome, cilia), 2);
    }

    #[test]
    fn hungry_agents_eat_the_best_atom() {
        let mut config = test_config();
        config.atom_replenish_rate = 0.0;
        let mut world = test_world(&config);
        let mut resources = ResourceGrid::new(config.world_width, config.world_height, 3);
        let mut population =
            Population::with_energy_model(config, EnergyModel::flat()).expect("population");
        population.spawn_random(&world, 1);
        population.columns_mut().energies_mut()[0] = 0.2;

        let x = population.columns().positions()[0].x.round() as i64;
        let y = population.columns().positions()[0].y.round() as i64;
        let phosphorus_before = resources.count_at(x, y, AtomKind::Phosphorus);

        population.step(1.0, &mut world, Some(&mut resources));

        assert_eq!(
            resources.count_at(x, y, AtomKind::Phosphorus),
            phosphorus_before - 1
        );
        // Fed 0.05, then decayed 0.001.
        let energy = population.columns().energies()[0];
        assert!((energy - 0.249).abs() < 1e-5);
    }

    #[test]
    fn nearest_lookup_and_info_respect_liveness() {
        let config = test_config();
        let world = test_world(&config);
        let mut population =
            Population::with_energy_model(config, EnergyModel::flat()).expect("population");
        population.spawn_random(&world, 3);

        let p = population.columns().positions()[1];
        assert_eq!(population.find_nearest(p.x, p.y, 0.5), Some(1));

        let info = population.agent_info(1).expect("info");
        assert_eq!(info.id, 1);
        assert_eq!(info.species, "proto");
        assert!(info.alive);
        assert!(population.agent_info(99).is_none());

        // Dead agents are invisible to the nearest-neighbor probe.
        population.columns_mut().energies_mut()[1] = 0.0;
        let mut w = world;
        population.step(1.0, &mut w, None);
        assert_ne!(population.find_nearest(p.x, p.y, 0.1), Some(1));
    }

    #[test]
    fn reset_clears_all_slots() {
        let config = test_config();
        let world = test_world(&config);
        let mut population = Population::new(config).expect("population");
        population.spawn_random(&world, 10);
        assert_eq!(population.count(), 10);

        population.reset();
        assert_eq!(population.count(), 0);
        assert_eq!(population.time(), 0.0);

        let ids = population.spawn_random(&world, 3);
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn capacity_bounds_the_population() {
        let mut config = test_config();
        config.capacity = 8;
        config.initial_pixels = 8;
        let world = test_world(&config);
        let mut population = Population::new(config).expect("population");
        let ids = population.spawn_random(&world, 100);
        assert_eq!(ids.len(), 8);
        assert_eq!(population.count(), 8);
    }
}
