//! Thin simulation driver.
//!
//! Wraps the world and population with pause/resume, speed scaling and
//! single-stepping, and samples aggregated metrics at most once per
//! simulated calendar year (one time unit is roughly a month). Frontends
//! talk to it through [`ControlCommand`] values so they never borrow the
//! core directly.

use crate::metabolism::IDX_INFO;
use crate::{Population, Tick, TickReport};
use pixelplanet_world::{ResourceGrid, World};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, info};

/// Simulated time units per calendar year.
pub const MONTHS_PER_YEAR: f32 = 12.0;

/// Summary of one processed tick, retained in a bounded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub alive: usize,
    pub births: usize,
    pub deaths: usize,
    pub mean_energy: f32,
}

/// Aggregated statistics sampled once per simulated calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub tick: u64,
    pub time: f32,
    pub year: u32,
    pub population: usize,
    pub avg_energy: f32,
    pub var_energy: f32,
    pub trait_diversity: usize,
    pub avg_traits_per_agent: f32,
    pub mean_info_order: f32,
    pub global_o2: f32,
    pub global_co2: f32,
}

/// Read-only metrics observer invoked by the driver. Must never touch core
/// state; a failing sink only loses its own data.
pub trait SimPersistence: Send {
    fn on_sample(&mut self, row: &MetricsRow);
}

/// No-op metrics sink.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl SimPersistence for NullPersistence {
    fn on_sample(&mut self, _row: &MetricsRow) {}
}

/// Commands issued by frontends (UI, control sockets, CLI).
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Pause,
    Resume,
    SetSpeed(f32),
    /// Advance exactly one tick even while paused.
    SingleStep,
    /// Drop all agents and respawn the founding batch.
    ResetPopulation,
    /// Request a snapshot; the hosting layer drains the request and does
    /// the actual writing.
    SaveSnapshot(PathBuf),
}

/// Apply a control command to the simulation.
pub fn apply_control_command(sim: &mut Simulation, command: ControlCommand) {
    debug!(?command, "applying control command");
    match command {
        ControlCommand::Pause => sim.paused = true,
        ControlCommand::Resume => sim.paused = false,
        ControlCommand::SetSpeed(speed) => {
            sim.speed = speed.clamp(0.0, 64.0);
        }
        ControlCommand::SingleStep => {
            sim.step_once = true;
        }
        ControlCommand::ResetPopulation => sim.reset_population(),
        ControlCommand::SaveSnapshot(path) => {
            sim.pending_snapshot = Some(path);
        }
    }
}

/// The simulation driver: owns world, population and the optional feeding
/// grid, and applies pause/speed scaling on top of the population tick.
pub struct Simulation {
    world: World,
    population: Population,
    resources: Option<ResourceGrid>,
    tick: Tick,
    base_dt: f32,
    paused: bool,
    speed: f32,
    step_once: bool,
    pending_snapshot: Option<PathBuf>,
    persistence: Box<dyn SimPersistence>,
    history: VecDeque<TickSummary>,
    step_count: u64,
    last_year_sampled: u32,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("paused", &self.paused)
            .field("speed", &self.speed)
            .field("alive", &self.population.alive_count())
            .finish()
    }
}

impl Simulation {
    /// Build a driver with a no-op metrics sink.
    #[must_use]
    pub fn new(world: World, population: Population, resources: Option<ResourceGrid>) -> Self {
        Self::with_persistence(world, population, resources, Box::new(NullPersistence))
    }

    /// Build a driver with an explicit metrics sink.
    #[must_use]
    pub fn with_persistence(
        world: World,
        population: Population,
        resources: Option<ResourceGrid>,
        persistence: Box<dyn SimPersistence>,
    ) -> Self {
        let history_capacity = population.config().history_capacity;
        Self {
            world,
            population,
            resources,
            tick: Tick::zero(),
            base_dt: 1.0 / 60.0,
            paused: false,
            speed: 1.0,
            step_once: false,
            pending_snapshot: None,
            persistence,
            history: VecDeque::with_capacity(history_capacity),
            step_count: 0,
            last_year_sampled: 0,
        }
    }

    /// Advance by `dt` (the base step when `None`), scaled by the current
    /// speed. Does nothing while paused unless a single step is armed.
    pub fn step(&mut self, dt: Option<f32>) -> Option<TickReport> {
        if self.paused && !self.step_once {
            return None;
        }
        self.step_once = false;

        let eff_dt = dt.unwrap_or(self.base_dt) * self.speed;
        let report = self
            .population
            .step(eff_dt, &mut self.world, self.resources.as_mut());
        self.tick = self.tick.next();

        let alive = self.population.alive_count();
        let mean_energy = if alive > 0 {
            live_energy_sum(&self.population) / alive as f32
        } else {
            0.0
        };
        if self.history.len() >= self.population.config().history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(TickSummary {
            tick: self.tick,
            alive,
            births: report.births,
            deaths: report.deaths,
            mean_energy,
        });

        self.sample_metrics();
        Some(report)
    }

    /// Drop every agent and respawn the founding batch.
    pub fn reset_population(&mut self) {
        let n = self.population.config().initial_pixels;
        self.population.reset();
        let spawned = self.population.spawn_random(&self.world, n);
        info!(spawned = spawned.len(), "population reset");
    }

    /// Metrics cadence: at most one row per simulated calendar year, with a
    /// configurable minimum step interval on top.
    fn sample_metrics(&mut self) {
        self.step_count += 1;
        let min_interval = self.population.config().metrics_min_interval.max(1);
        if !self.step_count.is_multiple_of(u64::from(min_interval)) {
            return;
        }

        let months = self.population.time();
        let year = (months / MONTHS_PER_YEAR) as u32 + 1;
        if year == self.last_year_sampled {
            return;
        }
        self.last_year_sampled = year;

        let row = self.collect_metrics(year);
        self.persistence.on_sample(&row);
    }

    fn collect_metrics(&self, year: u32) -> MetricsRow {
        let columns = self.population.columns();
        let mut alive = 0usize;
        let mut energy_sum = 0.0f32;
        let mut signatures = std::collections::HashSet::new();
        let mut trait_count = 0u32;
        let mut info_sum = 0.0f32;

        for i in 0..columns.len() {
            if !columns.alive()[i] {
                continue;
            }
            alive += 1;
            energy_sum += columns.energies()[i];
            signatures.insert(columns.traits()[i].signature());
            trait_count += columns.traits()[i].len();
            info_sum += columns.stocks()[i][IDX_INFO];
        }

        let avg_energy = if alive > 0 {
            energy_sum / alive as f32
        } else {
            0.0
        };
        let var_energy = if alive > 0 {
            let mut acc = 0.0f32;
            for i in 0..columns.len() {
                if columns.alive()[i] {
                    let d = columns.energies()[i] - avg_energy;
                    acc += d * d;
                }
            }
            acc / alive as f32
        } else {
            0.0
        };

        MetricsRow {
            tick: self.step_count,
            time: self.population.time(),
            year,
            population: alive,
            avg_energy,
            var_energy,
            trait_diversity: if alive > 0 { signatures.len() } else { 0 },
            avg_traits_per_agent: if alive > 0 {
                trait_count as f32 / alive as f32
            } else {
                0.0
            },
            mean_info_order: if alive > 0 {
                info_sum / alive as f32
            } else {
                0.0
            },
            global_o2: self.world.global_o2(),
            global_co2: self.world.global_co2(),
        }
    }

    /// Take a pending snapshot request, if a frontend queued one.
    pub fn take_snapshot_request(&mut self) -> Option<PathBuf> {
        self.pending_snapshot.take()
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    #[must_use]
    pub fn resources(&self) -> Option<&ResourceGrid> {
        self.resources.as_ref()
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}

fn live_energy_sum(population: &Population) -> f32 {
    let columns = population.columns();
    let mut sum = 0.0;
    for i in 0..columns.len() {
        if columns.alive()[i] {
            sum += columns.energies()[i];
        }
    }
    sum
}
