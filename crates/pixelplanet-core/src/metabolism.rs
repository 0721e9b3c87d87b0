//! Internal-resource metabolism.
//!
//! The genome is read as a flat coefficient matrix mapping sampled
//! environmental channels to fluxes over the internal resource stocks.
//! Maintenance costs drain the energy slot, which mirrors back into the
//! agent's scalar energy.

use pixelplanet_world::{AtomKind, ENV_CHANNELS};

/// Number of internal resource channels.
pub const INTERNAL_RESOURCES: usize = 5;

/// Per-agent internal resource stocks, each ≥ 0.
pub type Stocks = [f32; INTERNAL_RESOURCES];

/// Internal resource channels, index-aligned with [`Stocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum InternalResource {
    Energy = 0,
    Organics = 1,
    Minerals = 2,
    Membrane = 3,
    InfoOrder = 4,
}

pub const IDX_ENERGY: usize = InternalResource::Energy as usize;
pub const IDX_ORGANICS: usize = InternalResource::Organics as usize;
pub const IDX_MINERALS: usize = InternalResource::Minerals as usize;
pub const IDX_MEMBRANE: usize = InternalResource::Membrane as usize;
pub const IDX_INFO: usize = InternalResource::InfoOrder as usize;

/// Tunable metabolism constants.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetabolismParams {
    /// Basal energy cost per time unit.
    pub basal_energy_cost: f32,
    /// Maintenance cost per unit of membrane per time unit.
    pub membrane_cost: f32,
    /// Symmetric clamp applied to each per-resource flux.
    pub flux_limit: f32,
}

impl Default for MetabolismParams {
    fn default() -> Self {
        Self {
            basal_energy_cost: 0.001,
            membrane_cost: 0.0005,
            flux_limit: 1.0,
        }
    }
}

/// How an agent's scalar energy evolves, chosen at population construction.
/// `FlatDecay` is the no-op stand-in for a population run without genomic
/// metabolism and doubles as the per-agent degradation path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyModel {
    Genomic(MetabolismParams),
    FlatDecay { rate: f32 },
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self::Genomic(MetabolismParams::default())
    }
}

impl EnergyModel {
    /// The fallback decay model matching the original baseline drain.
    #[must_use]
    pub const fn flat() -> Self {
        Self::FlatDecay { rate: 0.001 }
    }
}

/// Result of one metabolism step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Fluxes applied normally.
    Metabolized,
    /// Genome produced non-finite values; the agent fell back to flat decay
    /// for this step.
    Degraded,
}

/// Fresh internal stocks for a newly spawned agent.
#[must_use]
pub fn initial_stocks() -> Stocks {
    let mut stocks = [0.0; INTERNAL_RESOURCES];
    stocks[IDX_ENERGY] = 1.0;
    stocks[IDX_ORGANICS] = 0.5;
    stocks[IDX_MINERALS] = 0.5;
    stocks[IDX_MEMBRANE] = 0.3;
    stocks[IDX_INFO] = 0.1;
    stocks
}

/// Energy gained (or lost) by consuming one unit of an atom.
#[must_use]
pub const fn atom_energy_yield(atom: AtomKind) -> f32 {
    match atom {
        AtomKind::Phosphorus => 0.05,
        AtomKind::Chlorine => -0.02,
        AtomKind::Xenotoxin => -0.2,
        _ => 0.0,
    }
}

/// Read the flat genome vector as an `INTERNAL_RESOURCES × ENV_CHANNELS`
/// coefficient matrix, tiling the genome when it is too short and
/// truncating when too long.
#[must_use]
pub fn coefficient_matrix(genome: &[f32]) -> [[f32; ENV_CHANNELS]; INTERNAL_RESOURCES] {
    let mut matrix = [[0.0f32; ENV_CHANNELS]; INTERNAL_RESOURCES];
    if genome.is_empty() {
        return matrix;
    }
    let mut flat = 0usize;
    for row in &mut matrix {
        for cell in row.iter_mut() {
            *cell = genome[flat % genome.len()];
            flat += 1;
        }
    }
    matrix
}

/// Advance one agent's stocks by `dt` given sampled environment inputs.
///
/// Fluxes are clamped to ±`flux_limit`, maintenance costs drain the energy
/// slot, and every stock is clamped to ≥ 0 afterwards. The energy slot is
/// additionally capped at 1.0 so the mirrored scalar energy stays in
/// [0, 1]. A genome that yields non-finite arithmetic degrades this step to
/// a flat basal decay instead of poisoning the stocks.
pub fn step(
    stocks: &mut Stocks,
    genome: &[f32],
    env: &[f32; ENV_CHANNELS],
    dt: f32,
    params: &MetabolismParams,
) -> StepOutcome {
    let matrix = coefficient_matrix(genome);

    let mut next = *stocks;
    for (i, row) in matrix.iter().enumerate() {
        let mut flux = 0.0f32;
        for (coeff, input) in row.iter().zip(env.iter()) {
            flux += coeff * input;
        }
        flux = flux.clamp(-params.flux_limit, params.flux_limit);
        next[i] += flux * dt;
    }

    let maintenance = params.basal_energy_cost + params.membrane_cost * next[IDX_MEMBRANE];
    next[IDX_ENERGY] -= maintenance * dt;

    if next.iter().any(|v| !v.is_finite()) {
        stocks[IDX_ENERGY] = (stocks[IDX_ENERGY] - params.basal_energy_cost * dt).max(0.0);
        return StepOutcome::Degraded;
    }

    for value in &mut next {
        *value = value.max(0.0);
    }
    next[IDX_ENERGY] = next[IDX_ENERGY].min(1.0);
    *stocks = next;
    StepOutcome::Metabolized
}
