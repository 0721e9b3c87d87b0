//! Asexual 1 → 2 division rules.
//!
//! Division demands a working replication gene, adequate internal stocks,
//! and a non-trivial metabolic stress signal. Thriving agents with
//! near-zero stress never divide; this is the population-control valve,
//! not an oversight.

use crate::metabolism::{IDX_ENERGY, IDX_INFO, IDX_MEMBRANE, IDX_ORGANICS, Stocks};
use pixelplanet_genome::{Genome, REPLICATION_GENE};

/// Metabolic stress below which division is suppressed.
pub const DIVISION_STRESS_FLOOR: f32 = 0.02;

/// Fraction of pre-division stocks retained by each of parent and child.
pub const DIVISION_SPLIT: f32 = 0.4;

/// Extra fraction of the energy slot burned by each party on top of the
/// split; division is asymmetrically expensive in energy.
pub const DIVISION_ENERGY_OVERHEAD: f32 = 0.8;

/// Replication-gene value required before division is considered.
pub const REPLICATION_THRESHOLD: f32 = 0.5;

/// Minimum internal stock levels required to divide.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DivisionThresholds {
    pub energy: f32,
    pub organics: f32,
    pub membrane: f32,
    pub info_order: f32,
}

impl Default for DivisionThresholds {
    fn default() -> Self {
        Self {
            energy: 0.6,
            organics: 0.3,
            membrane: 0.25,
            info_order: 0.15,
        }
    }
}

impl DivisionThresholds {
    /// All stock gates at once.
    #[must_use]
    pub fn stocks_sufficient(&self, stocks: &Stocks) -> bool {
        stocks[IDX_ENERGY] >= self.energy
            && stocks[IDX_ORGANICS] >= self.organics
            && stocks[IDX_MEMBRANE] >= self.membrane
            && stocks[IDX_INFO] >= self.info_order
    }
}

/// Whether the genome carries a working replication program.
#[must_use]
pub fn has_replication(genome: &Genome) -> bool {
    genome.gene(REPLICATION_GENE) >= REPLICATION_THRESHOLD
}

/// Full division gate: gene, stocks and stress floor together.
#[must_use]
pub fn division_allowed(genome: &Genome, stocks: &Stocks, stress: f32, thresholds: &DivisionThresholds) -> bool {
    has_replication(genome) && thresholds.stocks_sufficient(stocks) && stress >= DIVISION_STRESS_FLOOR
}

/// Split the parent's stocks for division, returning the child's stocks.
/// Parent and child each keep [`DIVISION_SPLIT`] of the pre-division
/// stocks, then both lose a further share of the energy slot.
pub fn split_stocks(parent: &mut Stocks) -> Stocks {
    let mut child = *parent;
    for i in 0..parent.len() {
        parent[i] *= DIVISION_SPLIT;
        child[i] *= DIVISION_SPLIT;
    }
    parent[IDX_ENERGY] *= DIVISION_ENERGY_OVERHEAD;
    child[IDX_ENERGY] *= DIVISION_ENERGY_OVERHEAD;
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolism::initial_stocks;
    use pixelplanet_genome::GENOME_LEN;

    fn replicator() -> Genome {
        let mut genome = Genome::from_data(vec![0.0; GENOME_LEN]);
        genome.set_gene(REPLICATION_GENE, 0.9);
        genome
    }

    fn ready_stocks() -> Stocks {
        let mut stocks = initial_stocks();
        stocks[IDX_INFO] = 0.5;
        stocks
    }

    #[test]
    fn fresh_spawns_cannot_divide() {
        // Initial info-order sits below its gate, and the neutral genome
        // has no replication program.
        let thresholds = DivisionThresholds::default();
        assert!(!thresholds.stocks_sufficient(&initial_stocks()));
        assert!(!division_allowed(
            &replicator(),
            &initial_stocks(),
            0.1,
            &thresholds
        ));
    }

    #[test]
    fn low_stress_suppresses_division() {
        let thresholds = DivisionThresholds::default();
        let stocks = ready_stocks();
        assert!(!division_allowed(&replicator(), &stocks, 0.0, &thresholds));
        assert!(!division_allowed(&replicator(), &stocks, 0.019, &thresholds));
        assert!(division_allowed(&replicator(), &stocks, 0.05, &thresholds));
    }

    #[test]
    fn replication_gene_is_required() {
        let thresholds = DivisionThresholds::default();
        let genome = Genome::from_data(vec![0.0; GENOME_LEN]);
        assert!(!division_allowed(&genome, &ready_stocks(), 0.1, &thresholds));
    }

    #[test]
    fn split_conserves_or_loses_energy() {
        let mut parent = ready_stocks();
        let before = parent[IDX_ENERGY];
        let child = split_stocks(&mut parent);

        assert!((parent[IDX_ENERGY] - before * 0.4 * 0.8).abs() < 1e-6);
        assert_eq!(parent[IDX_ENERGY], child[IDX_ENERGY]);
        assert!(parent[IDX_ENERGY] + child[IDX_ENERGY] <= before);

        assert!((parent[IDX_ORGANICS] - 0.5 * 0.4).abs() < 1e-6);
        assert_eq!(parent[IDX_ORGANICS], child[IDX_ORGANICS]);
    }
}
