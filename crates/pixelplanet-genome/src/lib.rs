//! Genome representation and trait decoding.
//!
//! A genome is a short fixed-length numeric vector. All founding individuals
//! share a near-identical neutral state; diversity emerges only through
//! mutation across generations. A handful of indices decode into discrete
//! traits once they cross an activation threshold and their prerequisites
//! are satisfied.

use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

pub mod traits;

pub use traits::{ALL_TRAITS, TRAIT_PREREQS, Trait, TraitSet, all_prereqs_met};

/// Default genome length. Indices above the reserved low range are free for
/// extension.
pub const GENOME_LEN: usize = 8;

/// Reserved gene index gating asexual replication.
pub const REPLICATION_GENE: usize = 0;
/// Reserved gene index driving baseline motility.
pub const MOTILITY_GENE: usize = 1;

/// Gene value at or above which a mapped trait is proposed.
pub const TRAIT_GENE_THRESHOLD: f32 = 0.6;

/// Standard deviation of the neutral founding distribution.
pub const NEUTRAL_SIGMA: f32 = 0.01;

/// Mutation sigma floor and ceiling; the ceiling bounds how wild a heavily
/// stressed parent's copy errors can get.
pub const MUTATION_SIGMA_FLOOR: f32 = 0.003;
pub const MUTATION_SIGMA_CEIL: f32 = 0.03;

/// Gene index → trait unlocked when the gene crosses the threshold.
pub const GENE_TRAIT_MAP: [(usize, Trait); 6] = [
    (2, Trait::Photosynthesis),
    (3, Trait::Chemosynthesis),
    (4, Trait::AntifreezeProteins),
    (5, Trait::HeatResistance),
    (6, Trait::Cilia),
    (7, Trait::Flagella),
];

/// Fixed-length numeric genome. Never resized after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    data: Vec<f32>,
}

impl Genome {
    /// Wrap an explicit gene vector (tests and snapshot loading).
    #[must_use]
    pub fn from_data(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Founding genome: the shared neutral base plus tiny independent
    /// Gaussian noise. Deliberately *not* i.i.d. uniform — all individuals
    /// start from the same state.
    #[must_use]
    pub fn neutral(rng: &mut SmallRng) -> Self {
        Self::neutral_with_len(GENOME_LEN, rng)
    }

    /// Neutral genome of a custom length.
    #[must_use]
    pub fn neutral_with_len(length: usize, rng: &mut SmallRng) -> Self {
        let noise = Normal::new(0.0f32, NEUTRAL_SIGMA).ok();
        let data = (0..length)
            .map(|_| noise.as_ref().map_or(0.0, |dist| dist.sample(rng)))
            .collect();
        Self { data }
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Gene value at `index`, 0.0 when out of range.
    #[must_use]
    pub fn gene(&self, index: usize) -> f32 {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    /// Overwrite one gene (scenario setup).
    pub fn set_gene(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = value;
        }
    }

    /// Copy with element-wise Gaussian noise whose scale grows with the
    /// parent's metabolic stress, clamped to a small floor and ceiling.
    #[must_use]
    pub fn mutated(&self, stress: f32, rng: &mut SmallRng) -> Self {
        let sigma = mutation_sigma(stress);
        let Ok(dist) = Normal::new(0.0f32, sigma) else {
            return self.clone();
        };
        let data = self.data.iter().map(|g| g + dist.sample(rng)).collect();
        Self { data }
    }

    /// Decode the active trait set.
    ///
    /// Each mapped gene at or above [`TRAIT_GENE_THRESHOLD`] proposes its
    /// trait; a proposed trait survives only if its full prerequisite list
    /// is contained in the proposal itself. The closure is a single pass
    /// over the proposal, not an iterative fixpoint.
    #[must_use]
    pub fn decode_traits(&self) -> TraitSet {
        let mut proposed = TraitSet::empty();
        for (index, t) in GENE_TRAIT_MAP {
            if self.gene(index) >= TRAIT_GENE_THRESHOLD {
                proposed.insert(t);
            }
        }

        let mut active = TraitSet::empty();
        for t in proposed.iter() {
            if all_prereqs_met(t, proposed) {
                active.insert(t);
            }
        }
        active
    }
}

/// Mutation standard deviation for a given parent stress level.
#[must_use]
pub fn mutation_sigma(stress: f32) -> f32 {
    MUTATION_SIGMA_FLOOR + (stress.max(0.0) * 0.1).min(MUTATION_SIGMA_CEIL)
}

/// Similarity between two genomes in [0, 1]; 1 means identical. Shape
/// mismatch or non-finite content yields 0 rather than an error.
#[must_use]
pub fn similarity(a: &Genome, b: &Genome) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dist_sq = 0.0f32;
    for (x, y) in a.data.iter().zip(b.data.iter()) {
        let d = x - y;
        dist_sq += d * d;
    }
    if !dist_sq.is_finite() {
        return 0.0;
    }
    let dist = dist_sq.sqrt();
    (1.0 - dist / (dist + 1e-9)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn neutral_genomes_cluster_around_zero() {
        let mut rng = rng();
        for _ in 0..64 {
            let genome = Genome::neutral(&mut rng);
            assert_eq!(genome.len(), GENOME_LEN);
            assert!(genome.data().iter().all(|g| g.abs() < 0.1));
            assert!(genome.decode_traits().is_empty());
        }
    }

    #[test]
    fn decode_requires_threshold() {
        let mut genome = Genome::from_data(vec![0.0; GENOME_LEN]);
        genome.set_gene(6, 0.59);
        assert!(!genome.decode_traits().contains(Trait::Cilia));
        genome.set_gene(6, 0.6);
        assert!(genome.decode_traits().contains(Trait::Cilia));
    }

    #[test]
    fn decode_closure_filters_missing_prereqs() {
        // Photosynthesis maps to gene 2 but needs chloroplasts, which no
        // gene proposes; it must never activate on its own.
        let mut genome = Genome::from_data(vec![0.0; GENOME_LEN]);
        genome.set_gene(2, 1.0);
        assert!(genome.decode_traits().is_empty());

        // Cilia and flagella have no prerequisites and activate directly.
        genome.set_gene(6, 1.0);
        genome.set_gene(7, 1.0);
        let active = genome.decode_traits();
        assert!(active.contains(Trait::Cilia));
        assert!(active.contains(Trait::Flagella));
        assert!(!active.contains(Trait::Photosynthesis));
    }

    #[test]
    fn active_traits_always_carry_their_prereqs() {
        // Property from the data model: any trait in the decoded set has
        // all direct prerequisites in the same snapshot.
        let mut rng = rng();
        for _ in 0..256 {
            let mut genome = Genome::neutral(&mut rng);
            for i in 0..GENOME_LEN {
                use rand::Rng;
                genome.set_gene(i, rng.random_range(0.0..1.0));
            }
            let active = genome.decode_traits();
            for t in active.iter() {
                for req in t.prerequisites() {
                    assert!(
                        active.contains(*req),
                        "{t:?} active without prerequisite {req:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn mutation_scale_tracks_stress() {
        assert!((mutation_sigma(0.0) - MUTATION_SIGMA_FLOOR).abs() < 1e-7);
        assert!(mutation_sigma(0.1) > mutation_sigma(0.0));
        assert!(
            (mutation_sigma(10.0) - (MUTATION_SIGMA_FLOOR + MUTATION_SIGMA_CEIL)).abs() < 1e-7
        );
    }

    #[test]
    fn mutated_child_stays_close_to_parent() {
        let mut rng = rng();
        let parent = Genome::neutral(&mut rng);
        let child = parent.mutated(0.05, &mut rng);
        assert_eq!(child.len(), parent.len());
        assert!(similarity(&parent, &child) > 0.0);
        for (p, c) in parent.data().iter().zip(child.data()) {
            assert!((p - c).abs() < 0.5);
        }
    }

    #[test]
    fn similarity_handles_degenerate_inputs() {
        let a = Genome::from_data(vec![0.1, 0.2, 0.3]);
        let b = Genome::from_data(vec![0.1, 0.2]);
        assert_eq!(similarity(&a, &b), 0.0);
        assert_eq!(similarity(&a, &a), 1.0);

        let nan = Genome::from_data(vec![f32::NAN, 0.0, 0.0]);
        assert_eq!(similarity(&a, &nan), 0.0);
    }
}
