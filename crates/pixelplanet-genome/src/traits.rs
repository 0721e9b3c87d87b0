//! Evolutionary traits and their prerequisite structure.
//!
//! The trait universe is closed and known at compile time; sets are a small
//! bitset and the prerequisite table a static adjacency slice.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named capability unlocked when a genome value crosses its activation
/// threshold and the capability's prerequisites are unlocked alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Trait {
    // Metabolic pathways.
    Photosynthesis = 0,
    Chemosynthesis = 1,
    Chloroplasts = 2,
    CellWall = 3,
    // Thermal adaptation.
    AntifreezeProteins = 4,
    HeatResistance = 5,
    Thermoregulation = 6,
    DigestiveSystem = 7,
    // Locomotion ladder.
    Cilia = 8,
    Flagella = 9,
    Muscle = 10,
    Legs = 11,
    Fins = 12,
    Wings = 13,
    RespiratoryOrgans = 14,
}

/// Every trait, bit-index aligned.
pub const ALL_TRAITS: [Trait; 15] = [
    Trait::Photosynthesis,
    Trait::Chemosynthesis,
    Trait::Chloroplasts,
    Trait::CellWall,
    Trait::AntifreezeProteins,
    Trait::HeatResistance,
    Trait::Thermoregulation,
    Trait::DigestiveSystem,
    Trait::Cilia,
    Trait::Flagella,
    Trait::Muscle,
    Trait::Legs,
    Trait::Fins,
    Trait::Wings,
    Trait::RespiratoryOrgans,
];

/// Direct prerequisites per trait. A trait activates only when every listed
/// prerequisite is present in the same proposed set (single-pass closure,
/// not a transitive fixpoint).
pub const TRAIT_PREREQS: [(Trait, &[Trait]); 15] = [
    (Trait::Photosynthesis, &[Trait::Chloroplasts]),
    (Trait::Chemosynthesis, &[Trait::CellWall]),
    (Trait::Chloroplasts, &[Trait::CellWall]),
    (Trait::CellWall, &[]),
    (Trait::AntifreezeProteins, &[Trait::DigestiveSystem]),
    (
        Trait::HeatResistance,
        &[Trait::AntifreezeProteins, Trait::Thermoregulation],
    ),
    (Trait::Thermoregulation, &[]),
    (Trait::DigestiveSystem, &[Trait::CellWall]),
    (Trait::Cilia, &[]),
    (Trait::Flagella, &[]),
    (Trait::Muscle, &[Trait::Cilia, Trait::Flagella]),
    (Trait::Legs, &[Trait::Muscle]),
    (Trait::Fins, &[Trait::Muscle]),
    (Trait::Wings, &[Trait::Muscle, Trait::RespiratoryOrgans]),
    (Trait::RespiratoryOrgans, &[Trait::DigestiveSystem]),
];

impl Trait {
    /// Direct prerequisites of this trait.
    #[must_use]
    pub fn prerequisites(self) -> &'static [Trait] {
        TRAIT_PREREQS[self as usize].1
    }
}

/// Fixed-size set over the closed trait universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TraitSet(u32);

impl TraitSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, t: Trait) -> bool {
        self.0 & (1 << t as u32) != 0
    }

    pub fn insert(&mut self, t: Trait) {
        self.0 |= 1 << t as u32;
    }

    pub fn remove(&mut self, t: Trait) {
        self.0 &= !(1 << t as u32);
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// True when every trait in `other` is also in `self`.
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one of `traits` is present.
    #[must_use]
    pub fn contains_any(self, traits: &[Trait]) -> bool {
        traits.iter().any(|t| self.contains(*t))
    }

    /// Stable signature for diversity accounting.
    #[must_use]
    pub const fn signature(self) -> u32 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = Trait> {
        ALL_TRAITS.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<Trait> for TraitSet {
    fn from_iter<I: IntoIterator<Item = Trait>>(iter: I) -> Self {
        let mut set = Self::empty();
        for t in iter {
            set.insert(t);
        }
        set
    }
}

impl fmt::Display for TraitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in self.iter() {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{t:?}")?;
            first = false;
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// True when all direct prerequisites of `t` are contained in `owned`.
#[must_use]
pub fn all_prereqs_met(t: Trait, owned: TraitSet) -> bool {
    t.prerequisites().iter().all(|req| owned.contains(*req))
}
