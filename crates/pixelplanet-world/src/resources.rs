//! Per-tile atom deposits agents can feed on.
//!
//! Each tile holds integer counts over a fixed table of atom kinds; agents
//! consume single units, and a slow replenishment step trickles counts back.

use rand::Rng;
use rand::rngs::SmallRng;

/// Fixed universe of atom kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum AtomKind {
    Hydrogen = 0,
    Carbon = 1,
    Nitrogen = 2,
    Oxygen = 3,
    Phosphorus = 4,
    Sulfur = 5,
    Iron = 6,
    Silicon = 7,
    Sodium = 8,
    Chlorine = 9,
    /// Placeholder for toxic/rare atoms.
    Xenotoxin = 10,
}

/// All atom kinds, index-aligned with tile storage.
pub const ATOM_KINDS: [AtomKind; 11] = [
    AtomKind::Hydrogen,
    AtomKind::Carbon,
    AtomKind::Nitrogen,
    AtomKind::Oxygen,
    AtomKind::Phosphorus,
    AtomKind::Sulfur,
    AtomKind::Iron,
    AtomKind::Silicon,
    AtomKind::Sodium,
    AtomKind::Chlorine,
    AtomKind::Xenotoxin,
];

/// Dense per-tile atom counts.
#[derive(Debug, Clone)]
pub struct ResourceGrid {
    width: u32,
    height: u32,
    counts: Vec<u32>,
}

impl ResourceGrid {
    /// Create a grid with every atom kind at `initial` per tile.
    #[must_use]
    pub fn new(width: u32, height: u32, initial: u32) -> Self {
        let len = (width as usize) * (height as usize) * ATOM_KINDS.len();
        Self {
            width,
            height,
            counts: vec![initial; len],
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn offset(&self, x: u32, y: u32, atom: usize) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * ATOM_KINDS.len() + atom
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    /// Count of one atom kind at a tile; 0 out of range.
    #[must_use]
    pub fn count_at(&self, x: i64, y: i64, atom: AtomKind) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        self.counts[self.offset(x as u32, y as u32, atom as usize)]
    }

    /// Sum of all atoms at a tile; 0 out of range.
    #[must_use]
    pub fn tile_total(&self, x: i64, y: i64) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        let base = self.offset(x as u32, y as u32, 0);
        self.counts[base..base + ATOM_KINDS.len()].iter().sum()
    }

    /// Consume `amount` units if available. Out-of-range tiles hold nothing.
    pub fn consume(&mut self, x: i64, y: i64, atom: AtomKind, amount: u32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.offset(x as u32, y as u32, atom as usize);
        if self.counts[idx] >= amount {
            self.counts[idx] -= amount;
            true
        } else {
            false
        }
    }

    /// Trickle atoms back: each slot independently gains one unit with
    /// probability `rate`.
    pub fn replenish(&mut self, rate: f32, rng: &mut SmallRng) {
        if rate <= 0.0 {
            return;
        }
        for slot in &mut self.counts {
            if rng.random::<f32>() < rate {
                *slot += 1;
            }
        }
    }

    /// Drain every tile (used when resetting a run to a barren state).
    pub fn clear(&mut self) {
        self.counts.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn consume_decrements_until_empty() {
        let mut grid = ResourceGrid::new(4, 4, 2);
        assert!(grid.consume(1, 1, AtomKind::Phosphorus, 1));
        assert!(grid.consume(1, 1, AtomKind::Phosphorus, 1));
        assert!(!grid.consume(1, 1, AtomKind::Phosphorus, 1));
        assert_eq!(grid.count_at(1, 1, AtomKind::Phosphorus), 0);
        assert_eq!(grid.count_at(1, 1, AtomKind::Carbon), 2);
    }

    #[test]
    fn out_of_range_tiles_are_empty() {
        let mut grid = ResourceGrid::new(4, 4, 5);
        assert_eq!(grid.count_at(-1, 0, AtomKind::Carbon), 0);
        assert_eq!(grid.tile_total(4, 0), 0);
        assert!(!grid.consume(0, 99, AtomKind::Carbon, 1));
    }

    #[test]
    fn replenish_only_adds() {
        let mut grid = ResourceGrid::new(8, 8, 0);
        let mut rng = SmallRng::seed_from_u64(3);
        grid.replenish(0.5, &mut rng);
        let total: u32 = (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .map(|(x, y)| grid.tile_total(x, y))
            .sum();
        assert!(total > 0);
    }
}
