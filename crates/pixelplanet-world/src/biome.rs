//! Biome identifiers and the deterministic classification cascade.

use serde::{Deserialize, Serialize};

/// Organic-soil level below which land cannot host true vegetation biomes.
pub const ORGANIC_SOIL_FLOOR: f32 = 0.05;
/// Minimum atmospheric O2 fraction for energetically expensive biomes.
pub const OXYGEN_FLOOR: f32 = 0.15;

/// Discrete terrain/climate classification of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Ocean,
    Water,
    Beach,
    Desert,
    RockDesert,
    Grassland,
    Forest,
    Rainforest,
    Savanna,
    Swamp,
    Mangrove,
    Mountain,
    Hills,
    Plain,
    Tundra,
    Snow,
    Glacier,
    Volcanic,
    Lake,
    River,
}

/// Every biome in id order, for iteration and id decoding.
pub const ALL_BIOMES: [Biome; 20] = [
    Biome::Ocean,
    Biome::Water,
    Biome::Beach,
    Biome::Desert,
    Biome::RockDesert,
    Biome::Grassland,
    Biome::Forest,
    Biome::Rainforest,
    Biome::Savanna,
    Biome::Swamp,
    Biome::Mangrove,
    Biome::Mountain,
    Biome::Hills,
    Biome::Plain,
    Biome::Tundra,
    Biome::Snow,
    Biome::Glacier,
    Biome::Volcanic,
    Biome::Lake,
    Biome::River,
];

impl Biome {
    /// Dense integer id used in grids and snapshots.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Decode a snapshot id.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        ALL_BIOMES.get(id as usize).copied()
    }

    /// Open or standing water.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(
            self,
            Biome::Ocean | Biome::Water | Biome::Lake | Biome::River
        )
    }

    /// Water or the wet margins suitable as a spawn origin.
    #[must_use]
    pub const fn is_shoreline(self) -> bool {
        matches!(self, Biome::Beach | Biome::Mangrove | Biome::Swamp)
    }

    /// Base display color, intentionally vivid.
    #[must_use]
    pub const fn color(self) -> [u8; 3] {
        match self {
            Biome::Ocean => [10, 40, 140],
            Biome::Water => [40, 140, 210],
            Biome::Beach => [242, 220, 180],
            Biome::Desert => [240, 200, 120],
            Biome::RockDesert => [210, 180, 110],
            Biome::Grassland => [110, 200, 65],
            Biome::Forest => [34, 139, 34],
            Biome::Rainforest => [5, 120, 60],
            Biome::Savanna => [200, 170, 80],
            Biome::Swamp => [40, 80, 50],
            Biome::Mangrove => [30, 120, 90],
            Biome::Mountain => [150, 150, 160],
            Biome::Hills => [140, 170, 100],
            Biome::Plain => [160, 200, 110],
            Biome::Tundra => [170, 190, 210],
            Biome::Snow => [245, 245, 245],
            Biome::Glacier => [210, 235, 255],
            Biome::Volcanic => [170, 45, 35],
            Biome::Lake => [40, 110, 210],
            Biome::River => [70, 160, 230],
        }
    }
}

/// Per-cell environmental tuple fed to [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellEnv {
    /// Normalized elevation: 0 = deep ocean, 1 = highest peaks.
    pub elevation: f32,
    /// Normalized temperature: 0 = coldest, 1 = hottest.
    pub temperature: f32,
    /// Normalized humidity.
    pub humidity: f32,
    /// Latitude fraction: 0 at the poles, 1 at the equator.
    pub latitude: f32,
    /// Global atmospheric O2 fraction.
    pub global_o2: f32,
    /// Slow organic-soil memory at this cell.
    pub organic: f32,
    /// Slow mineral enrichment at this cell.
    pub mineral: f32,
    /// Deterministic positional noise in [0, 1], used only to break up
    /// visually banded output.
    pub local_noise: f32,
}

/// Map one cell's environment to a biome.
///
/// An ordered decision cascade: the first matching rule wins, and the order
/// is load-bearing. Total by construction; grassland is the final fallback.
#[must_use]
pub fn classify(env: &CellEnv) -> Biome {
    let alt = env.elevation;
    let temp = env.temperature;
    let hum = env.humidity;
    let lat = env.latitude;

    // Water and coastline bands.
    if alt < 0.12 {
        return Biome::Ocean;
    }
    if alt < 0.16 {
        return if hum > 0.5 { Biome::Lake } else { Biome::Water };
    }
    if alt < 0.20 {
        return Biome::Beach;
    }

    // Extreme altitude. Glaciers and permanent snow are excluded near the
    // equator no matter how the temperature noise falls.
    if alt > 0.85 && temp < 0.35 && lat < 0.25 {
        return Biome::Glacier;
    }
    if alt > 0.80 && hum < 0.25 && temp > 0.6 {
        return Biome::Volcanic;
    }
    if alt > 0.80 {
        return if temp < 0.35 && lat < 0.6 {
            Biome::Snow
        } else {
            Biome::Mountain
        };
    }

    // Polar and sub-polar uplands.
    if lat < 0.15 && alt > 0.50 {
        return if temp < 0.35 { Biome::Tundra } else { Biome::Snow };
    }

    // Arid belts.
    if lat > 0.2 && lat < 0.6 && temp > 0.6 && hum < 0.35 {
        return if alt > 0.55 {
            Biome::RockDesert
        } else {
            Biome::Desert
        };
    }
    if temp > 0.8 && hum < 0.25 {
        return Biome::Desert;
    }

    // Pre-biotic gate: without organic soil, land resolves to barren
    // analogues of the vegetation biomes below. The positional noise only
    // staggers the boundaries between the barren variants.
    if env.organic < ORGANIC_SOIL_FLOOR {
        if temp > 0.7 {
            return if env.local_noise < 0.5 {
                Biome::RockDesert
            } else {
                Biome::Desert
            };
        }
        if alt > 0.6 {
            return Biome::Mountain;
        }
        return if env.local_noise < 0.34 {
            Biome::Hills
        } else if env.local_noise < 0.67 {
            Biome::Plain
        } else {
            Biome::RockDesert
        };
    }

    // Tropical rainforest needs heat, saturation, soil and oxygen.
    let oxygen_ok = env.global_o2 > OXYGEN_FLOOR;
    if lat > 0.4 && hum > 0.8 && temp > 0.6 && env.organic > 0.2 && oxygen_ok {
        return Biome::Rainforest;
    }

    // Wetlands: warm latitudes grow mangroves, cool ones swamp.
    if hum > 0.7 && alt < 0.35 {
        return if lat > 0.4 { Biome::Mangrove } else { Biome::Swamp };
    }

    // Temperate transitional zones split by elevation.
    if hum > 0.3 && hum < 0.6 && temp > 0.3 && temp < 0.7 {
        if alt < 0.35 {
            return Biome::Plain;
        }
        if alt < 0.6 {
            return Biome::Hills;
        }
        return Biome::Mountain;
    }

    if hum > 0.6 && temp > 0.3 && oxygen_ok && env.organic > 0.1 {
        return Biome::Forest;
    }

    if hum > 0.35 && temp > 0.5 {
        return Biome::Savanna;
    }

    if hum > 0.2 && temp > 0.2 {
        return Biome::Grassland;
    }

    Biome::Grassland
}

/// Deterministic small-scale positional noise in [0, 1], derived from the
/// world seed and tile coordinates. No extra noise map needed.
#[must_use]
pub fn local_noise(seed: u64, x: u32, y: u32) -> f32 {
    let v = (x.wrapping_mul(73_856_093)) ^ (y.wrapping_mul(19_349_663)) ^ (seed as u32);
    if v == 0 {
        return 0.0;
    }
    v as f32 / u32::MAX as f32
}
