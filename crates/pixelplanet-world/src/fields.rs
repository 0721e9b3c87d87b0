//! Planet-scale scalar field generation.
//!
//! Produces fragmented continents, large oceans, polar cold and arid belts
//! from stacked gradient-noise layers. Fields are generated once per world,
//! normalized to [0, 1], and immutable afterwards.

use crate::archive::{self, ArchiveError};
use crate::noise::Perlin;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Warm equatorial mean, degrees Celsius.
pub const EQUATOR_TEMP_C: f32 = 34.0;
/// Cold polar mean, degrees Celsius.
pub const POLE_TEMP_C: f32 = -20.0;
/// Temperature drop between sea level and maximum elevation.
pub const LAPSE_RATE_C_PER_ELEV: f32 = 25.0;
/// Coherent temperature noise amplitude around the latitudinal mean.
pub const TEMP_NOISE_AMPL_C: f32 = 6.0;
/// Humidity forced over ocean cells.
pub const HUMIDITY_OCEAN: f32 = 1.0;
/// Damping applied to land humidity.
pub const HUMIDITY_LAND_SCALE: f32 = 0.85;
/// Percentile of the continent mask that becomes the sea level. A higher
/// value means less land and more fragmented continents, and keeps the
/// land/ocean area ratio stable across seeds.
pub const CONTINENT_THRESHOLD_PERCENTILE: f32 = 60.0;

const CACHE_MAGIC: &[u8; 4] = b"PXFC";
const CACHE_VERSION: u32 = 1;

/// Errors raised while constructing field maps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("field dimensions must be non-zero")]
    EmptyDimensions,
    #[error("field buffer length does not match dimensions")]
    ShapeMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    version: u32,
    width: u32,
    height: u32,
}

/// The four immutable climate fields of a generated planet, each a dense
/// row-major `width * height` grid of `[0, 1]` values. `pressure` holds the
/// analytic distance-from-equator fraction (1 at the equator, 0 at the
/// poles) and serves as the latitude proxy for classification.
#[derive(Debug, Clone)]
pub struct FieldMaps {
    width: u32,
    height: u32,
    elevation: Vec<f32>,
    temperature: Vec<f32>,
    humidity: Vec<f32>,
    pressure: Vec<f32>,
}

impl FieldMaps {
    /// Generate all fields for `seed` at the requested resolution.
    pub fn generate(seed: u64, width: u32, height: u32) -> Result<Self, FieldError> {
        if width == 0 || height == 0 {
            return Err(FieldError::EmptyDimensions);
        }
        let perlin = Perlin::new(seed);
        let w = width as usize;
        let h = height as usize;

        // Continent mask: broad base, mid-scale detail, high-frequency rifts.
        let base = normalized(raw_layer(&perlin, w, h, 900.0, 2));
        let detail = normalized(raw_layer(&perlin, w, h, 220.0, 4));
        let rift = normalized(raw_layer(&perlin, w, h, 80.0, 5));

        let mut continent = vec![0.0f32; w * h];
        for i in 0..continent.len() {
            continent[i] = 0.6 * base[i] + 0.25 * detail[i] - 0.25 * rift[i];
        }
        normalize(&mut continent);
        let sea_level = percentile(&continent, CONTINENT_THRESHOLD_PERCENTILE);

        // Elevation: land rises into an upper band, the seafloor keeps a
        // faint texture of the same terrain noise without breaking surface.
        let terrain = normalized(raw_layer(&perlin, w, h, 140.0, 5));
        let mut elevation = vec![0.0f32; w * h];
        for i in 0..elevation.len() {
            elevation[i] = if continent[i] > sea_level {
                0.25 + 0.75 * terrain[i]
            } else {
                0.05 * terrain[i]
            };
        }
        normalize(&mut elevation);

        // Latitude fraction: 1 at the equator, 0 at both poles.
        let mut pressure = vec![0.0f32; w * h];
        for y in 0..h {
            let row_frac = if h > 1 {
                y as f32 / (h - 1) as f32
            } else {
                0.5
            };
            let lat_frac = 1.0 - (row_frac - 0.5).abs() * 2.0;
            for x in 0..w {
                pressure[y * w + x] = lat_frac;
            }
        }

        // Temperature in physical degrees, then renormalized: latitudinal
        // base, bounded coherent noise, altitude lapse cooling.
        let temp_noise = normalized(raw_layer(&perlin, w, h, 180.0, 3));
        let mut temperature = vec![0.0f32; w * h];
        let span = EQUATOR_TEMP_C - POLE_TEMP_C;
        for i in 0..temperature.len() {
            let noise_c = (temp_noise[i] * 2.0 - 1.0) * TEMP_NOISE_AMPL_C;
            let celsius = POLE_TEMP_C + span * pressure[i] + noise_c
                - LAPSE_RATE_C_PER_ELEV * elevation[i];
            let celsius = celsius.clamp(POLE_TEMP_C, EQUATOR_TEMP_C);
            temperature[i] = (celsius - POLE_TEMP_C) / span;
        }

        // Humidity: coherent noise, wetter near the equator, drier at
        // altitude, saturated over open water.
        let hum_noise = normalized(raw_layer(&perlin, w, h, 160.0, 4));
        let mut humidity = vec![0.0f32; w * h];
        for i in 0..humidity.len() {
            humidity[i] = if continent[i] > sea_level {
                let raw = 0.7 * hum_noise[i] + 0.3 * pressure[i] - 0.25 * elevation[i];
                (raw * HUMIDITY_LAND_SCALE).max(0.0)
            } else {
                HUMIDITY_OCEAN
            };
        }
        normalize(&mut humidity);

        Ok(Self {
            width,
            height,
            elevation,
            temperature,
            humidity,
            pressure,
        })
    }

    /// Reuse a cached archive when its shape matches, otherwise regenerate
    /// (and refresh the cache). Cache failures are never fatal.
    pub fn generate_or_load(
        seed: u64,
        width: u32,
        height: u32,
        cache: Option<&Path>,
    ) -> Result<Self, FieldError> {
        if let Some(path) = cache {
            match Self::load_cache(path, width, height) {
                Ok(fields) => {
                    info!(path = %path.display(), "reusing cached field maps");
                    return Ok(fields);
                }
                Err(err) => {
                    debug!(path = %path.display(), %err, "field cache unusable; regenerating");
                }
            }
        }
        let fields = Self::generate(seed, width, height)?;
        if let Some(path) = cache {
            if let Err(err) = fields.save_cache(path) {
                warn!(path = %path.display(), %err, "failed to write field cache");
            }
        }
        Ok(fields)
    }

    /// Rebuild field maps from raw grids (snapshot loading).
    pub fn from_parts(
        width: u32,
        height: u32,
        elevation: Vec<f32>,
        temperature: Vec<f32>,
        humidity: Vec<f32>,
        pressure: Vec<f32>,
    ) -> Result<Self, FieldError> {
        if width == 0 || height == 0 {
            return Err(FieldError::EmptyDimensions);
        }
        let len = (width as usize) * (height as usize);
        if elevation.len() != len
            || temperature.len() != len
            || humidity.len() != len
            || pressure.len() != len
        {
            return Err(FieldError::ShapeMismatch);
        }
        Ok(Self {
            width,
            height,
            elevation,
            temperature,
            humidity,
            pressure,
        })
    }

    /// Persist the four grids to a compressed cache archive.
    pub fn save_cache(&self, path: &Path) -> Result<(), ArchiveError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let header = CacheHeader {
            version: CACHE_VERSION,
            width: self.width,
            height: self.height,
        };
        let writer = BufWriter::new(File::create(path)?);
        archive::write_archive(
            writer,
            CACHE_MAGIC,
            &header,
            &[
                &archive::floats_to_bytes(&self.elevation),
                &archive::floats_to_bytes(&self.temperature),
                &archive::floats_to_bytes(&self.humidity),
                &archive::floats_to_bytes(&self.pressure),
            ],
        )
    }

    fn load_cache(path: &Path, width: u32, height: u32) -> Result<Self, ArchiveError> {
        let reader = BufReader::new(File::open(path)?);
        let (header, mut sections): (CacheHeader, _) =
            archive::read_archive(reader, CACHE_MAGIC)?;
        if header.version != CACHE_VERSION
            || header.width != width
            || header.height != height
            || sections.len() != 4
        {
            return Err(ArchiveError::SectionLength);
        }
        let pressure = archive::floats_from_bytes(&sections.pop().unwrap_or_default())?;
        let humidity = archive::floats_from_bytes(&sections.pop().unwrap_or_default())?;
        let temperature = archive::floats_from_bytes(&sections.pop().unwrap_or_default())?;
        let elevation = archive::floats_from_bytes(&sections.pop().unwrap_or_default())?;
        Self::from_parts(width, height, elevation, temperature, humidity, pressure)
            .map_err(|_| ArchiveError::SectionLength)
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
    #[must_use]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[must_use]
    pub fn elevation(&self) -> &[f32] {
        &self.elevation
    }

    #[must_use]
    pub fn temperature(&self) -> &[f32] {
        &self.temperature
    }

    #[must_use]
    pub fn humidity(&self) -> &[f32] {
        &self.humidity
    }

    #[must_use]
    pub fn pressure(&self) -> &[f32] {
        &self.pressure
    }
}

fn raw_layer(perlin: &Perlin, width: usize, height: usize, scale: f32, octaves: u32) -> Vec<f32> {
    let freq = 1.0 / scale;
    let mut cells = vec![0.0f32; width * height];
    cells
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let ny = y as f32 * freq;
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = perlin.fractal(x as f32 * freq, ny, octaves);
            }
        });
    cells
}

fn normalize(values: &mut [f32]) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    let span = (max - min).max(1e-12);
    for v in values.iter_mut() {
        *v = (*v - min) / span;
    }
}

fn normalized(mut values: Vec<f32>) -> Vec<f32> {
    normalize(&mut values);
    values
}

/// Value below which `pct` percent of `values` fall (nearest-rank).
fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f32).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
