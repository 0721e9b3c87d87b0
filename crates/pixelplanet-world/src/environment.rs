//! Per-biome environmental resource channels.
//!
//! These are the raw inputs agents convert into internal resources. Each
//! biome carries a base profile per channel; sampling adds Gaussian noise
//! and a sinusoidal seasonal term.

use crate::biome::Biome;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

/// Number of environmental channels.
pub const ENV_CHANNELS: usize = 6;

/// Simulated-time period of one seasonal cycle.
pub const SEASON_PERIOD: f32 = 1000.0;

/// Raw environmental input channels, in the fixed order used by the
/// metabolism coefficient matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum EnvChannel {
    /// Photosynthetic light availability.
    Light = 0,
    /// Dissolved / particulate organics.
    OrganicSoup = 1,
    /// Reduced sulfur compounds.
    H2s = 2,
    /// Ferrous iron and metals.
    Fe2 = 3,
    /// Inorganic carbon.
    Co2 = 4,
    /// Thermal gradients and vents.
    HeatGradient = 5,
}

/// Base behaviour of one channel: mean, variability (Gaussian sigma), and
/// seasonal amplitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub mean: f32,
    pub variability: f32,
    pub seasonal: f32,
}

impl ChannelProfile {
    const fn new(mean: f32, variability: f32, seasonal: f32) -> Self {
        Self {
            mean,
            variability,
            seasonal,
        }
    }
}

/// Base profile per channel for a biome at a given latitude fraction.
#[must_use]
pub fn base_profile(biome: Biome, lat_frac: f32) -> [ChannelProfile; ENV_CHANNELS] {
    // Defaults: low everything.
    let mut light = ChannelProfile::new(0.2, 0.05, 0.1);
    let mut soup = ChannelProfile::new(0.1, 0.05, 0.05);
    let mut h2s = ChannelProfile::new(0.0, 0.02, 0.0);
    let mut fe2 = ChannelProfile::new(0.05, 0.05, 0.02);
    let mut co2 = ChannelProfile::new(0.4, 0.05, 0.05);
    let mut heat = ChannelProfile::new(0.0, 0.02, 0.0);

    match biome {
        Biome::Rainforest | Biome::Forest => {
            light = ChannelProfile::new(0.7, 0.1, 0.15);
            soup = ChannelProfile::new(0.8, 0.1, 0.2);
            co2 = ChannelProfile::new(0.6, 0.05, 0.05);
        }
        Biome::Savanna | Biome::Grassland | Biome::Plain => {
            light = ChannelProfile::new(0.8, 0.1, 0.2);
            soup = ChannelProfile::new(0.4, 0.1, 0.3);
        }
        Biome::Desert | Biome::RockDesert => {
            light = ChannelProfile::new(0.95, 0.05, 0.2);
            soup = ChannelProfile::new(0.05, 0.03, 0.1);
            co2 = ChannelProfile::new(0.7, 0.05, 0.05);
        }
        Biome::Mangrove | Biome::Swamp => {
            light = ChannelProfile::new(0.6, 0.1, 0.15);
            soup = ChannelProfile::new(0.9, 0.1, 0.2);
        }
        Biome::Lake | Biome::River => {
            light = ChannelProfile::new(0.7, 0.1, 0.15);
            soup = ChannelProfile::new(0.7, 0.1, 0.25);
        }
        Biome::Ocean | Biome::Water => {
            light = ChannelProfile::new(0.8, 0.1, 0.1);
            soup = ChannelProfile::new(0.4, 0.1, 0.1);
        }
        _ => {}
    }

    if biome == Biome::Volcanic {
        heat = ChannelProfile::new(0.9, 0.05, 0.05);
        h2s = ChannelProfile::new(0.5, 0.1, 0.05);
        fe2 = ChannelProfile::new(0.4, 0.1, 0.05);
    }

    let cold = lat_frac < 0.25;
    if cold || matches!(biome, Biome::Snow | Biome::Glacier | Biome::Tundra) {
        // Cold regions: little liquid organic matter, dimmer light.
        light = ChannelProfile::new(light.mean.min(0.4), 0.05, 0.05);
        soup = ChannelProfile::new(soup.mean * 0.6, 0.05, 0.05);
    }

    [light, soup, h2s, fe2, co2, heat]
}

/// Sample all channels for `biome` at simulated time `t`. Values are
/// clamped non-negative.
#[must_use]
pub fn sample_environment(
    biome: Biome,
    lat_frac: f32,
    t: f32,
    rng: &mut SmallRng,
) -> [f32; ENV_CHANNELS] {
    let profile = base_profile(biome, lat_frac);
    let season_phase = std::f32::consts::TAU * (t / SEASON_PERIOD);
    let season = season_phase.sin();

    let mut values = [0.0f32; ENV_CHANNELS];
    for (value, channel) in values.iter_mut().zip(profile.iter()) {
        let noise = Normal::new(0.0, channel.variability)
            .map(|dist| dist.sample(rng))
            .unwrap_or(0.0);
        *value = (channel.mean + channel.seasonal * season + noise).max(0.0);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn samples_are_non_negative() {
        let mut rng = SmallRng::seed_from_u64(11);
        for biome in crate::biome::ALL_BIOMES {
            for step in 0..32 {
                let env = sample_environment(biome, 0.5, step as f32 * 37.0, &mut rng);
                assert!(env.iter().all(|v| *v >= 0.0), "{biome:?} went negative");
            }
        }
    }

    #[test]
    fn volcanic_profile_carries_redox_channels() {
        let profile = base_profile(Biome::Volcanic, 0.5);
        assert!(profile[EnvChannel::HeatGradient as usize].mean > 0.8);
        assert!(profile[EnvChannel::H2s as usize].mean > 0.3);
        assert!(profile[EnvChannel::Fe2 as usize].mean > 0.3);
    }

    #[test]
    fn cold_latitudes_dim_the_lights() {
        let warm = base_profile(Biome::Grassland, 0.8);
        let cold = base_profile(Biome::Grassland, 0.1);
        assert!(cold[EnvChannel::Light as usize].mean < warm[EnvChannel::Light as usize].mean);
        assert!(
            cold[EnvChannel::OrganicSoup as usize].mean
                < warm[EnvChannel::OrganicSoup as usize].mean
        );
    }
}
