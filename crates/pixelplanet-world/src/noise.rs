//! Seeded gradient noise used by the terrain and climate generators.

use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};

/// Classic permutation-table Perlin noise with a seed-shuffled table.
///
/// A single `Perlin` instance backs every layer of one generated planet;
/// layers differ only in spatial scale and octave count, so distinct seeds
/// produce fully decorrelated planets while one planet's layers stay
/// mutually coherent.
#[derive(Debug, Clone)]
pub struct Perlin {
    perm: [u8; 512],
    offset_x: f32,
    offset_y: f32,
}

impl Perlin {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut table: [u8; 256] = [0; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        table.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = table[i & 255];
        }

        // Shift sample coordinates per seed as well, so low-period artifacts
        // of the table never line up between seeds.
        use rand::Rng;
        let offset_x = rng.random_range(0.0f32..256.0);
        let offset_y = rng.random_range(0.0f32..256.0);

        Self {
            perm,
            offset_x,
            offset_y,
        }
    }

    fn fade(t: f32) -> f32 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + t * (b - a)
    }

    fn grad(hash: u8, x: f32, y: f32) -> f32 {
        match hash & 3 {
            0 => x + y,
            1 => -x + y,
            2 => x - y,
            _ => -x - y,
        }
    }

    /// Raw Perlin sample, roughly in [-1, 1].
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x + self.offset_x;
        let y = y + self.offset_y;

        let xi = (x.floor() as i32 & 255) as usize;
        let yi = (y.floor() as i32 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();

        let u = Self::fade(xf);
        let v = Self::fade(yf);

        let aa = self.perm[(self.perm[xi] as usize + yi) & 255];
        let ab = self.perm[(self.perm[xi] as usize + yi + 1) & 255];
        let ba = self.perm[(self.perm[(xi + 1) & 255] as usize + yi) & 255];
        let bb = self.perm[(self.perm[(xi + 1) & 255] as usize + yi + 1) & 255];

        Self::lerp(
            Self::lerp(Self::grad(aa, xf, yf), Self::grad(ba, xf - 1.0, yf), u),
            Self::lerp(
                Self::grad(ab, xf, yf - 1.0),
                Self::grad(bb, xf - 1.0, yf - 1.0),
                u,
            ),
            v,
        )
    }

    /// Octaved fractal sample with halving amplitude and doubling frequency,
    /// normalized back to roughly [-1, 1].
    #[must_use]
    pub fn fractal(&self, x: f32, y: f32, octaves: u32) -> f32 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves.max(1) {
            value += self.sample(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        value / max_value
    }
}
