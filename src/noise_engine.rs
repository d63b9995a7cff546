//! Seeded 2D gradient noise.
//!
//! The permutation table is shuffled with a small linear congruential generator
//! so that a given integer seed always reproduces the same terrain, independent
//! of the `rand` version in use.

use noise::NoiseFn;

const TABLE_SIZE: usize = 256;

// LCG constants (period 233280)
const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233_280;

/// Linear congruential generator producing values in [0, 1).
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed % LCG_MODULUS }
    }

    fn next_f64(&mut self) -> f64 {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }
}

/// Perlin-style gradient noise over a duplicated 256-entry permutation table.
#[derive(Clone)]
pub struct NoiseEngine {
    seed: u64,
    perm: [u8; TABLE_SIZE * 2],
}

impl NoiseEngine {
    pub fn new(seed: u64) -> Self {
        let mut permutation = [0u8; TABLE_SIZE];
        for (i, p) in permutation.iter_mut().enumerate() {
            *p = i as u8;
        }

        let mut lcg = Lcg::new(seed);
        for i in (1..TABLE_SIZE).rev() {
            let j = (lcg.next_f64() * (i + 1) as f64).floor() as usize;
            permutation.swap(i, j);
        }

        // Duplicate so corner lookups never need to wrap
        let mut perm = [0u8; TABLE_SIZE * 2];
        perm[..TABLE_SIZE].copy_from_slice(&permutation);
        perm[TABLE_SIZE..].copy_from_slice(&permutation);

        Self { seed, perm }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn permutation(&self) -> &[u8] {
        &self.perm
    }

    #[inline]
    fn p(&self, i: usize) -> usize {
        self.perm[i] as usize
    }

    /// Sample noise at (x, y). Roughly in [-1, 1]; exactly 0 on integer lattice points.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xi = (x0 as i64 & 255) as usize;
        let yi = (y0 as i64 & 255) as usize;

        let xf = x - x0;
        let yf = y - y0;

        let u = fade(xf);
        let v = fade(yf);

        let aa = self.p(self.p(xi) + yi);
        let ab = self.p(self.p(xi) + yi + 1);
        let ba = self.p(self.p(xi + 1) + yi);
        let bb = self.p(self.p(xi + 1) + yi + 1);

        let x1 = lerp(u, grad(aa, xf, yf), grad(ba, xf - 1.0, yf));
        let x2 = lerp(u, grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0));

        lerp(v, x1, x2)
    }
}

impl NoiseFn<f64, 2> for NoiseEngine {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0], point[1])
    }
}

/// Quintic smootherstep: 6t^5 - 15t^4 + 10t^3
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Gradient from the hash: bit 3 swaps the axes, bits 0 and 1 pick the signs.
#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let (u, v) = if h < 8 { (x, y) } else { (y, x) };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}
