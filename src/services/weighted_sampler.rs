//! Weighted sampling without replacement.
//!
//! Each draw picks `r` uniformly in `[0, ΣW)` and walks the remaining pool
//! until the running weight sum exceeds `r`; the picked item leaves the pool.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

/// Draws weighted samples. A fixed seed makes every call reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSampler {
    seed: Option<u64>,
}

impl WeightedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Pick up to `k` items from `pool`, proportionally to `weight`.
    ///
    /// Non-finite or non-positive weights count as 1.
    pub fn sample<T>(&self, pool: Vec<T>, k: usize, weight: impl Fn(&T) -> f64) -> Vec<T> {
        let mut rng = match self.seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        sample_with(&mut rng, pool, k, weight)
    }
}

/// Sampling with a caller-supplied random source.
pub fn sample_with<T, R: Rng>(
    rng: &mut R,
    pool: Vec<T>,
    k: usize,
    weight: impl Fn(&T) -> f64,
) -> Vec<T> {
    let mut pool: Vec<(T, f64)> = pool
        .into_iter()
        .map(|item| {
            let w = weight(&item);
            let w = if w.is_finite() && w > 0.0 { w } else { 1.0 };
            (item, w)
        })
        .collect();

    let k = k.min(pool.len());
    let mut picked = Vec::with_capacity(k);

    for _ in 0..k {
        let total: f64 = pool.iter().map(|(_, w)| w).sum();
        let r = rng.gen_range(0.0..total);

        let mut running = 0.0;
        // Rounding can leave r >= the final sum; fall back to the last item.
        let mut index = pool.len() - 1;
        for (i, (_, w)) in pool.iter().enumerate() {
            running += w;
            if running > r {
                index = i;
                break;
            }
        }

        picked.push(pool.remove(index).0);
    }

    picked
}
