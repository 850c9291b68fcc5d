use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the value a broker announces on each broadcast tick.
///
/// The reactor only reads from it; what it measures is up to the
/// deployment.
pub trait MetricSource: Send {
    fn sample(&mut self) -> Bytes;
}

impl<F> MetricSource for F
where
    F: FnMut() -> Bytes + Send,
{
    fn sample(&mut self) -> Bytes {
        self()
    }
}

/// Simulated free-worker count: a decimal integer in `[0, bound)`.
#[derive(Debug)]
pub struct RandomCapacity {
    rng: StdRng,
    bound: u32,
}

impl RandomCapacity {
    /// Default upper bound (exclusive).
    pub const DEFAULT_BOUND: u32 = 10;

    /// Seeded from OS entropy, so every broker start differs.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            bound: Self::DEFAULT_BOUND,
        }
    }

    /// Deterministic sequence for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            bound: Self::DEFAULT_BOUND,
        }
    }

    /// Change the exclusive upper bound (at least 1).
    pub fn with_bound(mut self, bound: u32) -> Self {
        self.bound = bound.max(1);
        self
    }
}

impl Default for RandomCapacity {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for RandomCapacity {
    fn sample(&mut self) -> Bytes {
        let free = self.rng.random_range(0..self.bound);
        Bytes::from(free.to_string())
    }
}
