use rand::{rngs::StdRng, Rng, SeedableRng};

/// Source of the uniform draws used to pick senders, recipients and
/// whether to gift.
pub trait RandomSource: Send {
    /// Uniform index in `0..len`. `len` is never zero.
    fn index(&mut self, len: usize) -> usize;

    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool;
}

#[derive(Debug, Clone)]
pub struct StdRandom(StdRng);

impl StdRandom {
    pub fn from_entropy() -> Self {
        StdRandom(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        StdRandom(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.0.gen_bool(p)
    }
}
