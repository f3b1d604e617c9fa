//! Random source adapters.

use crate::ports::RandomSource;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};

/// Production random source backed by the operating system CSPRNG.
///
/// `gen_range` performs rejection sampling, so `uniform` is unbiased.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn uniform(&mut self, max: u32) -> u32 {
        if max == 0 {
            0
        } else {
            OsRng.gen_range(0..max)
        }
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Deterministic random source seeded from a single integer.
///
/// Reproducible across runs; the workhorse for selection and
/// stochastic-gate tests.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: StdRng,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn uniform(&mut self, max: u32) -> u32 {
        if max == 0 {
            0
        } else {
            self.rng.gen_range(0..max)
        }
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}

/// Degenerate random source that always yields the same value.
///
/// `uniform(max)` returns `value % max`; `fill_bytes` repeats the value's
/// low byte. Lets a test force one arm of a probabilistic branch.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandomSource {
    value: u32,
}

impl FixedRandomSource {
    pub fn new(value: u32) -> Self {
        Self { value }
    }
}

impl RandomSource for FixedRandomSource {
    fn uniform(&mut self, max: u32) -> u32 {
        if max == 0 {
            0
        } else {
            self.value % max
        }
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        buf.fill(self.value as u8);
    }
}
