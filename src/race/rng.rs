//! Deterministic PRNG for race simulation. Evolves a 64-bit ring with the Rule 30 cellular automaton
//! and hands out 32-bit word pairs. Same seed produces the same sequence. Not cryptographically secure.
//!
//! Sub-systems never share a generator: they [fork](Rng::fork) a child seeded from one `int32()` of
//! the parent, so the order in which children are forked is part of the reproducibility contract.

/// Replaces an all-zero state, which Rule 30 would keep at zero forever.
const ZERO_STATE_REPLACEMENT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Seeds the low word; the high word starts at zero.
    pub fn new(seed: u32) -> Self {
        Self::from_state(u64::from(seed))
    }

    pub fn from_state(state: u64) -> Self {
        let state = if state == 0 { ZERO_STATE_REPLACEMENT } else { state };
        Self { state }
    }

    /// Raw state, for checkpointing. Restoring with [Rng::from_state] resumes the exact stream.
    pub fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn step(&mut self) {
        let s = self.state;
        self.state = s.rotate_right(1) ^ (s | s.rotate_left(1));
    }

    /// Advances one generation and returns `(high, low)` words.
    #[inline]
    pub fn pair(&mut self) -> (u32, u32) {
        self.step();
        ((self.state >> 32) as u32, self.state as u32)
    }

    #[inline]
    pub fn int32(&mut self) -> u32 {
        self.pair().1
    }

    /// Uniform float in `[0, 1)` built from 53 bits of one pair.
    #[inline]
    pub fn random(&mut self) -> f64 {
        let (hi, lo) = self.pair();
        let a = f64::from(hi >> 5);
        let b = f64::from(lo >> 6);
        (a * 67_108_864.0 + b) / 9_007_199_254_740_992.0
    }

    /// Uniform integer in `[0, upper)`. Rejection-samples `int32()` under a power-of-two mask.
    /// Returns 0 when `upper <= 1`.
    pub fn uniform(&mut self, upper: u32) -> u32 {
        if upper <= 1 {
            return 0;
        }
        let mask = u32::MAX >> (upper - 1).leading_zeros();
        loop {
            let n = self.int32() & mask;
            if n < upper {
                return n;
            }
        }
    }

    /// Independent child stream seeded from one `int32()` of this stream.
    pub fn fork(&mut self) -> Rng {
        Rng::new(self.int32())
    }
}
