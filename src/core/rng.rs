//! Deterministic Random Number Generation
//!
//! Two flavours, both integer-only:
//!
//! - [`DeterministicRng`]: a stateful Xorshift128+ stream, used for scripted
//!   sessions and replay tooling.
//! - [`noise`] / [`noise_signed_unit`]: stateless keyed noise. The same
//!   `(seed, counter, channel)` key always yields the same value, so a tick
//!   that is resimulated reproduces its recoil exactly without carrying RNG
//!   state in the record.

use super::fixed::{Fixed, FIXED_ONE, FIXED_SCALE};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform (x86, ARM, WASM, GPU).
///
/// # Example
///
/// ```
/// use tickfire::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Modulo bias is negligible for the small ranges scripts use
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// KEYED NOISE
// =============================================================================

/// Stateless 64-bit noise for a `(seed, counter, channel)` key.
///
/// Distinct channels give independent samples for the same counter.
#[inline]
pub fn noise(seed: u64, counter: u32, channel: u32) -> u64 {
    let mut state = seed
        ^ (counter as u64).wrapping_mul(0xD6E8FEB86659FD93)
        ^ (channel as u64).wrapping_mul(0xA0761D6478BD642F);
    splitmix64(&mut state)
}

/// Keyed noise mapped to a fixed-point value in [-1, 1).
#[inline]
pub fn noise_signed_unit(seed: u64, counter: u32, channel: u32) -> Fixed {
    // Top 17 bits cover [0, 2) in Q16.16
    let raw = (noise(seed, counter, channel) >> (64 - (FIXED_SCALE + 1))) as Fixed;
    raw - FIXED_ONE
}

// =============================================================================
// TESTS
// =============================================================================
