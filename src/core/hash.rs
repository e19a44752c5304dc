//! State Hashing for Verification
//!
//! Provides deterministic hashing of simulation state for:
//! - Rollback verification (resimulated tick == originally predicted tick)
//! - Replay validation
//! - Desync diagnostics between peers

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec3::FixedVec3;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for fixed-point types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for simulation state.
    pub fn for_sim_state() -> Self {
        Self::new(b"TICKFIRE_STATE_V1")
    }

    /// Create hasher for recorded inputs.
    pub fn for_input_history() -> Self {
        Self::new(b"TICKFIRE_INPUTS_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value (raw bits, little-endian).
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a FixedVec3.
    #[inline]
    pub fn update_vec3(&mut self, value: FixedVec3) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
        self.update_fixed(value.z);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an i8 value.
    #[inline]
    pub fn update_i8(&mut self, value: i8) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute state hash for rollback/replay verification.
///
/// This function is called by `WorldSnapshot::compute_hash()`.
/// The parameter is a closure that adds state-specific data.
pub fn compute_state_hash<F>(tick: u32, seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_sim_state();

    // Always hash tick and seed first
    hasher.update_u32(tick);
    hasher.update_u64(seed);

    // Add game-specific state
    add_state(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_sim_state();
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_fixed(to_fixed(5.5));
            hasher.update_vec3(FixedVec3::new(to_fixed(1.0), to_fixed(2.0), to_fixed(3.0)));
            hasher.update_bool(true);
            hasher.finalize()
        };

        let hash1 = make_hash();
        let hash2 = make_hash();

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let hash_in = |domain: &[u8]| {
            let mut h = StateHasher::new(domain);
            h.update_u32(1234);
            h.finalize()
        };

        assert_ne!(hash_in(b"DOMAIN_A"), hash_in(b"DOMAIN_B"));
        assert_ne!(StateHasher::for_sim_state().finalize(), StateHasher::for_input_history().finalize());
    }

    #[test]
    fn test_vec3_components_all_hashed() {
        let hash_of = |v: FixedVec3| {
            let mut h = StateHasher::for_sim_state();
            h.update_vec3(v);
            h.finalize()
        };

        let base = hash_of(FixedVec3::new(1, 2, 3));
        assert_ne!(base, hash_of(FixedVec3::new(1, 2, 4)));
        assert_ne!(base, hash_of(FixedVec3::new(1, 3, 3)));
    }

    #[test]
    fn test_compute_state_hash() {
        let hash = compute_state_hash(100, 12345, |hasher| {
            hasher.update_fixed(to_fixed(5.0));
            hasher.update_bool(true);
        });

        // Hash should be consistent
        let hash2 = compute_state_hash(100, 12345, |hasher| {
            hasher.update_fixed(to_fixed(5.0));
            hasher.update_bool(true);
        });

        assert_eq!(hash, hash2);

        // Different input = different hash
        let hash3 = compute_state_hash(101, 12345, |hasher| {
            hasher.update_fixed(to_fixed(5.0));
            hasher.update_bool(true);
        });

        assert_ne!(hash, hash3);
    }
}
