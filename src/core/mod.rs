//! Core deterministic primitives.
//!
//! All types in this module are designed for bit-exact replay: integer math
//! only, no platform-dependent behaviour, no hidden state.

pub mod fixed;
pub mod vec3;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec3::FixedVec3;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
