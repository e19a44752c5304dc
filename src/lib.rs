//! # Tickfire
//!
//! Deterministic gameplay simulation for a first-person shooter, designed to
//! run beneath a rollback/resimulation tick framework.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          TICKFIRE                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core/            - Deterministic primitives                 │
//! │  ├── fixed.rs     - Q16.16 fixed-point arithmetic            │
//! │  ├── vec3.rs      - 3D vector with fixed-point               │
//! │  ├── rng.rs       - Xorshift128+ and keyed noise             │
//! │  └── hash.rs      - State hashing for verification           │
//! │                                                              │
//! │  game/            - Simulation (deterministic)               │
//! │  ├── input.rs     - Input records, hooks, histories          │
//! │  ├── physics.rs   - Physics queries, static reference world  │
//! │  ├── health.rs    - Health authority and registry            │
//! │  ├── movement.rs  - Movement state machine                   │
//! │  ├── ability.rs   - Cooldown ability                         │
//! │  ├── recoil.rs    - Keyed recoil kicks and relaxation        │
//! │  ├── weapon.rs    - Hit-scan weapon                          │
//! │  ├── switching.rs - Weapon switch scheduler                  │
//! │  ├── events.rs    - Replay-safe event channel                │
//! │  ├── state.rs     - Actor/world records, snapshot ring       │
//! │  ├── actor.rs     - Actor aggregate and lifecycle            │
//! │  └── tick.rs      - Predict / roll back / resimulate         │
//! │                                                              │
//! │  anim/            - Animation phase and rollback bridge      │
//! │  view/            - Per-frame interpolation (float)          │
//! │  config.rs        - Tunables, JSON loading, validation       │
//! │  error.rs         - Error types                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in Simulate
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from keyed noise or seeded Xorshift128+
//!
//! Given identical inputs and seed, a tick produces identical records no
//! matter how many times it is resimulated.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod anim;
pub mod view;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::vec3::FixedVec3;
pub use core::rng::DeterministicRng;
pub use config::SimConfig;
pub use error::{ConfigError, SimError};
pub use game::input::{InputHistory, InputRecord};
pub use game::state::{ActorId, ActorState, WorldSnapshot};
pub use game::tick::{Correction, Simulation, SpawnPoint, TickInputs};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = config::DEFAULT_TICK_RATE;
