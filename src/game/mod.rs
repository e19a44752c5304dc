//! Gameplay Simulation
//!
//! Everything a tick touches. 100% deterministic: fixed-point math, keyed
//! noise, BTreeMap iteration, and no engine handles.
//!
//! ## Module Structure
//!
//! - `input`: Input records, the per-tick input hooks, recorded histories
//! - `physics`: Physics query seam and a static reference world
//! - `health`: Health authority seam and registry
//! - `movement`: Character movement state machine
//! - `ability`: Cooldown ability producing blink requests
//! - `recoil`: Seeded recoil kicks
//! - `weapon`: Generic hit-scan weapon
//! - `switching`: Weapon switch scheduler
//! - `events`: Simulation events and the replay-safe channel
//! - `state`: Actor/world records and the rollback ring
//! - `actor`: Actor aggregate and lifecycle
//! - `tick`: Local tick driver (predict, roll back, resimulate, confirm)

pub mod input;
pub mod physics;
pub mod health;
pub mod movement;
pub mod ability;
pub mod recoil;
pub mod weapon;
pub mod switching;
pub mod events;
pub mod state;
pub mod actor;
pub mod tick;

// Re-export key types
pub use input::{InputHistory, InputPipeline, InputRecord};
pub use state::{ActorId, ActorState, StateRing, WorldSnapshot};
pub use events::{SimEvent, SimEventData};
pub use tick::{Correction, Simulation, SpawnPoint, TickContext, TickHooks, TickInputs};
