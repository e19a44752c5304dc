//! Animation: simulated phase, the engine graph seam, and the rollback
//! bridge that keeps graphs consistent across resimulation.

pub mod phase;
pub mod graph;
pub mod bridge;

pub use phase::AnimPhase;
pub use graph::{AnimationGraph, ClipGraph, ClipId, ClipLibrary, ClipSlot, FilterState};
pub use bridge::{AnimSnapshot, AnimationBridge, AnimationSystem};
