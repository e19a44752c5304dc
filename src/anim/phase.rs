//! Animation phase derived from the movement record.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, to_fixed};
use crate::game::movement::{MoveMode, MovementState};

/// Horizontal speed below which an actor counts as standing still.
pub const LOCOMOTION_THRESHOLD: Fixed = to_fixed(0.1);

/// Coarse animation state, part of the simulated record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnimPhase {
    /// Standing still
    #[default]
    Idle = 0,
    /// Walking or running on the ground
    Locomotion = 1,
    /// Jump taken, not yet observed airborne
    JumpStart = 2,
    /// In the air
    Airborne = 3,
    /// Touched down this tick
    Landing = 4,
}

impl AnimPhase {
    /// Phase for a movement record. Pure.
    pub fn derive(movement: &MovementState) -> Self {
        if movement.landed {
            return AnimPhase::Landing;
        }
        match movement.mode {
            MoveMode::Jumping => AnimPhase::JumpStart,
            MoveMode::Airborne => AnimPhase::Airborne,
            MoveMode::Grounded if movement.horizontal_speed() > LOCOMOTION_THRESHOLD => AnimPhase::Locomotion,
            MoveMode::Grounded => AnimPhase::Idle,
        }
    }
}
