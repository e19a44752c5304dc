//! Deterministic Recoil
//!
//! Each shot kicks the view by a fixed pitch amount plus yaw and roll
//! samples drawn from keyed noise. The key is the weapon's seed and its shot
//! counter, so the same shot sequence reproduces the same offsets on every
//! run and every resimulation.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{self, Fixed, FIXED_ONE, fixed_lerp, fixed_min, fixed_mul};
use crate::core::hash::StateHasher;
use crate::core::rng::noise_signed_unit;

/// Noise channel for the yaw sample.
const YAW_CHANNEL: u32 = 0;

/// Noise channel for the roll sample.
const ROLL_CHANNEL: u32 = 1;

/// Per-weapon recoil tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoilProfile {
    /// Fixed per-weapon seed (any decimal; its raw bits key the noise)
    #[serde(with = "fixed::decimal")]
    pub seed: Fixed,
    /// Upward kick per shot (degrees)
    #[serde(with = "fixed::decimal")]
    pub pitch_kick: Fixed,
    /// Yaw kick drawn from [-yaw_range, yaw_range) (degrees)
    #[serde(with = "fixed::decimal")]
    pub yaw_range: Fixed,
    /// Roll kick drawn from [-roll_range, roll_range) (degrees)
    #[serde(with = "fixed::decimal")]
    pub roll_range: Fixed,
    /// Fraction of the offset recovered per second
    #[serde(with = "fixed::decimal")]
    pub relax_rate: Fixed,
}

impl RecoilProfile {
    /// Noise key derived from the seed.
    #[inline]
    pub fn noise_key(&self) -> u64 {
        self.seed as u32 as u64
    }

    /// Offset added by shot number `shot_count`.
    pub fn kick(&self, shot_count: u32) -> RecoilOffset {
        let key = self.noise_key();
        RecoilOffset {
            pitch: self.pitch_kick,
            yaw: fixed_mul(noise_signed_unit(key, shot_count, YAW_CHANNEL), self.yaw_range),
            roll: fixed_mul(noise_signed_unit(key, shot_count, ROLL_CHANNEL), self.roll_range),
        }
    }

    /// Interpolation factor for one tick of relaxation.
    #[inline]
    pub fn relax_factor(&self, dt: Fixed) -> Fixed {
        fixed_min(fixed_mul(self.relax_rate, dt), FIXED_ONE)
    }
}

/// Accumulated view offset (degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoilOffset {
    /// Vertical kick
    pub pitch: Fixed,
    /// Horizontal kick
    pub yaw: Fixed,
    /// Camera roll
    pub roll: Fixed,
}

impl RecoilOffset {
    /// No offset.
    pub const ZERO: Self = Self { pitch: 0, yaw: 0, roll: 0 };

    /// Componentwise sum.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            pitch: self.pitch.saturating_add(other.pitch),
            yaw: self.yaw.saturating_add(other.yaw),
            roll: self.roll.saturating_add(other.roll),
        }
    }

    /// Move toward zero by fraction `t`. Each component shrinks in magnitude,
    /// so both signs reach zero exactly.
    #[inline]
    pub fn relax(self, t: Fixed) -> Self {
        Self {
            pitch: relax_toward_zero(self.pitch, t),
            yaw: relax_toward_zero(self.yaw, t),
            roll: relax_toward_zero(self.roll, t),
        }
    }

    /// Is every component zero?
    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Hash for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.pitch);
        hasher.update_fixed(self.yaw);
        hasher.update_fixed(self.roll);
    }
}

fn relax_toward_zero(value: Fixed, t: Fixed) -> Fixed {
    let magnitude = fixed_lerp(value.saturating_abs(), 0, t);
    if value < 0 { -magnitude } else { magnitude }
}
