//! Blink Ability
//!
//! Cooldown-gated ability whose only mechanical effect is a teleport request
//! handed to movement. Firing while cooling down raises a one-tick `denied`
//! flag for feedback and nothing else.

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::fixed::{self, Fixed, FIXED_ONE, countdown, fixed_clamp, fixed_div, to_fixed};
use crate::core::hash::StateHasher;
use crate::game::events::SimEventData;
use crate::game::input::InputRecord;
use crate::game::movement::TeleportRequest;
use crate::game::tick::TickContext;

/// Ability tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Seconds between activations
    #[serde(with = "fixed::decimal")]
    pub cooldown: Fixed,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self { cooldown: to_fixed(4.0) }
    }
}

/// Ability sub-state of an actor record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityState {
    /// Seconds of cooldown remaining
    pub cooldown: Fixed,
    /// Successful activations so far (doubles as the blink press id)
    pub presses: u32,
    /// Activated this tick
    pub fired: bool,
    /// Pressed while cooling down this tick
    pub denied: bool,
}

impl AbilityState {
    /// Hash for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.cooldown);
        hasher.update_u32(self.presses);
        hasher.update_bool(self.fired);
        hasher.update_bool(self.denied);
    }
}

/// Ability component bound to its configuration.
#[derive(Clone, Debug)]
pub struct AbilitySim {
    config: AbilityConfig,
}

impl AbilitySim {
    /// Bind a configuration.
    pub fn bind(config: AbilityConfig) -> Self {
        if config.cooldown <= 0 {
            warn!("ability cooldown is not positive; ability fires every tick it is pressed");
        }
        Self { config }
    }

    /// Bound configuration.
    pub fn config(&self) -> &AbilityConfig {
        &self.config
    }

    /// Normalized readiness: 1 - remaining / total, clamped to [0, 1].
    pub fn readiness(&self, state: &AbilityState) -> Fixed {
        readiness(state.cooldown, self.config.cooldown)
    }

    /// Advance one tick. Returns the blink request on activation.
    pub fn simulate(
        &self,
        state: &mut AbilityState,
        input: &InputRecord,
        ctx: &mut TickContext<'_>,
    ) -> Option<TeleportRequest> {
        state.fired = false;
        state.denied = false;
        state.cooldown = countdown(state.cooldown, ctx.dt);

        if !input.ability_pressed() {
            return None;
        }
        if state.cooldown > 0 {
            state.denied = true;
            return None;
        }

        state.cooldown = self.config.cooldown;
        state.presses = state.presses.wrapping_add(1);
        state.fired = true;
        ctx.emit(SimEventData::AbilityFired { press_id: state.presses });
        Some(TeleportRequest { press_id: state.presses })
    }
}

/// 1 - remaining / total, clamped to [0, 1]. A non-positive total is always ready.
pub fn readiness(remaining: Fixed, total: Fixed) -> Fixed {
    if total <= 0 {
        return FIXED_ONE;
    }
    fixed_clamp(FIXED_ONE - fixed_div(remaining, total), 0, FIXED_ONE)
}
