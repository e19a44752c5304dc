//! Weapon Switching Scheduler
//!
//! Owns the ordered weapon set. Exactly one weapon is enabled, and only
//! that weapon is simulated each tick. A shared cooldown spaces switches
//! apart; while it runs, switch requests are ignored.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::fixed::{Fixed, countdown};
use crate::core::hash::StateHasher;
use crate::core::vec3::FixedVec3;
use crate::error::SimError;
use crate::game::events::SimEventData;
use crate::game::input::InputRecord;
use crate::game::tick::TickContext;
use crate::game::weapon::{WeaponProfile, WeaponSim, WeaponState};

/// Weapons sub-state of an actor record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArsenalState {
    /// One state per weapon, in arsenal order
    pub weapons: Vec<WeaponState>,
    /// Enabled weapon
    pub active: u8,
    /// Weapon enabled before the last switch
    pub previous: u8,
    /// Seconds until another switch is accepted
    pub switch_cooldown: Fixed,
    /// Switches performed
    pub switch_count: u32,
}

impl ArsenalState {
    /// State of the enabled weapon.
    pub fn active_weapon(&self) -> Option<&WeaponState> {
        self.weapons.get(self.active as usize)
    }

    /// Number of enabled weapons (1 in a valid record).
    pub fn enabled_count(&self) -> usize {
        self.weapons.iter().filter(|w| w.enabled).count()
    }

    /// Hash for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.weapons.len() as u32);
        for weapon in &self.weapons {
            weapon.hash_into(hasher);
        }
        hasher.update_u8(self.active);
        hasher.update_u8(self.previous);
        hasher.update_fixed(self.switch_cooldown);
        hasher.update_u32(self.switch_count);
    }
}

/// Switch request decoded from one input record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchRequest {
    /// Slot 0
    Primary,
    /// Slot 1
    Secondary,
    /// Back to the previously enabled weapon
    QuickSwap,
    /// Relative steps, wrapping around the arsenal
    Scroll(i8),
}

impl SwitchRequest {
    /// Highest-priority request in `input`, if any.
    pub fn from_input(input: &InputRecord) -> Option<Self> {
        if input.pressed(InputRecord::SELECT_PRIMARY) {
            Some(Self::Primary)
        } else if input.pressed(InputRecord::SELECT_SECONDARY) {
            Some(Self::Secondary)
        } else if input.pressed(InputRecord::QUICK_SWAP) {
            Some(Self::QuickSwap)
        } else if input.scroll != 0 {
            Some(Self::Scroll(input.scroll))
        } else {
            None
        }
    }
}

/// Scheduler over the bound weapons.
#[derive(Clone, Debug)]
pub struct WeaponSwitcher {
    weapons: Vec<WeaponSim>,
    switch_cooldown: Fixed,
}

impl WeaponSwitcher {
    /// Bind one weapon per profile.
    pub fn bind(profiles: &[WeaponProfile], switch_cooldown: Fixed) -> Self {
        Self {
            weapons: profiles.iter().cloned().map(WeaponSim::bind).collect(),
            switch_cooldown,
        }
    }

    /// Bound weapons in arsenal order.
    pub fn weapons(&self) -> &[WeaponSim] {
        &self.weapons
    }

    /// Seconds enforced between switches.
    pub fn switch_cooldown(&self) -> Fixed {
        self.switch_cooldown
    }

    /// Fresh arsenal with the first weapon drawn.
    pub fn spawn_state(&self) -> ArsenalState {
        let mut weapons: Vec<WeaponState> = self.weapons.iter().map(WeaponSim::spawn_state).collect();
        if let Some(first) = weapons.first_mut() {
            first.enabled = true;
        }
        ArsenalState { weapons, ..ArsenalState::default() }
    }

    /// Resolve a request to a weapon index.
    pub fn resolve(&self, state: &ArsenalState, request: SwitchRequest) -> Result<u8, SimError> {
        let count = self.weapons.len();
        let index: i32 = match request {
            SwitchRequest::Primary => 0,
            SwitchRequest::Secondary => 1,
            SwitchRequest::QuickSwap => state.previous as i32,
            SwitchRequest::Scroll(steps) if count > 0 => {
                (state.active as i32 + steps as i32).rem_euclid(count as i32)
            }
            SwitchRequest::Scroll(steps) => steps as i32,
        };
        if index < 0 || index as usize >= count || index > u8::MAX as i32 {
            return Err(SimError::InvalidWeaponIndex { index, count });
        }
        Ok(index as u8)
    }

    /// Advance one tick: switch if allowed, then simulate the enabled weapon.
    pub fn simulate(
        &self,
        state: &mut ArsenalState,
        input: &InputRecord,
        eye: FixedVec3,
        ctx: &mut TickContext<'_>,
    ) {
        state.switch_cooldown = countdown(state.switch_cooldown, ctx.dt);

        if state.switch_cooldown == 0 {
            if let Some(request) = SwitchRequest::from_input(input) {
                match self.resolve(state, request) {
                    Ok(target) if target != state.active => self.switch_to(state, target, ctx),
                    Ok(_) => {}
                    Err(err) => debug!(actor = %ctx.actor, tick = ctx.tick, ?request, %err, "switch rejected"),
                }
            }
        }

        let active = state.active as usize;
        if let (Some(sim), Some(weapon)) = (self.weapons.get(active), state.weapons.get_mut(active)) {
            sim.simulate(state.active, weapon, input, eye, ctx);
        }
    }

    fn switch_to(&self, state: &mut ArsenalState, target: u8, ctx: &mut TickContext<'_>) {
        let old = state.active;
        let aim = state.weapons.get(old as usize).map(|w| w.last_aim);
        for weapon in &mut state.weapons {
            weapon.enabled = false;
        }
        if let Some(weapon) = state.weapons.get_mut(target as usize) {
            weapon.enabled = true;
            // Last-known aim follows the hands
            if let Some(aim) = aim {
                weapon.last_aim = aim;
            }
        }
        state.previous = old;
        state.active = target;
        state.switch_cooldown = self.switch_cooldown;
        state.switch_count = state.switch_count.wrapping_add(1);

        debug!(actor = %ctx.actor, tick = ctx.tick, from = old, to = target, "weapon switch");
        ctx.emit(SimEventData::Holstered { slot: old });
        ctx.emit(SimEventData::Equipped { slot: target });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, TICK_DURATION};
    use crate::game::events::TickEvents;
    use crate::game::health::HealthRegistry;
    use crate::game::physics::{StaticWorld, LAYER_ALL};

    fn profile(name: &str) -> WeaponProfile {
        WeaponProfile {
            name: name.into(),
            fire_rate: to_fixed(5.0),
            base_damage: to_fixed(10.0),
            clip_size: 10,
            reload_time: to_fixed(1.0),
            headshot_multiplier: to_fixed(2.0),
            range: None,
            falloff: None,
            recoil: None,
            infinite_ammo: false,
            muzzle_offset: FixedVec3::ZERO,
            hit_mask: LAYER_ALL,
        }
    }

    fn switcher(count: usize) -> WeaponSwitcher {
        let profiles: Vec<_> = (0..count).map(|i| profile(&format!("w{i}"))).collect();
        WeaponSwitcher::bind(&profiles, to_fixed(0.2))
    }

    fn step(sw: &WeaponSwitcher, state: &mut ArsenalState, input: InputRecord) -> Vec<SimEventData> {
        let world = StaticWorld::new();
        let mut health = HealthRegistry::new();
        let mut events = TickEvents::new(0);
        let mut ctx = TickContext {
            tick: 0,
            dt: TICK_DURATION,
            actor: crate::game::state::ActorId(1),
            has_authority: true,
            physics: &world,
            health: &mut health,
            events: &mut events,
        };
        sw.simulate(state, &input, FixedVec3::ZERO, &mut ctx);
        events.as_slice().iter().map(|e| e.data.clone()).collect()
    }

    fn press(button: u16) -> InputRecord {
        InputRecord::new().pressing(button)
    }

    #[test]
    fn test_spawn_enables_first() {
        let sw = switcher(3);
        let state = sw.spawn_state();
        assert_eq!(state.enabled_count(), 1);
        assert!(state.weapons[0].enabled);
    }

    #[test]
    fn test_switch_emits_holster_then_equip() {
        let sw = switcher(2);
        let mut state = sw.spawn_state();
        let events = step(&sw, &mut state, press(InputRecord::SELECT_SECONDARY));
        assert_eq!(
            events,
            vec![SimEventData::Holstered { slot: 0 }, SimEventData::Equipped { slot: 1 }]
        );
        assert_eq!(state.active, 1);
        assert_eq!(state.previous, 0);
        assert_eq!(state.enabled_count(), 1);
        assert!(state.weapons[1].enabled);
        assert_eq!(state.switch_cooldown, to_fixed(0.2));
    }

    #[test]
    fn test_last_aim_follows_switch() {
        let sw = switcher(2);
        let mut state = sw.spawn_state();
        step(&sw, &mut state, InputRecord::new().looking(FixedVec3::RIGHT));
        assert_eq!(state.weapons[0].last_aim, FixedVec3::RIGHT);

        let swap = press(InputRecord::SELECT_SECONDARY).looking(FixedVec3::ZERO);
        step(&sw, &mut state, swap);
        assert_eq!(state.active, 1);
        assert_eq!(state.weapons[1].last_aim, FixedVec3::RIGHT);
    }

    #[test]
    fn test_requests_ignored_during_cooldown() {
        let sw = switcher(2);
        let mut state = sw.spawn_state();
        step(&sw, &mut state, press(InputRecord::SELECT_SECONDARY));

        // Straight back is ignored while the cooldown runs
        let events = step(&sw, &mut state, press(InputRecord::SELECT_PRIMARY));
        assert!(events.is_empty());
        assert_eq!(state.active, 1);

        let mut ticks = 1;
        loop {
            ticks += 1;
            let events = step(&sw, &mut state, press(InputRecord::SELECT_PRIMARY));
            if !events.is_empty() {
                break;
            }
        }
        assert_eq!(state.active, 0);
        // 0.2s at 60Hz
        assert!(ticks >= 12 && ticks <= 13);
    }

    #[test]
    fn test_priority_order() {
        let sw = switcher(3);
        let mut state = sw.spawn_state();
        state.active = 2;
        state.previous = 2;

        let all = InputRecord::SELECT_PRIMARY | InputRecord::SELECT_SECONDARY | InputRecord::QUICK_SWAP;
        let input = press(all).scrolling(1);
        assert_eq!(SwitchRequest::from_input(&input), Some(SwitchRequest::Primary));
        assert_eq!(
            SwitchRequest::from_input(&press(InputRecord::QUICK_SWAP).scrolling(1)),
            Some(SwitchRequest::QuickSwap)
        );
        assert_eq!(
            SwitchRequest::from_input(&InputRecord::new().scrolling(-1)),
            Some(SwitchRequest::Scroll(-1))
        );
        assert_eq!(SwitchRequest::from_input(&InputRecord::new()), None);

        step(&sw, &mut state, input);
        assert_eq!(state.active, 0);
    }

    #[test]
    fn test_scroll_wraps() {
        let sw = switcher(3);
        let state = sw.spawn_state();
        assert_eq!(sw.resolve(&state, SwitchRequest::Scroll(-1)).unwrap(), 2);
        assert_eq!(sw.resolve(&state, SwitchRequest::Scroll(4)).unwrap(), 1);
    }

    #[test]
    fn test_quick_swap_returns_to_previous() {
        let sw = switcher(3);
        let mut state = sw.spawn_state();
        step(&sw, &mut state, InputRecord::new().scrolling(2));
        assert_eq!(state.active, 2);
        state.switch_cooldown = 0;
        step(&sw, &mut state, press(InputRecord::QUICK_SWAP));
        assert_eq!(state.active, 0);
        assert_eq!(state.previous, 2);
    }

    #[test]
    fn test_invalid_index_keeps_current() {
        let sw = switcher(1);
        let mut state = sw.spawn_state();
        assert!(matches!(
            sw.resolve(&state, SwitchRequest::Secondary),
            Err(SimError::InvalidWeaponIndex { index: 1, count: 1 })
        ));
        let events = step(&sw, &mut state, press(InputRecord::SELECT_SECONDARY));
        assert!(events.is_empty());
        assert_eq!(state.active, 0);
        assert_eq!(state.switch_count, 0);
    }

    #[test]
    fn test_only_active_weapon_simulated() {
        let sw = switcher(2);
        let mut state = sw.spawn_state();
        state.weapons[1].cooldown = to_fixed(1.0);

        step(&sw, &mut state, press(InputRecord::FIRE));
        assert_eq!(state.weapons[0].ammo, 9);
        assert_eq!(state.weapons[1].cooldown, to_fixed(1.0));
    }
}
