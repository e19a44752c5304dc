//! Weapon Combat Simulation
//!
//! One generic hit-scan weapon parameterized by a data-only
//! [`WeaponProfile`]. Per-tick order:
//!
//! 1. relax recoil
//! 2. finish a reload in progress
//! 3. count down the fire cooldown
//! 4. start an automatic or manual reload
//! 5. bail out unless firing
//! 6. fire: ray cast, damage, ammo
//! 7. recoil kick
//! 8. shot/hit events

use serde::{Serialize, Deserialize};
use tracing::{trace, warn};

use crate::core::fixed::{
    self, Fixed, FIXED_ONE, FALLOFF_DISTANCE,
    countdown, fixed_clamp, fixed_div, fixed_lerp, fixed_mul, fixed_round, from_int, to_fixed,
};
use crate::core::hash::StateHasher;
use crate::core::vec3::{self, FixedVec3};
use crate::game::events::{HitInfo, SimEventData};
use crate::game::input::InputRecord;
use crate::game::physics::{ColliderMask, HitboxPart, RayHit, LAYER_ALL};
use crate::game::recoil::{RecoilOffset, RecoilProfile};
use crate::game::tick::TickContext;

/// Ray length used when a profile has no range limit.
pub const UNLIMITED_RANGE: Fixed = to_fixed(1000.0);

// =============================================================================
// PROFILE
// =============================================================================

/// One key of a damage falloff curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FalloffKey {
    /// Curve parameter (distance / 100)
    #[serde(with = "fixed::decimal")]
    pub t: Fixed,
    /// Damage scale at `t`
    #[serde(with = "fixed::decimal")]
    pub value: Fixed,
}

/// Piecewise-linear damage falloff over [0, 1].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FalloffCurve {
    /// Keys in ascending `t` order
    pub keys: Vec<FalloffKey>,
}

impl FalloffCurve {
    /// Build from `(t, value)` pairs, sorting by `t`.
    pub fn from_points(points: &[(Fixed, Fixed)]) -> Self {
        let mut keys: Vec<FalloffKey> =
            points.iter().map(|&(t, value)| FalloffKey { t, value }).collect();
        keys.sort_by_key(|k| k.t);
        Self { keys }
    }

    /// Evaluate at `t`; flat beyond the first and last keys, 1 when empty.
    pub fn evaluate(&self, t: Fixed) -> Fixed {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return FIXED_ONE;
        };
        if t <= first.t {
            return first.value;
        }
        if t >= last.t {
            return last.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0 {
                    return b.value;
                }
                return fixed_lerp(a.value, b.value, fixed_div(t - a.t, span));
            }
        }
        last.value
    }
}

fn default_hit_mask() -> ColliderMask {
    LAYER_ALL
}

/// Data-only weapon description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponProfile {
    /// Display name
    pub name: String,
    /// Shots per second
    #[serde(with = "fixed::decimal")]
    pub fire_rate: Fixed,
    /// Damage of a body hit before falloff
    #[serde(with = "fixed::decimal")]
    pub base_damage: Fixed,
    /// Rounds per clip
    pub clip_size: u32,
    /// Seconds to reload
    #[serde(with = "fixed::decimal")]
    pub reload_time: Fixed,
    /// Head hit multiplier
    #[serde(with = "fixed::decimal")]
    pub headshot_multiplier: Fixed,
    /// Maximum ray length (unlimited when absent)
    #[serde(default, with = "fixed::decimal::option")]
    pub range: Option<Fixed>,
    /// Distance falloff (none = flat damage)
    #[serde(default)]
    pub falloff: Option<FalloffCurve>,
    /// Recoil tuning (none = recoil disabled)
    #[serde(default)]
    pub recoil: Option<RecoilProfile>,
    /// Never consumes ammo
    #[serde(default)]
    pub infinite_ammo: bool,
    /// Camera-relative muzzle position (x right, y up, z forward)
    #[serde(default, with = "vec3::decimal")]
    pub muzzle_offset: FixedVec3,
    /// Layers the shot ray sees
    #[serde(default = "default_hit_mask")]
    pub hit_mask: ColliderMask,
}

impl WeaponProfile {
    /// Seconds between shots.
    pub fn fire_interval(&self) -> Fixed {
        fixed_div(FIXED_ONE, self.fire_rate)
    }

    /// Damage of a head hit: rounded, and strictly above the base when the
    /// multiplier exceeds 1.
    pub fn headshot_damage(&self) -> Fixed {
        let rounded = from_int(fixed_round(fixed_mul(self.base_damage, self.headshot_multiplier)));
        if self.headshot_multiplier > FIXED_ONE && rounded <= self.base_damage {
            self.base_damage + FIXED_ONE
        } else {
            rounded
        }
    }

    /// Damage of a body hit at `distance`.
    pub fn body_damage(&self, distance: Fixed) -> Fixed {
        match &self.falloff {
            Some(curve) => {
                let t = fixed_clamp(fixed_div(distance, FALLOFF_DISTANCE), 0, FIXED_ONE);
                let scale = fixed_clamp(curve.evaluate(t), 0, FIXED_ONE);
                fixed_mul(self.base_damage, scale)
            }
            None => self.base_damage,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Per-weapon sub-state of an actor record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponState {
    /// Seconds until the next shot
    pub cooldown: Fixed,
    /// Seconds of reload left
    pub reload_timer: Fixed,
    /// Reload in progress
    pub reloading: bool,
    /// Rounds in the clip
    pub ammo: u32,
    /// Accumulated recoil
    pub recoil: RecoilOffset,
    /// Shots fired (recoil noise counter)
    pub shot_count: u32,
    /// Last aim direction seen
    pub last_aim: FixedVec3,
    /// Drawn and simulated
    pub enabled: bool,
}

impl WeaponState {
    /// Fresh state with a full clip.
    pub fn for_profile(profile: &WeaponProfile) -> Self {
        Self {
            cooldown: 0,
            reload_timer: 0,
            reloading: false,
            ammo: profile.clip_size,
            recoil: RecoilOffset::ZERO,
            shot_count: 0,
            last_aim: FixedVec3::FORWARD,
            enabled: false,
        }
    }

    /// Hash for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.cooldown);
        hasher.update_fixed(self.reload_timer);
        hasher.update_bool(self.reloading);
        hasher.update_u32(self.ammo);
        self.recoil.hash_into(hasher);
        hasher.update_u32(self.shot_count);
        hasher.update_vec3(self.last_aim);
        hasher.update_bool(self.enabled);
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Weapon component bound to a profile.
#[derive(Clone, Debug)]
pub struct WeaponSim {
    profile: WeaponProfile,
}

impl WeaponSim {
    /// Bind a profile. Misconfiguration is logged once here.
    pub fn bind(profile: WeaponProfile) -> Self {
        if profile.recoil.is_none() {
            warn!(weapon = %profile.name, "no recoil profile; recoil disabled");
        }
        if profile.fire_rate <= 0 {
            warn!(weapon = %profile.name, "fire rate is not positive; no fire cooldown");
        }
        if profile.clip_size == 0 && !profile.infinite_ammo {
            warn!(weapon = %profile.name, "clip size is zero; weapon can never fire");
        }
        Self { profile }
    }

    /// Bound profile.
    pub fn profile(&self) -> &WeaponProfile {
        &self.profile
    }

    /// Fresh state for this weapon.
    pub fn spawn_state(&self) -> WeaponState {
        WeaponState::for_profile(&self.profile)
    }

    /// Advance one tick. `eye` is the shooter's camera position this tick.
    pub fn simulate(
        &self,
        slot: u8,
        state: &mut WeaponState,
        input: &InputRecord,
        eye: FixedVec3,
        ctx: &mut TickContext<'_>,
    ) {
        let profile = &self.profile;
        let dt = ctx.dt;
        let aim = if input.look.is_zero() { state.last_aim } else { input.look };
        state.last_aim = aim;

        // 1. Relax recoil
        if let Some(recoil) = &profile.recoil {
            state.recoil = state.recoil.relax(recoil.relax_factor(dt));
        }

        // 2. Reload in progress
        if state.reloading {
            state.reload_timer = countdown(state.reload_timer, dt);
            if state.reload_timer == 0 {
                state.ammo = profile.clip_size;
                state.reloading = false;
                ctx.emit(SimEventData::ReloadCompleted { slot });
            }
            return;
        }

        // 3. Fire cooldown (an empty clip still reaches the reload check)
        let empty = state.ammo == 0 && !profile.infinite_ammo;
        if state.cooldown > 0 {
            state.cooldown = countdown(state.cooldown, dt);
            if !empty {
                return;
            }
        }

        // 4. Automatic or manual reload
        let manual = input.reload_pressed() && state.ammo < profile.clip_size && !profile.infinite_ammo;
        if empty || manual {
            state.reloading = true;
            state.reload_timer = profile.reload_time;
            ctx.emit(SimEventData::ReloadStarted { slot });
            return;
        }

        // 5. Fire requested?
        if !input.fire_pressed() || (state.ammo == 0 && !profile.infinite_ammo) {
            return;
        }

        // 6. Fire
        state.cooldown = profile.fire_interval();
        let origin = eye + muzzle_world_offset(profile.muzzle_offset, aim);
        let range = profile.range.unwrap_or(UNLIMITED_RANGE);
        let hit = ctx.physics.raycast(origin, aim, range, profile.hit_mask, Some(ctx.actor));
        let hit_info = hit.map(|hit| self.resolve_hit(hit, ctx));
        if !profile.infinite_ammo {
            state.ammo -= 1;
        }

        // 7. Recoil
        if let Some(recoil) = &profile.recoil {
            state.recoil = state.recoil.add(recoil.kick(state.shot_count));
        }
        state.shot_count = state.shot_count.wrapping_add(1);

        // 8. Events
        trace!(actor = %ctx.actor, tick = ctx.tick, weapon = %profile.name, ammo = state.ammo, "shot");
        ctx.emit(SimEventData::Shot { slot, origin, direction: aim });
        if let Some(info) = hit_info {
            ctx.emit(SimEventData::Hit(info));
        }
    }

    /// Damage a struck actor (authority path only) and describe the hit.
    fn resolve_hit(&self, hit: RayHit, ctx: &mut TickContext<'_>) -> HitInfo {
        let is_headshot = hit.actor.is_some() && hit.part == Some(HitboxPart::Head);
        let damage = match hit.actor {
            Some(_) if is_headshot => self.profile.headshot_damage(),
            Some(_) => self.profile.body_damage(hit.distance),
            None => 0,
        };

        if let (Some(target), true) = (hit.actor, ctx.has_authority) {
            let shooter = ctx.actor;
            if let Some(change) = ctx.health.change_health(target, -damage, Some(shooter)) {
                if change.died {
                    ctx.emit(SimEventData::Died { victim: target, instigator: Some(shooter) });
                }
            }
        }

        HitInfo {
            position: hit.position,
            hit_actor: hit.actor,
            is_headshot,
            surface_normal: hit.normal,
            damage,
        }
    }
}

/// Rotate a camera-relative offset into world space around `aim`.
fn muzzle_world_offset(offset: FixedVec3, aim: FixedVec3) -> FixedVec3 {
    if offset.is_zero() {
        return FixedVec3::ZERO;
    }
    let mut right = FixedVec3::new(aim.z, 0, -aim.x).normalize();
    if right.is_zero() {
        right = FixedVec3::RIGHT;
    }
    let up = aim.cross(right);
    right.scale(offset.x) + up.scale(offset.y) + aim.scale(offset.z)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::TICK_DURATION;
    use crate::game::events::TickEvents;
    use crate::game::health::{HealthAuthority, HealthRegistry};
    use crate::game::physics::{PhysicsWorld, StaticWorld};
    use crate::game::state::ActorId;

    fn rifle() -> WeaponProfile {
        WeaponProfile {
            name: "rifle".into(),
            fire_rate: to_fixed(10.0),
            base_damage: to_fixed(20.0),
            clip_size: 3,
            reload_time: to_fixed(0.5),
            headshot_multiplier: to_fixed(2.0),
            range: None,
            falloff: None,
            recoil: Some(RecoilProfile {
                seed: to_fixed(12.345),
                pitch_kick: to_fixed(1.0),
                yaw_range: to_fixed(0.5),
                roll_range: to_fixed(0.25),
                relax_rate: to_fixed(5.0),
            }),
            infinite_ammo: false,
            muzzle_offset: FixedVec3::ZERO,
            hit_mask: LAYER_ALL,
        }
    }

    struct Rig {
        world: StaticWorld,
        health: HealthRegistry,
        tick: u32,
    }

    impl Rig {
        fn new() -> Self {
            Self { world: StaticWorld::flat_arena(to_fixed(100.0)), health: HealthRegistry::new(), tick: 0 }
        }

        fn step(&mut self, sim: &WeaponSim, state: &mut WeaponState, input: InputRecord, authority: bool) -> Vec<SimEventData> {
            self.tick += 1;
            let mut events = TickEvents::new(self.tick);
            let mut ctx = TickContext {
                tick: self.tick,
                dt: TICK_DURATION,
                actor: ActorId(1),
                has_authority: authority,
                physics: &self.world,
                health: &mut self.health,
                events: &mut events,
            };
            let eye = FixedVec3::new(0, to_fixed(1.6), 0);
            sim.simulate(0, state, &input.sanitize(), eye, &mut ctx);
            events.as_slice().iter().map(|e| e.data.clone()).collect()
        }
    }

    fn fire() -> InputRecord {
        InputRecord::new().pressing(InputRecord::FIRE)
    }

    #[test]
    fn test_fire_consumes_ammo_and_sets_cooldown() {
        let sim = WeaponSim::bind(rifle());
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();

        let events = rig.step(&sim, &mut state, fire(), true);
        assert_eq!(state.ammo, 2);
        assert_eq!(state.cooldown, sim.profile().fire_interval());
        assert_eq!(state.shot_count, 1);
        assert!(matches!(events[0], SimEventData::Shot { slot: 0, .. }));

        // Cooldown blocks the next shot
        rig.step(&sim, &mut state, fire(), true);
        assert_eq!(state.ammo, 2);
    }

    #[test]
    fn test_empty_clip_reloads_automatically() {
        let profile = WeaponProfile { clip_size: 1, ..rifle() };
        let sim = WeaponSim::bind(profile);
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();

        rig.step(&sim, &mut state, fire(), true);
        assert_eq!(state.ammo, 0);
        assert!(!state.reloading);

        let events = rig.step(&sim, &mut state, fire(), true);
        assert_eq!(events, vec![SimEventData::ReloadStarted { slot: 0 }]);
        assert!(state.reloading);

        // Firing never succeeds while reloading
        let mut completed = false;
        for _ in 0..40 {
            let events = rig.step(&sim, &mut state, fire(), true);
            assert!(!events.iter().any(|e| matches!(e, SimEventData::Shot { .. })) || completed);
            if events.contains(&SimEventData::ReloadCompleted { slot: 0 }) {
                completed = true;
                assert_eq!(state.ammo, 1);
            }
        }
        assert!(completed);
    }

    #[test]
    fn test_manual_reload_only_when_not_full() {
        let sim = WeaponSim::bind(rifle());
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();
        let reload = InputRecord::new().pressing(InputRecord::RELOAD);

        assert!(rig.step(&sim, &mut state, reload, true).is_empty());
        assert!(!state.reloading);

        rig.step(&sim, &mut state, fire(), true);
        for _ in 0..10 {
            rig.step(&sim, &mut state, InputRecord::new(), true);
        }
        let events = rig.step(&sim, &mut state, reload, true);
        assert_eq!(events, vec![SimEventData::ReloadStarted { slot: 0 }]);
    }

    #[test]
    fn test_infinite_ammo_never_depletes() {
        let profile = WeaponProfile { infinite_ammo: true, clip_size: 1, ..rifle() };
        let sim = WeaponSim::bind(profile);
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();

        let mut shots = 0;
        for _ in 0..60 {
            let events = rig.step(&sim, &mut state, fire(), true);
            shots += events.iter().filter(|e| matches!(e, SimEventData::Shot { .. })).count();
        }
        assert!(shots >= 5);
        assert_eq!(state.ammo, 1);
        assert!(!state.reloading);
    }

    #[test]
    fn test_headshot_beats_body_shot() {
        let sim = WeaponSim::bind(rifle());
        let mut rig = Rig::new();
        rig.health.register(ActorId(2), to_fixed(500.0));
        rig.world.sync_actor(ActorId(2), FixedVec3::new(0, 0, to_fixed(10.0)));
        let shape = rig.world.hurtbox();

        // Eye is at 1.6, the head sphere center is at 1.6 too
        let mut state = sim.spawn_state();
        let events = rig.step(&sim, &mut state, fire(), true);
        let SimEventData::Hit(head) = events[1].clone() else { panic!("expected hit") };
        assert!(head.is_headshot);
        assert_eq!(head.hit_actor, Some(ActorId(2)));
        assert_eq!(head.damage, to_fixed(40.0));
        assert_eq!(rig.health.health(ActorId(2)), Some(to_fixed(460.0)));

        // Aim slightly down at the body
        let body_aim = FixedVec3::new(0, shape.body_height - to_fixed(1.6), to_fixed(10.0)).normalize();
        let mut state = sim.spawn_state();
        let events = rig.step(&sim, &mut state, fire().looking(body_aim), true);
        let SimEventData::Hit(body) = events[1].clone() else { panic!("expected hit") };
        assert!(!body.is_headshot);
        assert!(head.damage > body.damage);
    }

    #[test]
    fn test_headshot_strictly_exceeds_base() {
        let profile = WeaponProfile {
            base_damage: to_fixed(10.0),
            headshot_multiplier: to_fixed(1.01),
            ..rifle()
        };
        assert!(profile.headshot_damage() > profile.body_damage(0));
        assert_eq!(rifle().headshot_damage(), to_fixed(40.0));
    }

    #[test]
    fn test_falloff_scales_body_damage() {
        let profile = WeaponProfile {
            falloff: Some(FalloffCurve::from_points(&[
                (0, FIXED_ONE),
                (FIXED_ONE, FIXED_ONE / 2),
            ])),
            ..rifle()
        };
        assert_eq!(profile.body_damage(0), to_fixed(20.0));
        assert_eq!(profile.body_damage(to_fixed(100.0)), to_fixed(10.0));
        assert_eq!(profile.body_damage(to_fixed(500.0)), to_fixed(10.0));
        let mid = profile.body_damage(to_fixed(50.0));
        assert!(mid > to_fixed(14.9) && mid < to_fixed(15.1));
    }

    #[test]
    fn test_damage_only_on_authority_path() {
        let sim = WeaponSim::bind(rifle());
        let mut rig = Rig::new();
        rig.health.register(ActorId(2), to_fixed(100.0));
        rig.world.sync_actor(ActorId(2), FixedVec3::new(0, 0, to_fixed(10.0)));

        let mut state = sim.spawn_state();
        let events = rig.step(&sim, &mut state, fire(), false);
        assert!(events.iter().any(|e| matches!(e, SimEventData::Hit(_))));
        assert_eq!(rig.health.health(ActorId(2)), Some(to_fixed(100.0)));
    }

    #[test]
    fn test_kill_emits_died_once() {
        let sim = WeaponSim::bind(rifle());
        let mut rig = Rig::new();
        rig.health.register(ActorId(2), to_fixed(30.0));
        rig.world.sync_actor(ActorId(2), FixedVec3::new(0, 0, to_fixed(10.0)));

        let mut deaths = 0;
        let mut state = sim.spawn_state();
        for _ in 0..30 {
            let events = rig.step(&sim, &mut state, fire(), true);
            deaths += events.iter().filter(|e| matches!(e, SimEventData::Died { .. })).count();
        }
        assert_eq!(deaths, 1);
        assert!(!rig.health.is_alive(ActorId(2)));
        assert!(rig.health.change_health(ActorId(2), -FIXED_ONE, None).is_none());
    }

    #[test]
    fn test_missing_recoil_profile_is_noop() {
        let sim = WeaponSim::bind(WeaponProfile { recoil: None, ..rifle() });
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();
        rig.step(&sim, &mut state, fire(), true);
        assert!(state.recoil.is_zero());
        assert_eq!(state.shot_count, 1);
    }

    #[test]
    fn test_recoil_accumulates_and_relaxes() {
        let sim = WeaponSim::bind(rifle());
        let mut state = sim.spawn_state();
        let mut rig = Rig::new();
        rig.step(&sim, &mut state, fire(), true);
        assert_eq!(state.recoil, sim.profile().recoil.as_ref().unwrap().kick(0));

        for _ in 0..120 {
            rig.step(&sim, &mut state, InputRecord::new(), true);
        }
        assert!(state.recoil.pitch.abs() < to_fixed(0.01));
    }

    #[test]
    fn test_muzzle_offset_rotates_with_aim() {
        let offset = FixedVec3::new(to_fixed(0.1), 0, to_fixed(0.5));
        let forward = muzzle_world_offset(offset, FixedVec3::FORWARD);
        assert_eq!(forward, offset);

        let right = muzzle_world_offset(offset, FixedVec3::RIGHT);
        assert_eq!(right.x, to_fixed(0.5));
        assert_eq!(right.z, -to_fixed(0.1));
    }
}
