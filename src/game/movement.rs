//! Movement Simulation
//!
//! Grounded/airborne/jump state machine with ledge compensation, slope
//! handling and a swept blink. Everything here is a pure function of the
//! previous [`MovementState`], the tick's [`InputRecord`], the tick delta,
//! [`MovementConfig`] and deterministic physics queries.

use serde::{Serialize, Deserialize};
use tracing::{trace, warn};

use crate::core::fixed::{
    self, Fixed, FIXED_ONE, DEFAULT_GRAVITY,
    countdown, fixed_clamp, fixed_max, fixed_min, fixed_mul, to_fixed,
};
use crate::core::hash::StateHasher;
use crate::core::vec3::FixedVec3;
use crate::game::events::SimEventData;
use crate::game::input::InputRecord;
use crate::game::physics::{ColliderMask, PhysicsWorld, LAYER_WORLD};
use crate::game::tick::TickContext;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Static locomotion tuning. Written as decimals in configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Top horizontal speed (units/s)
    #[serde(with = "fixed::decimal")]
    pub max_speed: Fixed,
    /// Horizontal acceleration toward the wished velocity (units/s²)
    #[serde(with = "fixed::decimal")]
    pub acceleration: Fixed,
    /// Grounded deceleration with no input (units/s²)
    #[serde(with = "fixed::decimal")]
    pub deceleration: Fixed,
    /// Downward acceleration (units/s²)
    #[serde(with = "fixed::decimal")]
    pub gravity: Fixed,
    /// Terminal fall speed
    #[serde(with = "fixed::decimal")]
    pub max_fall_speed: Fixed,
    /// Upward speed cap
    #[serde(with = "fixed::decimal")]
    pub max_rise_speed: Fixed,
    /// Vertical velocity applied by a jump
    #[serde(with = "fixed::decimal")]
    pub jump_impulse: Fixed,
    /// Seconds between jumps
    #[serde(with = "fixed::decimal")]
    pub jump_cooldown: Fixed,
    /// Radius of the feet overlap sphere
    #[serde(with = "fixed::decimal")]
    pub ground_probe_radius: Fixed,
    /// How far below the feet the probe sphere reaches
    #[serde(with = "fixed::decimal")]
    pub ground_probe_depth: Fixed,
    /// Length of the ground-normal ray below the probe sphere
    #[serde(with = "fixed::decimal")]
    pub ground_ray_length: Fixed,
    /// Length of the secondary ledge ray
    #[serde(with = "fixed::decimal")]
    pub ledge_probe_distance: Fixed,
    /// Corrective downward speed after a ledge re-assert
    #[serde(with = "fixed::decimal")]
    pub ledge_snap_speed: Fixed,
    /// Smallest ground-normal Y still treated as walkable
    #[serde(with = "fixed::decimal")]
    pub min_ground_normal_y: Fixed,
    /// Seconds gravity stays counteracted on a slope after input stops
    #[serde(with = "fixed::decimal")]
    pub slope_stick_time: Fixed,
    /// Blink distance
    #[serde(with = "fixed::decimal")]
    pub teleport_distance: Fixed,
    /// Capsule radius used by the blink sweep
    #[serde(with = "fixed::decimal")]
    pub capsule_radius: Fixed,
    /// Capsule height used by the blink sweep
    #[serde(with = "fixed::decimal")]
    pub capsule_height: Fixed,
    /// Gap kept between the capsule and whatever stopped the blink
    #[serde(with = "fixed::decimal")]
    pub skin_width: Fixed,
    /// Camera height above the feet
    #[serde(with = "fixed::decimal")]
    pub eye_height: Fixed,
    /// Layers the ground probe and blink sweep see
    pub ground_mask: ColliderMask,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_speed: to_fixed(6.0),
            acceleration: to_fixed(40.0),
            deceleration: to_fixed(30.0),
            gravity: DEFAULT_GRAVITY,
            max_fall_speed: to_fixed(30.0),
            max_rise_speed: to_fixed(12.0),
            jump_impulse: to_fixed(7.0),
            jump_cooldown: to_fixed(0.25),
            ground_probe_radius: to_fixed(0.2),
            ground_probe_depth: to_fixed(0.05),
            ground_ray_length: to_fixed(0.3),
            ledge_probe_distance: to_fixed(0.5),
            ledge_snap_speed: to_fixed(4.0),
            min_ground_normal_y: to_fixed(0.7),
            slope_stick_time: to_fixed(0.2),
            teleport_distance: to_fixed(8.0),
            capsule_radius: to_fixed(0.4),
            capsule_height: to_fixed(1.8),
            skin_width: to_fixed(0.05),
            eye_height: to_fixed(1.6),
            ground_mask: LAYER_WORLD,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Locomotion mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum MoveMode {
    /// Standing or walking on walkable ground
    Grounded = 0,
    /// Falling or coasting
    #[default]
    Airborne = 1,
    /// Jump impulse applied, not yet observed airborne
    Jumping = 2,
}

/// Blink request queued by the ability, consumed by the next movement tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportRequest {
    /// Ability press that produced the request
    pub press_id: u32,
}

/// Movement sub-state of an actor record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementState {
    /// Feet position
    pub position: FixedVec3,
    /// Velocity (units/s)
    pub velocity: FixedVec3,
    /// Horizontal unit facing (yaw only)
    pub facing: FixedVec3,
    /// Ground probe result this tick
    pub grounded: bool,
    /// Ground probe result last tick
    pub was_grounded: bool,
    /// Locomotion mode
    pub mode: MoveMode,
    /// Seconds until the next jump is allowed
    pub jump_cooldown: Fixed,
    /// Seconds of slope stick left after input stopped
    pub slope_stick: Fixed,
    /// Normal of the ground below the feet (UP when unknown)
    pub ground_normal: FixedVec3,
    /// Set for exactly one tick on the landing edge
    pub landed: bool,
    /// Blink waiting to be resolved
    pub pending_teleport: Option<TeleportRequest>,
    /// Press id of the last blink resolved
    pub last_teleport_press: Option<u32>,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            position: FixedVec3::ZERO,
            velocity: FixedVec3::ZERO,
            facing: FixedVec3::FORWARD,
            grounded: false,
            was_grounded: false,
            mode: MoveMode::Airborne,
            jump_cooldown: 0,
            slope_stick: 0,
            ground_normal: FixedVec3::UP,
            landed: false,
            pending_teleport: None,
            last_teleport_press: None,
        }
    }
}

impl MovementState {
    /// State standing at `position` facing `facing`.
    pub fn at(position: FixedVec3, facing: FixedVec3) -> Self {
        let facing = facing.horizontal().normalize();
        Self {
            position,
            facing: if facing.is_zero() { FixedVec3::FORWARD } else { facing },
            ..Self::default()
        }
    }

    /// Horizontal speed.
    pub fn horizontal_speed(&self) -> Fixed {
        self.velocity.horizontal().length()
    }

    /// Queue a blink for the next tick.
    pub fn enqueue_teleport(&mut self, request: TeleportRequest) {
        self.pending_teleport = Some(request);
    }

    /// Hash for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_vec3(self.position);
        hasher.update_vec3(self.velocity);
        hasher.update_vec3(self.facing);
        hasher.update_bool(self.grounded);
        hasher.update_bool(self.was_grounded);
        hasher.update_u8(self.mode as u8);
        hasher.update_fixed(self.jump_cooldown);
        hasher.update_fixed(self.slope_stick);
        hasher.update_vec3(self.ground_normal);
        hasher.update_bool(self.landed);
        hasher.update_u32(self.pending_teleport.map_or(0, |t| t.press_id.wrapping_add(1)));
        hasher.update_u32(self.last_teleport_press.map_or(0, |p| p.wrapping_add(1)));
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Result of the feet probe.
#[derive(Clone, Copy, Debug)]
struct GroundProbe {
    grounded: bool,
    normal: FixedVec3,
}

/// Movement component bound to its configuration.
#[derive(Clone, Debug)]
pub struct MovementSim {
    config: MovementConfig,
}

impl MovementSim {
    /// Bind a configuration. Misconfiguration is logged once here.
    pub fn bind(config: MovementConfig) -> Self {
        if config.ground_mask == 0 {
            warn!("movement ground_mask is empty; ground probe disabled, grounded state is retained");
        }
        if config.min_ground_normal_y > FIXED_ONE {
            warn!("movement min_ground_normal_y exceeds 1; no surface counts as walkable slope");
        }
        if config.max_speed <= 0 {
            warn!("movement max_speed is not positive; actors cannot walk");
        }
        Self { config }
    }

    /// Bound configuration.
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Camera position for a state.
    pub fn eye_position(&self, state: &MovementState) -> FixedVec3 {
        state.position.with_y(state.position.y + self.config.eye_height)
    }

    /// First-tick initialisation: seed grounded/mode from the probe
    /// without emitting a landing.
    pub fn init_ground(&self, state: &mut MovementState, physics: &dyn PhysicsWorld) {
        let probe = self.probe_ground(state, physics);
        state.grounded = probe.grounded;
        state.was_grounded = probe.grounded;
        state.ground_normal = probe.normal;
        state.mode = if probe.grounded { MoveMode::Grounded } else { MoveMode::Airborne };
    }

    /// Advance one tick.
    pub fn simulate(&self, state: &mut MovementState, input: &InputRecord, ctx: &mut TickContext<'_>) {
        let cfg = &self.config;
        let dt = ctx.dt;
        let prev_grounded = state.grounded;

        state.jump_cooldown = countdown(state.jump_cooldown, dt);
        let facing = facing_from_look(input.look, state.facing);

        // 1. Ground probe
        let mut probe = self.probe_ground(state, ctx.physics);

        // 2. Ledge-fall compensation
        if !probe.grounded && prev_grounded && state.jump_cooldown == 0 {
            if let Some(normal) = self.ledge_ray(state, ctx.physics) {
                probe = GroundProbe { grounded: true, normal };
                state.velocity.y = fixed_min(state.velocity.y, -cfg.ledge_snap_speed);
                trace!(actor = %ctx.actor, tick = ctx.tick, "ledge compensation re-asserted ground");
            }
        }
        let grounded = probe.grounded;
        state.ground_normal = probe.normal;

        // 3. Slope handling
        let has_input = input.has_movement();
        let on_walkable = grounded && probe.normal.y >= cfg.min_ground_normal_y;
        if on_walkable {
            state.slope_stick = if has_input {
                cfg.slope_stick_time
            } else {
                countdown(state.slope_stick, dt)
            };
        } else {
            state.slope_stick = 0;
        }
        let mut counteract_gravity = on_walkable && (has_input || state.slope_stick > 0);

        let mut target = wish_direction(input, facing).scale(cfg.max_speed);
        if on_walkable && !target.is_zero() {
            let speed = target.length();
            target = target.project_on_plane(probe.normal).normalize().scale(speed);
        }

        // 4. Acceleration
        let rate = match (grounded, has_input) {
            (true, true) => cfg.acceleration,
            (true, false) => cfg.deceleration,
            (false, _) => cfg.acceleration >> 1,
        };
        let max_delta = fixed_mul(rate, dt);
        if counteract_gravity {
            state.velocity = state.velocity.move_towards(target, max_delta);
        } else {
            let horizontal = state.velocity.horizontal().move_towards(target.horizontal(), max_delta);
            state.velocity = horizontal.with_y(state.velocity.y);
        }

        // 5. Clamps
        self.clamp_velocity(state);

        // 6. Jump
        if grounded && input.jump_pressed() && state.jump_cooldown == 0 {
            state.velocity.y = fixed_min(cfg.jump_impulse, cfg.max_rise_speed);
            state.mode = MoveMode::Jumping;
            state.jump_cooldown = cfg.jump_cooldown;
            counteract_gravity = false;
            ctx.emit(SimEventData::Jumped);
        }

        // 7. Integration
        self.integrate(state, counteract_gravity, dt, ctx.physics);

        // 8. Landing detection
        let landed = !prev_grounded && grounded;
        state.landed = landed;
        if landed {
            state.mode = MoveMode::Grounded;
            ctx.emit(SimEventData::Landed);
        }

        // 9. State reconciliation
        if !grounded && state.mode != MoveMode::Airborne {
            trace!(actor = %ctx.actor, tick = ctx.tick, from = ?state.mode, "now airborne");
            state.mode = MoveMode::Airborne;
        }
        state.was_grounded = prev_grounded;
        state.grounded = grounded;

        // 10. Teleport
        self.resolve_teleport(state, facing, ctx);

        // 11. Yaw
        state.facing = facing;
    }

    fn probe_ground(&self, state: &MovementState, physics: &dyn PhysicsWorld) -> GroundProbe {
        let cfg = &self.config;
        if cfg.ground_mask == 0 {
            return GroundProbe { grounded: state.grounded, normal: state.ground_normal };
        }

        let feet = state.position;
        let center = feet.with_y(feet.y + cfg.ground_probe_radius - cfg.ground_probe_depth);
        let grounded = physics.overlap_sphere(center, cfg.ground_probe_radius, cfg.ground_mask);

        let normal = if grounded {
            let origin = feet.with_y(feet.y + cfg.ground_probe_radius);
            physics
                .raycast(
                    origin,
                    FixedVec3::DOWN,
                    cfg.ground_probe_radius + cfg.ground_ray_length,
                    cfg.ground_mask,
                    None,
                )
                .map_or(FixedVec3::UP, |hit| hit.normal)
        } else {
            FixedVec3::UP
        };

        GroundProbe { grounded, normal }
    }

    /// Secondary downward ray; returns the ground normal on a walkable hit.
    fn ledge_ray(&self, state: &MovementState, physics: &dyn PhysicsWorld) -> Option<FixedVec3> {
        let cfg = &self.config;
        if cfg.ground_mask == 0 {
            return None;
        }
        physics
            .raycast(state.position, FixedVec3::DOWN, cfg.ledge_probe_distance, cfg.ground_mask, None)
            .filter(|hit| hit.normal.y >= cfg.min_ground_normal_y)
            .map(|hit| hit.normal)
    }

    fn clamp_velocity(&self, state: &mut MovementState) {
        let cfg = &self.config;
        let horizontal = state.velocity.horizontal().clamp_length(cfg.max_speed);
        let vertical = fixed_clamp(state.velocity.y, -cfg.max_fall_speed, cfg.max_rise_speed);
        state.velocity = horizontal.with_y(vertical);
    }

    /// Gravity, position update and ground clamp.
    fn integrate(
        &self,
        state: &mut MovementState,
        counteract_gravity: bool,
        dt: Fixed,
        physics: &dyn PhysicsWorld,
    ) {
        let cfg = &self.config;
        if !counteract_gravity {
            state.velocity.y = fixed_max(
                state.velocity.y.saturating_sub(fixed_mul(cfg.gravity, dt)),
                -cfg.max_fall_speed,
            );
        }

        let old = state.position;
        let mut next = old + state.velocity.scale(dt);

        // Ground clamp: never end a tick below a walkable surface
        if state.velocity.y <= 0 && cfg.ground_mask != 0 {
            let top = fixed_max(old.y, next.y) + cfg.ground_ray_length;
            let origin = next.with_y(top);
            if let Some(hit) =
                physics.raycast(origin, FixedVec3::DOWN, top - next.y, cfg.ground_mask, None)
            {
                if hit.normal.y >= cfg.min_ground_normal_y && hit.position.y > next.y {
                    next.y = hit.position.y;
                    state.velocity.y = 0;
                }
            }
        }

        state.position = next;
    }

    fn resolve_teleport(&self, state: &mut MovementState, facing: FixedVec3, ctx: &mut TickContext<'_>) {
        let Some(request) = state.pending_teleport.take() else {
            return;
        };
        if state.last_teleport_press == Some(request.press_id) {
            return;
        }

        let cfg = &self.config;
        let from = state.position;
        let travel = ctx
            .physics
            .sweep_capsule(
                from,
                facing,
                cfg.teleport_distance,
                cfg.capsule_radius,
                cfg.capsule_height,
                cfg.ground_mask,
            )
            .map_or(cfg.teleport_distance, |hit| fixed_max(0, hit.distance - cfg.skin_width));

        state.position = from + facing.scale(travel);
        state.velocity = FixedVec3::ZERO;
        state.last_teleport_press = Some(request.press_id);
        ctx.emit(SimEventData::Teleported { from, to: state.position });
    }
}

/// Yaw from the horizontal part of the transmitted look; pitch is dropped.
fn facing_from_look(look: FixedVec3, previous: FixedVec3) -> FixedVec3 {
    let flat = look.horizontal();
    if flat.is_zero() {
        return previous;
    }
    let facing = flat.normalize();
    if facing.is_zero() { previous } else { facing }
}

/// Unit-or-shorter world-space move direction for the facing basis.
fn wish_direction(input: &InputRecord, facing: FixedVec3) -> FixedVec3 {
    let (strafe, forward) = input.move_axes();
    let right = FixedVec3::new(facing.z, 0, -facing.x);
    (facing.scale(forward) + right.scale(strafe)).clamp_length(FIXED_ONE)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::TICK_DURATION;
    use crate::game::events::TickEvents;
    use crate::game::health::HealthRegistry;
    use crate::game::physics::{slab_height_at, Aabb, Slab, StaticWorld};
    use crate::game::state::ActorId;

    fn v(x: f64, y: f64, z: f64) -> FixedVec3 {
        FixedVec3::new(to_fixed(x), to_fixed(y), to_fixed(z))
    }

    /// Run one tick and return the events it emitted.
    fn step(
        sim: &MovementSim,
        state: &mut MovementState,
        input: InputRecord,
        world: &StaticWorld,
        tick: u32,
    ) -> Vec<SimEventData> {
        let mut health = HealthRegistry::new();
        let mut events = TickEvents::new(tick);
        let mut ctx = TickContext {
            tick,
            dt: TICK_DURATION,
            actor: ActorId(1),
            has_authority: true,
            physics: world,
            health: &mut health,
            events: &mut events,
        };
        sim.simulate(state, &input.sanitize(), &mut ctx);
        events.as_slice().iter().map(|e| e.data.clone()).collect()
    }

    fn grounded_actor(world: &StaticWorld, sim: &MovementSim) -> MovementState {
        let mut state = MovementState::at(FixedVec3::ZERO, FixedVec3::FORWARD);
        sim.init_ground(&mut state, world);
        state
    }

    #[test]
    fn test_idle_on_floor_stays_put() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);
        assert_eq!(state.mode, MoveMode::Grounded);

        for tick in 1..=120 {
            let events = step(&sim, &mut state, InputRecord::new(), &world, tick);
            assert!(events.is_empty());
        }
        assert_eq!(state.position, FixedVec3::ZERO);
        assert_eq!(state.mode, MoveMode::Grounded);
        assert!(state.grounded);
    }

    #[test]
    fn test_walk_reaches_max_speed() {
        let world = StaticWorld::flat_arena(to_fixed(100.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);
        let forward = InputRecord::with_movement(0, 127);

        for tick in 1..=60 {
            step(&sim, &mut state, forward, &world, tick);
        }
        let max = sim.config().max_speed;
        assert!(state.horizontal_speed() <= max);
        assert!(state.horizontal_speed() >= max - 64);
        assert!(state.position.z > to_fixed(4.0));
        assert_eq!(state.position.y, 0);

        // Releasing the stick decelerates to rest
        for tick in 61..=120 {
            step(&sim, &mut state, InputRecord::new(), &world, tick);
        }
        assert_eq!(state.horizontal_speed(), 0);
    }

    #[test]
    fn test_strafe_uses_facing_basis() {
        let world = StaticWorld::flat_arena(to_fixed(100.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);
        let strafe_right = InputRecord::with_movement(127, 0).looking(FixedVec3::FORWARD);

        for tick in 1..=30 {
            step(&sim, &mut state, strafe_right, &world, tick);
        }
        assert!(state.position.x > 0);
        assert_eq!(state.position.z, 0);
    }

    #[test]
    fn test_jump_and_land_once() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);

        let events = step(&sim, &mut state, InputRecord::new().pressing(InputRecord::JUMP), &world, 1);
        assert_eq!(events, vec![SimEventData::Jumped]);
        assert_eq!(state.mode, MoveMode::Jumping);
        assert!(state.velocity.y > 0);

        let mut landings = 0;
        let mut saw_airborne = false;
        for tick in 2..=120 {
            let events = step(&sim, &mut state, InputRecord::new(), &world, tick);
            landings += events.iter().filter(|e| **e == SimEventData::Landed).count();
            saw_airborne |= state.mode == MoveMode::Airborne;
            if state.landed {
                assert_eq!(state.mode, MoveMode::Grounded);
            }
        }
        assert!(saw_airborne);
        assert_eq!(landings, 1);
        assert_eq!(state.mode, MoveMode::Grounded);
        assert_eq!(state.position.y, 0);
    }

    #[test]
    fn test_jump_respects_cooldown() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);
        state.jump_cooldown = to_fixed(1.0);

        let events = step(&sim, &mut state, InputRecord::new().pressing(InputRecord::JUMP), &world, 1);
        assert!(events.is_empty());
        assert_eq!(state.mode, MoveMode::Grounded);
    }

    #[test]
    fn test_ledge_compensation_keeps_ground() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());

        // Grounded last tick, now hovering just above a lower step
        let mut state = MovementState::at(v(0.0, 0.2, 0.0), FixedVec3::FORWARD);
        state.grounded = true;
        state.mode = MoveMode::Grounded;

        let events = step(&sim, &mut state, InputRecord::new(), &world, 1);
        assert!(events.is_empty());
        assert!(state.grounded);
        assert_eq!(state.mode, MoveMode::Grounded);
        assert!(state.position.y < to_fixed(0.2));
    }

    #[test]
    fn test_no_ledge_compensation_during_jump_cooldown() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());

        let mut state = MovementState::at(v(0.0, 0.2, 0.0), FixedVec3::FORWARD);
        state.grounded = true;
        state.mode = MoveMode::Jumping;
        state.jump_cooldown = to_fixed(0.2);

        step(&sim, &mut state, InputRecord::new(), &world, 1);
        assert!(!state.grounded);
        assert_eq!(state.mode, MoveMode::Airborne);
    }

    #[test]
    fn test_jumping_lands_only_on_edge() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());

        // Jumping while the probe still touches: no landing, no Grounded
        let mut state = grounded_actor(&world, &sim);
        state.mode = MoveMode::Jumping;
        state.jump_cooldown = to_fixed(0.2);
        let events = step(&sim, &mut state, InputRecord::new(), &world, 1);
        assert!(events.is_empty());
        assert_eq!(state.mode, MoveMode::Jumping);
    }

    #[test]
    fn test_walk_up_slope() {
        let normal = v(0.0, 1.0, -0.5).normalize();
        let slope = Slab::inclined(FixedVec3::ZERO, normal, v(-20.0, 0.0, -20.0), v(20.0, 0.0, 20.0));
        let world = StaticWorld::new().with_slab(slope);
        let sim = MovementSim::bind(MovementConfig::default());

        let mut state = MovementState::at(FixedVec3::ZERO, FixedVec3::FORWARD);
        sim.init_ground(&mut state, &world);
        assert!(state.grounded);

        let uphill = InputRecord::with_movement(0, 127);
        for tick in 1..=60 {
            step(&sim, &mut state, uphill, &world, tick);
        }
        assert_eq!(state.mode, MoveMode::Grounded);
        assert!(state.position.y > to_fixed(1.0));
        let surface = slab_height_at(&slope, state.position.x, state.position.z);
        assert!((state.position.y - surface).abs() < to_fixed(0.1));
    }

    #[test]
    fn test_slope_stick_holds_after_release() {
        let normal = v(0.0, 1.0, -0.5).normalize();
        let slope = Slab::inclined(FixedVec3::ZERO, normal, v(-20.0, 0.0, -20.0), v(20.0, 0.0, 20.0));
        let world = StaticWorld::new().with_slab(slope);
        let sim = MovementSim::bind(MovementConfig::default());

        let mut state = MovementState::at(FixedVec3::ZERO, FixedVec3::FORWARD);
        sim.init_ground(&mut state, &world);
        let uphill = InputRecord::with_movement(0, 127);
        for tick in 1..=60 {
            step(&sim, &mut state, uphill, &world, tick);
        }
        assert_eq!(state.slope_stick, sim.config().slope_stick_time);

        // Stick window: counts down while the actor coasts in the slope plane
        let mut tick = 61;
        let mut stuck = 0;
        while state.slope_stick > 0 {
            let before = state.slope_stick;
            let z = state.position.z;
            step(&sim, &mut state, InputRecord::new(), &world, tick);
            tick += 1;
            assert_eq!(state.slope_stick, countdown(before, TICK_DURATION));
            assert!(state.position.z >= z);
            if state.slope_stick > 0 {
                stuck += 1;
                assert!(state.grounded);
                assert!(state.velocity.dot(state.ground_normal).abs() < to_fixed(0.02));
            }
        }
        // 0.2s at 60Hz
        assert_eq!(stuck, 12);

        // Afterwards the actor settles and never slides back down
        for t in tick..tick + 60 {
            let z = state.position.z;
            step(&sim, &mut state, InputRecord::new(), &world, t);
            assert!(state.position.z >= z);
            assert_eq!(state.slope_stick, 0);
        }
        let rest = state.position;
        for t in tick + 60..tick + 120 {
            step(&sim, &mut state, InputRecord::new(), &world, t);
        }
        assert_eq!(state.horizontal_speed(), 0);
        assert_eq!((state.position.x, state.position.z), (rest.x, rest.z));
        assert_eq!(state.mode, MoveMode::Grounded);
        let surface = slab_height_at(&slope, state.position.x, state.position.z);
        assert!((state.position.y - surface).abs() < to_fixed(0.02));
    }

    #[test]
    fn test_teleport_once_per_press() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);
        state.velocity = v(1.0, 0.0, 1.0);

        state.enqueue_teleport(TeleportRequest { press_id: 1 });
        let events = step(&sim, &mut state, InputRecord::new(), &world, 1);
        assert!(matches!(events.last(), Some(SimEventData::Teleported { .. })));
        assert_eq!(state.velocity, FixedVec3::ZERO);
        let after_first = state.position;
        assert!((after_first.z - to_fixed(8.0)).abs() < to_fixed(0.05));

        // Same press again is ignored
        state.enqueue_teleport(TeleportRequest { press_id: 1 });
        step(&sim, &mut state, InputRecord::new(), &world, 2);
        assert_eq!(state.position, after_first);
        assert!(state.pending_teleport.is_none());
    }

    #[test]
    fn test_teleport_stops_before_wall() {
        let world = StaticWorld::flat_arena(to_fixed(50.0))
            .with_box(Aabb::new(v(-5.0, 0.0, 4.0), v(5.0, 3.0, 5.0)));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);

        state.enqueue_teleport(TeleportRequest { press_id: 7 });
        step(&sim, &mut state, InputRecord::new(), &world, 1);
        // Capsule front stops short of the wall by the skin width
        assert!(state.position.z < to_fixed(3.6));
        assert!(state.position.z > to_fixed(3.4));
    }

    #[test]
    fn test_yaw_ignores_pitch() {
        let world = StaticWorld::flat_arena(to_fixed(50.0));
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = grounded_actor(&world, &sim);

        let look = v(1.0, 1.0, 0.0).normalize();
        step(&sim, &mut state, InputRecord::new().looking(look), &world, 1);
        assert_eq!(state.facing.y, 0);
        assert!((state.facing.x - FIXED_ONE).abs() <= 4);

        // Looking straight up keeps the previous yaw
        let before = state.facing;
        step(&sim, &mut state, InputRecord::new().looking(FixedVec3::UP), &world, 2);
        assert_eq!(state.facing, before);
    }

    #[test]
    fn test_empty_ground_mask_retains_grounded() {
        let world = StaticWorld::new();
        let config = MovementConfig { ground_mask: 0, ..MovementConfig::default() };
        let sim = MovementSim::bind(config);

        let mut state = MovementState::at(v(0.0, 10.0, 0.0), FixedVec3::FORWARD);
        state.grounded = true;
        state.mode = MoveMode::Grounded;
        step(&sim, &mut state, InputRecord::new(), &world, 1);
        assert!(state.grounded);
        assert_eq!(state.mode, MoveMode::Grounded);
    }

    #[test]
    fn test_fall_speed_clamped() {
        let world = StaticWorld::new();
        let sim = MovementSim::bind(MovementConfig::default());
        let mut state = MovementState::at(v(0.0, 1000.0, 0.0), FixedVec3::FORWARD);
        for tick in 1..=600 {
            step(&sim, &mut state, InputRecord::new(), &world, tick);
        }
        assert_eq!(state.velocity.y, -sim.config().max_fall_speed);
        assert_eq!(state.mode, MoveMode::Airborne);
    }
}
