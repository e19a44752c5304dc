//! Local Tick Driver
//!
//! Stands in for the prediction framework: advances predicted ticks,
//! rolls back to a corrected state and resimulates from recorded inputs,
//! and releases events once ticks are confirmed.
//!
//! Every tick runs the same way whether predicted or resimulated:
//! hurtboxes are synced from start-of-tick positions, then actors are
//! simulated in id order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info, trace, warn};

use crate::config::SimConfig;
use crate::core::fixed::Fixed;
use crate::core::hash::StateHash;
use crate::core::vec3::FixedVec3;
use crate::error::SimError;
use crate::game::actor::Actor;
use crate::game::events::{EventChannel, SimEvent, SimEventData, TickEvents};
use crate::game::health::HealthAuthority;
use crate::game::input::{InputHistory, InputRecord};
use crate::game::physics::PhysicsWorld;
use crate::game::state::{ActorId, ActorState, StateRing, WorldSnapshot};

// =============================================================================
// TICK CONTEXT
// =============================================================================

/// Everything a Simulate routine may touch besides its own record.
///
/// No engine handles: physics is query-only and health goes through the
/// injected authority.
pub struct TickContext<'a> {
    /// Tick being simulated
    pub tick: u32,
    /// Tick length in seconds
    pub dt: Fixed,
    /// Actor being simulated
    pub actor: ActorId,
    /// Running the authoritative path (health may change)
    pub has_authority: bool,
    /// Deterministic physics queries
    pub physics: &'a dyn PhysicsWorld,
    /// Health authority
    pub health: &'a mut dyn HealthAuthority,
    /// Event sink for this tick
    pub events: &'a mut TickEvents,
}

impl TickContext<'_> {
    /// Emit an event for the actor being simulated.
    #[inline]
    pub fn emit(&mut self, data: SimEventData) {
        self.events.emit(self.actor, data);
    }
}

/// Callbacks around simulated ticks (animation capture/restore).
pub trait TickHooks {
    /// After a tick has been simulated, predicted or resimulated.
    fn after_tick(&mut self, _world: &WorldSnapshot, _dt: Fixed) {}

    /// Before resimulation starts; `base` is the state being rolled back to.
    fn before_resimulate(&mut self, _base: &WorldSnapshot) {}
}

impl TickHooks for () {}

// =============================================================================
// INPUTS AND CORRECTIONS
// =============================================================================

/// Inputs for one tick, keyed by actor.
pub type TickInputs = BTreeMap<ActorId, InputRecord>;

/// Input used for one actor on one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RecordedInput {
    record: InputRecord,
    /// Predicted from the previous tick rather than received
    extrapolated: bool,
}

/// Server correction.
#[derive(Clone, Debug, Default)]
pub struct Correction {
    /// First tick to resimulate
    pub tick: u32,
    /// Authoritative state after `tick - 1` (ring snapshot used when absent)
    pub snapshot: Option<WorldSnapshot>,
    /// Authoritative inputs, by tick, replacing what was predicted
    pub inputs: BTreeMap<u32, TickInputs>,
}

/// Where an actor starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnPoint {
    /// Actor id
    pub id: ActorId,
    /// Feet position
    pub position: FixedVec3,
    /// Initial facing
    pub facing: FixedVec3,
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Deterministic multi-actor simulation with rollback.
pub struct Simulation<P: PhysicsWorld> {
    config: SimConfig,
    seed: u64,
    dt: Fixed,
    physics: P,
    actors: BTreeMap<ActorId, Actor>,
    despawned: BTreeSet<ActorId>,
    world: WorldSnapshot,
    ring: StateRing,
    inputs: BTreeMap<u32, BTreeMap<ActorId, RecordedInput>>,
    events: EventChannel,
    histories: BTreeMap<ActorId, InputHistory>,
    authority: bool,
}

impl<P: PhysicsWorld> Simulation<P> {
    /// Create an empty simulation at tick 0.
    pub fn new(config: SimConfig, physics: P, seed: u64) -> Self {
        let dt = config.tick_duration();
        let mut ring = StateRing::new(config.state_ring_capacity);
        let world = WorldSnapshot::new(0);
        ring.push(world.clone());
        Self {
            config,
            seed,
            dt,
            physics,
            actors: BTreeMap::new(),
            despawned: BTreeSet::new(),
            world,
            ring,
            inputs: BTreeMap::new(),
            events: EventChannel::new(),
            histories: BTreeMap::new(),
            authority: true,
        }
    }

    /// Session seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Last simulated tick.
    pub fn tick(&self) -> u32 {
        self.world.tick
    }

    /// Tick length.
    pub fn dt(&self) -> Fixed {
        self.dt
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Physics world.
    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// Run the authoritative path (health changes) or predict only.
    pub fn set_authority(&mut self, authority: bool) {
        self.authority = authority;
    }

    /// Current world state.
    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.world
    }

    /// Current record of one actor.
    pub fn state(&self, id: ActorId) -> Result<&ActorState, SimError> {
        self.world.actor(id).ok_or_else(|| self.missing(id))
    }

    /// Actor aggregate.
    pub fn actor(&self, id: ActorId) -> Result<&Actor, SimError> {
        self.actors.get(&id).ok_or_else(|| self.missing(id))
    }

    /// Hash of the current world.
    pub fn compute_hash(&self) -> StateHash {
        self.world.compute_hash(self.seed)
    }

    /// Confirmed input recordings.
    pub fn histories(&self) -> &BTreeMap<ActorId, InputHistory> {
        &self.histories
    }

    /// Retained snapshot history.
    pub fn ring(&self) -> &StateRing {
        &self.ring
    }

    /// Events recorded but not yet confirmed.
    pub fn pending_events(&self) -> usize {
        self.events.pending_count()
    }

    /// Spawn an actor at the current tick.
    ///
    /// Rollback cannot cross a spawn: the snapshot ring restarts here.
    pub fn spawn(&mut self, point: SpawnPoint) -> Result<(), SimError> {
        if self.actors.contains_key(&point.id) {
            return Err(SimError::AlreadySpawned(point.id));
        }

        let mut actor = Actor::construct(point.id);
        actor.bind(&self.config)?;
        let mut state = actor.spawn_state(point.position, point.facing)?;
        state.tick = self.world.tick;
        actor.ready(&mut state, &self.physics)?;

        self.physics.sync_actor(point.id, state.movement.position);
        self.world.health.register(point.id, self.config.max_health);
        self.world.actors.insert(point.id, state);
        self.actors.insert(point.id, actor);
        self.despawned.remove(&point.id);
        self.histories
            .insert(point.id, InputHistory::new(point.id, self.seed, self.world.tick + 1));
        self.reset_rollback_floor();

        info!(actor = %point.id, tick = self.world.tick, "spawned");
        Ok(())
    }

    /// Remove an actor. Rollback cannot cross a despawn either.
    pub fn despawn(&mut self, id: ActorId) -> Result<(), SimError> {
        let mut actor = self.actors.remove(&id).ok_or_else(|| self.missing(id))?;
        actor.despawn()?;
        self.world.actors.remove(&id);
        self.world.health.remove(id);
        self.physics.remove_actor(id);
        for inputs in self.inputs.values_mut() {
            inputs.remove(&id);
        }
        if let Some(history) = self.histories.get_mut(&id) {
            history.finalize(self.world.tick);
        }
        self.despawned.insert(id);
        self.reset_rollback_floor();

        info!(actor = %id, tick = self.world.tick, "despawned");
        Ok(())
    }

    /// Simulate the next tick. Actors without an input are extrapolated from
    /// their previous input with every one-shot field cleared.
    pub fn advance(&mut self, inputs: &TickInputs) -> u32 {
        self.advance_with(inputs, &mut ())
    }

    /// [`Simulation::advance`] with hooks.
    pub fn advance_with(&mut self, inputs: &TickInputs, hooks: &mut dyn TickHooks) -> u32 {
        let tick = self.world.tick + 1;

        for id in inputs.keys() {
            if !self.actors.contains_key(id) {
                warn!(actor = %id, tick, "input for unknown actor ignored");
            }
        }

        let mut recorded = BTreeMap::new();
        for id in self.actors.keys() {
            let entry = match inputs.get(id) {
                Some(record) => RecordedInput { record: record.sanitize(), extrapolated: false },
                None => RecordedInput { record: self.extrapolate(*id, tick), extrapolated: true },
            };
            recorded.insert(*id, entry);
        }
        self.inputs.insert(tick, recorded);

        self.step(tick);
        hooks.after_tick(&self.world, self.dt);
        tick
    }

    /// Roll back to a corrected state and resimulate up to the current tick.
    pub fn rollback(&mut self, correction: Correction) -> Result<(), SimError> {
        self.rollback_with(correction, &mut ())
    }

    /// [`Simulation::rollback`] with hooks.
    pub fn rollback_with(
        &mut self,
        correction: Correction,
        hooks: &mut dyn TickHooks,
    ) -> Result<(), SimError> {
        let current = self.world.tick;
        let target = correction.tick;
        if target == 0 || target > current {
            return Err(SimError::RollbackAhead { target, current });
        }
        let base_tick = target - 1;

        let (base, corrected) = match correction.snapshot {
            Some(snapshot) if snapshot.tick == base_tick => (snapshot, true),
            other => {
                if let Some(snapshot) = other {
                    warn!(got = snapshot.tick, expected = base_tick, "correction snapshot for the wrong tick ignored");
                }
                let local = self.ring.get(base_tick).cloned().ok_or(SimError::SnapshotMissing(base_tick))?;
                (local, false)
            }
        };
        if self.events.is_confirmed(target) {
            warn!(target, "rolling back into confirmed ticks; their events will not be re-sent");
        }

        for (tick, tick_inputs) in correction.inputs {
            if tick < target || tick > current {
                warn!(tick, target, current, "correction input outside the resimulated range ignored");
                continue;
            }
            let recorded = self.inputs.entry(tick).or_default();
            for (id, record) in tick_inputs {
                if self.actors.contains_key(&id) {
                    recorded.insert(id, RecordedInput { record: record.sanitize(), extrapolated: false });
                }
            }
        }

        debug!(from = target, to = current, "resimulating");
        self.world = base;
        self.ring.truncate_after(base_tick);
        if corrected {
            self.ring.push(self.world.clone());
        }
        hooks.before_resimulate(&self.world);

        for tick in target..=current {
            // Predictions are redone from the (possibly corrected) previous input
            let ids: Vec<ActorId> = self.actors.keys().copied().collect();
            for id in ids {
                let predicted = self
                    .inputs
                    .get(&tick)
                    .and_then(|m| m.get(&id))
                    .map_or(true, |r| r.extrapolated);
                if predicted {
                    let record = self.extrapolate(id, tick);
                    self.inputs
                        .entry(tick)
                        .or_default()
                        .insert(id, RecordedInput { record, extrapolated: true });
                }
            }
            self.step(tick);
            hooks.after_tick(&self.world, self.dt);
        }
        Ok(())
    }

    /// Confirm every tick up to `through`: release their events once and
    /// append their inputs to the input histories.
    pub fn confirm(&mut self, through: u32) -> Vec<SimEvent> {
        let through = through.min(self.world.tick);
        let first = self.events.confirmed_through().map_or(0, |c| c + 1);
        if first > through {
            return Vec::new();
        }

        for tick in first..=through {
            let Some(recorded) = self.inputs.get(&tick) else {
                continue;
            };
            for (id, input) in recorded {
                if let Some(history) = self.histories.get_mut(id) {
                    history.record(tick, input.record);
                }
            }
        }

        // Inputs older than the oldest snapshot can no longer be resimulated
        if let Some(oldest) = self.ring.oldest_tick() {
            let keep_from = oldest.min(through + 1);
            self.inputs = self.inputs.split_off(&keep_from);
        }

        self.events.confirm(through)
    }

    /// One tick, predicted or resimulated.
    fn step(&mut self, tick: u32) {
        for (id, state) in &self.world.actors {
            self.physics.sync_actor(*id, state.movement.position);
        }

        let empty = BTreeMap::new();
        let inputs = self.inputs.get(&tick).unwrap_or(&empty);
        let mut events = TickEvents::new(tick);

        for (id, actor) in &self.actors {
            let Some(state) = self.world.actors.get_mut(id) else {
                error!(actor = %id, tick, "actor has no state record; skipped");
                continue;
            };
            let input = inputs.get(id).map(|r| r.record).unwrap_or_default();
            let mut ctx = TickContext {
                tick,
                dt: self.dt,
                actor: *id,
                has_authority: self.authority,
                physics: &self.physics,
                health: &mut self.world.health,
                events: &mut events,
            };
            if let Err(err) = actor.simulate(state, &input, &mut ctx) {
                error!(actor = %id, tick, %err, "simulate failed; actor skipped this tick");
            }
        }

        self.world.tick = tick;
        trace!(tick, events = events.len(), "tick simulated");
        self.events.record(tick, events.into_sorted());
        self.ring.push(self.world.clone());
    }

    /// Previous tick's input for `id` with one-shot fields cleared.
    fn extrapolate(&self, id: ActorId, tick: u32) -> InputRecord {
        tick.checked_sub(1)
            .and_then(|prev| self.inputs.get(&prev))
            .and_then(|m| m.get(&id))
            .map(|r| r.record)
            .unwrap_or_default()
            .mask_extrapolated()
    }

    fn reset_rollback_floor(&mut self) {
        self.ring.clear();
        self.ring.push(self.world.clone());
    }

    fn missing(&self, id: ActorId) -> SimError {
        if self.despawned.contains(&id) {
            SimError::Despawned(id)
        } else {
            SimError::UnknownActor(id)
        }
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// Replay confirmed input histories straight through from tick 0.
///
/// Returns the final world. Used to verify that predicted, rolled-back and
/// resimulated sessions converge on the same state.
pub fn replay<P: PhysicsWorld>(
    config: SimConfig,
    physics: P,
    seed: u64,
    spawns: &[SpawnPoint],
    histories: &BTreeMap<ActorId, InputHistory>,
    through: u32,
) -> Result<WorldSnapshot, SimError> {
    let mut sim = Simulation::new(config, physics, seed);
    for point in spawns {
        sim.spawn(*point)?;
    }

    for tick in 1..=through {
        let inputs: TickInputs = histories
            .iter()
            .map(|(id, history)| (*id, history.get_input_at(tick)))
            .collect();
        sim.advance(&inputs);
    }

    Ok(sim.world)
}

// =============================================================================
// TESTS
// =============================================================================
