//! Simulation State Definitions
//!
//! Per-actor state records and the world snapshot the tick driver rolls
//! back to. Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::anim::phase::AnimPhase;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::error::SimError;
use crate::game::ability::AbilityState;
use crate::game::health::HealthRegistry;
use crate::game::movement::MovementState;
use crate::game::switching::ArsenalState;

// =============================================================================
// ACTOR ID
// =============================================================================

/// Unique actor identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

// =============================================================================
// ACTOR STATE
// =============================================================================

/// Everything Simulate needs to reproduce one actor's next tick.
///
/// Fully determined by the previous record, the tick's input record and
/// static configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    /// Owning actor
    pub id: ActorId,

    /// Tick this record was produced for
    pub tick: u32,

    /// Locomotion
    pub movement: MovementState,

    /// Blink ability
    pub ability: AbilityState,

    /// Weapons and switch scheduler
    pub arsenal: ArsenalState,

    /// Animation phase derived from movement
    pub anim_phase: AnimPhase,
}

impl ActorState {
    /// Hash this actor for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_u32(self.tick);
        self.movement.hash_into(hasher);
        self.ability.hash_into(hasher);
        self.arsenal.hash_into(hasher);
        hasher.update_u8(self.anim_phase as u8);
    }

    /// Compact state-record bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SimError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode state-record bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SimError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// =============================================================================
// WORLD SNAPSHOT
// =============================================================================

/// Post-tick state of every actor plus the health registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Last simulated tick
    pub tick: u32,

    /// All actors (BTreeMap for deterministic iteration)
    pub actors: BTreeMap<ActorId, ActorState>,

    /// Health authority state
    pub health: HealthRegistry,
}

impl WorldSnapshot {
    /// Empty world at `tick`.
    pub fn new(tick: u32) -> Self {
        Self { tick, actors: BTreeMap::new(), health: HealthRegistry::new() }
    }

    /// Get actor by ID.
    pub fn actor(&self, id: ActorId) -> Option<&ActorState> {
        self.actors.get(&id)
    }

    /// Compute deterministic state hash.
    ///
    /// Used for rollback verification and replay checks.
    pub fn compute_hash(&self, seed: u64) -> StateHash {
        compute_state_hash(self.tick, seed, |hasher| {
            hasher.update_u32(self.actors.len() as u32);
            for actor in self.actors.values() {
                actor.hash_into(hasher);
            }
            self.health.hash_into(hasher);
        })
    }

    /// Compact snapshot bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SimError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode snapshot bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SimError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// =============================================================================
// STATE RING
// =============================================================================

/// Bounded history of world snapshots keyed by tick.
///
/// Snapshots older than the retention window are retired.
#[derive(Clone, Debug)]
pub struct StateRing {
    capacity: usize,
    snapshots: BTreeMap<u32, WorldSnapshot>,
}

impl StateRing {
    /// Create a ring retaining at most `capacity` snapshots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), snapshots: BTreeMap::new() }
    }

    /// Store a snapshot, replacing any existing one for the same tick.
    pub fn push(&mut self, snapshot: WorldSnapshot) {
        self.snapshots.insert(snapshot.tick, snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_first();
        }
    }

    /// Snapshot taken after `tick`.
    pub fn get(&self, tick: u32) -> Option<&WorldSnapshot> {
        self.snapshots.get(&tick)
    }

    /// Drop every snapshot after `tick`.
    pub fn truncate_after(&mut self, tick: u32) {
        self.snapshots.split_off(&(tick + 1));
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Oldest retained tick.
    pub fn oldest_tick(&self) -> Option<u32> {
        self.snapshots.keys().next().copied()
    }

    /// Newest retained tick.
    pub fn latest_tick(&self) -> Option<u32> {
        self.snapshots.keys().next_back().copied()
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Nothing retained?
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Retention window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// =============================================================================
// TESTS
// =============================================================================
