//! Health Authority
//!
//! Hit resolution never owns health. It calls [`HealthAuthority::change_health`]
//! on an injected registry keyed by actor id. The registry is part of the world
//! snapshot, so a rolled-back tick restores health before it is re-applied.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, fixed_min};
use crate::core::hash::StateHasher;
use crate::game::state::ActorId;

/// Outcome of a health change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthChange {
    /// Actor whose health changed
    pub target: ActorId,
    /// Health before the change
    pub previous: Fixed,
    /// Health after the change
    pub current: Fixed,
    /// True only on the change that killed the target
    pub died: bool,
}

/// Authority over actor health.
pub trait HealthAuthority {
    /// Apply `amount` (negative = damage) to `target`.
    ///
    /// Returns `None` for unknown or already-dead targets.
    fn change_health(
        &mut self,
        target: ActorId,
        amount: Fixed,
        instigator: Option<ActorId>,
    ) -> Option<HealthChange>;
}

/// Health of one actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEntry {
    /// Current health
    pub health: Fixed,
    /// Maximum health
    pub max_health: Fixed,
    /// Still alive?
    pub alive: bool,
    /// Number of times this actor has died
    pub deaths: u32,
    /// Who dealt the last damage
    pub last_instigator: Option<ActorId>,
}

/// Registry of actor health (BTreeMap for deterministic iteration).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRegistry {
    entries: BTreeMap<ActorId, HealthEntry>,
}

impl HealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor at full health.
    pub fn register(&mut self, actor: ActorId, max_health: Fixed) {
        self.entries.insert(actor, HealthEntry {
            health: max_health,
            max_health,
            alive: true,
            deaths: 0,
            last_instigator: None,
        });
    }

    /// Remove an actor.
    pub fn remove(&mut self, actor: ActorId) {
        self.entries.remove(&actor);
    }

    /// Look up an actor's entry.
    pub fn get(&self, actor: ActorId) -> Option<&HealthEntry> {
        self.entries.get(&actor)
    }

    /// Current health, if registered.
    pub fn health(&self, actor: ActorId) -> Option<Fixed> {
        self.entries.get(&actor).map(|e| e.health)
    }

    /// Is the actor registered and alive?
    pub fn is_alive(&self, actor: ActorId) -> bool {
        self.entries.get(&actor).is_some_and(|e| e.alive)
    }

    /// Restore a dead actor to full health.
    pub fn revive(&mut self, actor: ActorId) {
        if let Some(entry) = self.entries.get_mut(&actor) {
            entry.health = entry.max_health;
            entry.alive = true;
        }
    }

    /// Hash all entries in id order.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        for (id, entry) in &self.entries {
            hasher.update_u32(id.0);
            hasher.update_fixed(entry.health);
            hasher.update_bool(entry.alive);
            hasher.update_u32(entry.deaths);
        }
    }
}

impl HealthAuthority for HealthRegistry {
    fn change_health(
        &mut self,
        target: ActorId,
        amount: Fixed,
        instigator: Option<ActorId>,
    ) -> Option<HealthChange> {
        let entry = self.entries.get_mut(&target)?;
        if !entry.alive {
            return None;
        }

        let previous = entry.health;
        entry.health = fixed_min(entry.max_health, previous.saturating_add(amount));
        if amount < 0 {
            entry.last_instigator = instigator;
        }

        let died = entry.health <= 0;
        if died {
            entry.health = 0;
            entry.alive = false;
            entry.deaths += 1;
        }

        Some(HealthChange { target, previous, current: entry.health, died })
    }
}
