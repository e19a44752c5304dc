//! Simulation Events
//!
//! Events generated during Simulate, plus the replay-safe channel that
//! hands them to the outside world.
//!
//! A tick may be simulated many times (prediction, then once per rollback
//! that covers it). Its events are recorded each time, replacing the
//! previous pass, and released exactly once when the tick is confirmed.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::core::fixed::Fixed;
use crate::core::vec3::FixedVec3;
use crate::game::state::ActorId;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Deaths processed first
    Death = 0,
    /// Then damage
    Damage = 1,
    /// Then shots and reloads
    Weapon = 2,
    /// Then weapon switches
    Switch = 3,
    /// Then abilities
    Ability = 4,
    /// Then locomotion
    Movement = 5,
    /// Lowest priority
    Other = 255,
}

/// Hit-scan result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitInfo {
    /// World-space hit point
    pub position: FixedVec3,
    /// Actor struck, if any
    pub hit_actor: Option<ActorId>,
    /// Struck the head volume
    pub is_headshot: bool,
    /// Surface normal at the hit point
    pub surface_normal: FixedVec3,
    /// Damage resolved for this hit (0 for world hits)
    pub damage: Fixed,
}

/// Event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventData {
    /// Grounded edge observed
    Landed,

    /// Jump impulse applied
    Jumped,

    /// Blink resolved
    Teleported {
        from: FixedVec3,
        to: FixedVec3,
    },

    /// A weapon fired
    Shot {
        slot: u8,
        origin: FixedVec3,
        direction: FixedVec3,
    },

    /// A shot struck something
    Hit(HitInfo),

    /// Reload began (manual or automatic)
    ReloadStarted {
        slot: u8,
    },

    /// Reload finished, clip refilled
    ReloadCompleted {
        slot: u8,
    },

    /// Weapon put away
    Holstered {
        slot: u8,
    },

    /// Weapon drawn
    Equipped {
        slot: u8,
    },

    /// Ability activated
    AbilityFired {
        press_id: u32,
    },

    /// An actor's health reached zero
    Died {
        victim: ActorId,
        instigator: Option<ActorId>,
    },
}

impl SimEventData {
    /// Processing priority for this kind of event.
    pub fn priority(&self) -> EventPriority {
        match self {
            SimEventData::Died { .. } => EventPriority::Death,
            SimEventData::Hit(_) => EventPriority::Damage,
            SimEventData::Shot { .. }
            | SimEventData::ReloadStarted { .. }
            | SimEventData::ReloadCompleted { .. } => EventPriority::Weapon,
            SimEventData::Holstered { .. } | SimEventData::Equipped { .. } => EventPriority::Switch,
            SimEventData::AbilityFired { .. } => EventPriority::Ability,
            SimEventData::Landed | SimEventData::Jumped | SimEventData::Teleported { .. } => {
                EventPriority::Movement
            }
        }
    }
}

/// A simulation event with timing and priority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Actor whose Simulate produced it
    pub actor: ActorId,

    /// Emission order within the tick (tie-breaker)
    pub seq: u32,

    /// Event data
    pub data: SimEventData,
}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then actor, then emission order
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.actor.cmp(&other.actor))
            .then(self.seq.cmp(&other.seq))
    }
}

// =============================================================================
// PER-TICK COLLECTOR
// =============================================================================

/// Events emitted while simulating one tick.
#[derive(Clone, Debug, Default)]
pub struct TickEvents {
    tick: u32,
    events: Vec<SimEvent>,
}

impl TickEvents {
    /// Start collecting for a tick.
    pub fn new(tick: u32) -> Self {
        Self { tick, events: Vec::new() }
    }

    /// Tick being collected.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Record an event for `actor`.
    pub fn emit(&mut self, actor: ActorId, data: SimEventData) {
        let seq = self.events.len() as u32;
        self.events.push(SimEvent {
            tick: self.tick,
            priority: data.priority(),
            actor,
            seq,
            data,
        });
    }

    /// Events so far, in emission order.
    pub fn as_slice(&self) -> &[SimEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// No events?
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finish collecting; events come back in processing order.
    pub fn into_sorted(mut self) -> Vec<SimEvent> {
        self.events.sort();
        self.events
    }
}

// =============================================================================
// REPLAY-SAFE CHANNEL
// =============================================================================

/// Holds each tick's events until the tick is confirmed.
///
/// - `record` replaces whatever an earlier pass recorded for that tick.
/// - `confirm` releases ticks once, in tick order.
/// - Ticks at or before the confirmation point are never recorded again.
#[derive(Clone, Debug, Default)]
pub struct EventChannel {
    pending: BTreeMap<u32, Vec<SimEvent>>,
    confirmed_through: Option<u32>,
}

impl EventChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the events produced by a (re)simulation of `tick`.
    pub fn record(&mut self, tick: u32, events: Vec<SimEvent>) {
        if self.is_confirmed(tick) {
            trace!(tick, count = events.len(), "dropping events for already confirmed tick");
            return;
        }
        if events.is_empty() {
            self.pending.remove(&tick);
        } else {
            self.pending.insert(tick, events);
        }
    }

    /// Release every pending event up to and including `tick`.
    pub fn confirm(&mut self, tick: u32) -> Vec<SimEvent> {
        if self.is_confirmed(tick) {
            return Vec::new();
        }
        let later = self.pending.split_off(&(tick + 1));
        let released = std::mem::replace(&mut self.pending, later);
        self.confirmed_through = Some(tick);
        released.into_values().flatten().collect()
    }

    /// Has `tick` already been confirmed?
    pub fn is_confirmed(&self, tick: u32) -> bool {
        self.confirmed_through.is_some_and(|c| tick <= c)
    }

    /// Last confirmed tick.
    pub fn confirmed_through(&self) -> Option<u32> {
        self.confirmed_through
    }

    /// Events waiting for confirmation.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let mut events = TickEvents::new(10);
        events.emit(ActorId(2), SimEventData::Landed);
        events.emit(ActorId(1), SimEventData::Holstered { slot: 0 });
        events.emit(ActorId(1), SimEventData::Equipped { slot: 1 });
        events.emit(ActorId(2), SimEventData::Died { victim: ActorId(1), instigator: None });

        let sorted = events.into_sorted();
        assert!(matches!(sorted[0].data, SimEventData::Died { .. }));
        // Same priority and actor: emission order kept
        assert_eq!(sorted[1].data, SimEventData::Holstered { slot: 0 });
        assert_eq!(sorted[2].data, SimEventData::Equipped { slot: 1 });
        assert_eq!(sorted[3].data, SimEventData::Landed);
    }

    fn landed(tick: u32) -> Vec<SimEvent> {
        let mut events = TickEvents::new(tick);
        events.emit(ActorId(1), SimEventData::Landed);
        events.into_sorted()
    }

    #[test]
    fn test_channel_replaces_on_resimulation() {
        let mut channel = EventChannel::new();
        channel.record(5, landed(5));
        channel.record(5, landed(5));
        channel.record(5, landed(5));
        assert_eq!(channel.pending_count(), 1);

        // A resimulation that no longer produces the event drops it
        channel.record(5, Vec::new());
        assert_eq!(channel.pending_count(), 0);
    }

    #[test]
    fn test_channel_confirms_once() {
        let mut channel = EventChannel::new();
        channel.record(1, landed(1));
        channel.record(2, landed(2));
        channel.record(3, landed(3));

        let released = channel.confirm(2);
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].tick, 1);
        assert_eq!(released[1].tick, 2);
        assert_eq!(channel.pending_count(), 1);

        // Re-recording a confirmed tick is ignored
        channel.record(2, landed(2));
        assert!(channel.confirm(2).is_empty());
        assert_eq!(channel.confirm(3).len(), 1);
    }
}
