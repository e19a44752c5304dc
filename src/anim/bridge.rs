//! Animation Rollback Bridge
//!
//! Captures a minimal snapshot of each actor's animation graph after every
//! simulated tick and restores it before resimulation. Restoring seeks
//! directly and never starts a transition, so rollback produces no visible
//! blend and never fires transition callbacks twice.

use std::collections::{BTreeMap, VecDeque};

use serde::{Serialize, Deserialize};
use tracing::{trace, warn};

use crate::anim::graph::{AnimationGraph, ClipLibrary, ClipSlot, FilterState, MAX_SLOTS};
use crate::core::fixed::{Fixed, to_float};
use crate::game::state::{ActorId, WorldSnapshot};
use crate::game::tick::TickHooks;

/// Post-tick capture of one graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimSnapshot {
    /// Tick the capture follows
    pub tick: u32,
    /// Active slots, incoming first
    pub slots: Vec<ClipSlot>,
    /// Blend filter
    pub filter: FilterState,
}

impl AnimSnapshot {
    /// Capture `graph` after `tick`.
    pub fn capture(tick: u32, graph: &dyn AnimationGraph) -> Self {
        Self {
            tick,
            slots: graph.active_slots().iter().take(MAX_SLOTS).copied().collect(),
            filter: graph.filter(),
        }
    }
}

/// Ring of snapshots for one graph, keyed by tick.
#[derive(Clone, Debug)]
pub struct AnimationBridge {
    ring: VecDeque<AnimSnapshot>,
    capacity: usize,
}

impl AnimationBridge {
    /// Bridge retaining `capacity` ticks.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { ring: VecDeque::with_capacity(capacity), capacity }
    }

    /// Record the graph state after `tick`, replacing any later captures.
    pub fn capture(&mut self, tick: u32, graph: &dyn AnimationGraph) {
        while self.ring.back().is_some_and(|s| s.tick >= tick) {
            self.ring.pop_back();
        }
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(AnimSnapshot::capture(tick, graph));
    }

    /// Snapshot after `tick`.
    pub fn get(&self, tick: u32) -> Option<&AnimSnapshot> {
        let oldest = self.ring.front()?.tick;
        let index = tick.checked_sub(oldest)? as usize;
        self.ring.get(index).filter(|s| s.tick == tick)
    }

    /// Put the graph back into its state after `tick`.
    ///
    /// Slots are seeked directly, the filter is overwritten, and clip-end
    /// notifications are re-armed for clips whose end drives a transition.
    /// Returns false (graph untouched) when no capture exists for `tick`.
    pub fn restore(&mut self, tick: u32, graph: &mut dyn AnimationGraph, library: &ClipLibrary) -> bool {
        let Some(snapshot) = self.get(tick).cloned() else {
            return false;
        };

        for index in 0..MAX_SLOTS {
            match snapshot.slots.get(index) {
                Some(slot) => graph.seek(index, *slot),
                None => graph.clear_slot(index),
            }
        }
        graph.set_filter(snapshot.filter);

        graph.disarm_clip_ends();
        for slot in &snapshot.slots {
            let unfinished = library.entry(slot.clip).is_some_and(|e| slot.time < e.length);
            if library.drives_transition(slot.clip) && unfinished {
                graph.arm_clip_end(slot.clip);
            }
        }

        while self.ring.back().is_some_and(|s| s.tick > tick) {
            self.ring.pop_back();
        }
        trace!(tick, slots = snapshot.slots.len(), "animation restored");
        true
    }

    /// Captures held.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// No captures held?
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Per-actor graphs kept consistent with predicted and resimulated ticks.
pub struct AnimationSystem<G: AnimationGraph> {
    library: ClipLibrary,
    capacity: usize,
    graphs: BTreeMap<ActorId, G>,
    bridges: BTreeMap<ActorId, AnimationBridge>,
}

impl<G: AnimationGraph> AnimationSystem<G> {
    /// Empty system.
    pub fn new(library: ClipLibrary, capacity: usize) -> Self {
        Self { library, capacity, graphs: BTreeMap::new(), bridges: BTreeMap::new() }
    }

    /// Clip data.
    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    /// Attach a graph to an actor.
    pub fn attach(&mut self, actor: ActorId, graph: G) {
        self.graphs.insert(actor, graph);
        self.bridges.insert(actor, AnimationBridge::new(self.capacity));
    }

    /// Detach an actor's graph.
    pub fn detach(&mut self, actor: ActorId) -> Option<G> {
        self.bridges.remove(&actor);
        self.graphs.remove(&actor)
    }

    /// Graph of an actor.
    pub fn graph(&self, actor: ActorId) -> Option<&G> {
        self.graphs.get(&actor)
    }

    /// Graph of an actor together with the clip library (view layer).
    pub fn graph_mut(&mut self, actor: ActorId) -> Option<(&mut G, &ClipLibrary)> {
        let library = &self.library;
        self.graphs.get_mut(&actor).map(|g| (g, library))
    }

    /// Capture ring of an actor.
    pub fn bridge(&self, actor: ActorId) -> Option<&AnimationBridge> {
        self.bridges.get(&actor)
    }
}

impl<G: AnimationGraph> TickHooks for AnimationSystem<G> {
    fn after_tick(&mut self, world: &WorldSnapshot, dt: Fixed) {
        let dt = to_float(dt);
        for (id, graph) in &mut self.graphs {
            if !world.actors.contains_key(id) {
                continue;
            }
            graph.advance(dt);
            if let Some(bridge) = self.bridges.get_mut(id) {
                bridge.capture(world.tick, graph);
            }
        }
    }

    fn before_resimulate(&mut self, base: &WorldSnapshot) {
        for (id, graph) in &mut self.graphs {
            let Some(bridge) = self.bridges.get_mut(id) else {
                continue;
            };
            if !bridge.restore(base.tick, graph, &self.library) {
                warn!(actor = %id, tick = base.tick, "no animation capture; keeping current pose");
            }
        }
    }
}
