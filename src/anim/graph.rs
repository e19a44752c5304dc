//! Animation Graph Seam
//!
//! The engine's animation graph is the one subsystem that cannot be replayed
//! cheaply, so the simulation only ever talks to it through
//! [`AnimationGraph`]. [`ClipGraph`] is a reference two-slot crossfading
//! graph with a SmoothDamp blend filter and clip-end notifications.
//!
//! Everything here is float: the graph is presentation state and is never
//! read back by Simulate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Deserialize};

use crate::anim::phase::AnimPhase;

/// Clip identifier.
pub type ClipId = u16;

/// Slots a graph blends between: the incoming clip and the one fading out.
pub const MAX_SLOTS: usize = 2;

/// One playing clip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipSlot {
    /// Clip playing in this slot
    pub clip: ClipId,
    /// Playback position (seconds)
    pub time: f32,
    /// Blend weight
    pub weight: f32,
    /// Crossfade time left (seconds)
    pub fade_remaining: f32,
}

/// Smoothing filter state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Filtered value
    pub value: f32,
    /// Rate of change
    pub velocity: f32,
}

/// Engine animation graph.
///
/// `play` starts a transition and belongs to the view layer. Restoring a
/// captured pose uses only `seek`, `clear_slot`, `set_filter` and the
/// clip-end arming calls.
pub trait AnimationGraph {
    /// Active slots, incoming first.
    fn active_slots(&self) -> &[ClipSlot];

    /// Blend filter state.
    fn filter(&self) -> FilterState;

    /// Put `slot` into slot `index` directly, without a transition.
    fn seek(&mut self, index: usize, slot: ClipSlot);

    /// Empty slot `index`.
    fn clear_slot(&mut self, index: usize);

    /// Overwrite the blend filter.
    fn set_filter(&mut self, filter: FilterState);

    /// Target the blend filter moves toward.
    fn set_blend_target(&mut self, target: f32);

    /// Request a notification when `clip` reaches its end.
    fn arm_clip_end(&mut self, clip: ClipId);

    /// Drop every armed notification and any undelivered ones.
    fn disarm_clip_ends(&mut self);

    /// Notifications delivered since the last drain.
    fn drain_clip_ends(&mut self) -> Vec<ClipId>;

    /// Crossfade to `clip` over `fade` seconds.
    fn play(&mut self, clip: ClipId, fade: f32);

    /// Advance playback.
    fn advance(&mut self, dt: f32);
}

// =============================================================================
// CLIP LIBRARY
// =============================================================================

/// Static clip data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipEntry {
    /// Display name
    pub name: String,
    /// Length in seconds
    pub length: f32,
    /// Wraps at the end
    pub looping: bool,
    /// Clip to play when this one ends (drives a transition)
    pub ends_into: Option<ClipId>,
}

/// Clips by id and the clip each phase plays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipLibrary {
    clips: BTreeMap<ClipId, ClipEntry>,
    phases: BTreeMap<AnimPhase, ClipId>,
    /// Crossfade used by phase transitions (seconds)
    pub fade: f32,
}

impl ClipLibrary {
    /// Empty library.
    pub fn new(fade: f32) -> Self {
        Self { clips: BTreeMap::new(), phases: BTreeMap::new(), fade }
    }

    /// Add a clip.
    pub fn with_clip(mut self, id: ClipId, entry: ClipEntry) -> Self {
        self.clips.insert(id, entry);
        self
    }

    /// Bind a phase to a clip.
    pub fn with_phase(mut self, phase: AnimPhase, clip: ClipId) -> Self {
        self.phases.insert(phase, clip);
        self
    }

    /// Clip data.
    pub fn entry(&self, clip: ClipId) -> Option<&ClipEntry> {
        self.clips.get(&clip)
    }

    /// Clip played by `phase`.
    pub fn clip_for(&self, phase: AnimPhase) -> Option<ClipId> {
        self.phases.get(&phase).copied()
    }

    /// Does the end of `clip` trigger a transition?
    pub fn drives_transition(&self, clip: ClipId) -> bool {
        self.entry(clip).is_some_and(|e| !e.looping && e.ends_into.is_some())
    }
}

impl Default for ClipLibrary {
    fn default() -> Self {
        let clip = |name: &str, length: f32, looping: bool, ends_into: Option<ClipId>| ClipEntry {
            name: name.into(),
            length,
            looping,
            ends_into,
        };
        Self::new(0.15)
            .with_clip(0, clip("idle", 2.0, true, None))
            .with_clip(1, clip("run", 0.8, true, None))
            .with_clip(2, clip("jump_start", 0.3, false, Some(3)))
            .with_clip(3, clip("fall", 1.0, true, None))
            .with_clip(4, clip("land", 0.25, false, Some(0)))
            .with_phase(AnimPhase::Idle, 0)
            .with_phase(AnimPhase::Locomotion, 1)
            .with_phase(AnimPhase::JumpStart, 2)
            .with_phase(AnimPhase::Airborne, 3)
            .with_phase(AnimPhase::Landing, 4)
    }
}

// =============================================================================
// CLIP GRAPH
// =============================================================================

/// Reference graph: two crossfading slots and a SmoothDamp blend filter.
#[derive(Clone, Debug)]
pub struct ClipGraph {
    library: ClipLibrary,
    slots: Vec<ClipSlot>,
    filter: FilterState,
    blend_target: f32,
    smooth_time: f32,
    armed: BTreeSet<ClipId>,
    ended: Vec<ClipId>,
    play_calls: u32,
}

impl ClipGraph {
    /// Graph playing `initial` at full weight.
    pub fn new(library: ClipLibrary, initial: ClipId) -> Self {
        Self {
            library,
            slots: vec![ClipSlot { clip: initial, time: 0.0, weight: 1.0, fade_remaining: 0.0 }],
            filter: FilterState::default(),
            blend_target: 0.0,
            smooth_time: 0.1,
            armed: BTreeSet::new(),
            ended: Vec::new(),
            play_calls: 0,
        }
    }

    /// Incoming clip.
    pub fn current_clip(&self) -> Option<ClipId> {
        self.slots.first().map(|s| s.clip)
    }

    /// How many times `play` has been called.
    pub fn play_calls(&self) -> u32 {
        self.play_calls
    }

    /// Clips with an armed end notification.
    pub fn armed(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.armed.iter().copied()
    }

    fn advance_slot(&mut self, index: usize, dt: f32) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let Some(entry) = self.library.entry(slot.clip) else {
            slot.time += dt;
            return;
        };
        let before = slot.time;
        slot.time += dt;
        if entry.length <= 0.0 {
            return;
        }
        if entry.looping {
            slot.time %= entry.length;
        } else if slot.time >= entry.length {
            slot.time = entry.length;
            if before < entry.length && self.armed.remove(&slot.clip) {
                self.ended.push(slot.clip);
            }
        }
    }
}

impl AnimationGraph for ClipGraph {
    fn active_slots(&self) -> &[ClipSlot] {
        &self.slots
    }

    fn filter(&self) -> FilterState {
        self.filter
    }

    fn seek(&mut self, index: usize, slot: ClipSlot) {
        if index >= MAX_SLOTS {
            return;
        }
        if index < self.slots.len() {
            self.slots[index] = slot;
        } else {
            self.slots.push(slot);
        }
    }

    fn clear_slot(&mut self, index: usize) {
        if index < self.slots.len() {
            self.slots.truncate(index);
        }
    }

    fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
    }

    fn set_blend_target(&mut self, target: f32) {
        self.blend_target = target;
    }

    fn arm_clip_end(&mut self, clip: ClipId) {
        self.armed.insert(clip);
    }

    fn disarm_clip_ends(&mut self) {
        self.armed.clear();
        self.ended.clear();
    }

    fn drain_clip_ends(&mut self) -> Vec<ClipId> {
        std::mem::take(&mut self.ended)
    }

    fn play(&mut self, clip: ClipId, fade: f32) {
        self.play_calls += 1;
        let incoming = ClipSlot {
            clip,
            time: 0.0,
            weight: if fade > 0.0 { 0.0 } else { 1.0 },
            fade_remaining: fade.max(0.0),
        };
        let outgoing = self.slots.first().copied();
        self.slots.clear();
        self.slots.push(incoming);
        if let Some(mut out) = outgoing.filter(|_| fade > 0.0) {
            out.weight = 1.0;
            out.fade_remaining = 0.0;
            self.slots.push(out);
        }
        if self.library.drives_transition(clip) {
            self.armed.insert(clip);
        }
    }

    fn advance(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for index in 0..self.slots.len() {
            self.advance_slot(index, dt);
        }

        if let Some(incoming) = self.slots.first_mut() {
            if incoming.fade_remaining > 0.0 {
                let step = (dt / incoming.fade_remaining).min(1.0);
                incoming.weight += (1.0 - incoming.weight) * step;
                incoming.fade_remaining = (incoming.fade_remaining - dt).max(0.0);
            }
            if incoming.fade_remaining <= 0.0 {
                incoming.weight = 1.0;
            }
            let incoming_weight = incoming.weight;
            if incoming_weight >= 1.0 {
                self.slots.truncate(1);
            } else if let Some(outgoing) = self.slots.get_mut(1) {
                outgoing.weight = 1.0 - incoming_weight;
            }
        }

        self.filter = smooth_damp(self.filter, self.blend_target, self.smooth_time, dt);
    }
}

/// Critically damped spring toward `target`.
pub fn smooth_damp(state: FilterState, target: f32, smooth_time: f32, dt: f32) -> FilterState {
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = state.value - target;
    let temp = (state.velocity + omega * change) * dt;
    FilterState {
        value: target + (change + temp) * exp,
        velocity: (state.velocity - omega * temp) * exp,
    }
}
