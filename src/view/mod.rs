//! View Reconciliation
//!
//! Runs once per render frame, outside the simulation. Interpolates the
//! numeric fields of the last two simulated records, takes discrete fields
//! from the latest one, raises effect cues on rising edges, and drives the
//! animation graph from the simulated phase. Never writes to a record.

use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::anim::graph::{AnimationGraph, ClipId, ClipLibrary};
use crate::anim::phase::AnimPhase;
use crate::config::SimConfig;
use crate::core::fixed::{Fixed, to_float};
use crate::core::vec3::FixedVec3;
use crate::game::ability::readiness;
use crate::game::recoil::RecoilOffset;
use crate::game::state::ActorState;

/// Feedback to play once (audio, VFX, HUD flash).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectCue {
    /// Touched down
    Landed,
    /// Weapon in `slot` fired
    Shot {
        /// Arsenal slot
        slot: u8,
    },
    /// Weapon in `slot` began reloading
    ReloadStarted {
        /// Arsenal slot
        slot: u8,
    },
    /// Ability activated
    AbilityFired,
    /// Ability pressed while cooling down
    AbilityDenied,
    /// Weapon in `slot` drawn
    WeaponEquipped {
        /// Arsenal slot
        slot: u8,
    },
}

/// Presentation values for one render frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewFrame {
    /// Latest simulated tick
    pub tick: u32,
    /// Fraction between the two records
    pub alpha: f32,
    /// Interpolated feet position
    pub position: [f32; 3],
    /// Interpolated camera position
    pub eye: [f32; 3],
    /// Interpolated facing
    pub facing: [f32; 3],
    /// Interpolated recoil (pitch, yaw, roll) in degrees
    pub recoil: [f32; 3],
    /// Interpolated ability readiness in [0, 1]
    pub readiness: f32,
    /// Simulated animation phase
    pub phase: AnimPhase,
    /// Active weapon slot
    pub active_weapon: u8,
    /// Rounds in the active weapon
    pub ammo: u32,
    /// Active weapon reloading
    pub reloading: bool,
    /// On the ground
    pub grounded: bool,
}

/// Per-actor view state.
#[derive(Clone, Debug)]
pub struct ViewReconciler {
    eye_height: Fixed,
    ability_cooldown: Fixed,
    last_phase: Option<AnimPhase>,
    deferred: Option<ClipId>,
    cued_tick: Option<u32>,
}

impl ViewReconciler {
    /// Reconciler for actors configured by `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            eye_height: config.movement.eye_height,
            ability_cooldown: config.ability.cooldown,
            last_phase: None,
            deferred: None,
            cued_tick: None,
        }
    }

    /// Build the frame between `prev` and `latest` at `alpha`, drive the
    /// graph, and return cues raised by `latest` (once per tick).
    pub fn reconcile(
        &mut self,
        prev: &ActorState,
        latest: &ActorState,
        alpha: f32,
        graph: &mut dyn AnimationGraph,
        library: &ClipLibrary,
    ) -> (ViewFrame, Vec<EffectCue>) {
        let alpha = alpha.clamp(0.0, 1.0);
        let frame = self.frame(prev, latest, alpha);

        let cues = if self.cued_tick.map_or(true, |t| latest.tick > t) {
            self.cued_tick = Some(latest.tick);
            rising_edges(prev, latest)
        } else {
            Vec::new()
        };

        self.drive_graph(latest, graph, library);
        graph.set_blend_target(to_float(latest.movement.horizontal_speed()));
        (frame, cues)
    }

    fn frame(&self, prev: &ActorState, latest: &ActorState, alpha: f32) -> ViewFrame {
        let eye_offset = FixedVec3::new(0, self.eye_height, 0);
        let weapon = latest.arsenal.active_weapon();
        let prev_recoil = prev
            .arsenal
            .weapons
            .get(latest.arsenal.active as usize)
            .map_or(RecoilOffset::ZERO, |w| w.recoil);
        let latest_recoil = weapon.map_or(RecoilOffset::ZERO, |w| w.recoil);

        let ready_prev = to_float(readiness(prev.ability.cooldown, self.ability_cooldown));
        let ready_latest = to_float(readiness(latest.ability.cooldown, self.ability_cooldown));

        ViewFrame {
            tick: latest.tick,
            alpha,
            position: lerp3(prev.movement.position, latest.movement.position, alpha),
            eye: lerp3(
                prev.movement.position.add(eye_offset),
                latest.movement.position.add(eye_offset),
                alpha,
            ),
            facing: lerp3(prev.movement.facing, latest.movement.facing, alpha),
            recoil: [
                lerp(to_float(prev_recoil.pitch), to_float(latest_recoil.pitch), alpha),
                lerp(to_float(prev_recoil.yaw), to_float(latest_recoil.yaw), alpha),
                lerp(to_float(prev_recoil.roll), to_float(latest_recoil.roll), alpha),
            ],
            readiness: lerp(ready_prev, ready_latest, alpha),
            phase: latest.anim_phase,
            active_weapon: latest.arsenal.active,
            ammo: weapon.map_or(0, |w| w.ammo),
            reloading: weapon.is_some_and(|w| w.reloading),
            grounded: latest.movement.grounded,
        }
    }

    /// Start transitions from the simulated phase. `play` is called only when
    /// the phase changes or a one-shot clip hands over to its successor.
    fn drive_graph(&mut self, latest: &ActorState, graph: &mut dyn AnimationGraph, library: &ClipLibrary) {
        for ended in graph.drain_clip_ends() {
            let next = self
                .deferred
                .take()
                .or_else(|| library.entry(ended).and_then(|e| e.ends_into));
            if let Some(next) = next {
                trace!(ended, next, "clip handed over");
                graph.play(next, library.fade);
            }
        }

        let phase = latest.anim_phase;
        if self.last_phase == Some(phase) {
            return;
        }
        self.last_phase = Some(phase);
        let Some(want) = library.clip_for(phase) else {
            return;
        };

        // A running one-shot finishes first; its successor is replaced
        let current = graph.active_slots().first().copied();
        let busy = current.is_some_and(|slot| {
            slot.clip != want
                && library.drives_transition(slot.clip)
                && library.entry(slot.clip).is_some_and(|e| slot.time < e.length)
        });
        if busy && !library.drives_transition(want) {
            self.deferred = Some(want);
            return;
        }

        self.deferred = None;
        if current.map(|s| s.clip) != Some(want) {
            graph.play(want, library.fade);
        }
    }
}

/// Cues raised by `latest` relative to `prev`.
pub fn rising_edges(prev: &ActorState, latest: &ActorState) -> Vec<EffectCue> {
    let mut cues = Vec::new();
    if latest.movement.landed {
        cues.push(EffectCue::Landed);
    }

    let slot = latest.arsenal.active;
    if slot != prev.arsenal.active {
        cues.push(EffectCue::WeaponEquipped { slot });
    }
    if let Some(weapon) = latest.arsenal.active_weapon() {
        let before = prev.arsenal.weapons.get(slot as usize);
        if before.is_some_and(|b| weapon.shot_count > b.shot_count) {
            cues.push(EffectCue::Shot { slot });
        }
        if weapon.reloading && !before.is_some_and(|b| b.reloading) {
            cues.push(EffectCue::ReloadStarted { slot });
        }
    }

    if latest.ability.fired {
        cues.push(EffectCue::AbilityFired);
    }
    if latest.ability.denied {
        cues.push(EffectCue::AbilityDenied);
    }
    cues
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp3(a: FixedVec3, b: FixedVec3, t: f32) -> [f32; 3] {
    let (a, b) = (a.to_floats(), b.to_floats());
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::graph::ClipGraph;
    use crate::core::fixed::to_fixed;
    use crate::game::actor::Actor;
    use crate::game::movement::MoveMode;
    use crate::game::state::ActorId;

    fn record() -> ActorState {
        let config = SimConfig::default();
        let mut actor = Actor::construct(ActorId(1));
        actor.bind(&config).unwrap();
        let mut state = actor.spawn_state(FixedVec3::ZERO, FixedVec3::FORWARD).unwrap();
        state.movement.mode = MoveMode::Grounded;
        state.movement.grounded = true;
        state.anim_phase = AnimPhase::Idle;
        state
    }

    #[test]
    fn test_interpolates_and_never_mutates() {
        let prev = record();
        let mut latest = prev.clone();
        latest.tick = 1;
        latest.movement.position = FixedVec3::new(0, 0, to_fixed(1.0));
        let (before_prev, before_latest) = (prev.clone(), latest.clone());

        let library = ClipLibrary::default();
        let mut graph = ClipGraph::new(library.clone(), 0);
        let mut view = ViewReconciler::new(&SimConfig::default());
        let (frame, _) = view.reconcile(&prev, &latest, 0.25, &mut graph, &library);

        assert!((frame.position[2] - 0.25).abs() < 1e-4);
        assert!((frame.eye[1] - 1.6).abs() < 1e-3);
        assert_eq!(prev, before_prev);
        assert_eq!(latest, before_latest);
    }

    #[test]
    fn test_cues_once_per_tick() {
        let prev = record();
        let mut latest = prev.clone();
        latest.tick = 1;
        latest.movement.landed = true;
        latest.ability.fired = true;
        latest.arsenal.weapons[0].shot_count = 1;

        let library = ClipLibrary::default();
        let mut graph = ClipGraph::new(library.clone(), 0);
        let mut view = ViewReconciler::new(&SimConfig::default());
        let (_, cues) = view.reconcile(&prev, &latest, 0.0, &mut graph, &library);
        assert_eq!(cues, vec![EffectCue::Landed, EffectCue::Shot { slot: 0 }, EffectCue::AbilityFired]);

        let (_, again) = view.reconcile(&prev, &latest, 0.5, &mut graph, &library);
        assert!(again.is_empty());
    }

    #[test]
    fn test_play_only_on_phase_change() {
        let library = ClipLibrary::default();
        let mut graph = ClipGraph::new(library.clone(), 0);
        let mut view = ViewReconciler::new(&SimConfig::default());
        let idle = record();

        for alpha in [0.0, 0.3, 0.6, 0.9] {
            view.reconcile(&idle, &idle, alpha, &mut graph, &library);
        }
        assert_eq!(graph.play_calls(), 0);

        let mut running = idle.clone();
        running.tick = 1;
        running.anim_phase = AnimPhase::Locomotion;
        view.reconcile(&idle, &running, 0.0, &mut graph, &library);
        view.reconcile(&idle, &running, 0.5, &mut graph, &library);
        assert_eq!(graph.play_calls(), 1);
        assert_eq!(graph.current_clip(), library.clip_for(AnimPhase::Locomotion));
    }

    #[test]
    fn test_landing_clip_finishes_before_idle() {
        let library = ClipLibrary::default();
        let mut graph = ClipGraph::new(library.clone(), 3);
        let mut view = ViewReconciler::new(&SimConfig::default());

        let mut landing = record();
        landing.anim_phase = AnimPhase::Landing;
        view.reconcile(&landing, &landing, 0.0, &mut graph, &library);
        assert_eq!(graph.current_clip(), Some(4));

        // Next tick the phase is already idle; the landing clip keeps playing
        let mut idle = record();
        idle.tick = 1;
        view.reconcile(&landing, &idle, 0.0, &mut graph, &library);
        assert_eq!(graph.current_clip(), Some(4));

        for _ in 0..30 {
            graph.advance(1.0 / 60.0);
        }
        view.reconcile(&landing, &idle, 1.0, &mut graph, &library);
        assert_eq!(graph.current_clip(), Some(0));
    }
}
