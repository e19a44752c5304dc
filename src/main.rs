//! Tickfire Simulation Demo
//!
//! Runs a scripted two-actor session through prediction, late input
//! corrections with rollback and resimulation, event confirmation and the
//! view layer, then verifies the final state against a straight-through
//! replay of the confirmed inputs.
//!
//! Usage: `tickfire-sim [config.json]`

use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tickfire::{
    TICK_RATE, VERSION,
    anim::{AnimationSystem, ClipGraph, ClipLibrary},
    config::SimConfig,
    core::{fixed::{to_fixed, FIXED_ONE}, rng::DeterministicRng, vec3::FixedVec3},
    game::{
        events::SimEventData,
        input::InputRecord,
        physics::{Aabb, StaticWorld},
        state::ActorId,
        tick::{replay, Correction, Simulation, SpawnPoint, TickInputs},
    },
    view::ViewReconciler,
};

/// Session length (20 seconds).
const SESSION_TICKS: u32 = 20 * TICK_RATE;

/// Ticks between server corrections.
const CORRECTION_INTERVAL: u32 = 12;

/// How far confirmation trails prediction.
const CONFIRM_DELAY: u32 = 8;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Tickfire v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => SimConfig::default(),
    };

    demo_session(config)
}

fn arena() -> StaticWorld {
    StaticWorld::flat_arena(to_fixed(60.0)).with_box(Aabb::new(
        FixedVec3::new(to_fixed(-4.0), 0, to_fixed(20.0)),
        FixedVec3::new(to_fixed(4.0), to_fixed(3.0), to_fixed(21.0)),
    ))
}

fn spawns() -> [SpawnPoint; 2] {
    [
        SpawnPoint { id: ActorId(1), position: FixedVec3::ZERO, facing: FixedVec3::FORWARD },
        SpawnPoint {
            id: ActorId(2),
            position: FixedVec3::new(to_fixed(2.0), 0, to_fixed(12.0)),
            facing: FixedVec3::new(0, 0, -FIXED_ONE),
        },
    ]
}

/// Scripted input for `actor` on `tick`.
fn scripted_input(rng: &mut DeterministicRng, actor: ActorId, tick: u32) -> InputRecord {
    match actor.0 {
        1 => {
            let mut input = InputRecord::with_movement(rng.next_int_range(-40, 40) as i8, 100);
            if tick % 9 == 0 {
                input = input.pressing(InputRecord::FIRE);
            }
            if tick % 150 == 0 {
                input = input.pressing(InputRecord::JUMP);
            }
            if tick == 300 || tick == 900 {
                input = input.pressing(InputRecord::ABILITY);
            }
            if tick == 600 {
                input = input.pressing(InputRecord::QUICK_SWAP);
            }
            input
        }
        _ => {
            let strafe = if (tick / 90) % 2 == 0 { 127 } else { -127 };
            let mut input = InputRecord::with_movement(strafe, 0)
                .looking(FixedVec3::new(0, 0, -FIXED_ONE));
            if tick % 40 == 0 {
                input = input.pressing(InputRecord::FIRE);
            }
            input
        }
    }
}

/// Demo function to exercise the simulation.
fn demo_session(config: SimConfig) -> Result<()> {
    info!("=== Starting Demo Session ===");

    let seed = 12345u64;
    let library = ClipLibrary::default();
    let mut sim = Simulation::new(config.clone(), arena(), seed);
    let mut anim: AnimationSystem<ClipGraph> =
        AnimationSystem::new(library.clone(), config.anim_snapshot_capacity);
    let mut view = ViewReconciler::new(&config);

    for point in spawns() {
        sim.spawn(point)?;
        let phase = sim.state(point.id)?.anim_phase;
        let clip = library.clip_for(phase).unwrap_or_default();
        anim.attach(point.id, ClipGraph::new(library.clone(), clip));
    }

    info!("RNG Seed: {}", seed);
    info!("Running {} ticks...", SESSION_TICKS);

    let mut rng = DeterministicRng::new(seed);
    // Actor 2's packets arrive late: predicted ticks are corrected in batches
    let mut late: BTreeMap<u32, TickInputs> = BTreeMap::new();
    let mut total_events = 0usize;
    let mut rollbacks = 0u32;
    let mut cues = 0usize;
    let local = ActorId(1);
    let mut prev = sim.state(local)?.clone();

    for tick in 1..=SESSION_TICKS {
        let mut inputs = TickInputs::new();
        for point in spawns() {
            inputs.insert(point.id, scripted_input(&mut rng, point.id, tick));
        }
        if tick % CORRECTION_INTERVAL >= CORRECTION_INTERVAL / 2 {
            if let Some(input) = inputs.remove(&ActorId(2)) {
                late.entry(tick).or_default().insert(ActorId(2), input);
            }
        }
        sim.advance_with(&inputs, &mut anim);

        if tick % CORRECTION_INTERVAL == CORRECTION_INTERVAL - 1 {
            if let Some(&first) = late.keys().next() {
                let correction = Correction { tick: first, snapshot: None, inputs: std::mem::take(&mut late) };
                sim.rollback_with(correction, &mut anim)?;
                rollbacks += 1;
            }
        }

        // Two render frames per tick
        let latest = sim.state(local)?.clone();
        if let Some((graph, library)) = anim.graph_mut(local) {
            for alpha in [0.5, 1.0] {
                let (frame, raised) = view.reconcile(&prev, &latest, alpha, &mut *graph, library);
                cues += raised.len();
                debug!(tick, ?frame.phase, ammo = frame.ammo, "frame");
            }
        }
        prev = latest;

        if let Some(through) = tick.checked_sub(CONFIRM_DELAY) {
            for event in sim.confirm(through) {
                total_events += 1;
                match &event.data {
                    SimEventData::Died { victim, instigator } => {
                        info!("{} died (instigator: {:?})", victim, instigator);
                    }
                    SimEventData::Equipped { slot } => {
                        info!("{} equipped slot {}", event.actor, slot);
                    }
                    SimEventData::AbilityFired { press_id } => {
                        info!("{} blinked (press {})", event.actor, press_id);
                    }
                    _ => {}
                }
            }
        }

        if tick % 300 == 0 {
            let hp = sim.snapshot().health.health(ActorId(2)).unwrap_or(0);
            info!("Tick {}: actor#2 health {:.1}, {} events confirmed", tick, hp as f32 / FIXED_ONE as f32, total_events);
        }
    }

    total_events += sim.confirm(SESSION_TICKS).len();

    info!("=== Session Results ===");
    let hash = sim.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Rollbacks: {}", rollbacks);
    info!("Total events: {}", total_events);
    info!("Effect cues: {}", cues);
    for (id, history) in sim.histories() {
        info!("{}: {} input deltas, history hash {}", id, history.delta_count(), hex::encode(&history.compute_hash()[..8]));
    }

    info!("=== Verifying Determinism ===");
    let replayed = replay(config, arena(), seed, &spawns(), sim.histories(), SESSION_TICKS)?;
    let replay_hash = replayed.compute_hash(seed);
    info!("Replay Hash: {}", hex::encode(replay_hash));
    ensure!(replay_hash == hash, "replay diverged from the corrected session");
    info!("Determinism verified");

    Ok(())
}
