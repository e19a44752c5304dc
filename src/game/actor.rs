//! Actor Aggregate
//!
//! Owns one actor's movement, ability and weapon components and runs them
//! in a fixed order: movement, then ability, then switching/weapon, then
//! the animation phase. The weapon reads the eye position movement produced
//! this tick.
//!
//! Lifecycle: construct, bind, first-tick init, simulate, despawn. Calls
//! made in the wrong stage return [`SimError::Lifecycle`].

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::anim::phase::AnimPhase;
use crate::config::SimConfig;
use crate::core::vec3::FixedVec3;
use crate::error::SimError;
use crate::game::ability::AbilitySim;
use crate::game::input::InputRecord;
use crate::game::movement::{MovementSim, MovementState};
use crate::game::physics::PhysicsWorld;
use crate::game::state::{ActorId, ActorState};
use crate::game::switching::WeaponSwitcher;
use crate::game::tick::TickContext;

/// Where an actor is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStage {
    /// Allocated, no configuration yet
    Constructed,
    /// Components bound to configuration
    Bound,
    /// First-tick initialisation done; simulating
    Ready,
    /// Removed from the world
    Despawned,
}

/// Components created at bind time.
#[derive(Clone, Debug)]
struct Components {
    movement: MovementSim,
    ability: AbilitySim,
    switcher: WeaponSwitcher,
}

/// One simulated actor.
#[derive(Clone, Debug)]
pub struct Actor {
    id: ActorId,
    stage: LifecycleStage,
    components: Option<Components>,
}

impl Actor {
    /// Allocate an actor with no components.
    pub fn construct(id: ActorId) -> Self {
        Self { id, stage: LifecycleStage::Constructed, components: None }
    }

    /// Actor id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Bind components to configuration.
    pub fn bind(&mut self, config: &SimConfig) -> Result<(), SimError> {
        self.require(LifecycleStage::Constructed, "bind")?;
        self.components = Some(Components {
            movement: MovementSim::bind(config.movement.clone()),
            ability: AbilitySim::bind(config.ability.clone()),
            switcher: WeaponSwitcher::bind(&config.weapons, config.switch_cooldown),
        });
        self.transition(LifecycleStage::Bound);
        Ok(())
    }

    /// Initial state record at `position`.
    pub fn spawn_state(&self, position: FixedVec3, facing: FixedVec3) -> Result<ActorState, SimError> {
        let parts = self.bound("spawn_state")?;
        let movement = MovementState::at(position, facing);
        Ok(ActorState {
            id: self.id,
            tick: 0,
            anim_phase: AnimPhase::derive(&movement),
            movement,
            ability: Default::default(),
            arsenal: parts.switcher.spawn_state(),
        })
    }

    /// First-tick initialisation: seed the grounded state from the world.
    pub fn ready(&mut self, state: &mut ActorState, physics: &dyn PhysicsWorld) -> Result<(), SimError> {
        self.require(LifecycleStage::Bound, "ready")?;
        let parts = self.bound("ready")?;
        parts.movement.init_ground(&mut state.movement, physics);
        state.anim_phase = AnimPhase::derive(&state.movement);
        self.transition(LifecycleStage::Ready);
        Ok(())
    }

    /// Advance one tick.
    pub fn simulate(
        &self,
        state: &mut ActorState,
        input: &InputRecord,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), SimError> {
        self.require(LifecycleStage::Ready, "simulate")?;
        let parts = self.bound("simulate")?;

        parts.movement.simulate(&mut state.movement, input, ctx);

        if let Some(request) = parts.ability.simulate(&mut state.ability, input, ctx) {
            state.movement.enqueue_teleport(request);
        }

        let eye = parts.movement.eye_position(&state.movement);
        parts.switcher.simulate(&mut state.arsenal, input, eye, ctx);

        state.anim_phase = AnimPhase::derive(&state.movement);
        state.tick = ctx.tick;
        Ok(())
    }

    /// Remove from the world. Further calls fail with [`SimError::Despawned`].
    pub fn despawn(&mut self) -> Result<(), SimError> {
        if self.stage == LifecycleStage::Despawned {
            return Err(SimError::Despawned(self.id));
        }
        self.components = None;
        self.transition(LifecycleStage::Despawned);
        Ok(())
    }

    /// Movement component, once bound.
    pub fn movement(&self) -> Option<&MovementSim> {
        self.components.as_ref().map(|c| &c.movement)
    }

    /// Ability component, once bound.
    pub fn ability(&self) -> Option<&AbilitySim> {
        self.components.as_ref().map(|c| &c.ability)
    }

    /// Weapon scheduler, once bound.
    pub fn switcher(&self) -> Option<&WeaponSwitcher> {
        self.components.as_ref().map(|c| &c.switcher)
    }

    fn require(&self, stage: LifecycleStage, operation: &'static str) -> Result<(), SimError> {
        match self.stage {
            s if s == stage => Ok(()),
            LifecycleStage::Despawned => Err(SimError::Despawned(self.id)),
            s => Err(SimError::Lifecycle { actor: self.id, operation, stage: s }),
        }
    }

    fn bound(&self, operation: &'static str) -> Result<&Components, SimError> {
        match (&self.components, self.stage) {
            (Some(parts), _) => Ok(parts),
            (None, LifecycleStage::Despawned) => Err(SimError::Despawned(self.id)),
            (None, stage) => Err(SimError::Lifecycle { actor: self.id, operation, stage }),
        }
    }

    fn transition(&mut self, to: LifecycleStage) {
        debug!(actor = %self.id, from = ?self.stage, to = ?to, "lifecycle");
        self.stage = to;
    }
}
