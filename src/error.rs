//! Error types.

use std::path::PathBuf;

use crate::game::actor::LifecycleStage;
use crate::game::state::ActorId;

/// Simulation errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Actor was despawned.
    #[error("{0} has been despawned")]
    Despawned(ActorId),

    /// Actor was never spawned.
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    /// Actor already exists.
    #[error("{0} is already spawned")]
    AlreadySpawned(ActorId),

    /// Lifecycle operation called in the wrong stage.
    #[error("{actor}: cannot {operation} while {stage:?}")]
    Lifecycle {
        /// Actor the call was made on
        actor: ActorId,
        /// Operation attempted
        operation: &'static str,
        /// Stage the actor was in
        stage: LifecycleStage,
    },

    /// Weapon index outside the arsenal.
    #[error("weapon index {index} out of range (arsenal holds {count})")]
    InvalidWeaponIndex {
        /// Requested index
        index: i32,
        /// Number of weapons
        count: usize,
    },

    /// Rollback target is outside the retention window.
    #[error("no snapshot retained for tick {0}")]
    SnapshotMissing(u32),

    /// Rollback target lies in the future.
    #[error("cannot roll back to tick {target}: simulation is at tick {current}")]
    RollbackAhead {
        /// Requested tick
        target: u32,
        /// Current tick
        current: u32,
    },

    /// State record encoding failed.
    #[error("state encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not read the file.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// JSON was malformed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid { field: field.into(), reason: reason.into() }
    }
}
