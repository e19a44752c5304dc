//! Simulation Configuration
//!
//! Static tuning shared by every actor. Fixed-point fields are written as
//! decimal numbers in JSON and converted once at load.

use std::path::Path;

use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::core::fixed::{self, Fixed, FIXED_ONE, fixed_div, from_int, to_fixed};
use crate::core::vec3::FixedVec3;
use crate::error::ConfigError;
use crate::game::ability::AbilityConfig;
use crate::game::movement::MovementConfig;
use crate::game::physics::LAYER_ALL;
use crate::game::recoil::RecoilProfile;
use crate::game::weapon::{FalloffCurve, WeaponProfile};

/// Default simulation rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Simulation configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Health every actor spawns with
    #[serde(with = "fixed::decimal")]
    pub max_health: Fixed,
    /// Locomotion tuning
    pub movement: MovementConfig,
    /// Ability tuning
    pub ability: AbilityConfig,
    /// Arsenal, in slot order; slot 0 is drawn at spawn
    pub weapons: Vec<WeaponProfile>,
    /// Seconds between weapon switches
    #[serde(with = "fixed::decimal")]
    pub switch_cooldown: Fixed,
    /// Snapshots retained for rollback
    pub state_ring_capacity: usize,
    /// Animation snapshots retained for rollback
    pub anim_snapshot_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_health: to_fixed(100.0),
            movement: MovementConfig::default(),
            ability: AbilityConfig::default(),
            weapons: vec![default_rifle(), default_sidearm()],
            switch_cooldown: to_fixed(0.2),
            state_ring_capacity: 128,
            anim_snapshot_capacity: 128,
        }
    }
}

impl SimConfig {
    /// Seconds per tick.
    pub fn tick_duration(&self) -> Fixed {
        fixed_div(FIXED_ONE, from_int(self.tick_rate.max(1) as i32))
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_json_str(&json)?;
        info!(path = %path.display(), weapons = config.weapons.len(), "configuration loaded");
        Ok(config)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no simulation can run with; warn about values that
    /// only disable a feature.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::invalid("tick_rate", "must be positive"));
        }
        if self.weapons.is_empty() {
            return Err(ConfigError::invalid("weapons", "at least one weapon is required"));
        }
        if self.weapons.len() > u8::MAX as usize {
            return Err(ConfigError::invalid("weapons", "at most 255 weapons"));
        }
        if self.state_ring_capacity < 2 {
            return Err(ConfigError::invalid("state_ring_capacity", "must hold at least 2 snapshots"));
        }
        if self.max_health <= 0 {
            return Err(ConfigError::invalid("max_health", "must be positive"));
        }
        for weapon in &self.weapons {
            if weapon.fire_rate <= 0 {
                return Err(ConfigError::invalid("fire_rate", format!("{}: must be positive", weapon.name)));
            }
            if weapon.clip_size == 0 && !weapon.infinite_ammo {
                return Err(ConfigError::invalid("clip_size", format!("{}: must be positive", weapon.name)));
            }
            if weapon.recoil.is_none() {
                warn!(weapon = %weapon.name, "no recoil profile; recoil disabled");
            }
        }
        if self.anim_snapshot_capacity < self.state_ring_capacity {
            warn!(
                anim = self.anim_snapshot_capacity,
                state = self.state_ring_capacity,
                "animation ring shorter than state ring; deep rollbacks keep the current pose"
            );
        }
        Ok(())
    }
}

/// Automatic rifle: finite clip, falloff, recoil.
pub fn default_rifle() -> WeaponProfile {
    WeaponProfile {
        name: "rifle".into(),
        fire_rate: to_fixed(10.0),
        base_damage: to_fixed(20.0),
        clip_size: 30,
        reload_time: to_fixed(2.0),
        headshot_multiplier: to_fixed(2.0),
        range: Some(to_fixed(150.0)),
        falloff: Some(FalloffCurve::from_points(&[
            (0, FIXED_ONE),
            (to_fixed(0.5), FIXED_ONE),
            (FIXED_ONE, to_fixed(0.6)),
        ])),
        recoil: Some(RecoilProfile {
            seed: to_fixed(12.345),
            pitch_kick: to_fixed(1.2),
            yaw_range: to_fixed(0.6),
            roll_range: to_fixed(0.4),
            relax_rate: to_fixed(6.0),
        }),
        infinite_ammo: false,
        muzzle_offset: FixedVec3::new(to_fixed(0.15), to_fixed(-0.1), to_fixed(0.4)),
        hit_mask: LAYER_ALL,
    }
}

/// Sidearm: never runs dry.
pub fn default_sidearm() -> WeaponProfile {
    WeaponProfile {
        name: "sidearm".into(),
        fire_rate: to_fixed(4.0),
        base_damage: to_fixed(15.0),
        clip_size: 12,
        reload_time: to_fixed(1.2),
        headshot_multiplier: to_fixed(1.5),
        range: Some(to_fixed(60.0)),
        falloff: None,
        recoil: Some(RecoilProfile {
            seed: to_fixed(7.25),
            pitch_kick: to_fixed(2.0),
            yaw_range: to_fixed(0.3),
            roll_range: to_fixed(0.2),
            relax_rate: to_fixed(8.0),
        }),
        infinite_ammo: true,
        muzzle_offset: FixedVec3::new(to_fixed(0.1), to_fixed(-0.08), to_fixed(0.3)),
        hit_mask: LAYER_ALL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::TICK_DURATION;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tick_duration(), TICK_DURATION);
    }

    #[test]
    fn test_json_roundtrip_uses_decimals() {
        let config = SimConfig::default();
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"switch_cooldown\": 0.19999"));
        let parsed = SimConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SimConfig::from_json_str(r#"{ "tick_rate": 30, "movement": { "max_speed": 8.5 } }"#).unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.movement.max_speed, to_fixed(8.5));
        assert_eq!(config.movement.gravity, MovementConfig::default().gravity);
        assert_eq!(config.weapons.len(), 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimConfig::from_json_str(r#"{ "tick_rate": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "tick_rate"));

        let err = SimConfig::from_json_str(r#"{ "weapons": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "weapons"));

        let mut config = SimConfig::default();
        config.weapons[0].fire_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { ref field, .. }) if field == "fire_rate"));

        assert!(matches!(SimConfig::from_json_str("{ nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(SimConfig::load("/nonexistent/tickfire.json"), Err(ConfigError::Io { .. })));
    }
}
