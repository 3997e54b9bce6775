//! Game settings and balance
//!
//! Every tunable the engine recognizes lives here. A `GameSession` is only
//! ever built from settings that passed [`Settings::validate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Rejected configuration
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("`{field}` must be finite, got {value}")]
    NotFinite { field: &'static str, value: f32 },
    #[error("`{field}` must be greater than zero, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("`combo_threshold` must be at least 1")]
    ZeroComboThreshold,
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Game balance and engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Geometry ===
    /// Edge length of every block (blocks are cubes)
    pub block_height: f32,

    // === Settling ===
    /// How long a block must stay still before it counts as stable (seconds)
    pub stabilization_duration: f32,
    /// Largest per-tick movement still considered "still"
    pub position_epsilon: f32,
    /// Largest per-tick rotation still considered "still" (degrees)
    pub angle_epsilon: f32,
    /// Monitoring starts this long after a block turns dynamic (seconds)
    pub settle_grace: f32,
    /// Freeze a block once it is stable
    pub freeze_when_stable: bool,

    // === Placement ===
    /// Tolerance below the anchor before a block counts as collapsed
    pub collapse_epsilon: f32,
    /// Support probe length, in block heights
    pub support_probe_factor: f32,
    /// Minimum time between two accepted placements (seconds)
    pub place_cooldown: f32,
    /// Stop surface tracking once the base is anchored
    pub hide_surfaces_after_anchor: bool,

    // === Pacing ===
    /// Timer starts here and can never exceed it (seconds)
    pub timer_max: f32,
    /// Seconds granted when a combo triggers
    pub combo_timer_bonus: f32,
    /// Consecutive valid placements needed for a combo
    pub combo_threshold: u32,
    /// A misplaced block ends the run after this long (seconds)
    pub falling_to_game_over_delay: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_height: BLOCK_HEIGHT,

            stabilization_duration: STABILIZATION_DURATION,
            position_epsilon: POSITION_EPSILON,
            angle_epsilon: ANGLE_EPSILON,
            settle_grace: SETTLE_GRACE,
            freeze_when_stable: true,

            collapse_epsilon: COLLAPSE_EPSILON,
            support_probe_factor: SUPPORT_PROBE_FACTOR,
            place_cooldown: PLACE_COOLDOWN,
            hide_surfaces_after_anchor: true,

            timer_max: TIMER_MAX,
            combo_timer_bonus: COMBO_TIMER_BONUS,
            combo_threshold: COMBO_THRESHOLD,
            falling_to_game_over_delay: FALLING_TO_GAME_OVER_DELAY,
        }
    }
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the configuration is consistent enough to run a session
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("block_height", self.block_height),
            ("position_epsilon", self.position_epsilon),
            ("angle_epsilon", self.angle_epsilon),
            ("support_probe_factor", self.support_probe_factor),
            ("timer_max", self.timer_max),
        ];
        let non_negative = [
            ("stabilization_duration", self.stabilization_duration),
            ("settle_grace", self.settle_grace),
            ("collapse_epsilon", self.collapse_epsilon),
            ("place_cooldown", self.place_cooldown),
            ("combo_timer_bonus", self.combo_timer_bonus),
            ("falling_to_game_over_delay", self.falling_to_game_over_delay),
        ];

        for &(field, value) in positive.iter().chain(non_negative.iter()) {
            if !value.is_finite() {
                return Err(SettingsError::NotFinite { field, value });
            }
        }
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(SettingsError::NonPositive { field, value });
            }
        }
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(SettingsError::Negative { field, value });
            }
        }
        if self.combo_threshold == 0 {
            return Err(SettingsError::ZeroComboThreshold);
        }
        Ok(())
    }

    /// Maximum reach of the downward support probe
    pub fn support_probe_distance(&self) -> f32 {
        self.block_height * self.support_probe_factor
    }
}
