//! AR Stacker - augmented-reality block stacking game engine
//!
//! Core modules:
//! - `sim`: Deterministic stacking simulation (phases, placement, settling, combos)
//! - `settings`: Data-driven game balance and validation

pub mod settings;
pub mod sim;

pub use settings::{Settings, SettingsError};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (one tick per frame at 60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Block defaults (world units are metres)
    pub const BLOCK_HEIGHT: f32 = 0.1;

    /// Settling defaults
    pub const STABILIZATION_DURATION: f32 = 2.0;
    pub const SETTLE_GRACE: f32 = 0.5;
    pub const POSITION_EPSILON: f32 = 0.001;
    /// Degrees
    pub const ANGLE_EPSILON: f32 = 0.1;

    /// How far below the anchor a block may sink before the stack counts as collapsed
    pub const COLLAPSE_EPSILON: f32 = 0.05;
    /// Support probe reaches this many block heights below a candidate
    pub const SUPPORT_PROBE_FACTOR: f32 = 1.5;

    /// Pacing
    pub const PLACE_COOLDOWN: f32 = 0.5;
    pub const TIMER_MAX: f32 = 10.0;
    pub const COMBO_TIMER_BONUS: f32 = 2.0;
    pub const COMBO_THRESHOLD: u32 = 5;
    pub const FALLING_TO_GAME_OVER_DELAY: f32 = 2.0;

    /// Combo prune effect: flash on/off cycles, then shrink to nothing
    pub const PRUNE_FLASH_COUNT: u32 = 3;
    pub const PRUNE_FLASH_INTERVAL: f32 = 0.05;
    pub const PRUNE_SHRINK_DURATION: f32 = 0.3;

    /// Aim rays (camera through screen point) reach this far
    pub const AIM_RANGE: f32 = 20.0;
}

/// A world-space position and orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at `position` with no rotation
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Whether a countdown advanced in steps of `dt` has run out.
///
/// Half a step of slack absorbs f32 rounding in the running sum, so a wait of
/// `n * dt` seconds ends on exactly the `n`th step (60 steps of 1/60 s do not
/// sum to exactly 1.0).
#[inline]
pub fn countdown_done(remaining: f32, dt: f32) -> bool {
    remaining <= dt * 0.5
}

/// Angle between two orientations, in degrees
#[inline]
pub fn angle_between_deg(a: Quat, b: Quat) -> f32 {
    a.normalize().angle_between(b.normalize()).to_degrees()
}
