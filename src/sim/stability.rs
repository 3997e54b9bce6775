//! Settle detection for dynamic blocks
//!
//! One record per tracked block, advanced by a single scan each tick after
//! physics has moved the blocks. A block is stable once it has stayed within
//! the position/angle epsilons for the whole stabilization duration.

use glam::{Quat, Vec3};

use super::registry::BlockRegistry;
use super::state::{BlockId, PhysicsMode, Stability};
use crate::{Pose, Settings, angle_between_deg, countdown_done};

/// Limits for "not moving"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleThresholds {
    pub position_epsilon: f32,
    /// Degrees
    pub angle_epsilon: f32,
    pub duration: f32,
}

impl SettleThresholds {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            position_epsilon: settings.position_epsilon,
            angle_epsilon: settings.angle_epsilon,
            duration: settings.stabilization_duration,
        }
    }
}

/// Per-block settle tracking
#[derive(Debug, Clone)]
pub struct SettleRecord {
    pub block: BlockId,
    last_position: Vec3,
    last_orientation: Quat,
    dwell_time: f32,
    grace_remaining: f32,
}

impl SettleRecord {
    pub fn new(block: BlockId, pose: Pose, grace: f32) -> Self {
        Self {
            block,
            last_position: pose.position,
            last_orientation: pose.orientation,
            dwell_time: 0.0,
            grace_remaining: grace,
        }
    }

    pub fn dwell_time(&self) -> f32 {
        self.dwell_time
    }

    pub fn in_grace(&self) -> bool {
        self.grace_remaining > 0.0
    }

    /// Feed this tick's pose; returns true once the block has settled
    pub fn observe(&mut self, pose: Pose, dt: f32, thresholds: &SettleThresholds) -> bool {
        if !countdown_done(self.grace_remaining, dt) {
            self.grace_remaining -= dt;
            self.last_position = pose.position;
            self.last_orientation = pose.orientation;
            return false;
        }

        let moved = pose.position.distance(self.last_position);
        let turned = angle_between_deg(pose.orientation, self.last_orientation);

        if moved < thresholds.position_epsilon && turned < thresholds.angle_epsilon {
            self.dwell_time += dt;
        } else {
            self.dwell_time = 0.0;
        }

        self.last_position = pose.position;
        self.last_orientation = pose.orientation;

        countdown_done(thresholds.duration - self.dwell_time, dt)
    }
}

/// Tracks every dynamic block that has not settled yet
#[derive(Debug, Clone, Default)]
pub struct StabilityMonitor {
    records: Vec<SettleRecord>,
}

impl StabilityMonitor {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Start (or restart) tracking a block
    pub fn track(&mut self, block: BlockId, pose: Pose, grace: f32) {
        self.untrack(block);
        self.records.push(SettleRecord::new(block, pose, grace));
    }

    /// Stop tracking a block; returns whether it was tracked
    pub fn untrack(&mut self, block: BlockId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.block != block);
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_tracking(&self, block: BlockId) -> bool {
        self.records.iter().any(|r| r.block == block)
    }

    pub fn record(&self, block: BlockId) -> Option<&SettleRecord> {
        self.records.iter().find(|r| r.block == block)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Advance every record by one tick.
    ///
    /// Blocks that settle are marked `Stable` and dropped from tracking; their
    /// ids are returned. Records whose block is gone or no longer dynamic are
    /// dropped silently.
    pub fn scan(
        &mut self,
        registry: &mut BlockRegistry,
        dt: f32,
        thresholds: &SettleThresholds,
    ) -> Vec<BlockId> {
        let mut settled = Vec::new();

        self.records.retain_mut(|record| {
            let Some(block) = registry.get_mut(record.block) else {
                return false;
            };
            if block.mode != PhysicsMode::Dynamic {
                return false;
            }
            if record.observe(block.pose(), dt, thresholds) {
                block.stability = Stability::Stable;
                settled.push(block.id);
                return false;
            }
            true
        });

        settled
    }
}
