//! Timed waits multiplexed over the fixed tick
//!
//! Cooldowns, fall delays and prune effects are plain records counted down by
//! the session tick. Restart and game over drop them wholesale, so nothing
//! scheduled before can fire afterwards.

use super::state::{Block, BlockId};
use crate::consts::{PRUNE_FLASH_COUNT, PRUNE_FLASH_INTERVAL, PRUNE_SHRINK_DURATION};
use crate::countdown_done;

/// Destruction effect of a pruned block: a few flashes, then a shrink
#[derive(Debug, Clone, PartialEq)]
pub struct PruneEffect {
    pub block: Block,
    pub elapsed: f32,
}

impl PruneEffect {
    /// Flash phase length (each flash is on then off)
    pub const FLASH_DURATION: f32 = PRUNE_FLASH_COUNT as f32 * 2.0 * PRUNE_FLASH_INTERVAL;
    pub const DURATION: f32 = Self::FLASH_DURATION + PRUNE_SHRINK_DURATION;

    pub fn new(block: Block) -> Self {
        Self {
            block,
            elapsed: 0.0,
        }
    }

    /// Highlight flag and uniform scale for the renderer
    pub fn appearance(&self) -> (bool, f32) {
        if self.elapsed < Self::FLASH_DURATION {
            let slot = (self.elapsed / PRUNE_FLASH_INTERVAL) as u32;
            (slot % 2 == 0, 1.0)
        } else {
            let t = (self.elapsed - Self::FLASH_DURATION) / PRUNE_SHRINK_DURATION;
            (false, (1.0 - t).clamp(0.0, 1.0))
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= Self::DURATION
    }
}

/// What a pending wait does when it elapses
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    /// Placements are refused until this elapses
    PlaceCooldown { remaining: f32 },
    /// A misplaced block ends the run when this elapses
    FallingGameOver { block: BlockId, remaining: f32 },
    PruneEffect(PruneEffect),
}

impl TaskKind {
    fn advance(&mut self, dt: f32) -> bool {
        match self {
            TaskKind::PlaceCooldown { remaining } | TaskKind::FallingGameOver { remaining, .. } => {
                *remaining -= dt;
                countdown_done(*remaining, dt)
            }
            TaskKind::PruneEffect(effect) => {
                effect.elapsed += dt;
                countdown_done(PruneEffect::DURATION - effect.elapsed, dt)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    tasks: Vec<TaskKind>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push(&mut self, task: TaskKind) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Count every task down by `dt`; returns the ones that finished, in
    /// scheduling order
    pub fn advance(&mut self, dt: f32) -> Vec<TaskKind> {
        let mut finished = Vec::new();
        let mut pending = Vec::with_capacity(self.tasks.len());
        for mut task in self.tasks.drain(..) {
            if task.advance(dt) {
                finished.push(task);
            } else {
                pending.push(task);
            }
        }
        self.tasks = pending;
        finished
    }

    /// Drop everything; returns the dropped tasks so owners can clean up
    pub fn cancel_all(&mut self) -> Vec<TaskKind> {
        std::mem::take(&mut self.tasks)
    }

    pub fn cooldown_active(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| matches!(t, TaskKind::PlaceCooldown { .. }))
    }

    pub fn fall_pending(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| matches!(t, TaskKind::FallingGameOver { .. }))
    }

    pub fn prune_effects(&self) -> impl Iterator<Item = &PruneEffect> {
        self.tasks.iter().filter_map(|t| match t {
            TaskKind::PruneEffect(effect) => Some(effect),
            _ => None,
        })
    }
}
