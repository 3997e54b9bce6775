//! Score and combo engine
//!
//! Every accepted non-base placement scores one point and extends the combo.
//! When the combo reaches the threshold the timer gets a bonus and the blocks
//! directly below the newest one are pruned from the stack.

use serde::{Deserialize, Serialize};

use super::registry::BlockRegistry;
use super::state::{Block, BlockId};
use super::timer::Timer;
use crate::Settings;

/// Score and combo counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub score: u64,
    /// Always below the combo threshold between placements
    pub combo_count: u32,
}

impl Scoreboard {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a combo paid out
#[derive(Debug, Clone, PartialEq)]
pub struct ComboReward {
    /// Timer value after the bonus
    pub timer: f32,
    /// Blocks taken out of the stack, in stack order
    pub pruned: Vec<Block>,
}

/// Result of scoring one placement
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementScore {
    pub score: u64,
    pub combo_count: u32,
    pub reward: Option<ComboReward>,
}

/// Blocks a combo removes: up to `threshold - 1` blocks directly below the
/// newest one, never the base and never the newest block itself.
pub fn select_prune_targets(registry: &BlockRegistry, threshold: u32) -> Vec<BlockId> {
    let Some((_newest, below)) = registry.as_slice().split_last() else {
        return Vec::new();
    };
    let candidates: Vec<BlockId> = below
        .iter()
        .filter(|b| !b.is_base())
        .map(|b| b.id)
        .collect();

    let take = (threshold as usize).saturating_sub(1).min(candidates.len());
    candidates[candidates.len() - take..].to_vec()
}

/// Score an accepted (non-base) placement; the placed block must already be in
/// the registry as its newest entry.
pub fn on_valid_placement(
    scoreboard: &mut Scoreboard,
    timer: &mut Timer,
    registry: &mut BlockRegistry,
    settings: &Settings,
) -> PlacementScore {
    scoreboard.score += 1;
    scoreboard.combo_count += 1;

    let mut reward = None;
    if scoreboard.combo_count >= settings.combo_threshold {
        let timer_after = timer.add_bonus(settings.combo_timer_bonus);

        let targets = select_prune_targets(registry, settings.combo_threshold);
        let pruned: Vec<Block> = targets
            .into_iter()
            .filter_map(|id| registry.remove(id))
            .collect();
        registry.compact();

        log::info!(
            "Combo! score={} timer={:.2} pruned={}",
            scoreboard.score,
            timer_after,
            pruned.len()
        );

        scoreboard.combo_count = 0;
        reward = Some(ComboReward {
            timer: timer_after,
            pruned,
        });
    }

    PlacementScore {
        score: scoreboard.score,
        combo_count: scoreboard.combo_count,
        reward,
    }
}
