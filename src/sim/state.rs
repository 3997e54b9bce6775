//! Game state and core simulation types
//!
//! One `GameSession` owns everything a playthrough needs. It is passed
//! explicitly to the tick and request functions; nothing is global.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::combo::Scoreboard;
use super::registry::BlockRegistry;
use super::stability::StabilityMonitor;
use super::tasks::{PruneEffect, TaskQueue};
use super::timer::Timer;
use crate::{Pose, Settings, SettingsError};

/// Unique block identifier, assigned in placement order
pub type BlockId = u32;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Initial state, nothing tracked
    MainMenu,
    /// Surface tracking active, waiting for the base
    AwaitingAnchor,
    /// Base placed, timer running
    Active,
    /// Run ended
    GameOver,
}

/// Block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// The immovable first block
    Base,
    Stackable,
}

/// How the physics world treats a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicsMode {
    Static,
    Dynamic,
    /// Released after a misplacement
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Settling,
    Stable,
}

/// A placed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub position: Vec3,
    pub orientation: Quat,
    pub mode: PhysicsMode,
    pub stability: Stability,
    /// Position in the stack, 0 = base
    pub stack_index: usize,
}

impl Block {
    /// The anchor block: static and stable for its whole life
    pub fn base(id: BlockId, pose: Pose) -> Self {
        Self {
            id,
            kind: BlockKind::Base,
            position: pose.position,
            orientation: pose.orientation,
            mode: PhysicsMode::Static,
            stability: Stability::Stable,
            stack_index: 0,
        }
    }

    /// A freshly dropped block, handed to physics
    pub fn stackable(id: BlockId, pose: Pose) -> Self {
        Self {
            id,
            kind: BlockKind::Stackable,
            position: pose.position,
            orientation: pose.orientation,
            mode: PhysicsMode::Dynamic,
            stability: Stability::Settling,
            stack_index: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.position = pose.position;
        self.orientation = pose.orientation;
    }

    pub fn is_base(&self) -> bool {
        self.kind == BlockKind::Base
    }

    /// Dynamic -> Static. Returns false (and changes nothing) for any other mode.
    pub fn freeze(&mut self) -> bool {
        if self.mode == PhysicsMode::Dynamic {
            self.mode = PhysicsMode::Static;
            true
        } else {
            false
        }
    }

    /// Dynamic -> Falling. Returns false (and changes nothing) for any other mode.
    pub fn release(&mut self) -> bool {
        if self.mode == PhysicsMode::Dynamic {
            self.mode = PhysicsMode::Falling;
            true
        } else {
            false
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverCause {
    TimerExpired,
    /// A stacked block dropped below the anchor
    Collapse { block: BlockId },
    /// A misplaced block finished its fall delay
    BlockFell { block: BlockId },
}

/// Notifications for the presentation layer, drained once per frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    SurfaceTrackingChanged { enabled: bool },
    BlockPlaced { block: BlockId, kind: BlockKind, stack_index: usize },
    BlockMisplaced { block: BlockId },
    BlockStabilized { block: BlockId },
    ScoreChanged { score: u64 },
    ComboChanged { count: u32, threshold: u32 },
    ComboTriggered { timer: f32, pruned: Vec<BlockId> },
    /// Removed from the stack; its destruction effect starts now
    BlockPruned { block: BlockId },
    PruneEffectFinished { block: BlockId },
    /// Cooldown elapsed, the next placement will be accepted
    PlacementReady,
    TimerChanged { remaining: f32, fraction: f32 },
    GameOver { final_score: u64, cause: GameOverCause },
}

/// Complete state of one playthrough
#[derive(Debug, Clone)]
pub struct GameSession {
    pub(crate) settings: Settings,
    pub(crate) phase: GamePhase,
    pub(crate) scoreboard: Scoreboard,
    pub(crate) timer: Timer,
    /// Top face of the base, set once anchored
    pub(crate) anchor_height: Option<f32>,
    pub(crate) registry: BlockRegistry,
    /// Misplaced blocks, outside the stack
    pub(crate) stray: Vec<Block>,
    pub(crate) monitor: StabilityMonitor,
    pub(crate) tasks: TaskQueue,
    pub(crate) events: Vec<GameEvent>,
    /// Simulation tick counter
    pub time_ticks: u64,
    next_id: BlockId,
}

impl GameSession {
    /// Create a session in the main menu. Fails on inconsistent settings.
    pub fn new(settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            phase: GamePhase::MainMenu,
            scoreboard: Scoreboard::default(),
            timer: Timer::new(settings.timer_max),
            anchor_height: None,
            registry: BlockRegistry::new(),
            stray: Vec::new(),
            monitor: StabilityMonitor::new(),
            tasks: TaskQueue::new(),
            events: Vec::new(),
            time_ticks: 0,
            next_id: 1,
            settings,
        })
    }

    /// Allocate a new block ID
    pub(crate) fn next_block_id(&mut self) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub(crate) fn set_phase(&mut self, to: GamePhase) {
        let from = self.phase;
        if from != to {
            log::info!("Phase {:?} -> {:?}", from, to);
            self.phase = to;
            self.emit(GameEvent::PhaseChanged { from, to });
        }
    }

    pub(crate) fn emit_scoreboard(&mut self) {
        let score = self.scoreboard.score;
        let count = self.scoreboard.combo_count;
        let threshold = self.settings.combo_threshold;
        self.emit(GameEvent::ScoreChanged { score });
        self.emit(GameEvent::ComboChanged { count, threshold });
    }

    pub(crate) fn emit_timer(&mut self) {
        let remaining = self.timer.remaining();
        let fraction = self.timer.fraction();
        self.emit(GameEvent::TimerChanged {
            remaining,
            fraction,
        });
    }

    /// Take all events raised since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.scoreboard.score
    }

    pub fn combo_count(&self) -> u32 {
        self.scoreboard.combo_count
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn anchor_height(&self) -> Option<f32> {
        self.anchor_height
    }

    /// Blocks currently in the stack, in stack order
    pub fn blocks(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Misplaced blocks released to fall
    pub fn stray_blocks(&self) -> &[Block] {
        &self.stray
    }

    /// Pruned blocks still playing their destruction effect
    pub fn prune_effects(&self) -> impl Iterator<Item = &PruneEffect> {
        self.tasks.prune_effects()
    }

    /// Whether a place request would currently be considered
    pub fn can_place(&self) -> bool {
        matches!(self.phase, GamePhase::AwaitingAnchor | GamePhase::Active)
            && !self.tasks.cooldown_active()
            && !self.tasks.fall_pending()
    }
}
