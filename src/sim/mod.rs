//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (stack order, then scheduling order)
//! - Physics and AR surfaces only through the collaborator traits
//! - No rendering or platform dependencies

pub mod collision;
pub mod combo;
pub mod physics;
pub mod placement;
pub mod registry;
pub mod stability;
pub mod state;
pub mod tasks;
pub mod tick;
pub mod timer;

pub use collision::{Aabb, Ray, ray_aabb};
pub use combo::{ComboReward, PlacementScore, Scoreboard, on_valid_placement, select_prune_targets};
pub use physics::{BodyMode, ColumnWorld, PhysicsWorld, PlaneSurface, RayHit, SurfaceTracker};
pub use placement::{
    CandidateSource, PlacementCandidate, PlacementVerdict, resolve_candidate, validate,
};
pub use registry::BlockRegistry;
pub use stability::{SettleRecord, SettleThresholds, StabilityMonitor};
pub use state::{
    Block, BlockId, BlockKind, GameEvent, GameOverCause, GamePhase, GameSession, PhysicsMode,
    Stability,
};
pub use tasks::{PruneEffect, TaskKind, TaskQueue};
pub use tick::{
    PlaceOutcome, RejectReason, TickInput, aim_down_at, enter_game_over, place_candidate,
    request_menu, request_place, request_restart, request_start, tick,
};
pub use timer::{Timer, TimerStatus};
