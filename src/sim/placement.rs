//! Placement candidates and the support check
//!
//! A candidate is where the next block would go. The validator only decides;
//! the session applies the consequences.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::collision::Ray;
use super::physics::{PhysicsWorld, SurfaceTracker};
use super::registry::BlockRegistry;
use super::state::{BlockId, GamePhase};
use crate::Pose;
use crate::consts::AIM_RANGE;

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    /// Detected real-world surface
    Surface,
    /// Aimed at a block already in the stack
    Stack { block: BlockId },
}

/// A proposed, not yet committed placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementCandidate {
    pub pose: Pose,
    pub source: CandidateSource,
}

impl PlacementCandidate {
    pub fn new(pose: Pose, source: CandidateSource) -> Self {
        Self { pose, source }
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }
}

/// Outcome of the support check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementVerdict {
    /// Extends the stack. `support` is `None` for the base.
    Accepted { support: Option<BlockId> },
    /// Nothing in the stack below; the block will fall
    Misplaced,
}

/// Decide whether `candidate` legally extends the stack.
///
/// An empty registry accepts anything (the candidate becomes the base).
/// Otherwise a probe is cast straight down from the candidate, up to
/// `probe_distance`; the nearest hit must be a block in the registry.
pub fn validate<P: PhysicsWorld + ?Sized>(
    candidate: &PlacementCandidate,
    registry: &BlockRegistry,
    physics: &P,
    probe_distance: f32,
) -> PlacementVerdict {
    if registry.is_empty() {
        return PlacementVerdict::Accepted { support: None };
    }

    let probe = Ray::down(candidate.position());
    match physics.raycast(&probe, probe_distance) {
        Some(hit) if registry.contains(hit.block) => PlacementVerdict::Accepted {
            support: Some(hit.block),
        },
        _ => PlacementVerdict::Misplaced,
    }
}

/// Work out the candidate for a place request.
///
/// Before the anchor exists the candidate sits on the surface under
/// `screen_point`. Once active, an aim ray that hits a stacked block puts the
/// candidate on top of the hit point; failing that the raw surface hit is used.
pub fn resolve_candidate<P, S>(
    phase: GamePhase,
    registry: &BlockRegistry,
    physics: &P,
    surface: &S,
    screen_point: Vec2,
    aim: Option<&Ray>,
    block_height: f32,
) -> Option<PlacementCandidate>
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    let lift = Vec3::Y * (block_height / 2.0);

    match phase {
        GamePhase::AwaitingAnchor => {
            let anchor = surface.try_get_anchor(screen_point)?;
            Some(PlacementCandidate::new(
                Pose::at(anchor.position + lift),
                CandidateSource::Surface,
            ))
        }
        GamePhase::Active => {
            let on_stack = aim
                .and_then(|ray| physics.raycast(ray, AIM_RANGE))
                .filter(|hit| registry.contains(hit.block))
                .map(|hit| {
                    PlacementCandidate::new(
                        Pose::at(hit.point + lift),
                        CandidateSource::Stack { block: hit.block },
                    )
                });

            on_stack.or_else(|| {
                surface
                    .try_get_anchor(screen_point)
                    .map(|anchor| PlacementCandidate::new(Pose::at(anchor.position), CandidateSource::Surface))
            })
        }
        GamePhase::MainMenu | GamePhase::GameOver => None,
    }
}
