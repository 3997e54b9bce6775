//! Collaborator seams: the physics world and the surface tracker
//!
//! The engine never owns a physics engine or an AR session. It pulls poses
//! after each physics step and asks for hit-tests through these traits.
//! `ColumnWorld` and `PlaneSurface` are small deterministic stand-ins used by
//! the headless binary and the tests.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, Ray, ray_aabb};
use super::state::BlockId;
use crate::Pose;

/// Simulation mode of a body. `Falling` in the game model is `Dynamic` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyMode {
    Static,
    Dynamic,
}

/// Nearest body along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub block: BlockId,
    pub distance: f32,
    pub point: Vec3,
}

/// Rigid-body simulation the engine drives one step per tick
pub trait PhysicsWorld {
    fn spawn(&mut self, id: BlockId, pose: Pose, mode: BodyMode);
    fn despawn(&mut self, id: BlockId);
    fn set_mode(&mut self, id: BlockId, mode: BodyMode);
    /// Advance dynamic bodies by `dt` seconds
    fn step(&mut self, dt: f32);
    fn pose(&self, id: BlockId) -> Option<Pose>;
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit>;
    /// Remove every body
    fn clear(&mut self);
}

/// Detected real-world planes
pub trait SurfaceTracker {
    /// World pose of the surface under a screen point, if any
    fn try_get_anchor(&self, screen_point: Vec2) -> Option<Pose>;
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// Standard gravity (m/s²)
pub const GRAVITY: f32 = 9.81;

#[derive(Debug, Clone)]
struct Body {
    id: BlockId,
    pose: Pose,
    mode: BodyMode,
    velocity_y: f32,
}

/// Axis-aligned cubes that drop straight down until they rest on something.
///
/// A dynamic body lands on the highest top face below it among bodies whose
/// footprint overlaps its own, or on the floor. A bounded floor lets bodies
/// fall past its edge indefinitely.
#[derive(Debug, Clone)]
pub struct ColumnWorld {
    size: f32,
    floor: Option<f32>,
    floor_half_extent: Option<f32>,
    gravity: f32,
    bodies: Vec<Body>,
}

impl ColumnWorld {
    /// Cubes of edge `size`; `floor` is the height of an infinite ground plane
    pub fn new(size: f32, floor: Option<f32>) -> Self {
        Self {
            size,
            floor,
            floor_half_extent: None,
            gravity: GRAVITY,
            bodies: Vec::new(),
        }
    }

    /// Limit the floor to `|x|, |z| <= half_extent` (a table top)
    pub fn with_floor_extent(mut self, half_extent: f32) -> Self {
        self.floor_half_extent = Some(half_extent);
        self
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.bodies.iter().any(|b| b.id == id)
    }

    pub fn mode(&self, id: BlockId) -> Option<BodyMode> {
        self.body(id).map(|b| b.mode)
    }

    /// Teleport a body, e.g. to simulate a knock
    pub fn set_pose(&mut self, id: BlockId, pose: Pose) {
        if let Some(body) = self.body_mut(id) {
            body.pose = pose;
            body.velocity_y = 0.0;
        }
    }

    fn body(&self, id: BlockId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn body_mut(&mut self, id: BlockId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    fn aabb(&self, pose: &Pose) -> Aabb {
        Aabb::from_center(pose.position, self.size / 2.0)
    }

    fn floor_under(&self, position: Vec3) -> Option<f32> {
        let floor = self.floor?;
        match self.floor_half_extent {
            Some(half) if position.x.abs() > half || position.z.abs() > half => None,
            _ => Some(floor),
        }
    }

    /// Highest surface at or below the bottom of body `index`
    fn rest_height(&self, index: usize) -> Option<f32> {
        let body = &self.bodies[index];
        let own = self.aabb(&body.pose);
        let tolerance = self.size * 1e-3;

        let support = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, other)| self.aabb(&other.pose))
            .filter(|other| other.overlaps_xz(&own) && other.top() <= own.bottom() + tolerance)
            .map(|other| other.top())
            .fold(None, |best: Option<f32>, top| Some(best.map_or(top, |b| b.max(top))));

        match (support, self.floor_under(body.pose.position)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

impl PhysicsWorld for ColumnWorld {
    fn spawn(&mut self, id: BlockId, pose: Pose, mode: BodyMode) {
        self.despawn(id);
        self.bodies.push(Body {
            id,
            pose,
            mode,
            velocity_y: 0.0,
        });
    }

    fn despawn(&mut self, id: BlockId) {
        self.bodies.retain(|b| b.id != id);
    }

    fn set_mode(&mut self, id: BlockId, mode: BodyMode) {
        if let Some(body) = self.body_mut(id) {
            body.mode = mode;
            body.velocity_y = 0.0;
        }
    }

    fn step(&mut self, dt: f32) {
        // Lowest first, so a body lands on a support that already moved this step
        let mut order: Vec<usize> = (0..self.bodies.len())
            .filter(|&i| self.bodies[i].mode == BodyMode::Dynamic)
            .collect();
        order.sort_by(|&a, &b| {
            self.bodies[a]
                .pose
                .position
                .y
                .total_cmp(&self.bodies[b].pose.position.y)
        });

        let half = self.size / 2.0;
        for index in order {
            let rest = self.rest_height(index);
            let gravity = self.gravity;
            let body = &mut self.bodies[index];

            body.velocity_y -= gravity * dt;
            let next_y = body.pose.position.y + body.velocity_y * dt;

            match rest {
                Some(surface) if next_y - half <= surface => {
                    body.pose.position.y = surface + half;
                    body.velocity_y = 0.0;
                }
                _ => body.pose.position.y = next_y,
            }
        }
    }

    fn pose(&self, id: BlockId) -> Option<Pose> {
        self.body(id).map(|b| b.pose)
    }

    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        self.bodies
            .iter()
            .filter_map(|body| {
                ray_aabb(ray, &self.aabb(&body.pose), max_distance).map(|distance| RayHit {
                    block: body.id,
                    distance,
                    point: ray.at(distance),
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn clear(&mut self) {
        self.bodies.clear();
    }
}

/// A single horizontal plane seen through a square screen.
///
/// Screen points span `[-1, 1]` on both axes and map linearly onto
/// `[-extent, extent]` in world X/Z.
#[derive(Debug, Clone)]
pub struct PlaneSurface {
    height: f32,
    extent: f32,
    enabled: bool,
}

impl PlaneSurface {
    pub fn new(height: f32, extent: f32) -> Self {
        Self {
            height,
            extent,
            enabled: true,
        }
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

impl SurfaceTracker for PlaneSurface {
    fn try_get_anchor(&self, screen_point: Vec2) -> Option<Pose> {
        if !self.enabled || screen_point.abs().max_element() > 1.0 {
            return None;
        }
        let world = screen_point * self.extent;
        Some(Pose::at(Vec3::new(world.x, self.height, world.y)))
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
