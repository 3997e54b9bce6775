//! Ray and box queries for stacked blocks
//!
//! Blocks are treated as axis-aligned cubes. Orientation is ignored for
//! collision: a settled block is near-upright, and a toppled one is caught by
//! the collapse check rather than by probes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A half-line from `origin` along `direction` (normalized on construction)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Straight down from `origin`
    pub fn down(origin: Vec3) -> Self {
        Self::new(origin, Vec3::NEG_Y)
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, half_extent: f32) -> Self {
        let half = Vec3::splat(half_extent);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.max.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.min.y
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Footprints overlap on the horizontal plane (touching edges do not count)
    pub fn overlaps_xz(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

/// Distance along `ray` to the first face of `aabb`, if within `max_distance`
///
/// Slab method. A box that already contains the ray origin is not reported,
/// so a probe cast from inside a block never hits that block.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb, max_distance: f32) -> Option<f32> {
    if aabb.contains_point(ray.origin) {
        return None;
    }

    let mut t_enter = 0.0_f32;
    let mut t_exit = max_distance;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if dir.abs() < f32::EPSILON {
            // Parallel to this slab: must already be between its planes
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let mut t0 = (lo - origin) * inv;
        let mut t1 = (hi - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    Some(t_enter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::from_center(center, 0.05)
    }

    #[test]
    fn test_down_ray_hits_top_face() {
        let aabb = unit_box_at(Vec3::new(0.0, 0.05, 0.0));
        let ray = Ray::down(Vec3::new(0.0, 0.2, 0.0));

        let t = ray_aabb(&ray, &aabb, 1.0).expect("should hit");
        assert!((t - 0.1).abs() < 1e-6);
        assert!((ray.at(t).y - aabb.top()).abs() < 1e-6);
    }

    #[test]
    fn test_down_ray_respects_max_distance() {
        let aabb = unit_box_at(Vec3::new(0.0, 0.05, 0.0));
        let ray = Ray::down(Vec3::new(0.0, 0.2, 0.0));

        assert!(ray_aabb(&ray, &aabb, 0.09).is_none());
    }

    #[test]
    fn test_down_ray_misses_lateral_box() {
        let aabb = unit_box_at(Vec3::new(0.0, 0.05, 0.0));
        // Two block widths to the side
        let ray = Ray::down(Vec3::new(0.2, 0.2, 0.0));

        assert!(ray_aabb(&ray, &aabb, 1.0).is_none());
    }

    #[test]
    fn test_ray_from_inside_ignored() {
        let aabb = unit_box_at(Vec3::ZERO);
        let ray = Ray::down(Vec3::new(0.0, 0.01, 0.0));

        assert!(ray_aabb(&ray, &aabb, 1.0).is_none());
    }

    #[test]
    fn test_oblique_ray_hits_side() {
        let aabb = unit_box_at(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::X);

        let t = ray_aabb(&ray, &aabb, 5.0).expect("should hit");
        assert!((t - 0.95).abs() < 1e-5);
    }

    #[test]
    fn test_overlaps_xz() {
        let a = unit_box_at(Vec3::ZERO);
        let b = unit_box_at(Vec3::new(0.05, 1.0, 0.0));
        let c = unit_box_at(Vec3::new(0.2, 0.0, 0.0));

        assert!(a.overlaps_xz(&b));
        assert!(!a.overlaps_xz(&c));
    }
}
