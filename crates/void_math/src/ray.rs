//! Bounded rays and raycast results
//!
//! Vehicles probe the ground with these; whoever owns the scene geometry
//! answers the query.

use crate::vector::Vec3;

/// Ray limited to `max_dist` along `dir`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ray {
    pub origin: Vec3,
    /// Direction (normalized on construction)
    pub dir: Vec3,
    pub max_dist: f32,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, dir: Vec3, max_dist: f32) -> Self {
        Self {
            origin,
            dir: dir.normalize(),
            max_dist,
        }
    }

    /// Point at distance `t` along the ray
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Intersect with the plane through `point` with normal `normal`
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> RayHit {
        let denom = self.dir.dot(normal);
        if denom.abs() < 1e-6 {
            return RayHit::miss();
        }
        let t = (point - self.origin).dot(normal) / denom;
        if t < 0.0 || t > self.max_dist {
            return RayHit::miss();
        }
        let facing = if denom < 0.0 { normal } else { -normal };
        RayHit::new(t, self.at(t), facing.normalize())
    }
}

/// Result of a raycast
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RayHit {
    pub hit: bool,
    pub dist: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl RayHit {
    #[inline]
    pub fn new(dist: f32, point: Vec3, normal: Vec3) -> Self {
        Self { hit: true, dist, point, normal }
    }

    #[inline]
    pub fn miss() -> Self {
        Self {
            hit: false,
            dist: f32::INFINITY,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::miss()
    }
}
