//! Collision shapes attached to bodies
//!
//! Colliders here only feed continuous collision detection; they are
//! read-only during a sweep.

use crate::body::BodyHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use void_math::{Aabb, Vec3};

/// Collider shapes supported by the sweeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    /// Axis-aligned box with full edge lengths `size`
    Box { size: Vec3 },
}

impl ColliderShape {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    pub fn cuboid(size: Vec3) -> Self {
        Self::Box { size }
    }

    /// Bounds of the shape centered at `center`
    pub fn aabb(&self, center: Vec3) -> Aabb {
        match *self {
            Self::Sphere { radius } => Aabb::from_center_half_extents(center, Vec3::splat(radius)),
            Self::Box { size } => Aabb::from_center_size(center, size),
        }
    }
}

/// A shape offset from its body's position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub offset: Vec3,
}

impl Collider {
    pub fn new(shape: ColliderShape) -> Self {
        Self { shape, offset: Vec3::ZERO }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ColliderShape::sphere(radius))
    }

    pub fn cuboid(size: Vec3) -> Self {
        Self::new(ColliderShape::cuboid(size))
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// World-space center for a body at `body_pos`
    #[inline]
    pub fn center(&self, body_pos: Vec3) -> Vec3 {
        body_pos + self.offset
    }
}

/// Colliders keyed by the body they belong to (one per body)
pub type ColliderSet = HashMap<BodyHandle, Collider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_bounds() {
        let sphere = ColliderShape::sphere(0.5).aabb(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(sphere.min, Vec3::new(0.5, -0.5, -0.5));

        let cube = ColliderShape::cuboid(Vec3::new(2.0, 4.0, 6.0)).aabb(Vec3::ZERO);
        assert_eq!(cube.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_offset_center() {
        let c = Collider::sphere(1.0).with_offset(Vec3::Z);
        assert_eq!(c.center(Vec3::X), Vec3::new(1.0, 0.0, 1.0));
    }
}
