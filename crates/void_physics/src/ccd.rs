//! Continuous collision detection
//!
//! Fast bodies are swept against their broad-phase candidates over one
//! time step; the earliest time of impact (TOI) per pair is reported so
//! the world can stop bodies before they pass through thin geometry.
//!
//! All contact normals point from the first body of a pair toward the
//! second.

use crate::body::{BodyHandle, BodySet, RigidBody};
use crate::collider::{ColliderSet, ColliderShape};
use crate::config::CcdConfig;
use log::trace;
use std::collections::HashSet;
use void_math::consts::EPSILON;
use void_math::{Aabb, Vec3};

/// A detected impact within the step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiResult {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Seconds from the start of the step until contact
    pub toi: f32,
    /// Contact normal, from `body_a` toward `body_b`
    pub normal: Vec3,
    pub point: Vec3,
}

/// Time, normal and point of a sweep hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub toi: f32,
    pub normal: Vec3,
    pub point: Vec3,
}

/// Tracks which bodies are fast enough to sweep and runs the sweeps
#[derive(Debug, Clone)]
pub struct CcdSystem {
    config: CcdConfig,
    high_speed: HashSet<BodyHandle>,
}

impl CcdSystem {
    pub fn new(config: CcdConfig) -> Self {
        Self {
            config,
            high_speed: HashSet::new(),
        }
    }

    pub fn config(&self) -> &CcdConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Add or remove `handle` from the fast set depending on its speed
    pub fn mark_high_speed(&mut self, body: &RigidBody, handle: BodyHandle) {
        if body.vel.length() > self.config.vel_threshold {
            self.high_speed.insert(handle);
        } else {
            self.high_speed.remove(&handle);
        }
    }

    /// Re-evaluate every body in `bodies`, dropping handles that no longer resolve
    pub fn mark_all(&mut self, bodies: &BodySet) {
        self.high_speed.retain(|h| bodies.contains(*h));
        for (handle, body) in bodies.iter() {
            self.mark_high_speed(body, handle);
        }
    }

    pub fn is_high_speed(&self, handle: BodyHandle) -> bool {
        self.high_speed.contains(&handle)
    }

    pub fn high_speed_count(&self) -> usize {
        self.high_speed.len()
    }

    pub fn clear(&mut self) {
        self.high_speed.clear();
    }

    /// Sweep candidate pairs and report impacts, earliest first.
    ///
    /// Pairs where neither body is fast are skipped, as are pairs where
    /// either collider is missing. A body that no longer resolves sweeps
    /// as stationary at its collider offset.
    pub fn detect_tunneling(
        &self,
        pairs: &[(BodyHandle, BodyHandle)],
        bodies: &BodySet,
        colliders: &ColliderSet,
        dt: f32,
    ) -> Vec<ToiResult> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut results = Vec::new();
        for &(a, b) in pairs {
            if !self.is_high_speed(a) && !self.is_high_speed(b) {
                continue;
            }
            let (Some(col_a), Some(col_b)) = (colliders.get(&a), colliders.get(&b)) else {
                continue;
            };

            let (pos_a, vel_a) = sweep_state(bodies.get(a), col_a.offset);
            let (pos_b, vel_b) = sweep_state(bodies.get(b), col_b.offset);

            let impact = match (col_a.shape, col_b.shape) {
                (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
                    toi_sphere_sphere(pos_a, ra, vel_a, pos_b, rb, vel_b, dt)
                }
                (ColliderShape::Sphere { radius }, ColliderShape::Box { size }) => {
                    toi_sphere_box(pos_a, radius, vel_a, pos_b, size, vel_b, dt)
                }
                (ColliderShape::Box { size }, ColliderShape::Sphere { radius }) => {
                    toi_sphere_box(pos_b, radius, vel_b, pos_a, size, vel_a, dt)
                        .map(|hit| Impact { normal: -hit.normal, ..hit })
                }
                (ColliderShape::Box { size: sa }, ColliderShape::Box { size: sb }) => {
                    toi_box_box(pos_a, sa, vel_a, pos_b, sb, vel_b, dt)
                }
            };

            if let Some(hit) = impact {
                results.push(ToiResult {
                    body_a: a,
                    body_b: b,
                    toi: hit.toi,
                    normal: hit.normal,
                    point: hit.point,
                });
            }
        }

        results.sort_by(|x, y| x.toi.total_cmp(&y.toi));
        trace!("ccd: {} candidate pairs, {} impacts", pairs.len(), results.len());
        results
    }
}

impl Default for CcdSystem {
    fn default() -> Self {
        Self::new(CcdConfig::default())
    }
}

fn sweep_state(body: Option<&RigidBody>, offset: Vec3) -> (Vec3, Vec3) {
    match body {
        Some(body) => (body.pos + offset, body.vel),
        None => (offset, Vec3::ZERO),
    }
}

/// Earliest contact of two moving spheres within `[0, dt]`.
///
/// Already-overlapping spheres report `toi = 0`, with the normal along
/// their separation (or `+Z` when the centers coincide).
pub fn toi_sphere_sphere(
    pos_a: Vec3,
    radius_a: f32,
    vel_a: Vec3,
    pos_b: Vec3,
    radius_b: f32,
    vel_b: Vec3,
    dt: f32,
) -> Option<Impact> {
    let rel_vel = vel_b - vel_a;
    let rel_pos = pos_b - pos_a;
    let sum = radius_a + radius_b;

    let a = rel_vel.dot(rel_vel);
    let b = 2.0 * rel_pos.dot(rel_vel);
    let c = rel_pos.dot(rel_pos) - sum * sum;

    if c < 0.0 {
        let normal = rel_pos.normalize_or(Vec3::Z, EPSILON);
        return Some(Impact {
            toi: 0.0,
            normal,
            point: pos_a + normal * radius_a,
        });
    }
    if a.abs() < EPSILON {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let t = (-b - disc.sqrt()) / (2.0 * a);
    if !(0.0..=dt).contains(&t) {
        return None;
    }

    let hit_a = pos_a + vel_a * t;
    let hit_b = pos_b + vel_b * t;
    let normal = (hit_b - hit_a).normalize_or(Vec3::Z, EPSILON);
    Some(Impact {
        toi: t,
        normal,
        point: hit_a + normal * radius_a,
    })
}

/// Sweep a moving sphere against a moving axis-aligned box.
///
/// The normal points from the sphere into the box face it enters.
pub fn toi_sphere_box(
    sphere_pos: Vec3,
    radius: f32,
    sphere_vel: Vec3,
    box_pos: Vec3,
    box_size: Vec3,
    box_vel: Vec3,
    dt: f32,
) -> Option<Impact> {
    let extents = box_size * 0.5 + Vec3::splat(radius);
    let (toi, face) = slab_sweep(sphere_pos - box_pos, sphere_vel - box_vel, extents, dt)?;

    let normal = -face;
    let hit_sphere = sphere_pos + sphere_vel * toi;
    Some(Impact {
        toi,
        normal,
        point: hit_sphere + normal * radius,
    })
}

/// Sweep box `b` against box `a`; the normal is `a`'s entered face
pub fn toi_box_box(
    pos_a: Vec3,
    size_a: Vec3,
    vel_a: Vec3,
    pos_b: Vec3,
    size_b: Vec3,
    vel_b: Vec3,
    dt: f32,
) -> Option<Impact> {
    let half_b = size_b * 0.5;
    let extents = size_a * 0.5 + half_b;
    let (toi, normal) = slab_sweep(pos_b - pos_a, vel_b - vel_a, extents, dt)?;

    let hit_b = pos_b + vel_b * toi;
    Some(Impact {
        toi,
        normal,
        point: hit_b - normal.mul_elem(half_b),
    })
}

/// Slab test of a point moving at `rel_vel` from `rel_pos` against a
/// stationary box of half extents `extents` centered at the origin.
///
/// Returns the entry time clamped to `[0, dt]` and the outward normal of
/// the entered face (zero if the point starts inside).
fn slab_sweep(rel_pos: Vec3, rel_vel: Vec3, extents: Vec3, dt: f32) -> Option<(f32, Vec3)> {
    let mut t_min = 0.0f32;
    let mut t_max = dt;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let p = rel_pos[axis];
        let v = rel_vel[axis];
        let lo = -extents[axis];
        let hi = extents[axis];

        if v.abs() < EPSILON {
            if p < lo || p > hi {
                return None;
            }
            continue;
        }

        let mut t1 = (lo - p) / v;
        let mut t2 = (hi - p) / v;
        let mut n1 = -Vec3::unit_axis(axis);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            n1 = -n1;
        }
        if t1 > t_min {
            t_min = t1;
            normal = n1;
        }
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    if t_min > dt {
        return None;
    }
    Some((t_min.max(0.0), normal))
}

/// Bounds swept by a box moving at `vel` for `dt`
pub fn swept_aabb(pos: Vec3, size: Vec3, vel: Vec3, dt: f32) -> Aabb {
    let half = size * 0.5;
    let end = pos + vel * dt;
    Aabb::new(pos.min(end) - half, pos.max(end) + half)
}

/// Bounds swept by a sphere moving at `vel` for `dt`
pub fn swept_sphere_aabb(pos: Vec3, radius: f32, vel: Vec3, dt: f32) -> Aabb {
    swept_aabb(pos, Vec3::splat(radius * 2.0), vel, dt)
}
