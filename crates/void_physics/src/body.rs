//! Rigid bodies and the arena that owns them

use log::warn;
use serde::{Deserialize, Serialize};
use void_core::{EntityId, Handle, HandleMap};
use void_math::{Mat3, Vec3};

/// Seconds a body must stay below its sleep threshold before sleeping
pub const SLEEP_DELAY: f32 = 0.5;

/// Handle to a rigid body in a [`BodySet`]
pub type BodyHandle = Handle<RigidBody>;

/// Generational arena of rigid bodies
pub type BodySet = HandleMap<RigidBody>;

/// Type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RigidBodyType {
    /// Static body - never moves, infinite mass
    Static,
    /// Dynamic body - fully simulated
    #[default]
    Dynamic,
    /// Kinematic body - moved by its velocity only, unaffected by forces
    Kinematic,
}

/// A simulated body
///
/// Orientation is stored as XYZ Euler angles (see [`Mat3::from_euler`]).
/// Inertia is diagonal and expressed in world axes.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub entity: EntityId,
    pub kind: RigidBodyType,
    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: Vec3,
    pub inv_inertia: Vec3,
    pub pos: Vec3,
    pub rot: Vec3,
    pub vel: Vec3,
    pub ang_vel: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
    pub drag: f32,
    pub ang_drag: f32,
    pub gravity_scale: f32,
    pub restitution: f32,
    pub friction: f32,
    pub sleeping: bool,
    pub sleep_threshold: f32,
    pub sleep_timer: f32,
    pub enabled: bool,
}

impl RigidBody {
    /// Create a body at the origin.
    ///
    /// Static and kinematic bodies get zero inverse mass. A dynamic body
    /// with a non-positive mass is kept but treated as immovable.
    pub fn new(entity: EntityId, kind: RigidBodyType, mass: f32) -> Self {
        let movable = kind == RigidBodyType::Dynamic;
        let valid_mass = mass > 0.0 && mass.is_finite();
        if movable && !valid_mass {
            warn!("dynamic body {entity} created with non-positive mass {mass}; treating it as immovable");
        }
        let inv = if movable && valid_mass { 1.0 / mass } else { 0.0 };

        Self {
            entity,
            kind,
            mass,
            inv_mass: inv,
            inertia: Vec3::splat(mass),
            inv_inertia: Vec3::splat(inv),
            pos: Vec3::ZERO,
            rot: Vec3::ZERO,
            vel: Vec3::ZERO,
            ang_vel: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            drag: 0.01,
            ang_drag: 0.05,
            gravity_scale: 1.0,
            restitution: 0.3,
            friction: 0.5,
            sleeping: false,
            sleep_threshold: 0.01,
            sleep_timer: 0.0,
            enabled: true,
        }
    }

    pub fn dynamic(entity: EntityId, mass: f32) -> Self {
        Self::new(entity, RigidBodyType::Dynamic, mass)
    }

    pub fn fixed(entity: EntityId) -> Self {
        Self::new(entity, RigidBodyType::Static, 0.0)
    }

    pub fn kinematic(entity: EntityId) -> Self {
        Self::new(entity, RigidBodyType::Kinematic, 0.0)
    }

    pub fn with_position(mut self, pos: Vec3) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_rotation(mut self, rot: Vec3) -> Self {
        self.rot = rot;
        self
    }

    pub fn with_velocity(mut self, vel: Vec3) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_angular_velocity(mut self, ang_vel: Vec3) -> Self {
        self.ang_vel = ang_vel;
        self
    }

    pub fn with_drag(mut self, drag: f32, ang_drag: f32) -> Self {
        self.drag = drag;
        self.ang_drag = ang_drag;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.kind == RigidBodyType::Static
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.kind == RigidBodyType::Dynamic
    }

    /// Whether the body currently takes part in integration
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_static() && self.enabled && !self.sleeping
    }

    /// Rotation matrix for the current orientation
    #[inline]
    pub fn rotation(&self) -> Mat3 {
        Mat3::from_euler(self.rot)
    }

    /// Transform a point from body space to world space
    #[inline]
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.pos + self.rotation() * local
    }

    // ==================== Forces & Impulses ====================

    pub fn apply_force(&mut self, force: Vec3) {
        if self.is_static() {
            return;
        }
        self.force += force;
        self.wake();
    }

    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.is_static() {
            return;
        }
        self.vel += impulse * self.inv_mass;
        self.wake();
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_static() {
            return;
        }
        self.torque += torque;
        self.wake();
    }

    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        if self.is_static() {
            return;
        }
        self.ang_vel += impulse.mul_elem(self.inv_inertia);
        self.wake();
    }

    /// Force applied at a world-space point: adds `r × f` as torque
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        if self.is_static() {
            return;
        }
        self.apply_force(force);
        self.apply_torque((point - self.pos).cross(force));
    }

    pub fn set_velocity(&mut self, vel: Vec3) {
        if self.is_static() {
            return;
        }
        self.vel = vel;
        self.wake();
    }

    pub fn set_angular_velocity(&mut self, ang_vel: Vec3) {
        if self.is_static() {
            return;
        }
        self.ang_vel = ang_vel;
        self.wake();
    }

    // ==================== Integration ====================

    /// Velocity half of a semi-implicit Euler step.
    ///
    /// Adds gravity and accumulated force/torque, applies drag and clears
    /// the accumulators. Immovable bodies only clear the accumulators.
    pub fn integrate_velocity(&mut self, dt: f32, gravity: Vec3) {
        if !self.is_active() {
            return;
        }
        if self.inv_mass > 0.0 {
            self.vel += gravity * (self.gravity_scale * dt);
            self.vel += self.force * (self.inv_mass * dt);
            self.ang_vel += self.torque.mul_elem(self.inv_inertia) * dt;
            self.vel *= (1.0 - self.drag * dt).max(0.0);
            self.ang_vel *= (1.0 - self.ang_drag * dt).max(0.0);
        }
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    /// Position half of a semi-implicit Euler step
    pub fn integrate_position(&mut self, dt: f32) {
        if !self.is_active() {
            return;
        }
        self.pos += self.vel * dt;
        self.rot += self.ang_vel * dt;
    }

    /// Full semi-implicit Euler step
    pub fn integrate(&mut self, dt: f32, gravity: Vec3) {
        self.integrate_velocity(dt, gravity);
        self.integrate_position(dt);
    }

    /// Advance the sleep timer; puts the body to sleep after
    /// [`SLEEP_DELAY`] seconds below its threshold
    pub fn update_sleep(&mut self, dt: f32) {
        if !self.is_active() {
            return;
        }
        if self.vel.length() < self.sleep_threshold && self.ang_vel.length() < self.sleep_threshold {
            self.sleep_timer += dt;
            if self.sleep_timer > SLEEP_DELAY {
                self.sleeping = true;
                self.vel = Vec3::ZERO;
                self.ang_vel = Vec3::ZERO;
            }
        } else {
            self.sleep_timer = 0.0;
        }
    }

    pub fn wake(&mut self) {
        self.sleeping = false;
        self.sleep_timer = 0.0;
    }

    // ==================== Queries ====================

    /// Velocity of a world-space point rigidly attached to the body
    #[inline]
    pub fn point_velocity(&self, point: Vec3) -> Vec3 {
        self.vel + self.ang_vel.cross(point - self.pos)
    }

    /// Translational kinetic energy
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.vel.length_squared()
    }

    pub fn momentum(&self) -> Vec3 {
        self.vel * self.mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const G: Vec3 = Vec3::new(0.0, 0.0, -9.81);

    #[test]
    fn test_inverse_mass_by_kind() {
        assert_relative_eq!(RigidBody::dynamic(EntityId(1), 4.0).inv_mass, 0.25);
        assert_eq!(RigidBody::fixed(EntityId(2)).inv_mass, 0.0);
        assert_eq!(RigidBody::kinematic(EntityId(3)).inv_mass, 0.0);
        assert_eq!(RigidBody::dynamic(EntityId(4), 0.0).inv_mass, 0.0);
        assert_eq!(RigidBody::dynamic(EntityId(5), -2.0).inv_inertia, Vec3::ZERO);
    }

    #[test]
    fn test_gravity_integration() {
        let mut body = RigidBody::dynamic(EntityId(1), 1.0).with_drag(0.0, 0.0);
        body.integrate(0.1, G);

        assert_relative_eq!(body.vel.z, -0.981, epsilon = 1e-5);
        // semi-implicit: position uses the updated velocity
        assert_relative_eq!(body.pos.z, -0.0981, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_mass_dynamic_does_not_move() {
        let mut body = RigidBody::dynamic(EntityId(1), 0.0);
        body.apply_force(Vec3::new(100.0, 0.0, 0.0));
        body.apply_impulse(Vec3::new(100.0, 0.0, 0.0));
        body.integrate(0.1, G);

        assert_eq!(body.pos, Vec3::ZERO);
        assert!(body.vel.is_finite());
    }

    #[test]
    fn test_static_ignores_everything() {
        let mut body = RigidBody::fixed(EntityId(1));
        body.apply_force(Vec3::X);
        body.apply_impulse(Vec3::X);
        body.set_velocity(Vec3::X);
        body.integrate(1.0, G);

        assert_eq!(body.pos, Vec3::ZERO);
        assert_eq!(body.vel, Vec3::ZERO);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_kinematic_moves_by_velocity_only() {
        let mut body = RigidBody::kinematic(EntityId(1)).with_velocity(Vec3::X);
        body.apply_force(Vec3::new(0.0, 50.0, 0.0));
        body.integrate(1.0, G);

        assert_eq!(body.pos, Vec3::X);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_force_at_point_adds_torque() {
        let mut body = RigidBody::dynamic(EntityId(1), 1.0);
        body.apply_force_at_point(Vec3::Y, Vec3::X);
        assert_eq!(body.force, Vec3::Y);
        assert_eq!(body.torque, Vec3::Z);
    }

    #[test]
    fn test_accumulators_reset_after_integration() {
        let mut body = RigidBody::dynamic(EntityId(1), 2.0);
        body.apply_force(Vec3::X);
        body.apply_torque(Vec3::Z);
        body.integrate(0.016, Vec3::ZERO);
        assert_eq!(body.force, Vec3::ZERO);
        assert_eq!(body.torque, Vec3::ZERO);
    }

    #[test]
    fn test_sleep_after_delay_and_wake() {
        let mut body = RigidBody::dynamic(EntityId(1), 1.0);
        for _ in 0..40 {
            body.update_sleep(1.0 / 60.0);
        }
        assert!(body.sleeping);

        let before = body.pos;
        body.integrate(0.1, G);
        assert_eq!(body.pos, before);

        body.apply_impulse(Vec3::X);
        assert!(!body.sleeping);
        assert_eq!(body.sleep_timer, 0.0);
    }

    #[test]
    fn test_point_velocity_and_energy() {
        let body = RigidBody::dynamic(EntityId(1), 2.0)
            .with_velocity(Vec3::new(3.0, 0.0, 0.0))
            .with_angular_velocity(Vec3::Z);

        assert_eq!(body.point_velocity(Vec3::X), Vec3::new(3.0, 1.0, 0.0));
        assert_relative_eq!(body.kinetic_energy(), 9.0);
        assert_eq!(body.momentum(), Vec3::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn test_body_set_stale_handle() {
        let mut set = BodySet::new();
        let h = set.insert(RigidBody::dynamic(EntityId(1), 1.0));
        set.remove(h);
        assert!(set.get(h).is_none());
    }
}
