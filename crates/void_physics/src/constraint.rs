//! Constraints between two bodies
//!
//! A [`Constraint`] couples two bodies through anchors expressed in each
//! body's local frame. The joint kinds form a closed set ([`ConstraintKind`]);
//! each carries its own parameters. Solving lives in [`crate::solver`].

use crate::body::BodyHandle;
use crate::error::{PhysicsError, Result};
use serde::{Deserialize, Serialize};
use void_core::IdGenerator;
use void_math::consts::PI;
use void_math::Vec3;

/// Identifier stamped by a [`ConstraintFactory`]
pub type ConstraintId = u64;

/// Keeps two anchors within a distance band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceParams {
    pub dist: f32,
    pub min_dist: f32,
    pub max_dist: f32,
    /// Fraction of the corrective impulse applied, in `[0, 1]`
    pub stiffness: f32,
}

impl DistanceParams {
    /// A rigid rod of length `dist`
    pub fn new(dist: f32) -> Self {
        Self {
            dist,
            min_dist: dist,
            max_dist: dist,
            stiffness: 1.0,
        }
    }

    pub fn with_range(mut self, min_dist: f32, max_dist: f32) -> Self {
        self.min_dist = min_dist;
        self.max_dist = max_dist;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }
}

/// Rotation about one axis, with angle limits and an optional motor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeParams {
    /// Hinge axis in body A's frame
    pub axis_a: Vec3,
    /// Hinge axis in body B's frame
    pub axis_b: Vec3,
    pub min_angle: f32,
    pub max_angle: f32,
    pub motor_enabled: bool,
    /// Target relative angular speed about the axis
    pub motor_speed: f32,
    pub motor_max_torque: f32,
}

impl HingeParams {
    pub fn new(axis_a: Vec3, axis_b: Vec3) -> Self {
        Self {
            axis_a,
            axis_b,
            min_angle: -PI,
            max_angle: PI,
            motor_enabled: false,
            motor_speed: 0.0,
            motor_max_torque: 0.0,
        }
    }

    pub fn with_limits(mut self, min_angle: f32, max_angle: f32) -> Self {
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.motor_enabled = true;
        self.motor_speed = speed;
        self.motor_max_torque = max_torque;
        self
    }
}

impl Default for HingeParams {
    fn default() -> Self {
        Self::new(Vec3::X, Vec3::X)
    }
}

/// Point joint with cone (swing) and twist limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSocketParams {
    pub swing_limit: f32,
    pub twist_limit: f32,
}

impl BallSocketParams {
    pub fn new(swing_limit: f32, twist_limit: f32) -> Self {
        Self { swing_limit, twist_limit }
    }
}

impl Default for BallSocketParams {
    fn default() -> Self {
        Self::new(PI, PI)
    }
}

/// Translation along one axis, with limits and an optional motor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderParams {
    /// Slide axis in body A's frame
    pub axis: Vec3,
    pub min_dist: f32,
    pub max_dist: f32,
    pub motor_enabled: bool,
    pub motor_speed: f32,
    pub motor_max_force: f32,
}

impl SliderParams {
    pub fn new(axis: Vec3) -> Self {
        Self {
            axis,
            min_dist: f32::NEG_INFINITY,
            max_dist: f32::INFINITY,
            motor_enabled: false,
            motor_speed: 0.0,
            motor_max_force: 0.0,
        }
    }

    pub fn with_limits(mut self, min_dist: f32, max_dist: f32) -> Self {
        self.min_dist = min_dist;
        self.max_dist = max_dist;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.motor_enabled = true;
        self.motor_speed = speed;
        self.motor_max_force = max_force;
        self
    }
}

/// Holds a relative offset and orientation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FixedParams {
    /// Offset of B's anchor from A's anchor, in A's frame
    pub rel_pos: Vec3,
    /// Euler angles of B relative to A
    pub rel_rot: Vec3,
}

impl FixedParams {
    pub fn new(rel_pos: Vec3, rel_rot: Vec3) -> Self {
        Self { rel_pos, rel_rot }
    }
}

/// Damped spring between the anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParams {
    pub rest_len: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl SpringParams {
    pub fn new(rest_len: f32) -> Self {
        Self {
            rest_len,
            stiffness: 100.0,
            damping: 1.0,
        }
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }
}

/// Joint kind with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Distance(DistanceParams),
    Hinge(HingeParams),
    BallSocket(BallSocketParams),
    Slider(SliderParams),
    Fixed(FixedParams),
    Spring(SpringParams),
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Distance(_) => "distance",
            Self::Hinge(_) => "hinge",
            Self::BallSocket(_) => "ball_socket",
            Self::Slider(_) => "slider",
            Self::Fixed(_) => "fixed",
            Self::Spring(_) => "spring",
        }
    }
}

/// A joint between two bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Attachment point in body A's frame
    pub anchor_a: Vec3,
    /// Attachment point in body B's frame
    pub anchor_b: Vec3,
    pub enabled: bool,
    /// Force above which the constraint breaks (default: unbreakable)
    pub break_force: f32,
    pub broken: bool,
    /// Net impulse of the last solve; signed and clamped for distance bounds
    pub(crate) accumulated_impulse: f32,
}

impl Constraint {
    /// Whether the solver should process this constraint
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.broken
    }

    pub fn set_break_force(&mut self, force: f32) {
        self.break_force = force;
    }

    /// Enable the hinge motor; `false` if this is not a hinge
    pub fn set_hinge_motor(&mut self, speed: f32, max_torque: f32) -> bool {
        match &mut self.kind {
            ConstraintKind::Hinge(p) => {
                p.motor_enabled = true;
                p.motor_speed = speed;
                p.motor_max_torque = max_torque;
                true
            }
            _ => false,
        }
    }

    pub fn disable_hinge_motor(&mut self) -> bool {
        match &mut self.kind {
            ConstraintKind::Hinge(p) => {
                p.motor_enabled = false;
                true
            }
            _ => false,
        }
    }

    /// Enable the slider motor; `false` if this is not a slider
    pub fn set_slider_motor(&mut self, speed: f32, max_force: f32) -> bool {
        match &mut self.kind {
            ConstraintKind::Slider(p) => {
                p.motor_enabled = true;
                p.motor_speed = speed;
                p.motor_max_force = max_force;
                true
            }
            _ => false,
        }
    }

    pub fn disable_slider_motor(&mut self) -> bool {
        match &mut self.kind {
            ConstraintKind::Slider(p) => {
                p.motor_enabled = false;
                true
            }
            _ => false,
        }
    }

    /// Whether the constraint touches `body`
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == body
    }
}

/// Builds constraints and stamps their ids
#[derive(Debug, Clone, Default)]
pub struct ConstraintFactory {
    ids: IdGenerator,
}

impl ConstraintFactory {
    /// Ids start at 1
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::starting_at(1),
        }
    }

    /// Build a constraint of any kind
    pub fn create(
        &mut self,
        kind: ConstraintKind,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
    ) -> Result<Constraint> {
        if body_a == body_b {
            return Err(PhysicsError::SameBody(body_a));
        }
        Ok(Constraint {
            id: self.ids.next_id(),
            kind,
            body_a,
            body_b,
            anchor_a,
            anchor_b,
            enabled: true,
            break_force: f32::INFINITY,
            broken: false,
            accumulated_impulse: 0.0,
        })
    }

    pub fn distance(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: DistanceParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::Distance(params), body_a, body_b, anchor_a, anchor_b)
    }

    pub fn hinge(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: HingeParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::Hinge(params), body_a, body_b, anchor_a, anchor_b)
    }

    pub fn ball_socket(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: BallSocketParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::BallSocket(params), body_a, body_b, anchor_a, anchor_b)
    }

    pub fn slider(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: SliderParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::Slider(params), body_a, body_b, anchor_a, anchor_b)
    }

    pub fn fixed(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: FixedParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::Fixed(params), body_a, body_b, anchor_a, anchor_b)
    }

    pub fn spring(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec3,
        anchor_b: Vec3,
        params: SpringParams,
    ) -> Result<Constraint> {
        self.create(ConstraintKind::Spring(params), body_a, body_b, anchor_a, anchor_b)
    }
}

/// Anything that owns a constraint the solver can work on
///
/// Implemented for [`Constraint`] itself and for ragdoll joints.
pub trait ConstraintRef {
    fn constraint(&self) -> &Constraint;
    fn constraint_mut(&mut self) -> &mut Constraint;
}

impl ConstraintRef for Constraint {
    fn constraint(&self) -> &Constraint {
        self
    }

    fn constraint_mut(&mut self) -> &mut Constraint {
        self
    }
}
