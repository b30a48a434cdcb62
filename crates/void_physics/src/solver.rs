//! Sequential-impulse constraint solver
//!
//! Each [`ConstraintSolver::solve`] call runs an optional warm start, then
//! a fixed number of velocity iterations over every active constraint, then
//! the soft springs and the break checks. [`ConstraintSolver::solve_positions`]
//! removes the residual drift with a Baumgarte-weighted positional pass.
//!
//! Inertia is diagonal, so angular effective masses are computed per axis.

use crate::body::{BodySet, RigidBody};
use crate::config::SolverConfig;
use crate::constraint::{
    BallSocketParams, Constraint, ConstraintKind, ConstraintRef, DistanceParams, FixedParams, HingeParams,
    SliderParams, SpringParams,
};
use crate::events::{emit, EventSender, PhysicsEvent};
use log::debug;
use void_math::consts::EPSILON;
use void_math::{Mat3, Vec3};

/// Fraction of last step's impulse re-applied when warm starting
const WARM_START_FACTOR: f32 = 0.8;

/// World-space view of a constraint's anchors for the current iteration
struct Anchors {
    rot_a: Mat3,
    /// Lever arm from body A's center
    ra: Vec3,
    rb: Vec3,
    pa: Vec3,
    pb: Vec3,
}

impl Anchors {
    fn new(c: &Constraint, a: &RigidBody, b: &RigidBody) -> Self {
        let rot_a = a.rotation();
        let ra = rot_a * c.anchor_a;
        let rb = b.rotation() * c.anchor_b;
        Self {
            rot_a,
            ra,
            rb,
            pa: a.pos + ra,
            pb: b.pos + rb,
        }
    }

    /// Relative velocity of anchor B with respect to anchor A
    fn rel_vel(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        b.point_velocity(self.pb) - a.point_velocity(self.pa)
    }
}

/// Inverse of the effective mass along `n`, or zero when both ends are immovable
fn linear_eff_mass(a: &RigidBody, b: &RigidBody, ra: Vec3, rb: Vec3, n: Vec3) -> f32 {
    let rna = ra.cross(n);
    let rnb = rb.cross(n);
    let k = a.inv_mass
        + b.inv_mass
        + rna.mul_elem(rna).dot(a.inv_inertia)
        + rnb.mul_elem(rnb).dot(b.inv_inertia);
    if k > EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

fn angular_eff_mass(a: &RigidBody, b: &RigidBody, axis: Vec3) -> f32 {
    let k = axis.mul_elem(axis).dot(a.inv_inertia + b.inv_inertia);
    if k > EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

/// Equal and opposite impulse: `-j` on A, `+j` on B, at the lever arms
fn apply_linear(a: &mut RigidBody, b: &mut RigidBody, ra: Vec3, rb: Vec3, j: Vec3) {
    a.vel -= j * a.inv_mass;
    a.ang_vel -= ra.cross(j).mul_elem(a.inv_inertia);
    b.vel += j * b.inv_mass;
    b.ang_vel += rb.cross(j).mul_elem(b.inv_inertia);
}

fn apply_angular(a: &mut RigidBody, b: &mut RigidBody, l: Vec3) {
    a.ang_vel -= l.mul_elem(a.inv_inertia);
    b.ang_vel += l.mul_elem(b.inv_inertia);
}

/// Move both bodies so the gap along `n` shrinks by `error`, split by inverse mass
fn correct_positions(a: &mut RigidBody, b: &mut RigidBody, n: Vec3, error: f32) {
    let total = a.inv_mass + b.inv_mass;
    if total < EPSILON {
        return;
    }
    let step = n * (error / total);
    a.pos += step * a.inv_mass;
    b.pos -= step * b.inv_mass;
    for body in [a, b] {
        if body.inv_mass > 0.0 {
            body.wake();
        }
    }
}

/// Per-call state that must not leak between solver invocations
#[derive(Default, Clone, Copy)]
struct CallState {
    /// Clamped motor impulse along the joint axis
    motor: f32,
    /// Signed point-constraint impulse, summed over iterations
    linear: Vec3,
}

/// Iterative solver for the closed set of joint kinds
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    config: SolverConfig,
    events: Option<EventSender>,
}

impl ConstraintSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config, events: None }
    }

    /// Report broken constraints through `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    // ==================== Velocity Pass ====================

    /// Run warm start, the velocity iterations, springs and break checks
    pub fn solve<C: ConstraintRef>(&self, constraints: &mut [C], bodies: &mut BodySet, dt: f32) {
        if dt < EPSILON || constraints.is_empty() {
            return;
        }

        for c in constraints.iter_mut() {
            let c = c.constraint_mut();
            if self.config.warm_start && c.is_active() {
                warm_start(c, bodies);
            } else {
                c.accumulated_impulse = 0.0;
            }
        }

        let mut states = vec![CallState::default(); constraints.len()];
        for _ in 0..self.config.iterations {
            for (c, state) in constraints.iter_mut().zip(states.iter_mut()) {
                let c = c.constraint_mut();
                if !c.is_active() {
                    continue;
                }
                self.solve_velocity(c, state, bodies, dt);
            }
        }

        for (c, state) in constraints.iter_mut().zip(states.iter()) {
            let c = c.constraint_mut();
            if !c.is_active() {
                continue;
            }
            match c.kind {
                ConstraintKind::Spring(p) => apply_spring(c, &p, bodies, dt),
                ConstraintKind::Hinge(_) | ConstraintKind::BallSocket(_) | ConstraintKind::Fixed(_) => {
                    c.accumulated_impulse = state.linear.length();
                }
                ConstraintKind::Distance(_) | ConstraintKind::Slider(_) => {}
            }
            if c.accumulated_impulse.abs() / dt > c.break_force {
                c.broken = true;
                debug!(
                    "{} constraint {} broke (force {:.1} > {:.1})",
                    c.kind.name(),
                    c.id,
                    c.accumulated_impulse.abs() / dt,
                    c.break_force
                );
                emit(&self.events, PhysicsEvent::ConstraintBroken { id: c.id });
            }
        }
    }

    fn solve_velocity(&self, c: &mut Constraint, state: &mut CallState, bodies: &mut BodySet, dt: f32) {
        let Some((a, b)) = bodies.get2_mut(c.body_a, c.body_b) else {
            return;
        };
        let beta = self.config.baumgarte;
        let anchors = Anchors::new(c, a, b);

        match c.kind {
            ConstraintKind::Distance(p) => {
                solve_distance(&p, &anchors, a, b, &mut c.accumulated_impulse, beta, dt);
            }
            ConstraintKind::Hinge(p) => {
                state.linear += solve_point(&anchors, Vec3::ZERO, a, b, beta, dt);
                solve_hinge(&p, &anchors, &mut state.motor, a, b, beta, dt);
            }
            ConstraintKind::BallSocket(p) => {
                state.linear += solve_point(&anchors, Vec3::ZERO, a, b, beta, dt);
                solve_ball_socket(c.anchor_a, &p, &anchors, a, b, beta, dt);
            }
            ConstraintKind::Slider(p) => {
                c.accumulated_impulse += solve_slider(&p, &anchors, &mut state.motor, a, b, beta, dt);
            }
            ConstraintKind::Fixed(p) => {
                state.linear += solve_point(&anchors, anchors.rot_a * p.rel_pos, a, b, beta, dt);
                solve_fixed_rotation(&p, a, b, beta, dt);
            }
            // applied once per call, after the iterations
            ConstraintKind::Spring(_) => {}
        }
    }

    // ==================== Position Pass ====================

    /// Push bodies back toward satisfying the hard constraints
    pub fn solve_positions<C: ConstraintRef>(&self, constraints: &mut [C], bodies: &mut BodySet) {
        let beta = self.config.baumgarte;
        let slop = self.config.slop;

        for c in constraints.iter_mut() {
            let c = c.constraint();
            if !c.is_active() {
                continue;
            }
            let Some((a, b)) = bodies.get2_mut(c.body_a, c.body_b) else {
                continue;
            };
            let anchors = Anchors::new(c, a, b);
            let d = anchors.pb - anchors.pa;

            match c.kind {
                ConstraintKind::Distance(p) => {
                    let len = d.length();
                    if len < EPSILON {
                        continue;
                    }
                    let error = if len > p.max_dist {
                        len - p.max_dist
                    } else if len < p.min_dist {
                        len - p.min_dist
                    } else {
                        continue;
                    };
                    if error.abs() > slop {
                        correct_positions(a, b, d / len, beta * error * p.stiffness);
                    }
                }
                ConstraintKind::Hinge(_) | ConstraintKind::BallSocket(_) => {
                    let len = d.length();
                    if len > slop {
                        correct_positions(a, b, d / len, beta * len);
                    }
                }
                ConstraintKind::Fixed(p) => {
                    let d = d - anchors.rot_a * p.rel_pos;
                    let len = d.length();
                    if len > slop {
                        correct_positions(a, b, d / len, beta * len);
                    }
                }
                ConstraintKind::Slider(p) => {
                    let axis = (anchors.rot_a * p.axis).normalize_or(Vec3::X, EPSILON);
                    let perp = d - axis * d.dot(axis);
                    let len = perp.length();
                    if len > slop {
                        correct_positions(a, b, perp / len, beta * len);
                    }
                }
                ConstraintKind::Spring(_) => {}
            }
        }
    }
}

/// Re-apply part of last step's clamped impulse along the current constraint
/// normal, only while the bound it was resisting is still violated
fn warm_start(c: &mut Constraint, bodies: &mut BodySet) {
    let previous = c.accumulated_impulse;
    c.accumulated_impulse = 0.0;
    if previous == 0.0 {
        return;
    }
    let ConstraintKind::Distance(p) = c.kind else {
        return;
    };
    let Some((a, b)) = bodies.get2_mut(c.body_a, c.body_b) else {
        return;
    };
    let anchors = Anchors::new(c, a, b);
    let d = anchors.pb - anchors.pa;
    let len = d.length();
    if len < EPSILON {
        return;
    }
    let still_resisting = (len > p.max_dist && previous < 0.0) || (len < p.min_dist && previous > 0.0);
    if !still_resisting {
        return;
    }
    let lambda = previous * WARM_START_FACTOR;
    apply_linear(a, b, anchors.ra, anchors.rb, d * (lambda / len));
    c.accumulated_impulse = lambda;
}

/// One-sided push toward whichever bound is violated; free inside the band.
///
/// `accumulated` is the signed impulse along A→B applied so far this call.
/// Past `max_dist` it may only pull (never above zero), below `min_dist`
/// it may only push (never below zero), so a body moving back into the band
/// is never held at the bound.
fn solve_distance(
    p: &DistanceParams,
    anchors: &Anchors,
    a: &mut RigidBody,
    b: &mut RigidBody,
    accumulated: &mut f32,
    beta: f32,
    dt: f32,
) {
    let d = anchors.pb - anchors.pa;
    let len = d.length();
    if len < EPSILON {
        return;
    }
    let (target, pulling) = if len > p.max_dist {
        (p.max_dist, true)
    } else if len < p.min_dist {
        (p.min_dist, false)
    } else {
        return;
    };

    let n = d / len;
    let error = len - target;
    let eff = linear_eff_mass(a, b, anchors.ra, anchors.rb, n);
    if eff == 0.0 {
        return;
    }
    let rel = anchors.rel_vel(a, b).dot(n);
    let lambda = -(rel + beta * error / dt) * eff * p.stiffness;

    let previous = *accumulated;
    *accumulated = if pulling {
        (previous + lambda).min(0.0)
    } else {
        (previous + lambda).max(0.0)
    };
    let applied = *accumulated - previous;
    if applied != 0.0 {
        apply_linear(a, b, anchors.ra, anchors.rb, n * applied);
    }
}

/// Drive anchor B onto anchor A plus `offset`, one world axis at a time.
/// Returns the signed impulse applied on each axis.
fn solve_point(anchors: &Anchors, offset: Vec3, a: &mut RigidBody, b: &mut RigidBody, beta: f32, dt: f32) -> Vec3 {
    let error = anchors.pb - (anchors.pa + offset);
    let mut total = Vec3::ZERO;
    for i in 0..3 {
        let n = Vec3::unit_axis(i);
        let eff = linear_eff_mass(a, b, anchors.ra, anchors.rb, n);
        if eff == 0.0 {
            continue;
        }
        let rel = anchors.rel_vel(a, b).dot(n);
        let lambda = -(rel + beta * error[i] / dt) * eff;
        apply_linear(a, b, anchors.ra, anchors.rb, n * lambda);
        total += n * lambda;
    }
    total
}

/// One-sided angular push keeping `value` inside `[min, max]` about `axis`
fn angular_limit(a: &mut RigidBody, b: &mut RigidBody, axis: Vec3, value: f32, min: f32, max: f32, beta: f32, dt: f32) {
    let eff = angular_eff_mass(a, b, axis);
    if eff == 0.0 {
        return;
    }
    let w = (b.ang_vel - a.ang_vel).dot(axis);
    let lambda = if value < min {
        ((beta * (min - value) / dt) - w).max(0.0) * eff
    } else if value > max {
        ((-beta * (value - max) / dt) - w).min(0.0) * eff
    } else {
        return;
    };
    apply_angular(a, b, axis * lambda);
}

fn solve_hinge(
    p: &HingeParams,
    anchors: &Anchors,
    motor: &mut f32,
    a: &mut RigidBody,
    b: &mut RigidBody,
    beta: f32,
    dt: f32,
) {
    let axis = (anchors.rot_a * p.axis_a).normalize_or(Vec3::X, EPSILON);

    // only rotation about the axis is free
    let w = b.ang_vel - a.ang_vel;
    let off_axis = w - axis * w.dot(axis);
    let off_len = off_axis.length();
    if off_len > EPSILON {
        let dir = off_axis / off_len;
        let eff = angular_eff_mass(a, b, dir);
        apply_angular(a, b, dir * (-off_len * eff));
    }

    let angle = (b.rot - a.rot).dot(axis);
    angular_limit(a, b, axis, angle, p.min_angle, p.max_angle, beta, dt);

    if p.motor_enabled {
        let eff = angular_eff_mass(a, b, axis);
        let w_axial = (b.ang_vel - a.ang_vel).dot(axis);
        let max = p.motor_max_torque * dt;
        let previous = *motor;
        *motor = (previous + (p.motor_speed - w_axial) * eff).clamp(-max, max);
        apply_angular(a, b, axis * (*motor - previous));
    }
}

fn solve_ball_socket(
    anchor_a: Vec3,
    p: &BallSocketParams,
    anchors: &Anchors,
    a: &mut RigidBody,
    b: &mut RigidBody,
    beta: f32,
    dt: f32,
) {
    let fallback = anchors.rot_a * Vec3::Z;
    let twist_axis = (anchors.rot_a * anchor_a).normalize_or(fallback, EPSILON);

    let rel_rot = b.rot - a.rot;
    let twist = rel_rot.dot(twist_axis);
    angular_limit(a, b, twist_axis, twist, -p.twist_limit, p.twist_limit, beta, dt);

    let swing_vec = rel_rot - twist_axis * twist;
    let swing = swing_vec.length();
    if swing > EPSILON {
        angular_limit(a, b, swing_vec / swing, swing, f32::NEG_INFINITY, p.swing_limit, beta, dt);
    }
}

fn solve_slider(
    p: &SliderParams,
    anchors: &Anchors,
    motor: &mut f32,
    a: &mut RigidBody,
    b: &mut RigidBody,
    beta: f32,
    dt: f32,
) -> f32 {
    let axis = (anchors.rot_a * p.axis).normalize_or(Vec3::X, EPSILON);
    let d = anchors.pb - anchors.pa;
    let mut total = 0.0;

    // drift off the axis, with positional bias
    let rel = anchors.rel_vel(a, b);
    let perp_err = d - axis * d.dot(axis);
    let perp_vel = rel - axis * rel.dot(axis);
    let drive = perp_vel + perp_err * (beta / dt);
    let drive_len = drive.length();
    if drive_len > EPSILON {
        let n = drive / drive_len;
        let eff = linear_eff_mass(a, b, anchors.ra, anchors.rb, n);
        let lambda = -drive_len * eff;
        apply_linear(a, b, anchors.ra, anchors.rb, n * lambda);
        total += lambda.abs();
    }

    // no relative rotation
    let w = b.ang_vel - a.ang_vel;
    for i in 0..3 {
        let n = Vec3::unit_axis(i);
        let eff = angular_eff_mass(a, b, n);
        apply_angular(a, b, n * (-w[i] * eff));
    }

    let eff = linear_eff_mass(a, b, anchors.ra, anchors.rb, axis);
    let along = d.dot(axis);
    let rel_axial = anchors.rel_vel(a, b).dot(axis);
    let limit = if along < p.min_dist {
        ((beta * (p.min_dist - along) / dt) - rel_axial).max(0.0) * eff
    } else if along > p.max_dist {
        ((-beta * (along - p.max_dist) / dt) - rel_axial).min(0.0) * eff
    } else {
        0.0
    };
    if limit != 0.0 {
        apply_linear(a, b, anchors.ra, anchors.rb, axis * limit);
        total += limit.abs();
    }

    if p.motor_enabled {
        let rel_axial = anchors.rel_vel(a, b).dot(axis);
        let max = p.motor_max_force * dt;
        let previous = *motor;
        *motor = (previous + (p.motor_speed - rel_axial) * eff).clamp(-max, max);
        apply_linear(a, b, anchors.ra, anchors.rb, axis * (*motor - previous));
    }
    total
}

/// Hold `rel_rot` by driving the Euler difference back per axis
fn solve_fixed_rotation(p: &FixedParams, a: &mut RigidBody, b: &mut RigidBody, beta: f32, dt: f32) {
    let error = b.rot - a.rot - p.rel_rot;
    let w = b.ang_vel - a.ang_vel;
    for i in 0..3 {
        let n = Vec3::unit_axis(i);
        let eff = angular_eff_mass(a, b, n);
        let lambda = (-beta * error[i] / dt - w[i]) * eff;
        apply_angular(a, b, n * lambda);
    }
}

/// Soft spring, applied once per step
fn apply_spring(c: &mut Constraint, p: &SpringParams, bodies: &mut BodySet, dt: f32) {
    let Some((a, b)) = bodies.get2_mut(c.body_a, c.body_b) else {
        return;
    };
    let anchors = Anchors::new(c, a, b);
    let d = anchors.pb - anchors.pa;
    let len = d.length();
    if len < EPSILON {
        return;
    }
    let n = d / len;
    let stretch = len - p.rest_len;
    let rel = anchors.rel_vel(a, b).dot(n);
    let force = p.stiffness * stretch + p.damping * rel;

    // stretched: A pulled toward B and B toward A
    apply_linear(a, b, anchors.ra, anchors.rb, n * (-force * dt));
    c.accumulated_impulse = force.abs() * dt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use crate::constraint::ConstraintFactory;
    use crate::events::EventQueue;
    use approx::assert_relative_eq;
    use void_core::EntityId;

    const DT: f32 = 1.0 / 60.0;

    fn pair(pos_a: Vec3, pos_b: Vec3) -> (BodySet, BodyHandle, BodyHandle) {
        let mut bodies = BodySet::new();
        let a = bodies.insert(RigidBody::dynamic(EntityId(1), 1.0).with_position(pos_a).with_drag(0.0, 0.0));
        let b = bodies.insert(RigidBody::dynamic(EntityId(2), 1.0).with_position(pos_b).with_drag(0.0, 0.0));
        (bodies, a, b)
    }

    fn step(solver: &ConstraintSolver, constraints: &mut [Constraint], bodies: &mut BodySet) {
        step_in(Vec3::ZERO, solver, constraints, bodies);
    }

    fn step_in(gravity: Vec3, solver: &ConstraintSolver, constraints: &mut [Constraint], bodies: &mut BodySet) {
        for (_, body) in bodies.iter_mut() {
            body.integrate_velocity(DT, gravity);
        }
        solver.solve(constraints, bodies, DT);
        for (_, body) in bodies.iter_mut() {
            body.integrate_position(DT);
        }
        solver.solve_positions(constraints, bodies);
    }

    fn gap(bodies: &BodySet, a: BodyHandle, b: BodyHandle) -> f32 {
        bodies.get(a).unwrap().pos.distance(bodies.get(b).unwrap().pos)
    }

    #[test]
    fn test_distance_band_converges_to_max() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0));
        let mut factory = ConstraintFactory::new();
        let c = factory
            .distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(2.0).with_range(1.0, 3.0))
            .unwrap();
        let mut constraints = vec![c];
        let solver = ConstraintSolver::default();

        for _ in 0..300 {
            step(&solver, &mut constraints, &mut bodies);
        }
        assert_relative_eq!(gap(&bodies, a, b), 3.0, epsilon = 0.02);
    }

    #[test]
    fn test_distance_inside_band_is_free() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        bodies.get_mut(b).unwrap().vel = Vec3::new(0.5, 0.0, 0.0);
        let c = ConstraintFactory::new()
            .distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(2.0).with_range(1.0, 3.0))
            .unwrap();
        let mut constraints = vec![c];
        ConstraintSolver::default().solve(&mut constraints, &mut bodies, DT);

        assert_eq!(bodies.get(b).unwrap().vel, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(constraints[0].accumulated_impulse, 0.0);
    }

    /// Fixed A at the origin, free B, held against one bound of a 1..3 band
    fn tethered(b_x: f32) -> (BodySet, BodyHandle, Vec<Constraint>) {
        let mut bodies = BodySet::new();
        let a = bodies.insert(RigidBody::fixed(EntityId(1)));
        let b = bodies.insert(
            RigidBody::dynamic(EntityId(2), 1.0)
                .with_position(Vec3::new(b_x, 0.0, 0.0))
                .with_drag(0.0, 0.0),
        );
        let c = ConstraintFactory::new()
            .distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(2.0).with_range(1.0, 3.0))
            .unwrap();
        (bodies, b, vec![c])
    }

    #[test]
    fn test_taut_distance_releases_inward() {
        let (mut bodies, b, mut constraints) = tethered(2.5);
        let solver = ConstraintSolver::default();
        for _ in 0..120 {
            step_in(Vec3::new(9.81, 0.0, 0.0), &solver, &mut constraints, &mut bodies);
        }
        assert_relative_eq!(bodies.get(b).unwrap().pos.x, 3.0, epsilon = 0.02);

        bodies.get_mut(b).unwrap().vel = Vec3::new(-0.5, 0.0, 0.0);
        for _ in 0..20 {
            step(&solver, &mut constraints, &mut bodies);
            let vel = bodies.get(b).unwrap().vel.x;
            assert!(vel < -0.45, "body held at max bound, vel {vel}");
        }
        assert!(bodies.get(b).unwrap().pos.x < 2.9);
        assert_eq!(constraints[0].accumulated_impulse, 0.0);
    }

    #[test]
    fn test_compressed_distance_releases_outward() {
        let (mut bodies, b, mut constraints) = tethered(1.5);
        let solver = ConstraintSolver::default();
        for _ in 0..120 {
            step_in(Vec3::new(-9.81, 0.0, 0.0), &solver, &mut constraints, &mut bodies);
        }
        assert_relative_eq!(bodies.get(b).unwrap().pos.x, 1.0, epsilon = 0.02);

        bodies.get_mut(b).unwrap().vel = Vec3::new(0.5, 0.0, 0.0);
        for _ in 0..20 {
            step(&solver, &mut constraints, &mut bodies);
            let vel = bodies.get(b).unwrap().vel.x;
            assert!(vel > 0.45, "body held at min bound, vel {vel}");
        }
        assert!(bodies.get(b).unwrap().pos.x > 1.1);
    }

    #[test]
    fn test_taut_distance_never_pushes() {
        let (mut bodies, b, mut constraints) = tethered(3.0001);
        bodies.get_mut(b).unwrap().vel = Vec3::new(-2.0, 0.0, 0.0);
        ConstraintSolver::default().solve(&mut constraints, &mut bodies, DT);

        // moving back inside: the bound has nothing to resist
        assert_relative_eq!(bodies.get(b).unwrap().vel.x, -2.0, epsilon = 0.01);
        assert!(constraints[0].accumulated_impulse <= 0.0);
    }

    #[test]
    fn test_rigid_rod_stops_separation() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        bodies.get_mut(b).unwrap().vel = Vec3::new(4.0, 0.0, 0.0);
        let c = ConstraintFactory::new()
            .distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(2.0))
            .unwrap();
        let mut constraints = vec![c];
        let solver = ConstraintSolver::default();
        for _ in 0..120 {
            step(&solver, &mut constraints, &mut bodies);
        }
        assert_relative_eq!(gap(&bodies, a, b), 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_ball_socket_keeps_anchors_together() {
        let mut bodies = BodySet::new();
        let anchor = bodies.insert(RigidBody::fixed(EntityId(1)));
        let bob = bodies.insert(RigidBody::dynamic(EntityId(2), 1.0).with_position(Vec3::new(0.0, 0.0, -1.0)));
        let c = ConstraintFactory::new()
            .ball_socket(anchor, bob, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), BallSocketParams::default())
            .unwrap();
        let mut constraints = vec![c];
        let solver = ConstraintSolver::default();
        let gravity = Vec3::new(0.0, 0.0, -9.81);

        for _ in 0..120 {
            for (_, body) in bodies.iter_mut() {
                body.integrate_velocity(DT, gravity);
            }
            solver.solve(&mut constraints, &mut bodies, DT);
            for (_, body) in bodies.iter_mut() {
                body.integrate_position(DT);
            }
            solver.solve_positions(&mut constraints, &mut bodies);
        }

        let body = bodies.get(bob).unwrap();
        let anchor_world = body.local_to_world(Vec3::new(0.0, 0.0, 1.0));
        assert!(anchor_world.length() < 0.1, "anchor drifted to {anchor_world:?}");
    }

    #[test]
    fn test_hinge_motor_respects_torque_cap() {
        let mut bodies = BodySet::new();
        let base = bodies.insert(RigidBody::fixed(EntityId(1)));
        let wheel = bodies.insert(RigidBody::dynamic(EntityId(2), 1.0));
        let mut c = ConstraintFactory::new()
            .hinge(base, wheel, Vec3::ZERO, Vec3::ZERO, HingeParams::new(Vec3::Z, Vec3::Z))
            .unwrap();
        c.set_hinge_motor(100.0, 6.0);
        let mut constraints = vec![c];
        ConstraintSolver::default().solve(&mut constraints, &mut bodies, DT);

        let spin = bodies.get(wheel).unwrap().ang_vel.z;
        assert!(spin > 0.0);
        assert!(spin <= 6.0 * DT + 1e-5, "motor exceeded its cap: {spin}");
    }

    #[test]
    fn test_hinge_removes_off_axis_spin() {
        let mut bodies = BodySet::new();
        let base = bodies.insert(RigidBody::fixed(EntityId(1)));
        let door = bodies.insert(RigidBody::dynamic(EntityId(2), 1.0).with_angular_velocity(Vec3::new(1.0, 0.0, 2.0)));
        let c = ConstraintFactory::new()
            .hinge(base, door, Vec3::ZERO, Vec3::ZERO, HingeParams::new(Vec3::Z, Vec3::Z))
            .unwrap();
        let mut constraints = vec![c];
        ConstraintSolver::default().solve(&mut constraints, &mut bodies, DT);

        let w = bodies.get(door).unwrap().ang_vel;
        assert!(w.x.abs() < 1e-4);
        assert_relative_eq!(w.z, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_slider_limit_stops_travel() {
        let mut bodies = BodySet::new();
        let rail = bodies.insert(RigidBody::fixed(EntityId(1)));
        let cart = bodies.insert(
            RigidBody::dynamic(EntityId(2), 1.0)
                .with_position(Vec3::new(1.0, 0.0, 0.0))
                .with_velocity(Vec3::new(5.0, 0.0, 0.0))
                .with_drag(0.0, 0.0),
        );
        let c = ConstraintFactory::new()
            .slider(rail, cart, Vec3::ZERO, Vec3::ZERO, SliderParams::new(Vec3::X).with_limits(0.0, 1.0))
            .unwrap();
        let mut constraints = vec![c];
        let solver = ConstraintSolver::default();
        for _ in 0..60 {
            step(&solver, &mut constraints, &mut bodies);
        }
        let pos = bodies.get(cart).unwrap().pos;
        assert!(pos.x < 1.1, "cart ran past its limit: {pos:?}");
        assert!(pos.y.abs() < 1e-3 && pos.z.abs() < 1e-3);
    }

    #[test]
    fn test_fixed_holds_offset() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        bodies.get_mut(b).unwrap().vel = Vec3::new(0.0, 3.0, 0.0);
        let c = ConstraintFactory::new()
            .fixed(a, b, Vec3::ZERO, Vec3::ZERO, FixedParams::new(Vec3::X, Vec3::ZERO))
            .unwrap();
        let mut constraints = vec![c];
        let solver = ConstraintSolver::default();
        for _ in 0..120 {
            step(&solver, &mut constraints, &mut bodies);
        }
        let offset = bodies.get(b).unwrap().pos - bodies.get(a).unwrap().pos;
        assert_relative_eq!(offset.x, 1.0, epsilon = 0.05);
        assert!(offset.y.abs() < 0.05);
    }

    #[test]
    fn test_spring_pulls_stretched_bodies_together() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        let c = ConstraintFactory::new()
            .spring(a, b, Vec3::ZERO, Vec3::ZERO, SpringParams::new(1.0))
            .unwrap();
        let mut constraints = vec![c];
        ConstraintSolver::default().solve(&mut constraints, &mut bodies, DT);

        // F = 100 * 2, impulse = F * dt
        assert_relative_eq!(bodies.get(a).unwrap().vel.x, 200.0 * DT, epsilon = 1e-4);
        assert_relative_eq!(bodies.get(b).unwrap().vel.x, -200.0 * DT, epsilon = 1e-4);
    }

    #[test]
    fn test_break_force_marks_broken_and_emits() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        let mut c = ConstraintFactory::new()
            .spring(a, b, Vec3::ZERO, Vec3::ZERO, SpringParams::new(1.0))
            .unwrap();
        c.set_break_force(50.0);
        let id = c.id;
        let mut constraints = vec![c];

        let queue = EventQueue::new();
        let solver = ConstraintSolver::default().with_events(queue.sender());
        solver.solve(&mut constraints, &mut bodies, DT);

        assert!(constraints[0].broken);
        assert_eq!(queue.drain(), vec![PhysicsEvent::ConstraintBroken { id }]);

        // broken constraints are skipped from now on
        let before = bodies.get(a).unwrap().vel;
        solver.solve(&mut constraints, &mut bodies, DT);
        assert_eq!(bodies.get(a).unwrap().vel, before);
        assert!(queue.is_empty());
    }

    fn hanging_bob(break_force: f32) -> (BodySet, Vec<Constraint>) {
        let mut bodies = BodySet::new();
        let anchor = bodies.insert(RigidBody::fixed(EntityId(1)));
        let bob = bodies.insert(RigidBody::dynamic(EntityId(2), 1.0).with_position(Vec3::new(0.0, 0.0, -1.0)));
        let mut c = ConstraintFactory::new()
            .ball_socket(anchor, bob, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), BallSocketParams::default())
            .unwrap();
        c.set_break_force(break_force);
        (bodies, vec![c])
    }

    #[test]
    fn test_point_break_force_is_net_impulse() {
        let gravity = Vec3::new(0.0, 0.0, -9.81);
        let solver = ConstraintSolver::default();

        // twice the static load holds
        let (mut bodies, mut constraints) = hanging_bob(2.0 * 9.81);
        for _ in 0..120 {
            step_in(gravity, &solver, &mut constraints, &mut bodies);
        }
        assert!(!constraints[0].broken);
        let force = constraints[0].accumulated_impulse / DT;
        assert!((9.0..10.6).contains(&force), "reported force {force}");

        // half of it does not
        let (mut bodies, mut constraints) = hanging_bob(0.5 * 9.81);
        step_in(gravity, &solver, &mut constraints, &mut bodies);
        assert!(constraints[0].broken);
    }

    #[test]
    fn test_stale_and_disabled_constraints_are_skipped() {
        let (mut bodies, a, b) = pair(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0));
        let mut factory = ConstraintFactory::new();
        let mut disabled = factory.distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(1.0)).unwrap();
        disabled.enabled = false;
        let stale = factory.distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(1.0)).unwrap();
        bodies.remove(b);

        let mut constraints = vec![disabled, stale];
        let solver = ConstraintSolver::default();
        solver.solve(&mut constraints, &mut bodies, DT);
        solver.solve_positions(&mut constraints, &mut bodies);

        assert_eq!(bodies.get(a).unwrap().vel, Vec3::ZERO);
        assert_eq!(bodies.get(a).unwrap().pos, Vec3::ZERO);
    }
}
