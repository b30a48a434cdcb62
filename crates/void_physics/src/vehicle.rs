//! Raycast vehicles
//!
//! A [`Vehicle`] does not own its chassis body. Each [`Vehicle::update`]
//! borrows the chassis, probes the ground under every wheel through a
//! [`Raycaster`], and applies suspension, anti-roll, tire and downforce
//! forces to it.
//!
//! Tire forces follow the Pacejka magic formula and are limited by a
//! friction circle: the combined longitudinal and lateral force of a wheel
//! never exceeds `normal_load * friction_slip`.

use crate::body::RigidBody;
use crate::config::{VehicleConfig, WheelConfig};
use void_core::EntityId;
use void_math::consts::{EPSILON, PI};
use void_math::{sign, Mat3, Ray, RayHit, Vec3};

/// Forward speed below which slip is not computed
const MIN_SLIP_SPEED: f32 = 0.1;

/// Answers the suspension ray queries
pub trait Raycaster {
    fn raycast(&self, ray: &Ray) -> RayHit;
}

impl<F> Raycaster for F
where
    F: Fn(&Ray) -> RayHit,
{
    fn raycast(&self, ray: &Ray) -> RayHit {
        self(ray)
    }
}

/// An infinite plane, handy as flat ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl GroundPlane {
    /// Horizontal plane at height `z`
    pub fn at_height(z: f32) -> Self {
        Self {
            point: Vec3::new(0.0, 0.0, z),
            normal: Vec3::Z,
        }
    }
}

impl Raycaster for GroundPlane {
    fn raycast(&self, ray: &Ray) -> RayHit {
        ray.intersect_plane(self.point, self.normal)
    }
}

/// Pacejka magic formula: `D·sin(C·atan(B·s − E·(B·s − atan(B·s))))`
#[inline]
pub fn pacejka(slip: f32, b: f32, c: f32, d: f32, e: f32) -> f32 {
    let bs = b * slip;
    d * (c * (bs - e * (bs - bs.atan())).atan()).sin()
}

/// Scale `(long, lat)` so its magnitude is at most `max`
pub fn friction_circle(long: f32, lat: f32, max: f32) -> (f32, f32) {
    if max <= 0.0 {
        return (0.0, 0.0);
    }
    let magnitude = (long * long + lat * lat).sqrt();
    if magnitude <= max {
        return (long, lat);
    }
    let scale = max / magnitude;
    (long * scale, lat * scale)
}

/// One wheel and its per-step state
#[derive(Debug, Clone, PartialEq)]
pub struct Wheel {
    pub cfg: WheelConfig,
    /// Mount point in chassis space
    pub local_pos: Vec3,
    pub world_pos: Vec3,
    pub steering: f32,
    /// Accumulated spin angle in radians
    pub rotation: f32,
    pub rpm: f32,
    pub slip_ratio: f32,
    pub slip_angle: f32,
    pub ground_hit: bool,
    pub ground_normal: Vec3,
    pub ground_point: Vec3,
    pub suspension_len: f32,
    pub suspension_force: f32,
    pub forward_dir: Vec3,
    pub side_dir: Vec3,
    /// Longitudinal tire force applied in the last update
    pub long_force: f32,
    /// Lateral tire force applied in the last update
    pub lat_force: f32,
}

impl Wheel {
    pub fn new(cfg: WheelConfig, local_pos: Vec3) -> Self {
        Self {
            suspension_len: cfg.suspension_len,
            cfg,
            local_pos,
            world_pos: Vec3::ZERO,
            steering: 0.0,
            rotation: 0.0,
            rpm: 0.0,
            slip_ratio: 0.0,
            slip_angle: 0.0,
            ground_hit: false,
            ground_normal: Vec3::Z,
            ground_point: Vec3::ZERO,
            suspension_force: 0.0,
            forward_dir: Vec3::X,
            side_dir: Vec3::Y,
            long_force: 0.0,
            lat_force: 0.0,
        }
    }

    /// Grip limit for the current normal load
    #[inline]
    pub fn max_friction(&self) -> f32 {
        self.suspension_force * self.cfg.friction_slip
    }

    /// Suspension travel from rest (positive when compressed)
    #[inline]
    fn travel(&self) -> f32 {
        self.cfg.suspension_len - self.suspension_len
    }
}

/// Chassis axes for the current orientation
struct ChassisBasis {
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl ChassisBasis {
    fn new(body: &RigidBody) -> Self {
        let rot = body.rotation();
        Self {
            forward: rot * Vec3::X,
            right: rot * Vec3::Y,
            up: rot * Vec3::Z,
        }
    }
}

/// A wheeled vehicle driving a borrowed chassis body
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub entity: EntityId,
    pub cfg: VehicleConfig,
    pub wheels: Vec<Wheel>,
    throttle: f32,
    brake: f32,
    steering: f32,
    handbrake: bool,
    speed: f32,
    local_vel: Vec3,
}

impl Vehicle {
    /// One wheel per position; a missing wheel config falls back to the default
    pub fn new(entity: EntityId, cfg: VehicleConfig, wheel_cfgs: &[WheelConfig], wheel_positions: &[Vec3]) -> Self {
        let wheels = wheel_positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| Wheel::new(wheel_cfgs.get(i).cloned().unwrap_or_default(), pos))
            .collect();
        Self {
            entity,
            cfg,
            wheels,
            throttle: 0.0,
            brake: 0.0,
            steering: 0.0,
            handbrake: false,
            speed: 0.0,
            local_vel: Vec3::ZERO,
        }
    }

    // ==================== Controls ====================

    pub fn set_throttle(&mut self, value: f32) {
        self.throttle = value.clamp(-1.0, 1.0);
    }

    pub fn set_brake(&mut self, value: f32) {
        self.brake = value.clamp(0.0, 1.0);
    }

    /// Steer toward `value * max_steer_angle`, limited by the steering slew rate
    pub fn set_steering(&mut self, value: f32, dt: f32) {
        let target = value * self.cfg.max_steer_angle;
        let max_change = self.cfg.steer_speed * dt;
        self.steering += (target - self.steering).clamp(-max_change, max_change);
    }

    pub fn set_handbrake(&mut self, active: bool) {
        self.handbrake = active;
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn brake(&self) -> f32 {
        self.brake
    }

    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn handbrake(&self) -> bool {
        self.handbrake
    }

    /// Forward speed as of the last update
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Chassis velocity in chassis axes as of the last update
    pub fn local_velocity(&self) -> Vec3 {
        self.local_vel
    }

    pub fn wheel_world_positions(&self) -> Vec<Vec3> {
        self.wheels.iter().map(|w| w.world_pos).collect()
    }

    pub fn wheel_rotations(&self) -> Vec<f32> {
        self.wheels.iter().map(|w| w.rotation).collect()
    }

    pub fn wheel_steerings(&self) -> Vec<f32> {
        self.wheels.iter().map(|w| w.steering).collect()
    }

    fn driven_wheel_count(&self) -> usize {
        self.wheels.iter().filter(|w| w.cfg.is_driven).count().max(1)
    }

    // ==================== Simulation ====================

    /// Apply one step of vehicle forces to `body`
    pub fn update(&mut self, body: &mut RigidBody, raycaster: &impl Raycaster, dt: f32) {
        if dt < EPSILON {
            return;
        }
        let basis = ChassisBasis::new(body);
        let rot = body.rotation();

        self.speed = body.vel.dot(basis.forward);
        self.local_vel = Vec3::new(self.speed, body.vel.dot(basis.right), body.vel.dot(basis.up));

        for wheel in &mut self.wheels {
            update_wheel_transform(wheel, body, rot, &basis, self.steering);
        }
        for wheel in &mut self.wheels {
            update_suspension(wheel, body, raycaster, &basis);
        }
        self.apply_anti_roll(body, &basis);

        let grounded = self.wheels.iter().filter(|w| w.ground_hit).count().max(1);
        let driven = self.driven_wheel_count();
        for i in 0..self.wheels.len() {
            if self.wheels[i].ground_hit {
                self.apply_tire_forces(i, body, grounded, driven, dt);
            } else {
                self.wheels[i].long_force = 0.0;
                self.wheels[i].lat_force = 0.0;
            }
        }

        let downforce = self.cfg.downforce * self.speed * self.speed;
        if downforce > 0.0 {
            body.apply_force_at_point(basis.up * -downforce, body.pos);
        }

        for wheel in &mut self.wheels {
            if wheel.ground_hit {
                wheel.rotation += self.speed / wheel.cfg.radius * dt;
                wheel.rpm = self.speed.abs() / (2.0 * PI * wheel.cfg.radius) * 60.0;
            }
        }
    }

    fn apply_anti_roll(&self, body: &mut RigidBody, basis: &ChassisBasis) {
        if self.wheels.len() < 4 {
            return;
        }
        for (l, r) in [(0, 1), (2, 3)] {
            let (left, right) = (&self.wheels[l], &self.wheels[r]);
            if !left.ground_hit || !right.ground_hit {
                continue;
            }
            let force = (left.travel() - right.travel()) * self.cfg.anti_roll;
            body.apply_force_at_point(basis.up * -force, left.ground_point);
            body.apply_force_at_point(basis.up * force, right.ground_point);
        }
    }

    fn apply_tire_forces(&mut self, index: usize, body: &mut RigidBody, grounded: usize, driven: usize, dt: f32) {
        let (throttle, brake, handbrake) = (self.throttle, self.brake, self.handbrake);
        let cfg = &self.cfg;
        let wheel = &mut self.wheels[index];

        let contact_vel = body.point_velocity(wheel.ground_point);
        let forward_vel = contact_vel.dot(wheel.forward_dir);
        let side_vel = contact_vel.dot(wheel.side_dir);
        let wheel_speed = forward_vel.abs();

        let target_speed = if wheel.cfg.is_driven { throttle * cfg.max_target_speed } else { 0.0 };
        if wheel_speed > MIN_SLIP_SPEED {
            wheel.slip_angle = side_vel.atan2(wheel_speed);
            wheel.slip_ratio = (target_speed - forward_vel) / wheel_speed;
        } else {
            wheel.slip_angle = 0.0;
            // Only a driven wheel spinning up from rest is fully slipping.
            // Undriven wheels report zero slip here even under throttle, so
            // a stationary car's free-rolling wheels generate no drive force.
            wheel.slip_ratio = if target_speed > 0.0 { 1.0 } else { 0.0 };
        }

        let load = wheel.suspension_force;
        let max_friction = wheel.max_friction();
        let tire = cfg.tire;
        let long = pacejka(wheel.slip_ratio, tire.b, tire.c, max_friction, tire.e);
        let mut lat = -pacejka(wheel.slip_angle, tire.b, tire.c, max_friction, tire.e);

        let engine = if wheel.cfg.is_driven {
            throttle * cfg.engine_max_force / driven as f32
        } else {
            0.0
        };

        // never more than what stops the chassis within this step
        let stop_force = wheel_speed * body.mass / (dt * grounded as f32);
        let mut braking = 0.0;
        if brake > 0.0 {
            braking = -sign(forward_vel) * (brake * wheel.cfg.max_brake_force).min(stop_force);
        }
        if handbrake && !wheel.cfg.is_steering {
            braking = -sign(forward_vel) * (wheel.cfg.max_brake_force * 0.8).min(stop_force);
            lat *= 0.5;
        }

        let (long, lat) = friction_circle(long + engine + braking, lat, max_friction);
        wheel.long_force = long;
        wheel.lat_force = lat;

        let point = wheel.ground_point;
        body.apply_force_at_point(wheel.forward_dir * long, point);
        body.apply_force_at_point(wheel.side_dir * lat, point);
        body.apply_torque(wheel.forward_dir * (side_vel * load * wheel.cfg.roll_influence));
    }
}

fn update_wheel_transform(wheel: &mut Wheel, body: &RigidBody, rot: Mat3, basis: &ChassisBasis, steering: f32) {
    wheel.world_pos = body.pos + rot * wheel.local_pos;
    if wheel.cfg.is_steering {
        wheel.steering = steering;
        let steer = Mat3::from_euler(Vec3::new(0.0, 0.0, steering));
        wheel.forward_dir = steer * basis.forward;
        wheel.side_dir = steer * basis.right;
    } else {
        wheel.forward_dir = basis.forward;
        wheel.side_dir = basis.right;
    }
}

fn update_suspension(wheel: &mut Wheel, body: &mut RigidBody, raycaster: &impl Raycaster, basis: &ChassisBasis) {
    let ray_len = wheel.cfg.suspension_len + wheel.cfg.radius;
    let hit = raycaster.raycast(&Ray::new(wheel.world_pos, -basis.up, ray_len));

    if hit.hit && hit.dist < ray_len {
        wheel.ground_hit = true;
        wheel.ground_normal = hit.normal;
        wheel.ground_point = hit.point;
        wheel.suspension_len = hit.dist - wheel.cfg.radius;

        let spring = wheel.travel() * wheel.cfg.suspension_stiffness;
        let damper = -body.vel.dot(basis.up) * wheel.cfg.suspension_damping;
        wheel.suspension_force = (spring + damper).max(0.0);

        body.apply_force_at_point(basis.up * wheel.suspension_force, wheel.world_pos);
        body.wake();
    } else {
        wheel.ground_hit = false;
        wheel.suspension_len = wheel.cfg.suspension_len;
        wheel.suspension_force = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use void_math::consts::FRAC_PI_6;

    const DT: f32 = 1.0 / 60.0;

    fn car() -> (Vehicle, RigidBody) {
        let cfgs = [WheelConfig::steering(), WheelConfig::steering(), WheelConfig::driven(), WheelConfig::driven()];
        let positions = [
            Vec3::new(1.2, -0.8, 0.0),
            Vec3::new(1.2, 0.8, 0.0),
            Vec3::new(-1.2, -0.8, 0.0),
            Vec3::new(-1.2, 0.8, 0.0),
        ];
        let vehicle = Vehicle::new(EntityId(1), VehicleConfig::default(), &cfgs, &positions);
        let body = RigidBody::dynamic(EntityId(1), 1500.0).with_position(Vec3::new(0.0, 0.0, 0.6));
        (vehicle, body)
    }

    #[test]
    fn test_pacejka_shape() {
        assert_eq!(pacejka(0.0, 10.0, 1.9, 1000.0, 0.97), 0.0);
        let f = pacejka(0.1, 10.0, 1.9, 1000.0, 0.97);
        assert!(f > 0.0 && f <= 1000.0);
        assert_relative_eq!(pacejka(-0.1, 10.0, 1.9, 1000.0, 0.97), -f);
    }

    #[test]
    fn test_friction_circle() {
        assert_eq!(friction_circle(3.0, 4.0, 10.0), (3.0, 4.0));
        let (l, t) = friction_circle(30.0, 40.0, 10.0);
        assert_relative_eq!(l, 6.0, epsilon = 1e-5);
        assert_relative_eq!(t, 8.0, epsilon = 1e-5);
        assert_eq!(friction_circle(5.0, 5.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_control_clamping() {
        let (mut vehicle, _) = car();
        vehicle.set_throttle(3.0);
        assert_eq!(vehicle.throttle(), 1.0);
        vehicle.set_throttle(-3.0);
        assert_eq!(vehicle.throttle(), -1.0);
        vehicle.set_brake(-1.0);
        assert_eq!(vehicle.brake(), 0.0);
        vehicle.set_brake(0.5);
        assert_eq!(vehicle.brake(), 0.5);
    }

    #[test]
    fn test_steering_ramps_to_lock() {
        let (mut vehicle, _) = car();
        vehicle.set_steering(1.0, 0.1);
        assert_relative_eq!(vehicle.steering(), 0.3, epsilon = 1e-6);
        for _ in 0..10 {
            vehicle.set_steering(1.0, 0.1);
        }
        assert_relative_eq!(vehicle.steering(), FRAC_PI_6, epsilon = 1e-6);
        vehicle.set_steering(0.0, 0.1);
        assert_relative_eq!(vehicle.steering(), FRAC_PI_6 - 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_suspension_on_flat_ground() {
        let (mut vehicle, mut body) = car();
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        for wheel in &vehicle.wheels {
            assert!(wheel.ground_hit);
            assert_relative_eq!(wheel.suspension_len, 0.2, epsilon = 1e-4);
            assert_relative_eq!(wheel.suspension_force, 3000.0, epsilon = 1.0);
        }
        assert_relative_eq!(body.force.z, 12000.0, epsilon = 4.0);
        assert!(body.torque.length() < 1.0);
    }

    #[test]
    fn test_airborne_wheels_apply_nothing() {
        let (mut vehicle, mut body) = car();
        vehicle.set_throttle(1.0);
        vehicle.update(&mut body, &|_: &Ray| RayHit::miss(), DT);

        assert!(vehicle.wheels.iter().all(|w| !w.ground_hit && w.suspension_force == 0.0));
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_throttle_pushes_forward_within_grip() {
        let (mut vehicle, mut body) = car();
        vehicle.set_throttle(1.0);
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        assert!(body.force.x > 0.0);
        for wheel in &vehicle.wheels {
            let combined = (wheel.long_force.powi(2) + wheel.lat_force.powi(2)).sqrt();
            assert!(combined <= wheel.max_friction() + 1e-2);
        }
        // front wheels are not driven
        assert_eq!(vehicle.wheels[0].long_force, 0.0);
    }

    #[test]
    fn test_low_speed_slip_only_on_driven_wheels() {
        let (mut vehicle, mut body) = car();
        vehicle.set_throttle(0.5);
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        let slips: Vec<f32> = vehicle.wheels.iter().map(|w| w.slip_ratio).collect();
        assert_eq!(slips, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_brake_does_not_reverse_motion() {
        let (mut vehicle, mut body) = car();
        body.vel = Vec3::new(0.05, 0.0, 0.0);
        vehicle.set_brake(1.0);
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        assert!(body.force.x < 0.0);
        let dv = body.force.x / body.mass * DT;
        assert!(body.vel.x + dv >= -1e-4);
    }

    #[test]
    fn test_steering_rotates_front_wheels_only() {
        let (mut vehicle, mut body) = car();
        vehicle.set_steering(1.0, 1.0);
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        let steerings = vehicle.wheel_steerings();
        assert_relative_eq!(steerings[0], FRAC_PI_6);
        assert_eq!(steerings[2], 0.0);
        assert!(vehicle.wheels[0].forward_dir.y > 0.0);
        assert_eq!(vehicle.wheels[2].forward_dir, Vec3::X);
    }

    #[test]
    fn test_wheel_spin_and_downforce() {
        let (mut vehicle, mut body) = car();
        body.vel = Vec3::new(10.0, 0.0, 0.0);
        vehicle.update(&mut body, &GroundPlane::at_height(0.0), DT);

        assert_relative_eq!(vehicle.speed(), 10.0);
        assert_relative_eq!(vehicle.wheel_rotations()[0], 10.0 / 0.4 * DT, epsilon = 1e-5);
        assert_relative_eq!(vehicle.wheels[0].rpm, 10.0 / (2.0 * PI * 0.4) * 60.0, epsilon = 1e-2);
        // downforce 0.5 * 10^2 pulls the chassis down
        assert!(body.force.z < 12000.0 - 40.0);
    }

    #[test]
    fn test_missing_wheel_configs_default() {
        let vehicle = Vehicle::new(EntityId(2), VehicleConfig::default(), &[], &[Vec3::ZERO, Vec3::X]);
        assert_eq!(vehicle.wheels.len(), 2);
        assert_eq!(vehicle.wheels[1].cfg, WheelConfig::default());
        assert_eq!(vehicle.wheel_world_positions(), vec![Vec3::ZERO, Vec3::ZERO]);
    }
}
