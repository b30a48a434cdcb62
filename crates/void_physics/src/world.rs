//! Physics world - main simulation container

use crate::body::{BodyHandle, BodySet, RigidBody};
use crate::ccd::{CcdSystem, ToiResult};
use crate::collider::{Collider, ColliderSet};
use crate::config::PhysicsConfig;
use crate::constraint::{Constraint, ConstraintFactory, ConstraintId};
use crate::destruction::DestructionSystem;
use crate::error::{PhysicsError, Result};
use crate::events::{EventQueue, EventSender, PhysicsEvent};
use crate::ragdoll::{humanoid_template, RagdollManager};
use crate::rope::RopeManager;
use crate::solver::ConstraintSolver;
use crate::vehicle::{Raycaster, Vehicle};
use log::{trace, warn};
use std::collections::HashMap;
use void_math::Vec3;

/// Name the built-in humanoid template is registered under
pub const HUMANOID_TEMPLATE: &str = "humanoid";

/// The main physics world containing all simulation state
#[derive(Debug)]
pub struct PhysicsWorld {
    /// Configuration
    config: PhysicsConfig,

    /// Rigid bodies simulated by the world
    bodies: BodySet,

    /// One collider per body, used by CCD
    colliders: ColliderSet,

    /// World constraints, solved every substep
    constraints: Vec<Constraint>,
    factory: ConstraintFactory,
    solver: ConstraintSolver,

    /// Continuous collision detection
    ccd: CcdSystem,

    /// Broad-phase output supplied by the caller
    candidate_pairs: Vec<(BodyHandle, BodyHandle)>,

    ragdolls: RagdollManager,
    ropes: RopeManager,
    destruction: DestructionSystem,

    /// Events produced by every subsystem
    events: EventQueue,

    /// Accumulated time for fixed timestep
    accumulated_time: f32,
}

impl PhysicsWorld {
    /// Create a new physics world
    pub fn new(config: PhysicsConfig) -> Self {
        let events = EventQueue::new();

        let solver = ConstraintSolver::new(config.solver.clone()).with_events(events.sender());
        let mut ragdolls = RagdollManager::new(config.ragdoll.clone(), solver.clone());
        if let Err(err) = ragdolls.register_template(HUMANOID_TEMPLATE, humanoid_template()) {
            warn!("Built-in humanoid template rejected: {}", err);
        }

        let mut destruction = match config.fracture_seed {
            Some(seed) => DestructionSystem::with_seed(seed),
            None => DestructionSystem::new(),
        }
        .with_events(events.sender());
        destruction.set_gravity(config.gravity);

        Self {
            ccd: CcdSystem::new(config.ccd.clone()),
            bodies: BodySet::new(),
            colliders: ColliderSet::new(),
            constraints: Vec::new(),
            factory: ConstraintFactory::new(),
            solver,
            candidate_pairs: Vec::new(),
            ragdolls,
            ropes: RopeManager::new(),
            destruction,
            events,
            accumulated_time: 0.0,
            config,
        }
    }

    /// Create a world after validating `config`
    pub fn try_new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Set gravity for bodies and debris
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.destruction.set_gravity(gravity);
    }

    /// Get gravity
    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    // ==================== Rigid Bodies ====================

    /// Add a rigid body
    pub fn create_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.insert(body)
    }

    /// Remove a rigid body and its collider.
    ///
    /// Constraints that reference it stay registered but no longer act.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        self.colliders.remove(&handle);
        self.candidate_pairs.retain(|&(a, b)| a != handle && b != handle);
        self.bodies.remove(handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    /// Apply a force to a rigid body
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec3) -> Result<()> {
        self.bodies
            .get_mut(handle)
            .map(|b| b.apply_force(force))
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    /// Apply an impulse to a rigid body
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<()> {
        self.bodies
            .get_mut(handle)
            .map(|b| b.apply_impulse(impulse))
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    /// Apply a force at a world point
    pub fn apply_force_at_point(&mut self, handle: BodyHandle, force: Vec3, point: Vec3) -> Result<()> {
        self.bodies
            .get_mut(handle)
            .map(|b| b.apply_force_at_point(force, point))
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    // ==================== Colliders ====================

    /// Attach (or replace) the collider of a body
    pub fn set_collider(&mut self, handle: BodyHandle, collider: Collider) -> Result<()> {
        if !self.bodies.contains(handle) {
            return Err(PhysicsError::BodyNotFound(handle));
        }
        self.colliders.insert(handle, collider);
        Ok(())
    }

    pub fn collider(&self, handle: BodyHandle) -> Option<&Collider> {
        self.colliders.get(&handle)
    }

    pub fn remove_collider(&mut self, handle: BodyHandle) -> Option<Collider> {
        self.colliders.remove(&handle)
    }

    /// Replace the pairs CCD sweeps each substep
    pub fn set_candidate_pairs(&mut self, pairs: Vec<(BodyHandle, BodyHandle)>) {
        self.candidate_pairs = pairs;
    }

    // ==================== Constraints ====================

    /// The factory that stamps constraint ids for this world
    pub fn factory(&mut self) -> &mut ConstraintFactory {
        &mut self.factory
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = constraint.id;
        self.constraints.push(constraint);
        id
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints.iter_mut().find(|c| c.id == id)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        let index = self.constraints.iter().position(|c| c.id == id)?;
        Some(self.constraints.remove(index))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    // ==================== Subsystems ====================

    pub fn ccd(&self) -> &CcdSystem {
        &self.ccd
    }

    pub fn ragdolls(&self) -> &RagdollManager {
        &self.ragdolls
    }

    pub fn ragdolls_mut(&mut self) -> &mut RagdollManager {
        &mut self.ragdolls
    }

    pub fn ropes(&self) -> &RopeManager {
        &self.ropes
    }

    pub fn ropes_mut(&mut self) -> &mut RopeManager {
        &mut self.ropes
    }

    pub fn destruction(&self) -> &DestructionSystem {
        &self.destruction
    }

    pub fn destruction_mut(&mut self) -> &mut DestructionSystem {
        &mut self.destruction
    }

    /// Drive a vehicle whose chassis lives in this world
    pub fn update_vehicle(
        &mut self,
        vehicle: &mut Vehicle,
        chassis: BodyHandle,
        raycaster: &impl Raycaster,
        dt: f32,
    ) -> Result<()> {
        let body = self
            .bodies
            .get_mut(chassis)
            .ok_or(PhysicsError::BodyNotFound(chassis))?;
        vehicle.update(body, raycaster, dt);
        Ok(())
    }

    // ==================== Simulation ====================

    /// Step the physics simulation with fixed timestep.
    ///
    /// Returns the number of substeps taken. Time left over after
    /// `max_substeps` is dropped beyond one timestep.
    pub fn step(&mut self, delta_time: f32) -> u32 {
        let timestep = self.config.timestep;
        self.accumulated_time += delta_time;

        let mut steps = 0;
        while self.accumulated_time >= timestep && steps < self.config.max_substeps {
            self.step_internal(timestep);
            self.accumulated_time -= timestep;
            steps += 1;
        }
        if steps == self.config.max_substeps {
            self.accumulated_time = self.accumulated_time.min(timestep);
        }
        steps
    }

    /// Internal fixed timestep
    fn step_internal(&mut self, dt: f32) {
        let gravity = self.config.gravity;

        for (_, body) in self.bodies.iter_mut() {
            body.integrate_velocity(dt, gravity);
        }

        self.solver.solve(&mut self.constraints, &mut self.bodies, dt);

        let consumed = self.resolve_tunneling(dt);

        for (handle, body) in self.bodies.iter_mut() {
            let used = consumed.get(&handle).copied().unwrap_or(0.0);
            body.integrate_position(dt - used);
        }

        self.solver.solve_positions(&mut self.constraints, &mut self.bodies);

        for (_, body) in self.bodies.iter_mut() {
            body.update_sleep(dt);
        }

        self.ragdolls.update(dt);
        self.ropes.update(dt);
        self.destruction.update(dt);
    }

    /// Sweep the candidate pairs and stop fast bodies at their first impact.
    ///
    /// Returns, per body, the part of `dt` already spent advancing it.
    fn resolve_tunneling(&mut self, dt: f32) -> HashMap<BodyHandle, f32> {
        let mut consumed = HashMap::new();
        if !self.ccd.config().enabled {
            return consumed;
        }

        self.ccd.mark_all(&self.bodies);
        let hits = self
            .ccd
            .detect_tunneling(&self.candidate_pairs, &self.bodies, &self.colliders, dt);

        let max_impacts = self.ccd.config().max_iterations as usize;
        let tolerance = self.ccd.config().tolerance;
        let mut resolved = 0;
        for hit in hits {
            if resolved >= max_impacts {
                break;
            }
            if consumed.contains_key(&hit.body_a) || consumed.contains_key(&hit.body_b) {
                continue;
            }

            let advance = (hit.toi - tolerance).max(0.0);
            for handle in [hit.body_a, hit.body_b] {
                if let Some(body) = self.bodies.get_mut(handle) {
                    body.integrate_position(advance);
                    consumed.insert(handle, advance);
                }
            }
            stop_approach(&mut self.bodies, &hit);

            self.events.sender().send(PhysicsEvent::TunnelingPrevented {
                a: hit.body_a,
                b: hit.body_b,
                toi: hit.toi,
            });
            resolved += 1;
        }

        trace!("ccd resolved {} impacts", resolved);
        consumed
    }

    // ==================== Events ====================

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<PhysicsEvent> {
        self.events.drain()
    }

    /// A producer handle for caller-side systems
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    // ==================== Debug ====================

    /// Get number of rigid bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get number of colliders
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Get number of active (awake) bodies
    pub fn active_body_count(&self) -> usize {
        self.bodies.iter().filter(|(_, b)| b.is_active()).count()
    }
}

/// Remove the closing normal velocity of an impact, split by inverse mass.
///
/// A body that no longer resolves counts as immovable.
fn stop_approach(bodies: &mut BodySet, hit: &ToiResult) {
    let n = hit.normal;
    let state = |h| bodies.get(h).map_or((Vec3::ZERO, 0.0), |b: &RigidBody| (b.vel, b.inv_mass));
    let (vel_a, inv_a) = state(hit.body_a);
    let (vel_b, inv_b) = state(hit.body_b);

    let closing = (vel_b - vel_a).dot(n);
    let total = inv_a + inv_b;
    if closing >= 0.0 || total <= 0.0 {
        return;
    }

    if let Some(a) = bodies.get_mut(hit.body_a) {
        a.vel += n * (closing * inv_a / total);
    }
    if let Some(b) = bodies.get_mut(hit.body_b) {
        b.vel -= n * (closing * inv_b / total);
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::DistanceParams;
    use approx::assert_relative_eq;
    use void_core::EntityId;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_create_world() {
        let world = PhysicsWorld::new(PhysicsConfig::default());
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.collider_count(), 0);
        assert!(world.ragdolls().has_template(HUMANOID_TEMPLATE));
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        let config = PhysicsConfig::default().with_timestep(0.0);
        assert!(matches!(
            PhysicsWorld::try_new(config),
            Err(PhysicsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_create_body_and_collider() {
        let mut world = PhysicsWorld::default();

        let body = world.create_body(RigidBody::dynamic(EntityId(1), 1.0).with_position(Vec3::new(0.0, 0.0, 10.0)));
        world.set_collider(body, Collider::sphere(1.0)).unwrap();

        assert_eq!(world.body_count(), 1);
        assert_eq!(world.collider_count(), 1);

        world.remove_body(body);
        assert_eq!(world.collider_count(), 0);
        assert!(matches!(
            world.set_collider(body, Collider::sphere(1.0)),
            Err(PhysicsError::BodyNotFound(_))
        ));
    }

    #[test]
    fn test_gravity_fall() {
        let mut world = PhysicsWorld::default();
        let body = world.create_body(RigidBody::dynamic(EntityId(1), 1.0).with_position(Vec3::new(0.0, 0.0, 10.0)));

        for _ in 0..60 {
            world.step(DT);
        }

        let z = world.body(body).unwrap().pos.z;
        assert!(z < 6.0, "Body should fall due to gravity, z = {}", z);
    }

    #[test]
    fn test_substep_cap() {
        let mut world = PhysicsWorld::default();
        assert_eq!(world.step(DT * 0.5), 0);
        assert_eq!(world.step(DT * 0.5), 1);
        assert_eq!(world.step(1.0), 4);
        // leftover time is capped, so the next frame does not catch up
        assert!(world.step(0.0) <= 1);
    }

    #[test]
    fn test_missing_body_errors() {
        let mut world = PhysicsWorld::default();
        let body = world.create_body(RigidBody::dynamic(EntityId(1), 2.0));
        world.apply_impulse(body, Vec3::X).unwrap();
        assert_relative_eq!(world.body(body).unwrap().vel.x, 0.5);

        world.remove_body(body);
        assert!(matches!(world.apply_force(body, Vec3::X), Err(PhysicsError::BodyNotFound(_))));
        assert!(matches!(world.apply_impulse(body, Vec3::X), Err(PhysicsError::BodyNotFound(_))));
    }

    #[test]
    fn test_constraint_api() {
        let mut world = PhysicsWorld::default();
        let a = world.create_body(RigidBody::fixed(EntityId(1)));
        let b = world.create_body(RigidBody::dynamic(EntityId(2), 1.0).with_position(Vec3::new(0.0, 0.0, -2.0)));

        let c = world
            .factory()
            .distance(a, b, Vec3::ZERO, Vec3::ZERO, DistanceParams::new(2.0))
            .unwrap();
        let id = world.add_constraint(c);
        assert!(world.constraint(id).is_some());

        for _ in 0..120 {
            world.step(DT);
        }
        let dist = world.body(b).unwrap().pos.length();
        assert!((dist - 2.0).abs() < 0.05, "rod stretched to {}", dist);

        // a removed body leaves the constraint inert
        world.remove_body(b);
        world.step(DT);
        assert!(world.constraint_mut(id).is_some());
        assert!(world.remove_constraint(id).is_some());
        assert!(world.constraints().is_empty());
    }

    #[test]
    fn test_ccd_stops_fast_sphere() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_gravity(Vec3::ZERO));
        let bullet = world.create_body(RigidBody::dynamic(EntityId(1), 1.0).with_velocity(Vec3::new(600.0, 0.0, 0.0)));
        let wall = world.create_body(RigidBody::fixed(EntityId(2)).with_position(Vec3::new(5.0, 0.0, 0.0)));
        world.set_collider(bullet, Collider::sphere(0.1)).unwrap();
        world.set_collider(wall, Collider::cuboid(Vec3::new(0.1, 4.0, 4.0))).unwrap();
        world.set_candidate_pairs(vec![(bullet, wall)]);

        world.step(DT);

        let body = world.body(bullet).unwrap();
        assert!(body.pos.x < 5.0, "bullet tunneled to {}", body.pos.x);
        assert!(body.vel.x <= 1e-3);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, PhysicsEvent::TunnelingPrevented { .. })));
    }

    #[test]
    fn test_subsystems_emit_into_world_queue() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_fracture_seed(3));
        world
            .destruction_mut()
            .register(crate::destruction::Destructible::new(EntityId(7), 10.0));
        assert!(world.destruction_mut().damage(EntityId(7), 20.0, None, None));

        let events = world.drain_events();
        assert!(matches!(events[0], PhysicsEvent::Destroyed { entity: EntityId(7), .. }));
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn test_step_drives_ragdolls_and_ropes() {
        let mut world = PhysicsWorld::default();
        world
            .ragdolls_mut()
            .create("r", HUMANOID_TEMPLATE, Vec3::new(0.0, 0.0, 5.0))
            .unwrap()
            .set_enabled(true);
        world
            .ropes_mut()
            .create("rope", Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Default::default());

        let pelvis_before = world.ragdolls().get("r").unwrap().bone_position("pelvis").unwrap();
        for _ in 0..30 {
            world.step(DT);
        }
        let pelvis_after = world.ragdolls().get("r").unwrap().bone_position("pelvis").unwrap();
        assert!(pelvis_after.z < pelvis_before.z);

        let rope_end = *world.ropes().get("rope").unwrap().positions().last().unwrap();
        assert!(rope_end.z < 0.0);
    }
}
