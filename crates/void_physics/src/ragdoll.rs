//! Articulated ragdolls built from bone/joint templates
//!
//! A template ([`RagdollDef`]) lists bones placed relative to a root position
//! and the joints connecting them. [`RagdollManager::create`] instantiates a
//! template: one dynamic body per bone inside the ragdoll's own [`BodySet`]
//! and one hinge or ball-socket constraint per joint. Ragdolls start
//! disabled; [`Ragdoll::set_enabled`] wakes their bones.

use crate::body::{BodyHandle, BodySet, RigidBody};
use crate::config::RagdollConfig;
use crate::constraint::{BallSocketParams, Constraint, ConstraintFactory, ConstraintRef, HingeParams};
use crate::error::{PhysicsError, Result};
use crate::solver::ConstraintSolver;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use void_core::{EntityId, IdGenerator};
use void_math::consts::{FRAC_PI_3, FRAC_PI_4, FRAC_PI_6};
use void_math::Vec3;

/// First entity id handed out to ragdoll bones
pub const BONE_ENTITY_BASE: u64 = 10_000;

// ============================================================================
// Templates
// ============================================================================

/// A bone in a ragdoll template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDef {
    pub name: String,
    /// `None` marks the root bone
    pub parent: Option<String>,
    /// Offset from the ragdoll's root position
    pub pos: Vec3,
    pub size: Vec3,
    pub mass: f32,
}

impl BoneDef {
    pub fn new(name: impl Into<String>, parent: Option<&str>, pos: Vec3, size: Vec3, mass: f32) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_owned),
            pos,
            size,
            mass,
        }
    }
}

/// Joint type in a template; unset limits fall back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointDefKind {
    /// Defaults: axis +X, limits ±π/4
    Hinge {
        axis: Option<Vec3>,
        min_angle: Option<f32>,
        max_angle: Option<f32>,
    },
    /// Defaults: swing π/3, twist π/6
    Ball {
        swing_limit: Option<f32>,
        twist_limit: Option<f32>,
    },
}

/// A joint in a ragdoll template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDef {
    pub name: String,
    pub bone_a: String,
    pub bone_b: String,
    /// Attachment point in bone A's frame
    pub anchor: Vec3,
    pub kind: JointDefKind,
}

impl JointDef {
    pub fn hinge(name: &str, bone_a: &str, bone_b: &str, anchor: Vec3, axis: Vec3, min_angle: f32, max_angle: f32) -> Self {
        Self {
            name: name.to_owned(),
            bone_a: bone_a.to_owned(),
            bone_b: bone_b.to_owned(),
            anchor,
            kind: JointDefKind::Hinge {
                axis: Some(axis),
                min_angle: Some(min_angle),
                max_angle: Some(max_angle),
            },
        }
    }

    pub fn ball(name: &str, bone_a: &str, bone_b: &str, anchor: Vec3, swing_limit: f32, twist_limit: f32) -> Self {
        Self {
            name: name.to_owned(),
            bone_a: bone_a.to_owned(),
            bone_b: bone_b.to_owned(),
            anchor,
            kind: JointDefKind::Ball {
                swing_limit: Some(swing_limit),
                twist_limit: Some(twist_limit),
            },
        }
    }
}

/// Bones and joints making up a ragdoll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagdollDef {
    pub bones: Vec<BoneDef>,
    pub joints: Vec<JointDef>,
}

impl RagdollDef {
    /// Check bone names are unique and every joint links two distinct, known bones
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.bones.is_empty() {
            return Err(PhysicsError::EmptyTemplate(name.to_owned()));
        }
        let mut names = HashSet::with_capacity(self.bones.len());
        for bone in &self.bones {
            if !names.insert(bone.name.as_str()) {
                return Err(PhysicsError::DuplicateBone(bone.name.clone()));
            }
        }
        for joint in &self.joints {
            for bone in [&joint.bone_a, &joint.bone_b] {
                if !names.contains(bone.as_str()) {
                    return Err(PhysicsError::UnknownBone {
                        joint: joint.name.clone(),
                        bone: bone.clone(),
                    });
                }
            }
            if joint.bone_a == joint.bone_b {
                return Err(PhysicsError::SelfJoint(joint.name.clone()));
            }
        }
        Ok(())
    }
}

/// The canonical 12-bone, 11-joint humanoid skeleton
pub fn humanoid_template() -> RagdollDef {
    let v = Vec3::new;
    let bones = vec![
        BoneDef::new("pelvis", None, v(0.0, 0.0, 1.0), v(0.3, 0.2, 0.2), 15.0),
        BoneDef::new("spine", Some("pelvis"), v(0.0, 0.0, 1.3), v(0.25, 0.15, 0.3), 10.0),
        BoneDef::new("chest", Some("spine"), v(0.0, 0.0, 1.5), v(0.35, 0.2, 0.25), 12.0),
        BoneDef::new("head", Some("chest"), v(0.0, 0.0, 1.8), v(0.2, 0.2, 0.25), 5.0),
        BoneDef::new("upperArmL", Some("chest"), v(-0.35, 0.0, 1.5), v(0.08, 0.08, 0.25), 3.0),
        BoneDef::new("upperArmR", Some("chest"), v(0.35, 0.0, 1.5), v(0.08, 0.08, 0.25), 3.0),
        BoneDef::new("lowerArmL", Some("upperArmL"), v(-0.35, 0.0, 1.25), v(0.06, 0.06, 0.25), 2.0),
        BoneDef::new("lowerArmR", Some("upperArmR"), v(0.35, 0.0, 1.25), v(0.06, 0.06, 0.25), 2.0),
        BoneDef::new("upperLegL", Some("pelvis"), v(-0.1, 0.0, 0.7), v(0.1, 0.1, 0.35), 8.0),
        BoneDef::new("upperLegR", Some("pelvis"), v(0.1, 0.0, 0.7), v(0.1, 0.1, 0.35), 8.0),
        BoneDef::new("lowerLegL", Some("upperLegL"), v(-0.1, 0.0, 0.3), v(0.08, 0.08, 0.35), 5.0),
        BoneDef::new("lowerLegR", Some("upperLegR"), v(0.1, 0.0, 0.3), v(0.08, 0.08, 0.35), 5.0),
    ];
    let joints = vec![
        JointDef::ball("spine_joint", "pelvis", "spine", v(0.0, 0.0, 0.15), 0.3, 0.2),
        JointDef::ball("chest_joint", "spine", "chest", v(0.0, 0.0, 0.1), 0.2, 0.15),
        JointDef::ball("neck_joint", "chest", "head", v(0.0, 0.0, 0.15), 0.5, 0.7),
        JointDef::ball("shoulderL", "chest", "upperArmL", v(-0.2, 0.0, 0.0), 1.2, 0.8),
        JointDef::ball("shoulderR", "chest", "upperArmR", v(0.2, 0.0, 0.0), 1.2, 0.8),
        JointDef::hinge("elbowL", "upperArmL", "lowerArmL", v(0.0, 0.0, -0.12), Vec3::X, 0.0, 2.5),
        JointDef::hinge("elbowR", "upperArmR", "lowerArmR", v(0.0, 0.0, -0.12), Vec3::X, 0.0, 2.5),
        JointDef::ball("hipL", "pelvis", "upperLegL", v(-0.1, 0.0, -0.1), 0.8, 0.3),
        JointDef::ball("hipR", "pelvis", "upperLegR", v(0.1, 0.0, -0.1), 0.8, 0.3),
        JointDef::hinge("kneeL", "upperLegL", "lowerLegL", v(0.0, 0.0, -0.17), Vec3::X, -2.5, 0.0),
        JointDef::hinge("kneeR", "upperLegR", "lowerLegR", v(0.0, 0.0, -0.17), Vec3::X, -2.5, 0.0),
    ];
    RagdollDef { bones, joints }
}

// ============================================================================
// Instances
// ============================================================================

/// A bone of a live ragdoll
#[derive(Debug, Clone, PartialEq)]
pub struct RagdollBone {
    pub name: String,
    pub entity: EntityId,
    pub body: BodyHandle,
    pub size: Vec3,
}

/// A joint of a live ragdoll
#[derive(Debug, Clone, PartialEq)]
pub struct RagdollJoint {
    pub name: String,
    pub bone_a: String,
    pub bone_b: String,
    pub constraint: Constraint,
}

impl ConstraintRef for RagdollJoint {
    fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    fn constraint_mut(&mut self) -> &mut Constraint {
        &mut self.constraint
    }
}

/// World transform of one bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub pos: Vec3,
    pub rot: Vec3,
}

/// An instantiated ragdoll; owns its bone bodies
#[derive(Debug)]
pub struct Ragdoll {
    id: String,
    bones: Vec<RagdollBone>,
    bone_index: HashMap<String, usize>,
    joints: Vec<RagdollJoint>,
    root_bone: Option<String>,
    enabled: bool,
    bodies: BodySet,
}

impl Ragdoll {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            bones: Vec::new(),
            bone_index: HashMap::new(),
            joints: Vec::new(),
            root_bone: None,
            enabled: false,
            bodies: BodySet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn root_bone(&self) -> Option<&str> {
        self.root_bone.as_deref()
    }

    pub fn bone(&self, name: &str) -> Option<&RagdollBone> {
        self.bone_index.get(name).map(|&i| &self.bones[i])
    }

    pub fn bones(&self) -> &[RagdollBone] {
        &self.bones
    }

    pub fn joints(&self) -> &[RagdollJoint] {
        &self.joints
    }

    pub fn joint(&self, name: &str) -> Option<&RagdollJoint> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// The body simulating a bone
    pub fn body(&self, bone: &str) -> Option<&RigidBody> {
        self.bone(bone).and_then(|b| self.bodies.get(b.body))
    }

    fn body_mut(&mut self, bone: &str) -> Option<&mut RigidBody> {
        let handle = self.bone(bone)?.body;
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    pub fn bone_position(&self, bone: &str) -> Option<Vec3> {
        self.body(bone).map(|b| b.pos)
    }

    pub fn bone_rotation(&self, bone: &str) -> Option<Vec3> {
        self.body(bone).map(|b| b.rot)
    }

    /// Teleport the root bone; other bones follow through the joints
    pub fn set_root_position(&mut self, pos: Vec3) {
        let Some(root) = self.root_bone.clone() else {
            return;
        };
        if let Some(body) = self.body_mut(&root) {
            body.pos = pos;
        }
    }

    /// Accumulate a force on a bone without waking it
    pub fn apply_force(&mut self, bone: &str, force: Vec3) {
        if let Some(body) = self.body_mut(bone) {
            body.force += force;
        }
    }

    /// Change a bone's velocity by `impulse / mass` without waking it
    pub fn apply_impulse(&mut self, bone: &str, impulse: Vec3) {
        if let Some(body) = self.body_mut(bone) {
            body.vel += impulse * body.inv_mass;
        }
    }

    /// Enabling wakes every bone; disabling puts them to sleep
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for (_, body) in self.bodies.iter_mut() {
            body.sleeping = !enabled;
            body.sleep_timer = 0.0;
        }
    }

    pub fn bone_transforms(&self) -> HashMap<&str, BoneTransform> {
        self.bones
            .iter()
            .filter_map(|bone| {
                let body = self.bodies.get(bone.body)?;
                Some((bone.name.as_str(), BoneTransform { pos: body.pos, rot: body.rot }))
            })
            .collect()
    }

    fn step(&mut self, config: &RagdollConfig, solver: &ConstraintSolver, dt: f32) {
        for (_, body) in self.bodies.iter_mut() {
            body.integrate_velocity(dt, config.gravity);
        }
        if config.solve_joints {
            solver.solve(&mut self.joints, &mut self.bodies, dt);
        }
        for (_, body) in self.bodies.iter_mut() {
            body.integrate_position(dt);
        }
        if config.solve_joints {
            solver.solve_positions(&mut self.joints, &mut self.bodies);
        }
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Owns ragdoll templates and live ragdolls
#[derive(Debug)]
pub struct RagdollManager {
    config: RagdollConfig,
    templates: HashMap<String, RagdollDef>,
    ragdolls: HashMap<String, Ragdoll>,
    entity_ids: IdGenerator,
    factory: ConstraintFactory,
    solver: ConstraintSolver,
}

impl RagdollManager {
    pub fn new(config: RagdollConfig, solver: ConstraintSolver) -> Self {
        Self {
            config,
            templates: HashMap::new(),
            ragdolls: HashMap::new(),
            entity_ids: IdGenerator::starting_at(BONE_ENTITY_BASE),
            factory: ConstraintFactory::new(),
            solver,
        }
    }

    pub fn config(&self) -> &RagdollConfig {
        &self.config
    }

    /// Register (or replace) a template after validating it
    pub fn register_template(&mut self, name: &str, def: RagdollDef) -> Result<()> {
        def.validate(name)?;
        debug!("Registered ragdoll template '{}' ({} bones, {} joints)", name, def.bones.len(), def.joints.len());
        self.templates.insert(name.to_owned(), def);
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Instantiate `template` at `root_pos`; `None` if the template is unknown.
    ///
    /// An existing ragdoll with the same id is replaced.
    pub fn create(&mut self, id: &str, template: &str, root_pos: Vec3) -> Option<&mut Ragdoll> {
        let def = self.templates.get(template)?;
        let mut ragdoll = Ragdoll::new(id);

        for bone_def in &def.bones {
            let entity = EntityId(self.entity_ids.next_id());
            let mut body = RigidBody::dynamic(entity, bone_def.mass)
                .with_position(root_pos + bone_def.pos)
                .with_drag(self.config.bone_drag, self.config.bone_angular_drag);
            body.sleeping = true;
            let handle = ragdoll.bodies.insert(body);

            ragdoll.bone_index.insert(bone_def.name.clone(), ragdoll.bones.len());
            ragdoll.bones.push(RagdollBone {
                name: bone_def.name.clone(),
                entity,
                body: handle,
                size: bone_def.size,
            });
            if bone_def.parent.is_none() {
                ragdoll.root_bone = Some(bone_def.name.clone());
            }
        }

        for joint_def in &def.joints {
            let (Some(a), Some(b)) = (ragdoll.bone(&joint_def.bone_a), ragdoll.bone(&joint_def.bone_b)) else {
                warn!("Ragdoll '{}': joint '{}' references a missing bone", id, joint_def.name);
                continue;
            };
            let (a, b) = (a.body, b.body);
            let built = match joint_def.kind {
                JointDefKind::Hinge { axis, min_angle, max_angle } => {
                    let axis = axis.unwrap_or(Vec3::X);
                    let params = HingeParams::new(axis, axis)
                        .with_limits(min_angle.unwrap_or(-FRAC_PI_4), max_angle.unwrap_or(FRAC_PI_4));
                    self.factory.hinge(a, b, joint_def.anchor, Vec3::ZERO, params)
                }
                JointDefKind::Ball { swing_limit, twist_limit } => {
                    let params = BallSocketParams::new(swing_limit.unwrap_or(FRAC_PI_3), twist_limit.unwrap_or(FRAC_PI_6));
                    self.factory.ball_socket(a, b, joint_def.anchor, Vec3::ZERO, params)
                }
            };
            match built {
                Ok(constraint) => ragdoll.joints.push(RagdollJoint {
                    name: joint_def.name.clone(),
                    bone_a: joint_def.bone_a.clone(),
                    bone_b: joint_def.bone_b.clone(),
                    constraint,
                }),
                Err(e) => warn!("Ragdoll '{}': skipping joint '{}': {}", id, joint_def.name, e),
            }
        }

        debug!(
            "Created ragdoll '{}' from '{}' ({} bones, {} joints)",
            id,
            template,
            ragdoll.bones.len(),
            ragdoll.joints.len()
        );
        self.ragdolls.insert(id.to_owned(), ragdoll);
        self.ragdolls.get_mut(id)
    }

    pub fn get(&self, id: &str) -> Option<&Ragdoll> {
        self.ragdolls.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Ragdoll> {
        self.ragdolls.get_mut(id)
    }

    /// Drop a ragdoll together with its bones and joints
    pub fn remove(&mut self, id: &str) -> Option<Ragdoll> {
        let removed = self.ragdolls.remove(id);
        if removed.is_some() {
            debug!("Removed ragdoll '{}'", id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.ragdolls.clear();
    }

    pub fn count(&self) -> usize {
        self.ragdolls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ragdoll> {
        self.ragdolls.values()
    }

    /// Step every enabled ragdoll
    pub fn update(&mut self, dt: f32) {
        for ragdoll in self.ragdolls.values_mut() {
            if ragdoll.enabled {
                ragdoll.step(&self.config, &self.solver, dt);
            }
        }
    }
}

impl Default for RagdollManager {
    fn default() -> Self {
        Self::new(RagdollConfig::default(), ConstraintSolver::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintKind;
    use approx::assert_relative_eq;

    fn manager() -> RagdollManager {
        let mut m = RagdollManager::default();
        m.register_template("humanoid", humanoid_template()).unwrap();
        m
    }

    #[test]
    fn test_humanoid_shape() {
        let def = humanoid_template();
        assert_eq!(def.bones.len(), 12);
        assert_eq!(def.joints.len(), 11);
        assert!(def.validate("humanoid").is_ok());
        assert_eq!(def.bones.iter().filter(|b| b.parent.is_none()).count(), 1);
    }

    #[test]
    fn test_create_places_bones_relative_to_root() {
        let mut m = manager();
        let ragdoll = m.create("r1", "humanoid", Vec3::new(10.0, 0.0, 0.0)).unwrap();

        assert_eq!(ragdoll.root_bone(), Some("pelvis"));
        assert_eq!(ragdoll.bone_position("head"), Some(Vec3::new(10.0, 0.0, 1.8)));
        assert!(!ragdoll.is_enabled());

        let pelvis = ragdoll.body("pelvis").unwrap();
        assert_eq!(pelvis.mass, 15.0);
        assert_eq!(pelvis.drag, 0.3);
        assert_eq!(pelvis.ang_drag, 0.8);
        assert_eq!(ragdoll.bone("pelvis").unwrap().entity, EntityId(BONE_ENTITY_BASE));
    }

    #[test]
    fn test_joint_defaults_applied() {
        let mut def = RagdollDef {
            bones: vec![
                BoneDef::new("a", None, Vec3::ZERO, Vec3::ONE, 1.0),
                BoneDef::new("b", Some("a"), Vec3::Z, Vec3::ONE, 1.0),
                BoneDef::new("c", Some("b"), Vec3::Z * 2.0, Vec3::ONE, 1.0),
            ],
            joints: Vec::new(),
        };
        def.joints.push(JointDef {
            name: "h".into(),
            bone_a: "a".into(),
            bone_b: "b".into(),
            anchor: Vec3::Z,
            kind: JointDefKind::Hinge { axis: None, min_angle: None, max_angle: None },
        });
        def.joints.push(JointDef {
            name: "s".into(),
            bone_a: "b".into(),
            bone_b: "c".into(),
            anchor: Vec3::Z,
            kind: JointDefKind::Ball { swing_limit: None, twist_limit: None },
        });

        let mut m = RagdollManager::default();
        m.register_template("chain", def).unwrap();
        let ragdoll = m.create("c", "chain", Vec3::ZERO).unwrap();

        match ragdoll.joint("h").unwrap().constraint.kind {
            ConstraintKind::Hinge(p) => {
                assert_eq!(p.axis_a, Vec3::X);
                assert_relative_eq!(p.min_angle, -FRAC_PI_4);
                assert_relative_eq!(p.max_angle, FRAC_PI_4);
            }
            other => panic!("expected hinge, got {other:?}"),
        }
        match ragdoll.joint("s").unwrap().constraint.kind {
            ConstraintKind::BallSocket(p) => {
                assert_relative_eq!(p.swing_limit, FRAC_PI_3);
                assert_relative_eq!(p.twist_limit, FRAC_PI_6);
            }
            other => panic!("expected ball socket, got {other:?}"),
        }
        assert_eq!(ragdoll.joint("s").unwrap().constraint.anchor_b, Vec3::ZERO);
    }

    #[test]
    fn test_template_validation() {
        let mut m = RagdollManager::default();
        assert_eq!(
            m.register_template("empty", RagdollDef::default()),
            Err(PhysicsError::EmptyTemplate("empty".into()))
        );

        let dup = RagdollDef {
            bones: vec![
                BoneDef::new("a", None, Vec3::ZERO, Vec3::ONE, 1.0),
                BoneDef::new("a", None, Vec3::ZERO, Vec3::ONE, 1.0),
            ],
            joints: Vec::new(),
        };
        assert_eq!(m.register_template("dup", dup), Err(PhysicsError::DuplicateBone("a".into())));

        let mut missing = humanoid_template();
        missing.joints[0].bone_b = "tail".into();
        assert_eq!(
            m.register_template("missing", missing),
            Err(PhysicsError::UnknownBone { joint: "spine_joint".into(), bone: "tail".into() })
        );

        let mut looped = humanoid_template();
        looped.joints[0].bone_b = "pelvis".into();
        assert_eq!(m.register_template("looped", looped), Err(PhysicsError::SelfJoint("spine_joint".into())));
        assert!(!m.has_template("looped"));
    }

    #[test]
    fn test_unknown_template_gives_none() {
        let mut m = RagdollManager::default();
        assert!(m.create("x", "nope", Vec3::ZERO).is_none());
        assert_eq!(m.count(), 0);
    }

    #[test]
    fn test_disabled_ragdolls_do_not_move() {
        let mut m = manager();
        m.create("r", "humanoid", Vec3::ZERO);
        m.update(1.0 / 60.0);
        assert_eq!(m.get("r").unwrap().bone_position("pelvis"), Some(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_enabled_ragdoll_falls() {
        let mut m = RagdollManager::new(RagdollConfig::default().with_solve_joints(false), ConstraintSolver::default());
        m.register_template("humanoid", humanoid_template()).unwrap();
        m.create("r", "humanoid", Vec3::ZERO).unwrap().set_enabled(true);

        for _ in 0..30 {
            m.update(1.0 / 60.0);
        }
        let ragdoll = m.get("r").unwrap();
        for bone in ragdoll.bones() {
            let body = ragdoll.bodies().get(bone.body).unwrap();
            assert!(body.vel.z < 0.0, "{} is not falling", bone.name);
        }
    }

    #[test]
    fn test_joint_solving_stays_finite() {
        let mut m = manager();
        m.create("r", "humanoid", Vec3::ZERO).unwrap().set_enabled(true);
        for _ in 0..120 {
            m.update(1.0 / 60.0);
        }
        let ragdoll = m.get("r").unwrap();
        for transform in ragdoll.bone_transforms().values() {
            assert!(transform.pos.is_finite());
            assert!(transform.rot.is_finite());
        }
    }

    #[test]
    fn test_bone_operations() {
        let mut m = manager();
        let ragdoll = m.create("r", "humanoid", Vec3::ZERO).unwrap();

        ragdoll.apply_impulse("head", Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(ragdoll.body("head").unwrap().vel, Vec3::new(2.0, 0.0, 0.0));

        ragdoll.apply_force("chest", Vec3::Z);
        assert_eq!(ragdoll.body("chest").unwrap().force, Vec3::Z);
        // neither call wakes a disabled ragdoll
        assert!(ragdoll.body("chest").unwrap().sleeping);

        ragdoll.set_root_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(ragdoll.bone_position("pelvis"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(ragdoll.bone_position("nope"), None);
        assert_eq!(ragdoll.bone_rotation("head"), Some(Vec3::ZERO));

        ragdoll.set_enabled(true);
        assert!(ragdoll.bodies().iter().all(|(_, b)| !b.sleeping));
        assert_eq!(ragdoll.bone_transforms().len(), 12);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut m = manager();
        m.create("a", "humanoid", Vec3::ZERO);
        m.create("b", "humanoid", Vec3::ZERO);
        assert_eq!(m.count(), 2);

        let removed = m.remove("a").unwrap();
        assert_eq!(removed.bone_count(), 12);
        assert!(m.get("a").is_none());
        assert!(m.remove("a").is_none());

        m.clear();
        assert_eq!(m.count(), 0);
    }
}
