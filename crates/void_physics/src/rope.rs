//! Verlet ropes
//!
//! A rope is a chain of point masses joined by distance constraints and
//! solved with position-based dynamics. Each update applies external
//! forces, integrates, relaxes the segments toward their rest length and
//! derives velocities from the position change. A final sweep clamps every
//! segment to `rest_length * max_stretch`, walking away from the pinned end.

use crate::config::RopeConfig;
use log::{debug, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use void_core::EntityId;
use void_math::consts::EPSILON;
use void_math::Vec3;

/// Normal velocity removed on collision, as a multiple of the inward speed
const COLLISION_RESPONSE: f32 = 1.5;

/// A point mass of a rope
#[derive(Debug, Clone, PartialEq)]
pub struct RopeNode {
    pub pos: Vec3,
    pub prev_pos: Vec3,
    pub vel: Vec3,
    pub mass: f32,
    pub fixed: bool,
    /// Force accumulated until the next update
    pub force: Vec3,
}

impl RopeNode {
    fn new(pos: Vec3, mass: f32, fixed: bool) -> Self {
        Self {
            pos,
            prev_pos: pos,
            vel: Vec3::ZERO,
            mass,
            fixed,
            force: Vec3::ZERO,
        }
    }

    /// Inverse mass; zero for pinned or massless nodes
    #[inline]
    pub fn inv_mass(&self) -> f32 {
        if self.fixed || self.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }
}

/// A distance constraint between two neighbouring nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeSegment {
    pub node_a: usize,
    pub node_b: usize,
    pub rest_length: f32,
    pub stiffness: f32,
}

/// Which end of a rope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RopeEnd {
    Start,
    End,
}

/// An end of a rope following an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeAttachment {
    pub entity: EntityId,
    pub offset: Vec3,
}

/// A simulated rope
#[derive(Debug, Clone)]
pub struct Rope {
    id: String,
    pub cfg: RopeConfig,
    nodes: Vec<RopeNode>,
    segments: Vec<RopeSegment>,
    attach_start: Option<RopeAttachment>,
    attach_end: Option<RopeAttachment>,
}

impl Rope {
    /// A straight rope from `start` to `end`, pinned at `start`
    pub fn new(id: &str, start: Vec3, end: Vec3, cfg: RopeConfig) -> Self {
        let mut cfg = cfg;
        if cfg.segments == 0 {
            warn!("rope '{}' configured with zero segments; using one", id);
            cfg.segments = 1;
        }
        if cfg.max_stretch < 1.0 {
            warn!("rope '{}' max_stretch {} is below 1; clamping", id, cfg.max_stretch);
            cfg.max_stretch = 1.0;
        }

        let mut rope = Self {
            id: id.to_owned(),
            cfg,
            nodes: Vec::new(),
            segments: Vec::new(),
            attach_start: None,
            attach_end: None,
        };
        rope.build(start, end);
        rope
    }

    /// A rope of the configured length hanging along gravity from `anchor`
    pub fn hanging(id: &str, anchor: Vec3, cfg: RopeConfig) -> Self {
        let down = cfg.gravity.normalize_or(-Vec3::Z, EPSILON);
        let end = anchor + down * cfg.length;
        Self::new(id, anchor, end, cfg)
    }

    fn build(&mut self, start: Vec3, end: Vec3) {
        let count = self.cfg.segments as usize;
        let step = (end - start) / count as f32;
        let rest_length = step.length();
        let node_mass = self.cfg.mass / (count + 1) as f32;

        self.nodes = (0..=count)
            .map(|i| RopeNode::new(start + step * i as f32, node_mass, i == 0))
            .collect();
        self.segments = (0..count)
            .map(|i| RopeSegment {
                node_a: i,
                node_b: i + 1,
                rest_length,
                stiffness: self.cfg.stiffness,
            })
            .collect();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> &[RopeNode] {
        &self.nodes
    }

    pub fn segments(&self) -> &[RopeSegment] {
        &self.segments
    }

    // ==================== Simulation ====================

    /// Advance the rope by `dt`
    pub fn update(&mut self, dt: f32) {
        if dt < EPSILON {
            return;
        }
        self.apply_forces(dt);
        self.integrate(dt);
        self.solve_constraints();
        self.update_velocities(dt);
    }

    fn apply_forces(&mut self, dt: f32) {
        let RopeConfig { gravity, damping, .. } = self.cfg;
        for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
            let inv_mass = node.inv_mass();
            node.vel += (gravity + node.force * inv_mass) * dt;
            node.vel *= damping;
            node.force = Vec3::ZERO;
        }
    }

    fn integrate(&mut self, dt: f32) {
        for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
            node.prev_pos = node.pos;
            node.pos += node.vel * dt;
        }
    }

    /// Gauss-Seidel relaxation of every segment, then the stretch-limit sweep
    pub fn solve_constraints(&mut self) {
        let max_stretch = self.cfg.max_stretch;
        for _ in 0..self.cfg.iterations {
            for seg in &self.segments {
                let (a, b) = (&self.nodes[seg.node_a], &self.nodes[seg.node_b]);
                let delta = b.pos - a.pos;
                let dist = delta.length();
                if dist < EPSILON {
                    continue;
                }
                let (wa, wb) = (a.inv_mass(), b.inv_mass());
                let total = wa + wb;
                if total <= 0.0 {
                    continue;
                }

                let max_len = seg.rest_length * max_stretch;
                let (target, weight) = if dist > max_len {
                    (max_len, 1.0)
                } else {
                    (seg.rest_length, seg.stiffness)
                };
                let correction = delta * ((dist - target) / dist * weight / total);
                self.nodes[seg.node_a].pos += correction * wa;
                self.nodes[seg.node_b].pos -= correction * wb;
            }
        }
        self.enforce_stretch_limit();
    }

    /// Pull nodes back within `rest_length * max_stretch`, walking away from
    /// the pinned end so each move only affects segments not yet visited
    fn enforce_stretch_limit(&mut self) {
        let max_stretch = self.cfg.max_stretch;
        let end_pinned_only = self.nodes.last().is_some_and(|n| n.fixed) && !self.nodes[0].fixed;

        if end_pinned_only {
            for seg in self.segments.iter().rev() {
                clamp_segment(&mut self.nodes, seg.node_b, seg.node_a, seg.rest_length * max_stretch);
            }
        } else {
            for seg in &self.segments {
                clamp_segment(&mut self.nodes, seg.node_a, seg.node_b, seg.rest_length * max_stretch);
            }
        }
    }

    fn update_velocities(&mut self, dt: f32) {
        for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
            node.vel = (node.pos - node.prev_pos) / dt;
        }
    }

    // ==================== Node Control ====================

    pub fn set_start_fixed(&mut self, fixed: bool) {
        if let Some(node) = self.nodes.first_mut() {
            node.fixed = fixed;
        }
    }

    pub fn set_end_fixed(&mut self, fixed: bool) {
        if let Some(node) = self.nodes.last_mut() {
            node.fixed = fixed;
        }
    }

    /// Teleport a node (no velocity is introduced)
    pub fn set_node_position(&mut self, index: usize, pos: Vec3) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pos = pos;
            node.prev_pos = pos;
        }
    }

    pub fn set_start_position(&mut self, pos: Vec3) {
        self.set_node_position(0, pos);
    }

    pub fn set_end_position(&mut self, pos: Vec3) {
        let last = self.nodes.len().saturating_sub(1);
        self.set_node_position(last, pos);
    }

    /// Accumulate a force on one node, or on every free node when `index` is `None`
    pub fn apply_force(&mut self, force: Vec3, index: Option<usize>) {
        match index {
            Some(i) => {
                if let Some(node) = self.nodes.get_mut(i).filter(|n| !n.fixed) {
                    node.force += force;
                }
            }
            None => {
                for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
                    node.force += force;
                }
            }
        }
    }

    /// Change one free node's velocity by `impulse / mass`
    pub fn apply_impulse(&mut self, impulse: Vec3, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.vel += impulse * node.inv_mass();
        }
    }

    // ==================== Queries ====================

    /// Current length along the nodes
    pub fn length(&self) -> f32 {
        self.nodes.windows(2).map(|w| w[0].pos.distance(w[1].pos)).sum()
    }

    /// Largest stretch ratio over all segments (1.0 at rest length)
    pub fn tension(&self) -> f32 {
        self.segments
            .iter()
            .filter(|s| s.rest_length > EPSILON)
            .map(|s| self.nodes[s.node_a].pos.distance(self.nodes[s.node_b].pos) / s.rest_length)
            .fold(0.0, f32::max)
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.nodes.iter().map(|n| n.pos).collect()
    }

    // ==================== Attachments ====================

    /// Pin an end to an entity
    pub fn attach(&mut self, entity: EntityId, offset: Vec3, end: RopeEnd) {
        let attachment = Some(RopeAttachment { entity, offset });
        match end {
            RopeEnd::Start => {
                self.attach_start = attachment;
                self.set_start_fixed(true);
            }
            RopeEnd::End => {
                self.attach_end = attachment;
                self.set_end_fixed(true);
            }
        }
    }

    /// Release an end; it becomes free
    pub fn detach(&mut self, end: RopeEnd) {
        match end {
            RopeEnd::Start => {
                self.attach_start = None;
                self.set_start_fixed(false);
            }
            RopeEnd::End => {
                self.attach_end = None;
                self.set_end_fixed(false);
            }
        }
    }

    pub fn attachment(&self, end: RopeEnd) -> Option<&RopeAttachment> {
        match end {
            RopeEnd::Start => self.attach_start.as_ref(),
            RopeEnd::End => self.attach_end.as_ref(),
        }
    }

    /// Move an attached end to follow its entity at `entity_pos`
    pub fn sync_attachment(&mut self, end: RopeEnd, entity_pos: Vec3) {
        let Some(attachment) = self.attachment(end).copied() else {
            return;
        };
        let pos = entity_pos + attachment.offset;
        match end {
            RopeEnd::Start => self.set_start_position(pos),
            RopeEnd::End => self.set_end_position(pos),
        }
    }

    /// Rebuild the rope as a straight line; attachments are kept
    pub fn reset(&mut self, start: Vec3, end: Vec3) {
        self.build(start, end);
        if self.attach_end.is_some() {
            self.set_end_fixed(true);
        }
        if self.attach_start.is_none() && self.attach_end.is_some() {
            // a rope held only by its end hangs from there
            self.set_start_fixed(false);
        }
    }
}

/// Move `moving` toward `anchor` until they are at most `max_len` apart
fn clamp_segment(nodes: &mut [RopeNode], anchor: usize, moving: usize, max_len: f32) {
    if nodes[moving].fixed {
        return;
    }
    let delta = nodes[moving].pos - nodes[anchor].pos;
    let dist = delta.length();
    if dist > max_len {
        nodes[moving].pos = nodes[anchor].pos + delta * (max_len / dist);
    }
}

/// Static obstacles ropes collide with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RopeCollider {
    Sphere { center: Vec3, radius: f32 },
    Plane { point: Vec3, normal: Vec3 },
}

/// Owns ropes and the colliders they hit
#[derive(Debug, Default)]
pub struct RopeManager {
    ropes: HashMap<String, Rope>,
    colliders: Vec<RopeCollider>,
}

impl RopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a rope
    pub fn create(&mut self, id: &str, start: Vec3, end: Vec3, cfg: RopeConfig) -> &mut Rope {
        debug!("Created rope '{}' ({} segments)", id, cfg.segments);
        let rope = Rope::new(id, start, end, cfg);
        match self.ropes.entry(id.to_owned()) {
            Entry::Occupied(mut slot) => {
                slot.insert(rope);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(rope),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Rope> {
        self.ropes.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Rope> {
        self.ropes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Rope> {
        self.ropes.get_mut(id)
    }

    pub fn ropes(&self) -> impl Iterator<Item = &Rope> {
        self.ropes.values()
    }

    pub fn count(&self) -> usize {
        self.ropes.len()
    }

    pub fn add_collider(&mut self, collider: RopeCollider) {
        self.colliders.push(collider);
    }

    pub fn remove_collider(&mut self, index: usize) -> Option<RopeCollider> {
        (index < self.colliders.len()).then(|| self.colliders.remove(index))
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    pub fn colliders(&self) -> &[RopeCollider] {
        &self.colliders
    }

    /// Step every rope, then resolve collisions
    pub fn update(&mut self, dt: f32) {
        for rope in self.ropes.values_mut() {
            rope.update(dt);
            handle_collisions(rope, &self.colliders);
        }
    }

    pub fn clear(&mut self) {
        self.ropes.clear();
    }
}

/// Push free nodes out of the colliders and damp their inward velocity
pub fn handle_collisions(rope: &mut Rope, colliders: &[RopeCollider]) {
    let radius = rope.cfg.collision_radius;
    for node in rope.nodes.iter_mut().filter(|n| !n.fixed) {
        for collider in colliders {
            let contact = match *collider {
                RopeCollider::Sphere { center, radius: r } => {
                    let delta = node.pos - center;
                    let dist = delta.length();
                    let min_dist = r + radius;
                    (dist < min_dist && dist > EPSILON).then(|| (delta / dist, min_dist - dist))
                }
                RopeCollider::Plane { point, normal } => {
                    let normal = normal.normalize_or(Vec3::Z, EPSILON);
                    let d = (node.pos - point).dot(normal);
                    (d < radius).then(|| (normal, radius - d))
                }
            };
            let Some((normal, penetration)) = contact else {
                continue;
            };
            node.pos += normal * penetration;
            let inward = node.vel.dot(normal);
            if inward < 0.0 {
                node.vel -= normal * (inward * COLLISION_RESPONSE);
            }
        }
    }
}
