//! Destructibles and debris
//!
//! A destructible loses health to damage; when it reaches zero it is
//! removed and replaced by fragments. Fragments live in a bounded FIFO
//! pool with their own ballistic simulation (gravity, ground bounce at
//! `z = 0`, lifetime countdown) and never enter the rigid-body set.
//!
//! Fragment centers come from a ring around the destructible, or from a
//! Voronoi partition of its bounds when bounds are given.

use crate::config::{FractureConfig, DEFAULT_GRAVITY};
use crate::events::{emit, EventSender, PhysicsEvent};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use void_core::{EntityId, IdGenerator};
use void_math::consts::TAU;
use void_math::{Aabb, Vec3};

/// Fragment entity ids are offset by this value
pub const FRAGMENT_ENTITY_BASE: u64 = 10_000;

/// Lattice resolution of the Voronoi fracture, per axis
pub const DEFAULT_SUBDIVISIONS: u32 = 8;

const GROUND_RESTITUTION: f32 = 0.3;
const GROUND_FRICTION: f32 = 0.8;
const GROUND_ANGULAR_DAMPING: f32 = 0.5;
const IMPACT_SPEED: f32 = 5.0;
const IMPACT_SPREAD: f32 = 0.5;

/// Hook invoked with the fragments of a destroyed object
pub type DestroyCallback = Box<dyn FnMut(&[Fragment]) + Send>;

/// A piece of debris
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: u64,
    pub entity: EntityId,
    pub center: Vec3,
    /// Euler angles, integrated from `ang_vel`
    pub rot: Vec3,
    pub mass: f32,
    pub vel: Vec3,
    pub ang_vel: Vec3,
    /// Seconds left before removal
    pub lifetime: f32,
}

/// Something that can be damaged and shattered
pub struct Destructible {
    pub entity: EntityId,
    pub health: f32,
    pub max_health: f32,
    pub armor: f32,
    pub mass: f32,
    pub position: Vec3,
    /// World-space volume to fracture; `None` uses ring placement
    pub bounds: Option<Aabb>,
    pub fracture_cfg: FractureConfig,
    on_destroy: Option<DestroyCallback>,
}

impl Destructible {
    pub fn new(entity: EntityId, health: f32) -> Self {
        Self {
            entity,
            health,
            max_health: health,
            armor: 0.0,
            mass: 1.0,
            position: Vec3::ZERO,
            bounds: None,
            fracture_cfg: FractureConfig::default(),
            on_destroy: None,
        }
    }

    pub fn with_armor(mut self, armor: f32) -> Self {
        self.armor = armor;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_fracture(mut self, cfg: FractureConfig) -> Self {
        self.fracture_cfg = cfg;
        self
    }

    pub fn on_destroy(mut self, callback: impl FnMut(&[Fragment]) + Send + 'static) -> Self {
        self.on_destroy = Some(Box::new(callback));
        self
    }

    /// Health as a fraction of `max_health`
    pub fn health_fraction(&self) -> f32 {
        if self.max_health > 0.0 {
            (self.health / self.max_health).max(0.0)
        } else {
            0.0
        }
    }
}

impl fmt::Debug for Destructible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destructible")
            .field("entity", &self.entity)
            .field("health", &self.health)
            .field("max_health", &self.max_health)
            .field("armor", &self.armor)
            .field("mass", &self.mass)
            .field("position", &self.position)
            .field("bounds", &self.bounds)
            .field("fracture_cfg", &self.fracture_cfg)
            .field("on_destroy", &self.on_destroy.is_some())
            .finish()
    }
}

// ==================== Voronoi ====================

/// Lattice points closest to one site
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiCell {
    pub site: Vec3,
    pub points: Vec<Vec3>,
}

impl VoronoiCell {
    pub fn centroid(&self) -> Vec3 {
        if self.points.is_empty() {
            return self.site;
        }
        let sum = self.points.iter().fold(Vec3::ZERO, |acc, &p| acc + p);
        sum / self.points.len() as f32
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }
}

/// Voronoi partition of a box, sampled on a regular lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoronoiFracture {
    pub subdivisions: u32,
}

impl Default for VoronoiFracture {
    fn default() -> Self {
        Self {
            subdivisions: DEFAULT_SUBDIVISIONS,
        }
    }
}

impl VoronoiFracture {
    pub fn new(subdivisions: u32) -> Self {
        Self {
            subdivisions: subdivisions.max(1),
        }
    }

    /// Random sites inside `bounds`; the first third cluster around the impact
    pub fn generate_sites<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: &Aabb,
        count: usize,
        impact_point: Option<Vec3>,
    ) -> Vec<Vec3> {
        let size = bounds.size();
        (0..count)
            .map(|i| match impact_point {
                Some(impact) if (i as f32) < count as f32 / 3.0 => {
                    let r = rng.gen::<f32>() * 0.3;
                    let jitter = Vec3::new(
                        (rng.gen::<f32>() - 0.5) * size.x * r,
                        (rng.gen::<f32>() - 0.5) * size.y * r,
                        (rng.gen::<f32>() - 0.5) * size.z * r,
                    );
                    bounds.clamp_point(impact + jitter)
                }
                _ => bounds.min + size.mul_elem(Vec3::new(rng.gen(), rng.gen(), rng.gen())),
            })
            .collect()
    }

    /// Assign every lattice point of `bounds` to its nearest site
    ///
    /// Points equidistant from several sites belong to all of them. Cells
    /// with fewer than four points are dropped.
    pub fn fracture(&self, bounds: &Aabb, sites: &[Vec3]) -> Vec<VoronoiCell> {
        let n = self.subdivisions.max(1);
        let size = bounds.size();
        let mut cells: Vec<VoronoiCell> = sites
            .iter()
            .map(|&site| VoronoiCell {
                site,
                points: Vec::new(),
            })
            .collect();

        for i in 0..=n {
            for j in 0..=n {
                for k in 0..=n {
                    let t = Vec3::new(i as f32, j as f32, k as f32) / n as f32;
                    let point = bounds.min + size.mul_elem(t);
                    let nearest = sites
                        .iter()
                        .map(|s| (*s - point).length_squared())
                        .fold(f32::INFINITY, f32::min);
                    for (cell, site) in cells.iter_mut().zip(sites) {
                        if (*site - point).length_squared() <= nearest {
                            cell.points.push(point);
                        }
                    }
                }
            }
        }

        cells.retain(|c| c.points.len() >= 4);
        cells
    }
}

// ==================== System ====================

/// Owns destructibles and the debris pool
pub struct DestructionSystem {
    destructibles: HashMap<EntityId, Destructible>,
    fragments: VecDeque<Fragment>,
    fragment_ids: IdGenerator,
    voronoi: VoronoiFracture,
    gravity: Vec3,
    rng: StdRng,
    events: Option<EventSender>,
}

impl fmt::Debug for DestructionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructionSystem")
            .field("destructibles", &self.destructibles.len())
            .field("fragments", &self.fragments.len())
            .field("gravity", &self.gravity)
            .finish()
    }
}

impl Default for DestructionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl DestructionSystem {
    /// A system seeded from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A deterministic system
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            destructibles: HashMap::new(),
            fragments: VecDeque::new(),
            fragment_ids: IdGenerator::new(),
            voronoi: VoronoiFracture::default(),
            gravity: DEFAULT_GRAVITY,
            rng,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn set_voronoi(&mut self, voronoi: VoronoiFracture) {
        self.voronoi = voronoi;
    }

    /// Register (or replace) a destructible
    pub fn register(&mut self, destructible: Destructible) -> EntityId {
        let entity = destructible.entity;
        debug!("Registered destructible {} (health {})", entity, destructible.health);
        self.destructibles.insert(entity, destructible);
        entity
    }

    pub fn unregister(&mut self, entity: EntityId) -> Option<Destructible> {
        self.destructibles.remove(&entity)
    }

    pub fn destructible(&self, entity: EntityId) -> Option<&Destructible> {
        self.destructibles.get(&entity)
    }

    /// Apply damage reduced by armor; returns `true` if this destroyed it
    pub fn damage(
        &mut self,
        entity: EntityId,
        amount: f32,
        impact_point: Option<Vec3>,
        impact_dir: Option<Vec3>,
    ) -> bool {
        let Some(target) = self.destructibles.get_mut(&entity) else {
            return false;
        };
        target.health -= (amount - target.armor).max(0.0);
        if target.health <= 0.0 {
            return self.destroy(entity, impact_point, impact_dir);
        }
        false
    }

    /// Shatter a destructible; `false` if it is unknown or already destroyed
    pub fn destroy(
        &mut self,
        entity: EntityId,
        impact_point: Option<Vec3>,
        impact_dir: Option<Vec3>,
    ) -> bool {
        let Some(mut target) = self.destructibles.remove(&entity) else {
            return false;
        };

        let cfg = &target.fracture_cfg;
        let count: u32 = if cfg.max_fragments > cfg.min_fragments {
            self.rng.gen_range(cfg.min_fragments..=cfg.max_fragments)
        } else {
            cfg.min_fragments
        };
        let count = count as usize;

        let fragments = match target.bounds {
            Some(bounds) => self.voronoi_fragments(&target, &bounds, count, impact_point, impact_dir),
            None => Vec::new(),
        };
        let fragments = if fragments.is_empty() {
            self.ring_fragments(&target, count, impact_dir)
        } else {
            fragments
        };

        if let Some(callback) = target.on_destroy.as_mut() {
            callback(&fragments);
        }

        let produced = fragments.len();
        self.fragments.extend(fragments);
        let max_debris = target.fracture_cfg.max_debris;
        let evicted = self.fragments.len().saturating_sub(max_debris);
        self.fragments.drain(..evicted);

        debug!("Destroyed {} into {} fragments", entity, produced);
        emit(
            &self.events,
            PhysicsEvent::Destroyed {
                entity,
                fragments: produced,
            },
        );
        if evicted > 0 {
            emit(&self.events, PhysicsEvent::DebrisEvicted { count: evicted });
        }
        true
    }

    fn spawn(&mut self, center: Vec3, mass: f32, vel: Vec3, lifetime: f32) -> Fragment {
        let id = self.fragment_ids.next_id();
        let rng = &mut self.rng;
        let ang_vel = Vec3::new(
            (rng.gen::<f32>() - 0.5) * 10.0,
            (rng.gen::<f32>() - 0.5) * 10.0,
            (rng.gen::<f32>() - 0.5) * 10.0,
        );
        Fragment {
            id,
            entity: EntityId(FRAGMENT_ENTITY_BASE + id),
            center,
            rot: Vec3::ZERO,
            mass,
            vel,
            ang_vel,
            lifetime,
        }
    }

    fn launch_velocity(&mut self, impact_dir: Option<Vec3>) -> Vec3 {
        let rng = &mut self.rng;
        match impact_dir {
            Some(dir) => Vec3::new(
                dir.x * IMPACT_SPEED + (rng.gen::<f32>() - 0.5) * IMPACT_SPREAD,
                dir.y * IMPACT_SPEED + (rng.gen::<f32>() - 0.5) * IMPACT_SPREAD,
                dir.z * IMPACT_SPEED + rng.gen::<f32>() * 2.0,
            ),
            None => Vec3::new(
                (rng.gen::<f32>() - 0.5) * 3.0,
                (rng.gen::<f32>() - 0.5) * 3.0,
                rng.gen::<f32>() * 5.0,
            ),
        }
    }

    fn ring_fragments(&mut self, target: &Destructible, count: usize, impact_dir: Option<Vec3>) -> Vec<Fragment> {
        let base_mass = target.mass * target.fracture_cfg.fragment_mass_ratio;
        let bias = impact_dir.map_or(Vec3::ZERO, Vec3::normalize_or_zero);

        (0..count)
            .map(|i| {
                let angle = TAU * i as f32 / count as f32;
                let radius = 0.5 + self.rng.gen::<f32>() * 0.5;
                let offset = Vec3::new(
                    angle.cos() * radius,
                    angle.sin() * radius,
                    (self.rng.gen::<f32>() - 0.5) * radius,
                ) + bias * (radius * 0.5);
                let mass = base_mass + self.rng.gen::<f32>() * base_mass;
                let vel = self.launch_velocity(impact_dir);
                self.spawn(target.position + offset, mass, vel, target.fracture_cfg.debris_lifetime)
            })
            .collect()
    }

    fn voronoi_fragments(
        &mut self,
        target: &Destructible,
        bounds: &Aabb,
        count: usize,
        impact_point: Option<Vec3>,
        impact_dir: Option<Vec3>,
    ) -> Vec<Fragment> {
        let sites = self.voronoi.generate_sites(&mut self.rng, bounds, count, impact_point);
        let cells = self.voronoi.fracture(bounds, &sites);
        let total: usize = cells.iter().map(|c| c.points.len()).sum();
        if total == 0 {
            return Vec::new();
        }

        cells
            .iter()
            .map(|cell| {
                let mass = target.mass * cell.points.len() as f32 / total as f32;
                let vel = self.launch_velocity(impact_dir);
                self.spawn(cell.centroid(), mass, vel, target.fracture_cfg.debris_lifetime)
            })
            .collect()
    }

    /// Advance the debris simulation
    pub fn update(&mut self, dt: f32) {
        let before = self.fragments.len();
        self.fragments.retain_mut(|frag| {
            frag.lifetime -= dt;
            frag.lifetime > 0.0
        });
        let expired = before - self.fragments.len();

        for frag in &mut self.fragments {
            frag.vel += self.gravity * dt;
            frag.center += frag.vel * dt;
            frag.rot += frag.ang_vel * dt;
            if frag.center.z < 0.0 {
                frag.center.z = 0.0;
                frag.vel.z *= -GROUND_RESTITUTION;
                frag.vel.x *= GROUND_FRICTION;
                frag.vel.y *= GROUND_FRICTION;
                frag.ang_vel *= GROUND_ANGULAR_DAMPING;
            }
        }

        if expired > 0 {
            emit(&self.events, PhysicsEvent::DebrisExpired { count: expired });
        }
        trace!("{} fragments alive, {} expired", self.fragments.len(), expired);
    }

    /// Live fragments, oldest first
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn destructible_count(&self) -> usize {
        self.destructibles.len()
    }

    pub fn clear(&mut self) {
        self.destructibles.clear();
        self.fragments.clear();
    }
}
