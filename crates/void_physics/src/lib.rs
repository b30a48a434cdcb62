//! Void Physics - rigid-body dynamics core
//!
//! This crate provides the physics simulation layer of the Void Engine:
//! explicit-integration rigid bodies plus the systems built on them.
//!
//! # Features
//!
//! - Rigid body dynamics (static, dynamic, kinematic) with sleeping
//! - Continuous collision detection for fast spheres and boxes
//! - Sequential-impulse joints (distance, hinge, ball socket, slider, fixed, spring)
//! - Ragdolls built from bone templates
//! - Raycast vehicles with Pacejka tires
//! - Verlet ropes
//! - Destructibles with Voronoi fracture and pooled debris
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  PhysicsWorld                     │
//! │  ┌─────────┐  ┌─────────────┐  ┌──────────────┐  │
//! │  │ BodySet │  │ ColliderSet │  │ Constraints  │  │
//! │  └─────────┘  └─────────────┘  └──────────────┘  │
//! │  ┌──────────────────────────────────────────────┐│
//! │  │ substep: integrate → solve → CCD → positions ││
//! │  └──────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────┘
//!                         │
//!        ┌────────────┬───┴────────┬─────────────┐
//!        ▼            ▼            ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌───────────┐
//!   │ Ragdoll │  │  Rope   │  │ Vehicle │  │Destruction│
//!   │ Manager │  │ Manager │  │(borrows)│  │  System   │
//!   └─────────┘  └─────────┘  └─────────┘  └───────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_physics::prelude::*;
//!
//! let mut physics = PhysicsWorld::new(PhysicsConfig::default());
//!
//! let ball = physics.create_body(
//!     RigidBody::dynamic(EntityId(1), 1.0).with_position(Vec3::new(0.0, 0.0, 10.0)),
//! );
//! physics.set_collider(ball, Collider::sphere(0.5))?;
//!
//! physics.step(1.0 / 60.0);
//! for event in physics.drain_events() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod body;
pub mod ccd;
pub mod collider;
pub mod config;
pub mod constraint;
pub mod destruction;
pub mod error;
pub mod events;
pub mod ragdoll;
pub mod rope;
pub mod solver;
pub mod vehicle;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality
    pub use crate::body::{BodyHandle, BodySet, RigidBody, RigidBodyType};
    pub use crate::ccd::{CcdSystem, ToiResult};
    pub use crate::collider::{Collider, ColliderSet, ColliderShape};
    pub use crate::config::{
        CcdConfig, FractureConfig, PacejkaCoeffs, PhysicsConfig, RagdollConfig, RopeConfig,
        SolverConfig, VehicleConfig, WheelConfig,
    };
    pub use crate::constraint::{Constraint, ConstraintFactory, ConstraintId, ConstraintKind};
    pub use crate::destruction::{Destructible, DestructionSystem, Fragment, VoronoiFracture};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{EventQueue, EventSender, PhysicsEvent};
    pub use crate::ragdoll::{humanoid_template, Ragdoll, RagdollDef, RagdollManager};
    pub use crate::rope::{Rope, RopeCollider, RopeEnd, RopeManager};
    pub use crate::solver::ConstraintSolver;
    pub use crate::vehicle::{GroundPlane, Raycaster, Vehicle};
    pub use crate::world::PhysicsWorld;
    pub use void_core::EntityId;
    pub use void_math::Vec3;
}

pub use prelude::*;
