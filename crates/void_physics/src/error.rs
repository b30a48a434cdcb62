//! Error types for the physics system

use crate::body::BodyHandle;
use thiserror::Error;

/// Physics system errors
///
/// Only construction and explicit lookups fail; the per-tick simulation
/// paths degrade to neutral results instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// Rigid body not found (removed, or never existed)
    #[error("Rigid body not found: {0:?}")]
    BodyNotFound(BodyHandle),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// A constraint was asked to connect a body to itself
    #[error("Constraint connects body {0:?} to itself")]
    SameBody(BodyHandle),

    /// A ragdoll joint names a bone the template does not define
    #[error("Joint '{joint}' references unknown bone '{bone}'")]
    UnknownBone { joint: String, bone: String },

    /// Two bones in one ragdoll template share a name
    #[error("Duplicate bone name: {0}")]
    DuplicateBone(String),

    /// A ragdoll joint whose two ends are the same bone
    #[error("Joint '{0}' connects a bone to itself")]
    SelfJoint(String),

    /// A ragdoll template without any bones
    #[error("Ragdoll template '{0}' has no bones")]
    EmptyTemplate(String),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
