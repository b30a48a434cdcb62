//! Physics configuration
//!
//! Every config is a plain value with documented defaults. All of them
//! deserialize with `#[serde(default)]`, so a partial document overrides
//! only the fields it names.

use crate::error::{PhysicsError, Result};
use serde::{Deserialize, Serialize};
use void_math::consts::FRAC_PI_6;
use void_math::Vec3;

/// Standard gravity along -Z
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(PhysicsError::InvalidConfig(msg()))
    }
}

/// Physics world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 in Z)
    pub gravity: Vec3,

    /// Fixed timestep for physics simulation
    pub timestep: f32,

    /// Maximum number of substeps per frame
    pub max_substeps: u32,

    /// Seed for fracture randomness; `None` seeds from entropy
    pub fracture_seed: Option<u64>,

    pub solver: SolverConfig,
    pub ccd: CcdConfig,
    pub ragdoll: RagdollConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            timestep: 1.0 / 60.0,
            max_substeps: 4,
            fracture_seed: None,
            solver: SolverConfig::default(),
            ccd: CcdConfig::default(),
            ragdoll: RagdollConfig::default(),
        }
    }
}

impl PhysicsConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            timestep: 1.0 / 120.0,
            max_substeps: 8,
            solver: SolverConfig {
                iterations: 20,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            max_substeps: 2,
            solver: SolverConfig {
                iterations: 4,
                warm_start: false,
                ..Default::default()
            },
            ccd: CcdConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    pub fn with_fracture_seed(mut self, seed: u64) -> Self {
        self.fracture_seed = Some(seed);
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_ccd(mut self, ccd: CcdConfig) -> Self {
        self.ccd = ccd;
        self
    }

    pub fn with_ragdoll(mut self, ragdoll: RagdollConfig) -> Self {
        self.ragdoll = ragdoll;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.timestep > 0.0 && self.timestep.is_finite(), || {
            format!("timestep must be positive, got {}", self.timestep)
        })?;
        ensure(self.max_substeps >= 1, || "max_substeps must be at least 1".into())?;
        ensure(self.gravity.is_finite(), || "gravity must be finite".into())?;
        self.solver.validate()?;
        self.ccd.validate()?;
        self.ragdoll.validate()
    }
}

/// Sequential-impulse solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Velocity passes per solve
    pub iterations: u32,
    /// Re-apply a fraction of last step's impulses before iterating
    pub warm_start: bool,
    /// Fraction of positional error corrected per step
    pub baumgarte: f32,
    /// Positional error tolerated without correction
    pub slop: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warm_start: true,
            baumgarte: 0.2,
            slop: 0.005,
        }
    }
}

impl SolverConfig {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    pub fn with_baumgarte(mut self, baumgarte: f32) -> Self {
        self.baumgarte = baumgarte;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.iterations >= 1, || "solver iterations must be at least 1".into())?;
        ensure((0.0..=1.0).contains(&self.baumgarte), || {
            format!("baumgarte must be in [0, 1], got {}", self.baumgarte)
        })?;
        ensure(self.slop >= 0.0, || format!("slop must be non-negative, got {}", self.slop))
    }
}

/// Continuous collision detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcdConfig {
    pub enabled: bool,
    /// Speed above which a body is swept
    pub vel_threshold: f32,
    /// Maximum impacts resolved per substep
    pub max_iterations: u32,
    /// Time kept between a resolved body and its impact surface
    pub tolerance: f32,
}

impl Default for CcdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vel_threshold: 10.0,
            max_iterations: 8,
            tolerance: 0.001,
        }
    }
}

impl CcdConfig {
    pub fn with_vel_threshold(mut self, vel_threshold: f32) -> Self {
        self.vel_threshold = vel_threshold;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.vel_threshold >= 0.0, || {
            format!("vel_threshold must be non-negative, got {}", self.vel_threshold)
        })?;
        ensure(self.tolerance >= 0.0, || {
            format!("tolerance must be non-negative, got {}", self.tolerance)
        })
    }
}

/// Ragdoll simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagdollConfig {
    pub gravity: Vec3,
    /// Linear drag given to every bone
    pub bone_drag: f32,
    /// Angular drag given to every bone
    pub bone_angular_drag: f32,
    /// Run the joint solver after bone integration
    pub solve_joints: bool,
}

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            bone_drag: 0.3,
            bone_angular_drag: 0.8,
            solve_joints: true,
        }
    }
}

impl RagdollConfig {
    pub fn with_solve_joints(mut self, solve_joints: bool) -> Self {
        self.solve_joints = solve_joints;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.bone_drag >= 0.0 && self.bone_angular_drag >= 0.0, || {
            "bone drag must be non-negative".into()
        })
    }
}

/// Pacejka "magic formula" shape coefficients (peak `D` comes from the load)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacejkaCoeffs {
    /// Stiffness factor
    pub b: f32,
    /// Shape factor
    pub c: f32,
    /// Curvature factor
    pub e: f32,
}

impl Default for PacejkaCoeffs {
    fn default() -> Self {
        Self { b: 10.0, c: 1.9, e: 0.97 }
    }
}

/// Whole-vehicle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub chassis_mass: f32,
    /// Engine force at full throttle, split over the driven wheels
    pub engine_max_force: f32,
    pub brake_force: f32,
    /// Steering lock in radians
    pub max_steer_angle: f32,
    /// Steering slew rate in radians per second
    pub steer_speed: f32,
    pub anti_roll: f32,
    /// Downforce coefficient, applied as `downforce * speed^2`
    pub downforce: f32,
    pub tire: PacejkaCoeffs,
    /// Wheel speed a driven wheel targets at full throttle
    pub max_target_speed: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            chassis_mass: 1500.0,
            engine_max_force: 8000.0,
            brake_force: 12000.0,
            max_steer_angle: FRAC_PI_6,
            steer_speed: 3.0,
            anti_roll: 5000.0,
            downforce: 0.5,
            tire: PacejkaCoeffs::default(),
            max_target_speed: 30.0,
        }
    }
}

impl VehicleConfig {
    pub fn with_engine_force(mut self, force: f32) -> Self {
        self.engine_max_force = force;
        self
    }

    pub fn with_downforce(mut self, downforce: f32) -> Self {
        self.downforce = downforce;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.chassis_mass > 0.0, || {
            format!("chassis_mass must be positive, got {}", self.chassis_mass)
        })?;
        ensure(self.max_steer_angle >= 0.0 && self.steer_speed >= 0.0, || {
            "steering limits must be non-negative".into()
        })
    }
}

/// Per-wheel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub radius: f32,
    pub width: f32,
    /// Rest length of the suspension
    pub suspension_len: f32,
    pub suspension_stiffness: f32,
    pub suspension_damping: f32,
    /// Friction coefficient: grip limit is `normal_load * friction_slip`
    pub friction_slip: f32,
    pub roll_influence: f32,
    pub max_brake_force: f32,
    pub is_steering: bool,
    pub is_driven: bool,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius: 0.4,
            width: 0.2,
            suspension_len: 0.3,
            suspension_stiffness: 30000.0,
            suspension_damping: 4000.0,
            friction_slip: 1.5,
            roll_influence: 0.1,
            max_brake_force: 5000.0,
            is_steering: false,
            is_driven: false,
        }
    }
}

impl WheelConfig {
    /// Front wheel: steers, not driven
    pub fn steering() -> Self {
        Self {
            is_steering: true,
            ..Default::default()
        }
    }

    /// Rear wheel: driven, does not steer
    pub fn driven() -> Self {
        Self {
            is_driven: true,
            ..Default::default()
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_friction_slip(mut self, friction_slip: f32) -> Self {
        self.friction_slip = friction_slip;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.radius > 0.0, || format!("wheel radius must be positive, got {}", self.radius))?;
        ensure(self.suspension_len >= 0.0, || "suspension_len must be non-negative".into())?;
        ensure(self.friction_slip >= 0.0, || "friction_slip must be non-negative".into())
    }
}

/// Verlet rope settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeConfig {
    /// Number of segments; the rope has `segments + 1` nodes
    pub segments: u32,
    pub length: f32,
    /// Total mass, spread evenly over the nodes
    pub mass: f32,
    pub stiffness: f32,
    /// Velocity retained per step
    pub damping: f32,
    pub gravity: Vec3,
    pub iterations: u32,
    /// Segment length limit as a multiple of rest length
    pub max_stretch: f32,
    pub collision_radius: f32,
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self {
            segments: 20,
            length: 5.0,
            mass: 1.0,
            stiffness: 0.9,
            damping: 0.98,
            gravity: DEFAULT_GRAVITY,
            iterations: 4,
            max_stretch: 1.5,
            collision_radius: 0.05,
        }
    }
}

impl RopeConfig {
    pub fn with_segments(mut self, segments: u32) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_max_stretch(mut self, max_stretch: f32) -> Self {
        self.max_stretch = max_stretch;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.segments >= 1, || "rope needs at least one segment".into())?;
        ensure(self.length > 0.0 && self.mass > 0.0, || {
            "rope length and mass must be positive".into()
        })?;
        ensure((0.0..=1.0).contains(&self.stiffness), || {
            format!("stiffness must be in [0, 1], got {}", self.stiffness)
        })?;
        ensure((0.0..=1.0).contains(&self.damping), || {
            format!("damping must be in [0, 1], got {}", self.damping)
        })?;
        ensure(self.max_stretch >= 1.0, || {
            format!("max_stretch must be at least 1, got {}", self.max_stretch)
        })
    }
}

/// Fracture and debris settings of a destructible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractureConfig {
    pub min_fragments: u32,
    pub max_fragments: u32,
    pub noise_scale: f32,
    pub noise_amplitude: f32,
    pub impact_threshold: f32,
    /// Fragment base mass as a fraction of the destructible's mass unit
    pub fragment_mass_ratio: f32,
    /// Seconds a fragment lives
    pub debris_lifetime: f32,
    /// Pool capacity; the oldest fragments are evicted first
    pub max_debris: usize,
}

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            min_fragments: 3,
            max_fragments: 12,
            noise_scale: 1.0,
            noise_amplitude: 0.2,
            impact_threshold: 100.0,
            fragment_mass_ratio: 0.1,
            debris_lifetime: 10.0,
            max_debris: 100,
        }
    }
}

impl FractureConfig {
    pub fn with_fragments(mut self, min: u32, max: u32) -> Self {
        self.min_fragments = min;
        self.max_fragments = max;
        self
    }

    pub fn with_max_debris(mut self, max_debris: usize) -> Self {
        self.max_debris = max_debris;
        self
    }

    pub fn with_debris_lifetime(mut self, lifetime: f32) -> Self {
        self.debris_lifetime = lifetime;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure(self.min_fragments <= self.max_fragments, || {
            format!(
                "min_fragments ({}) exceeds max_fragments ({})",
                self.min_fragments, self.max_fragments
            )
        })?;
        ensure(self.fragment_mass_ratio >= 0.0 && self.debris_lifetime >= 0.0, || {
            "fragment mass ratio and lifetime must be non-negative".into()
        })
    }
}
