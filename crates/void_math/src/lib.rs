//! # void_math - Physics Math
//!
//! Plain `f32` math primitives used by the simulation:
//! - [`Vec3`] value vectors with the usual operators
//! - [`Mat3`] rotation built from XYZ Euler angles
//! - [`Aabb`] bounds and [`Ray`] / [`RayHit`] for queries
//!
//! Degenerate input (zero-length vectors, parallel axes) yields neutral
//! results instead of NaN.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod vector;
pub mod matrix;
pub mod bounds;
pub mod ray;

pub use vector::*;
pub use matrix::*;
pub use bounds::*;
pub use ray::*;

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const TAU: f32 = PI * 2.0;
    pub const FRAC_PI_2: f32 = PI / 2.0;
    pub const FRAC_PI_3: f32 = PI / 3.0;
    pub const FRAC_PI_4: f32 = PI / 4.0;
    pub const FRAC_PI_6: f32 = PI / 6.0;
    /// Guard below which lengths, speeds and time steps count as zero
    pub const EPSILON: f32 = 1e-4;
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp value between min and max
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min { min }
    else if value > max { max }
    else { value }
}

/// Sign of `value`, with `sign(0.0) == 0.0`
#[inline]
pub fn sign(value: f32) -> f32 {
    if value > 0.0 { 1.0 }
    else if value < 0.0 { -1.0 }
    else { 0.0 }
}

pub mod prelude {
    pub use crate::vector::Vec3;
    pub use crate::matrix::Mat3;
    pub use crate::bounds::Aabb;
    pub use crate::ray::{Ray, RayHit};
    pub use crate::consts::EPSILON;
    pub use crate::{lerp, clamp, sign};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_of_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(2.0), 1.0);
    }

    #[test]
    fn test_clamp_and_lerp() {
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, -1.0, 1.0), -1.0);
        assert_eq!(lerp(0.0, 10.0, 0.25), 2.5);
    }
}
