//! Rotation matrices for Euler-angle orientations

use crate::vector::Vec3;
use core::ops::Mul;

/// 3x3 matrix (column-major)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3 {
    pub cols: [Vec3; 3],
}

impl Mat3 {
    pub const IDENTITY: Self = Self {
        cols: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    pub const ZERO: Self = Self {
        cols: [Vec3::ZERO, Vec3::ZERO, Vec3::ZERO],
    };

    #[inline]
    pub const fn from_cols(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self { cols: [c0, c1, c2] }
    }

    /// Rotation for XYZ Euler angles (radians), `R = Rx · Ry · Rz`
    ///
    /// This is the orientation convention of every body in the simulation:
    /// a body with `rot` maps a local vector `v` to `Mat3::from_euler(rot) * v`.
    pub fn from_euler(angles: Vec3) -> Self {
        let (sx, cx) = angles.x.sin_cos();
        let (sy, cy) = angles.y.sin_cos();
        let (sz, cz) = angles.z.sin_cos();

        Self::from_cols(
            Vec3::new(cy * cz, sx * sy * cz + cx * sz, -cx * sy * cz + sx * sz),
            Vec3::new(-cy * sz, -sx * sy * sz + cx * cz, cx * sy * sz + sx * cz),
            Vec3::new(sy, -sx * cy, cx * cy),
        )
    }

    /// Row `i` of the matrix
    #[inline]
    pub fn row(&self, i: usize) -> Vec3 {
        Vec3::new(self.cols[0][i], self.cols[1][i], self.cols[2][i])
    }

    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2))
    }

    #[inline]
    pub fn mul_vec3(&self, v: Vec3) -> Vec3 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.cols[0].dot(self.cols[1].cross(self.cols[2]))
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.mul_vec3(rhs)
    }
}

impl Mul for Mat3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_cols(
            self.mul_vec3(rhs.cols[0]),
            self.mul_vec3(rhs.cols[1]),
            self.mul_vec3(rhs.cols[2]),
        )
    }
}

/// Rotate `v` by XYZ Euler angles
#[inline]
pub fn rotate_by_euler(v: Vec3, angles: Vec3) -> Vec3 {
    Mat3::from_euler(angles).mul_vec3(v)
}
