//! Rigid 3D transformations

use crate::error::{Error, Result};
use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Tolerance used when accepting a 4x4 matrix as rigid
const RIGIDITY_TOLERANCE: f32 = 1e-3;

/// A rigid transformation (rotation + translation, no scale or shear).
///
/// Stored as an isometry so the rotation block is always orthonormal;
/// composition of two rigid transforms stays rigid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub isometry: Isometry3<f32>,
}

impl RigidTransform {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::from(translation), UnitQuaternion::identity()),
        }
    }

    /// Create a rotation transformation from a quaternion
    pub fn rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::identity(), rotation),
        }
    }

    /// Create a transformation that rotates first, then translates
    pub fn from_translation_rotation(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    /// Build from a homogeneous matrix, rejecting anything that is not rigid
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Result<Self> {
        let bottom = matrix.fixed_view::<1, 4>(3, 0);
        if (bottom[(0, 0)].abs() + bottom[(0, 1)].abs() + bottom[(0, 2)].abs()) > RIGIDITY_TOLERANCE
            || (bottom[(0, 3)] - 1.0).abs() > RIGIDITY_TOLERANCE
        {
            return Err(Error::InvalidData("Matrix is not an affine transform".to_string()));
        }

        let r: Matrix3<f32> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let orthogonality = (r.transpose() * r - Matrix3::identity()).norm();
        if orthogonality > RIGIDITY_TOLERANCE || (r.determinant() - 1.0).abs() > RIGIDITY_TOLERANCE {
            return Err(Error::InvalidData("Rotation block is not a proper rotation".to_string()));
        }

        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        let t = matrix.fixed_view::<3, 1>(0, 3);
        Ok(Self::from_translation_rotation(Vector3::new(t[0], t[1], t[2]), rotation))
    }

    /// Homogeneous 4x4 matrix
    pub fn matrix(&self) -> Matrix4<f32> {
        self.isometry.to_homogeneous()
    }

    /// Rotation part as a 3x3 matrix
    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        self.isometry.rotation.to_rotation_matrix().into_inner()
    }

    /// Translation part
    pub fn translation_vector(&self) -> Vector3<f32> {
        self.isometry.translation.vector
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.isometry.transform_point(point)
    }

    /// Apply the rotation part to a vector
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.isometry.transform_vector(vector)
    }

    /// Compose this transformation with another: `other` is applied first
    pub fn compose(self, other: Self) -> Self {
        Self {
            isometry: self.isometry * other.isometry,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(self) -> Self {
        Self {
            isometry: self.isometry.inverse(),
        }
    }

    /// Rotation angle in radians
    pub fn rotation_angle(&self) -> f32 {
        self.isometry.rotation.angle()
    }

    /// Rotation angle (radians) and translation distance separating two transforms
    pub fn difference(&self, other: &Self) -> (f32, f32) {
        let angle = self.isometry.rotation.angle_to(&other.isometry.rotation);
        let distance = (self.translation_vector() - other.translation_vector()).norm();
        (angle, distance)
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f32) -> bool {
        (self.matrix() - Matrix4::identity()).norm() < epsilon
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Isometry3<f32>> for RigidTransform {
    fn from(isometry: Isometry3<f32>) -> Self {
        Self { isometry }
    }
}

impl From<RigidTransform> for Matrix4<f32> {
    fn from(transform: RigidTransform) -> Self {
        transform.matrix()
    }
}
