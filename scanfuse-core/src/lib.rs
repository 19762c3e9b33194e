//! Core data structures and traits for scanfuse
//!
//! This crate provides the fundamental types shared by the registration and
//! fusion crates: colored points, descriptor keypoints, generic point clouds,
//! rigid transforms and the common error type.

pub mod point;
pub mod keypoint;
pub mod point_cloud;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use keypoint::*;
pub use point_cloud::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4, Isometry3, UnitQuaternion, Translation3};
