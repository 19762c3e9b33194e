//! Keypoints with appearance descriptors

use crate::error::{Error, Result};
use crate::point::Point3f;
use crate::point_cloud::PointCloud;
use serde::{Deserialize, Serialize};

/// Descriptor length produced by SIFT-style extractors
pub const SIFT_DESCRIPTOR_SIZE: usize = 128;

/// A distinctive 3D point with a fixed-length descriptor vector.
///
/// The descriptor summarizes local appearance and is what correspondence
/// search compares; the position is only used once pairs are formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point3f,
    pub descriptor: Vec<f32>,
}

/// A cloud of descriptor keypoints
pub type KeypointCloud = PointCloud<Keypoint>;

impl Keypoint {
    /// Create a keypoint from a position and a descriptor
    pub fn new(position: Point3f, descriptor: Vec<f32>) -> Self {
        Self { position, descriptor }
    }

    /// Length of the descriptor vector
    pub fn dimensionality(&self) -> usize {
        self.descriptor.len()
    }

    /// Whether every descriptor component is finite
    pub fn has_finite_descriptor(&self) -> bool {
        self.descriptor.iter().all(|v| v.is_finite())
    }
}

impl PointCloud<Keypoint> {
    /// Check that every keypoint carries a descriptor of `expected` length
    pub fn check_dimensionality(&self, expected: usize) -> Result<()> {
        match self.iter().find(|kp| kp.dimensionality() != expected) {
            Some(kp) => Err(Error::DimensionMismatch {
                expected,
                found: kp.dimensionality(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensionality() {
        let cloud = KeypointCloud::from_points(vec![
            Keypoint::new(Point3f::origin(), vec![0.0; 4]),
            Keypoint::new(Point3f::origin(), vec![0.0; 3]),
        ]);

        match cloud.check_dimensionality(4) {
            Err(Error::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_descriptor() {
        let kp = Keypoint::new(Point3f::origin(), vec![1.0, f32::NAN]);
        assert!(!kp.has_finite_descriptor());
    }
}
