//! Core traits for scanfuse

use crate::{keypoint::Keypoint, point::*, point_cloud::*, transform::RigidTransform};

/// Anything that has a position in 3D space
pub trait Positioned {
    /// Position of the element
    fn position(&self) -> Point3f;

    /// Move the element to a new position, keeping its other attributes
    fn set_position(&mut self, position: Point3f);

    /// Whether all coordinates are finite (a measured point)
    fn is_finite(&self) -> bool {
        let p = self.position();
        p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
    }
}

impl Positioned for Point3f {
    fn position(&self) -> Point3f {
        *self
    }

    fn set_position(&mut self, position: Point3f) {
        *self = position;
    }
}

impl Positioned for ColoredPoint3f {
    fn position(&self) -> Point3f {
        self.position
    }

    fn set_position(&mut self, position: Point3f) {
        self.position = position;
    }
}

impl Positioned for Keypoint {
    fn position(&self) -> Point3f {
        self.position
    }

    fn set_position(&mut self, position: Point3f) {
        self.position = position;
    }
}

/// Nearest neighbor search over descriptor vectors
pub trait DescriptorSearch {
    /// Index and Euclidean distance of the nearest stored descriptor
    fn find_nearest(&self, query: &[f32]) -> Option<(usize, f32)>;

    /// The `k` nearest stored descriptors, closest first
    fn find_k_nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Apply a rigid transformation in place
    fn transform(&mut self, transform: &RigidTransform);
}

impl<T: Positioned> Transformable for PointCloud<T> {
    fn transform(&mut self, transform: &RigidTransform) {
        for point in &mut self.points {
            let moved = transform.transform_point(&point.position());
            point.set_position(moved);
        }
    }
}

impl<T: Positioned + Clone> PointCloud<T> {
    /// A transformed copy of this cloud
    pub fn transformed(&self, transform: &RigidTransform) -> Self {
        let mut copy = self.clone();
        copy.transform(transform);
        copy
    }
}
