//! Point cloud data structures and functionality

use crate::point::*;
use crate::traits::Positioned;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A generic point cloud container.
///
/// Point order carries no meaning beyond index stability within one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// A point cloud with 3D points
pub type PointCloud3f = PointCloud<Point3f>;

/// A point cloud with colored points
pub type ColoredPointCloud3f = PointCloud<ColoredPoint3f>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
        }
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }

    /// Get a mutable iterator over the points
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.points.iter_mut()
    }

    /// Get a point by index
    pub fn get(&self, index: usize) -> Option<&T> {
        self.points.get(index)
    }

    /// Move all points of `other` to the end of this cloud
    pub fn append(&mut self, mut other: PointCloud<T>) {
        self.points.append(&mut other.points);
    }

    /// Clear all points from the cloud
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Reserve capacity for additional points
    pub fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }
}

impl<T: Positioned> PointCloud<T> {
    /// Number of points with finite coordinates
    pub fn valid_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_finite()).count()
    }

    /// Drop every point with NaN or infinite coordinates
    pub fn retain_finite(&mut self) {
        self.points.retain(|p| p.is_finite());
    }

    /// Positions of all points, in cloud order
    pub fn positions(&self) -> Vec<Point3f> {
        self.points.iter().map(|p| p.position()).collect()
    }
}

impl<T: bytemuck::Pod> PointCloud<T> {
    /// View the points as a contiguous byte buffer, e.g. for a vertex upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IndexMut<usize> for PointCloud<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> Extend<T> for PointCloud<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut a = PointCloud::from_points(vec![Point3f::new(0.0, 0.0, 0.0)]);
        let b = PointCloud::from_points(vec![Point3f::new(1.0, 0.0, 0.0), Point3f::new(2.0, 0.0, 0.0)]);
        a.append(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a[2].x, 2.0);
    }

    #[test]
    fn test_valid_count_and_retain() {
        let mut cloud = ColoredPointCloud3f::from_points(vec![
            ColoredPoint3f::from_xyzrgb(0.0, 0.0, 1.0, 1, 2, 3),
            ColoredPoint3f::invalid(),
            ColoredPoint3f::from_xyzrgb(0.0, 1.0, 1.0, 1, 2, 3),
        ]);
        assert_eq!(cloud.valid_count(), 2);
        cloud.retain_finite();
        assert_eq!(cloud.len(), 2);
    }

    #[test]
    fn test_as_bytes_length() {
        let cloud = ColoredPointCloud3f::from_points(vec![ColoredPoint3f::default(); 4]);
        assert_eq!(cloud.as_bytes().len(), 64);
    }
}
