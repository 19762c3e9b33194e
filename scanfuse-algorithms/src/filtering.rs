//! Filtering algorithms

use scanfuse_core::{Error, PointCloud, Positioned, Result};
use std::collections::HashSet;

/// Voxel grid filtering
///
/// Reduces the density of a point cloud by grouping points into voxels of a
/// grid anchored at the origin and keeping the first point that falls into
/// each voxel. Input order of the kept points is preserved, and because the
/// grid does not depend on the cloud's bounding box, successive frames in a
/// common coordinate frame are binned consistently. Points with non-finite
/// coordinates cannot be binned and are dropped.
///
/// # Arguments
/// * `cloud` - Input point cloud
/// * `voxel_size` - Size of each voxel cube
///
/// # Example
/// ```rust
/// use scanfuse_core::{PointCloud, Point3f};
/// use scanfuse_algorithms::voxel_grid_filter;
///
/// fn main() -> scanfuse_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3f::new(0.0, 0.0, 0.0),
///         Point3f::new(0.1, 0.0, 0.0),
///         Point3f::new(0.0, 0.1, 0.0),
///         Point3f::new(0.0, 0.0, 0.5),
///     ]);
///
///     let filtered = voxel_grid_filter(&cloud, 0.2)?;
///     assert_eq!(filtered.len(), 2);
///     Ok(())
/// }
/// ```
pub fn voxel_grid_filter<T>(cloud: &PointCloud<T>, voxel_size: f32) -> Result<PointCloud<T>>
where
    T: Positioned + Clone,
{
    if !(voxel_size > 0.0) {
        return Err(Error::InvalidData("voxel_size must be positive".to_string()));
    }

    let voxel_of = |point: &T| -> (i64, i64, i64) {
        let p = point.position();
        (
            (p.x / voxel_size).floor() as i64,
            (p.y / voxel_size).floor() as i64,
            (p.z / voxel_size).floor() as i64,
        )
    };

    let mut occupied = HashSet::with_capacity(cloud.len());
    let filtered = cloud
        .iter()
        .filter(|point| point.is_finite() && occupied.insert(voxel_of(*point)))
        .cloned()
        .collect();

    Ok(filtered)
}

/// Copy of the cloud without NaN / infinite points
pub fn remove_invalid_points<T>(cloud: &PointCloud<T>) -> PointCloud<T>
where
    T: Positioned + Clone,
{
    cloud.iter().filter(|p| p.is_finite()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanfuse_core::{ColoredPoint3f, Point3f};

    #[test]
    fn test_voxel_grid_keeps_first_point_per_voxel() {
        let cloud = PointCloud::from_points(vec![
            ColoredPoint3f::from_xyzrgb(0.01, 0.01, 0.01, 255, 0, 0),
            ColoredPoint3f::from_xyzrgb(0.02, 0.02, 0.02, 0, 255, 0),
            ColoredPoint3f::from_xyzrgb(1.0, 1.0, 1.0, 0, 0, 255),
        ]);

        let filtered = voxel_grid_filter(&cloud, 0.1).unwrap();

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].color, [255, 0, 0]);
        assert_eq!(filtered[1].color, [0, 0, 255]);
    }

    #[test]
    fn test_voxel_grid_drops_invalid_points() {
        let cloud = PointCloud::from_points(vec![
            ColoredPoint3f::invalid(),
            ColoredPoint3f::from_xyzrgb(0.5, 0.5, 0.5, 1, 1, 1),
        ]);
        let filtered = voxel_grid_filter(&cloud, 0.1).unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_voxel_grid_negative_coordinates() {
        let cloud = PointCloud::from_points(vec![Point3f::new(-0.05, 0.0, 0.0), Point3f::new(0.05, 0.0, 0.0)]);
        let filtered = voxel_grid_filter(&cloud, 0.1).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_voxel_grid_invalid_size() {
        let cloud = PointCloud::from_points(vec![Point3f::origin()]);
        assert!(voxel_grid_filter(&cloud, 0.0).is_err());
        assert!(voxel_grid_filter(&cloud, f32::NAN).is_err());
    }

    #[test]
    fn test_remove_invalid_points() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(f32::INFINITY, 0.0, 0.0),
            Point3f::new(1.0, 2.0, 3.0),
        ]);
        let cleaned = remove_invalid_points(&cloud);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0], Point3f::new(1.0, 2.0, 3.0));
    }
}
