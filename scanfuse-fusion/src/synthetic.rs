//! Synthetic scenes for tests, benchmarks and demos.
//!
//! A scene is a fixed set of colored world points, a subset of which carry
//! random descriptors. Observing the scene from a camera pose yields a
//! [`Frame`] in camera coordinates with identical descriptors for the same
//! keypoint across frames.

use rand::prelude::*;
use scanfuse_core::{ColoredPoint3f, ColoredPointCloud3f, Keypoint, KeypointCloud, Point3f, RigidTransform, Transformable};

use crate::frame::Frame;

/// Points and keypoints expressed in world coordinates
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub points: ColoredPointCloud3f,
    pub keypoints: KeypointCloud,
}

impl SyntheticScene {
    /// Random scene of `point_count` points inside a 4 x 4 x 3 box, with
    /// `keypoint_count` of them promoted to keypoints.
    pub fn generate(point_count: usize, keypoint_count: usize, dimensionality: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let points: ColoredPointCloud3f = (0..point_count)
            .map(|_| {
                ColoredPoint3f::new(
                    Point3f::new(
                        rng.gen_range(-2.0..2.0),
                        rng.gen_range(-2.0..2.0),
                        rng.gen_range(0.5..3.5),
                    ),
                    [rng.gen(), rng.gen(), rng.gen()],
                )
            })
            .collect();

        let keypoints = rand::seq::index::sample(&mut rng, point_count, keypoint_count.min(point_count))
            .iter()
            .map(|idx| {
                let descriptor = (0..dimensionality).map(|_| rng.gen::<f32>()).collect();
                Keypoint::new(points[idx].position, descriptor)
            })
            .collect();

        Self { points, keypoints }
    }

    /// The scene as seen by a camera at `camera_pose` (camera to world)
    pub fn observe(&self, camera_pose: &RigidTransform) -> Frame {
        let world_to_camera = camera_pose.inverse();

        let mut cloud = self.points.clone();
        cloud.transform(&world_to_camera);
        let mut keypoints = self.keypoints.clone();
        keypoints.transform(&world_to_camera);

        Frame::new(cloud, keypoints)
    }
}
