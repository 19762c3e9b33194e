//! Named object models built from a fused scan

use scanfuse_core::{ColoredPointCloud3f, KeypointCloud};
use serde::{Deserialize, Serialize};

/// A fused scan packaged for recognition: the merged colored cloud and the
/// merged keypoints, both in the global frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    pub name: String,
    pub cloud: ColoredPointCloud3f,
    pub keypoints: KeypointCloud,
}

impl ObjectModel {
    pub fn new(name: impl Into<String>, cloud: ColoredPointCloud3f, keypoints: KeypointCloud) -> Self {
        Self {
            name: name.into(),
            cloud,
            keypoints,
        }
    }

    pub fn point_count(&self) -> usize {
        self.cloud.len()
    }

    pub fn keypoint_count(&self) -> usize {
        self.keypoints.len()
    }
}
