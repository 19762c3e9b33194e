//! Fusion pipeline configuration.
//!
//! Configuration can be built in code with the `with_*` setters or loaded
//! from YAML; every key is optional and falls back to its default.
//!
//! ```yaml
//! descriptor_dimensionality: 128
//! max_iterations: 2000
//! inlier_distance_threshold: 0.001
//! seed: 42
//! failure_policy: hold_last_transform
//! merge_voxel_size: 0.005
//! ```

use std::path::Path;

use scanfuse_algorithms::{CorrespondenceMatcher, SampleConsensusConfig};
use scanfuse_core::{Error, Result, SIFT_DESCRIPTOR_SIZE};
use serde::{Deserialize, Serialize};

/// What to do with a frame pair whose registration found too little support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFailurePolicy {
    /// Compose whatever transform the estimator returned, even with no inliers.
    #[default]
    ApplyAnyway,
    /// Keep the previous global transform when inliers < `min_inliers`.
    HoldLastTransform,
}

/// Configuration for a [`RegistrationSession`](crate::RegistrationSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Required descriptor length.
    /// Default: 128
    pub descriptor_dimensionality: usize,

    /// Sample consensus iteration cap.
    /// Default: 2000
    pub max_iterations: usize,

    /// Distance under which a correspondence is geometrically consistent.
    /// Default: 0.001
    pub inlier_distance_threshold: f32,

    /// Seed for sample consensus. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Reject mutual matches whose descriptor distance exceeds this.
    pub max_descriptor_distance: Option<f32>,

    /// Nearest / second-nearest ratio test threshold.
    pub ratio_threshold: Option<f32>,

    /// Least-squares refit of the best transform on its inliers.
    /// Default: false
    pub refine: bool,

    /// Stop sampling once this fraction of correspondences agree.
    /// Default: 1.0
    pub early_termination_ratio: f32,

    /// Frames with fewer keypoints are rejected.
    /// Default: 3
    pub min_keypoints: usize,

    /// Default: apply_anyway
    pub failure_policy: RegistrationFailurePolicy,

    /// Inlier count below which `hold_last_transform` keeps the old pose.
    /// Default: 3
    pub min_inliers: usize,

    /// Down-sample each appended frame on a voxel grid of this size.
    /// Default: none (plain concatenation)
    pub merge_voxel_size: Option<f32>,

    /// Remove NaN points from frames before merging.
    /// Default: false
    pub drop_invalid_points: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            descriptor_dimensionality: SIFT_DESCRIPTOR_SIZE,
            max_iterations: 2000,
            inlier_distance_threshold: 0.001,
            seed: None,
            max_descriptor_distance: None,
            ratio_threshold: None,
            refine: false,
            early_termination_ratio: 1.0,
            min_keypoints: 3,
            failure_policy: RegistrationFailurePolicy::default(),
            min_inliers: 3,
            merge_voxel_size: None,
            drop_invalid_points: false,
        }
    }
}

impl FusionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_descriptor_dimensionality(mut self, dimensionality: usize) -> Self {
        self.descriptor_dimensionality = dimensionality;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_inlier_distance_threshold(mut self, threshold: f32) -> Self {
        self.inlier_distance_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_descriptor_distance(mut self, distance: f32) -> Self {
        self.max_descriptor_distance = Some(distance);
        self
    }

    pub fn with_ratio_threshold(mut self, ratio: f32) -> Self {
        self.ratio_threshold = Some(ratio);
        self
    }

    pub fn with_refine(mut self, refine: bool) -> Self {
        self.refine = refine;
        self
    }

    pub fn with_early_termination_ratio(mut self, ratio: f32) -> Self {
        self.early_termination_ratio = ratio;
        self
    }

    pub fn with_min_keypoints(mut self, count: usize) -> Self {
        self.min_keypoints = count;
        self
    }

    pub fn with_failure_policy(mut self, policy: RegistrationFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_min_inliers(mut self, count: usize) -> Self {
        self.min_inliers = count;
        self
    }

    pub fn with_merge_voxel_size(mut self, size: f32) -> Self {
        self.merge_voxel_size = Some(size);
        self
    }

    pub fn with_drop_invalid_points(mut self, drop: bool) -> Self {
        self.drop_invalid_points = drop;
        self
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_dimensionality == 0 {
            return Err(Error::Config("descriptor_dimensionality must be positive".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be positive".to_string()));
        }
        if !(self.inlier_distance_threshold > 0.0) {
            return Err(Error::Config("inlier_distance_threshold must be positive".to_string()));
        }
        if let Some(distance) = self.max_descriptor_distance {
            if !(distance >= 0.0) {
                return Err(Error::Config("max_descriptor_distance must be non-negative".to_string()));
            }
        }
        if let Some(ratio) = self.ratio_threshold {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(Error::Config("ratio_threshold must be in (0, 1]".to_string()));
            }
        }
        if !(self.early_termination_ratio > 0.0) {
            return Err(Error::Config("early_termination_ratio must be positive".to_string()));
        }
        if let Some(size) = self.merge_voxel_size {
            if !(size > 0.0) {
                return Err(Error::Config("merge_voxel_size must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Correspondence matcher configured from these settings
    pub fn matcher(&self) -> CorrespondenceMatcher {
        let mut matcher = CorrespondenceMatcher::new(self.descriptor_dimensionality);
        if let Some(distance) = self.max_descriptor_distance {
            matcher = matcher.with_max_distance(distance);
        }
        if let Some(ratio) = self.ratio_threshold {
            matcher = matcher.with_ratio_test(ratio);
        }
        matcher
    }

    /// Sample consensus settings derived from this configuration
    pub fn sample_consensus(&self) -> SampleConsensusConfig {
        SampleConsensusConfig {
            max_iterations: self.max_iterations,
            inlier_threshold: self.inlier_distance_threshold,
            seed: self.seed,
            refine: self.refine,
            early_termination_ratio: self.early_termination_ratio,
        }
    }
}
