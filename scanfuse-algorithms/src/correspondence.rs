//! Descriptor-space correspondence estimation

use crate::nearest_neighbor::BruteForceDescriptorSearch;
use rayon::prelude::*;
use scanfuse_core::{DescriptorSearch, Error, Keypoint, PointCloud, Result, SIFT_DESCRIPTOR_SIZE};

/// A pairing between a keypoint of the query ("next") cloud and a keypoint
/// of the match ("previous") cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the query cloud
    pub index_query: usize,
    /// Index into the match cloud
    pub index_match: usize,
    /// Euclidean distance between the two descriptors
    pub distance: f32,
}

impl Correspondence {
    pub fn new(index_query: usize, index_match: usize, distance: f32) -> Self {
        Self {
            index_query,
            index_match,
            distance,
        }
    }
}

/// Reciprocal nearest neighbor matcher working purely on descriptors.
///
/// Keypoint positions are never read: two keypoints correspond when each is
/// the other's nearest neighbor in descriptor space.
#[derive(Debug, Clone)]
pub struct CorrespondenceMatcher {
    dimensionality: usize,
    max_distance: Option<f32>,
    ratio_threshold: Option<f32>,
}

impl Default for CorrespondenceMatcher {
    fn default() -> Self {
        Self::new(SIFT_DESCRIPTOR_SIZE)
    }
}

impl CorrespondenceMatcher {
    /// Create a matcher expecting descriptors of the given length
    pub fn new(dimensionality: usize) -> Self {
        Self {
            dimensionality,
            max_distance: None,
            ratio_threshold: None,
        }
    }

    /// Reject mutual pairs whose descriptor distance exceeds `distance`
    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = Some(distance);
        self
    }

    /// Apply the nearest / second-nearest ratio test on the forward search
    pub fn with_ratio_test(mut self, threshold: f32) -> Self {
        self.ratio_threshold = Some(threshold);
        self
    }

    /// Descriptor length this matcher accepts
    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// Find reciprocal correspondences from `next` into `prev`.
    ///
    /// Returns an empty set (not an error) when no mutual pairs exist. The
    /// result is ordered by query index and is fully deterministic.
    ///
    /// # Errors
    /// * `InsufficientFrame` if either cloud is empty
    /// * `DimensionMismatch` if any descriptor length differs from the configured one
    pub fn match_reciprocal(
        &self,
        next: &PointCloud<Keypoint>,
        prev: &PointCloud<Keypoint>,
    ) -> Result<Vec<Correspondence>> {
        for cloud in [next, prev] {
            if cloud.is_empty() {
                return Err(Error::InsufficientFrame {
                    what: "keypoints",
                    required: 1,
                    found: 0,
                });
            }
            cloud.check_dimensionality(self.dimensionality)?;
        }

        let prev_search = BruteForceDescriptorSearch::new(&prev.points);
        let next_search = BruteForceDescriptorSearch::new(&next.points);

        let forward: Vec<Option<(usize, f32)>> = next
            .points
            .par_iter()
            .map(|kp| self.forward_match(&prev_search, kp))
            .collect();

        let backward: Vec<Option<usize>> = prev
            .points
            .par_iter()
            .map(|kp| {
                if !kp.has_finite_descriptor() {
                    return None;
                }
                next_search.find_nearest(&kp.descriptor).map(|(idx, _)| idx)
            })
            .collect();

        let correspondences: Vec<Correspondence> = forward
            .iter()
            .enumerate()
            .filter_map(|(query_idx, candidate)| {
                let (match_idx, distance) = (*candidate)?;
                if backward[match_idx] != Some(query_idx) {
                    return None;
                }
                if let Some(max_distance) = self.max_distance {
                    if distance > max_distance {
                        return None;
                    }
                }
                Some(Correspondence::new(query_idx, match_idx, distance))
            })
            .collect();

        log::debug!(
            "Reciprocal correspondences: {} out of {} keypoints",
            correspondences.len(),
            next.len()
        );

        Ok(correspondences)
    }

    fn forward_match(
        &self,
        search: &BruteForceDescriptorSearch<'_>,
        keypoint: &Keypoint,
    ) -> Option<(usize, f32)> {
        if !keypoint.has_finite_descriptor() {
            return None;
        }

        match self.ratio_threshold {
            None => search.find_nearest(&keypoint.descriptor),
            Some(threshold) => {
                let neighbors = search.find_k_nearest(&keypoint.descriptor, 2);
                match neighbors.as_slice() {
                    [best, second] if second.1 > 0.0 && best.1 / second.1 > threshold => None,
                    [best, ..] => Some(*best),
                    [] => None,
                }
            }
        }
    }
}

/// Reciprocal correspondences between two keypoint clouds with default filters
pub fn find_reciprocal_correspondences(
    next: &PointCloud<Keypoint>,
    prev: &PointCloud<Keypoint>,
    dimensionality: usize,
) -> Result<Vec<Correspondence>> {
    CorrespondenceMatcher::new(dimensionality).match_reciprocal(next, prev)
}
