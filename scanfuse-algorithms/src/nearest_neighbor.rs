//! Nearest neighbor search in descriptor space

use scanfuse_core::{DescriptorSearch, Keypoint};

/// Squared Euclidean distance between two descriptors of equal length
#[inline]
pub fn descriptor_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Brute force descriptor search.
///
/// High-dimensional descriptors (128 floats for SIFT) defeat space
/// partitioning, so an exhaustive scan is both exact and competitive for
/// the keypoint counts of a single frame. Entries with non-finite
/// descriptors are never returned.
pub struct BruteForceDescriptorSearch<'a> {
    keypoints: &'a [Keypoint],
}

impl<'a> BruteForceDescriptorSearch<'a> {
    pub fn new(keypoints: &'a [Keypoint]) -> Self {
        Self { keypoints }
    }

    fn squared_distances<'q>(&'q self, query: &'q [f32]) -> impl Iterator<Item = (usize, f32)> + 'q {
        let keypoints: &'q [Keypoint] = self.keypoints;
        keypoints
            .iter()
            .enumerate()
            .filter(|(_, kp)| kp.has_finite_descriptor())
            .map(move |(idx, kp)| (idx, descriptor_distance_squared(query, &kp.descriptor)))
    }
}

impl DescriptorSearch for BruteForceDescriptorSearch<'_> {
    fn find_nearest(&self, query: &[f32]) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, distance) in self.squared_distances(query) {
            // strict comparison keeps the lowest index on ties
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((idx, distance)),
            }
        }
        best.map(|(idx, d)| (idx, d.sqrt()))
    }

    fn find_k_nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut distances: Vec<(usize, f32)> = self.squared_distances(query).collect();

        // Stable sort keeps index order among equal distances
        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(k);
        distances.into_iter().map(|(idx, d)| (idx, d.sqrt())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanfuse_core::Point3f;

    fn keypoints(descriptors: &[[f32; 2]]) -> Vec<Keypoint> {
        descriptors
            .iter()
            .map(|d| Keypoint::new(Point3f::origin(), d.to_vec()))
            .collect()
    }

    #[test]
    fn test_find_nearest() {
        let kps = keypoints(&[[0.0, 0.0], [3.0, 4.0], [1.0, 1.0]]);
        let search = BruteForceDescriptorSearch::new(&kps);
        let (idx, distance) = search.find_nearest(&[2.9, 4.0]).unwrap();
        assert_eq!(idx, 1);
        assert!((distance - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let kps = keypoints(&[[1.0, 0.0], [-1.0, 0.0]]);
        let search = BruteForceDescriptorSearch::new(&kps);
        assert_eq!(search.find_nearest(&[0.0, 0.0]).unwrap().0, 0);
    }

    #[test]
    fn test_skips_non_finite_descriptors() {
        let kps = keypoints(&[[f32::NAN, 0.0], [5.0, 5.0]]);
        let search = BruteForceDescriptorSearch::new(&kps);
        assert_eq!(search.find_nearest(&[0.0, 0.0]).unwrap().0, 1);
        assert_eq!(search.find_k_nearest(&[0.0, 0.0], 5).len(), 1);
    }

    #[test]
    fn test_find_k_nearest_sorted() {
        let kps = keypoints(&[[5.0, 0.0], [1.0, 0.0], [3.0, 0.0]]);
        let search = BruteForceDescriptorSearch::new(&kps);
        let result = search.find_k_nearest(&[0.0, 0.0], 2);
        assert_eq!(result.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_empty_search() {
        let kps: Vec<Keypoint> = Vec::new();
        let search = BruteForceDescriptorSearch::new(&kps);
        assert!(search.find_nearest(&[0.0]).is_none());
    }
}
