//! Registration algorithms

use crate::correspondence::Correspondence;
use nalgebra::{Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scanfuse_core::{Error, Isometry3, Point3f, PointCloud, Positioned, Result, RigidTransform};
use std::ops::ControlFlow;

/// Points of a minimal sample
const SAMPLE_SIZE: usize = 3;

/// Below this triangle area (twice the area, in squared units) a sample is degenerate
const DEGENERACY_EPSILON: f64 = 1e-10;

/// Configuration for sample consensus registration.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConsensusConfig {
    /// Maximum number of sampling iterations.
    /// Default: 2000
    pub max_iterations: usize,

    /// Distance below which a transformed source point counts as an inlier.
    /// Default: 0.001
    pub inlier_threshold: f32,

    /// Seed for the random source. `None` draws from entropy.
    pub seed: Option<u64>,

    /// Refit the best candidate on all of its inliers.
    /// Default: false
    pub refine: bool,

    /// Stop sampling once this fraction of correspondences are inliers.
    /// Default: 1.0
    pub early_termination_ratio: f32,
}

impl Default for SampleConsensusConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            inlier_threshold: 0.001,
            seed: None,
            refine: false,
            early_termination_ratio: 1.0,
        }
    }
}

impl SampleConsensusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_inlier_threshold(mut self, threshold: f32) -> Self {
        self.inlier_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
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

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidData("Max iterations must be positive".to_string()));
        }
        if !(self.inlier_threshold > 0.0) {
            return Err(Error::InvalidData("Inlier threshold must be positive".to_string()));
        }
        Ok(())
    }
}

/// Result of sample consensus registration
#[derive(Debug, Clone)]
pub struct SampleConsensusResult {
    /// Transformation mapping source points onto target points
    pub transformation: RigidTransform,
    /// Correspondences consistent with the transformation
    pub inliers: Vec<Correspondence>,
    /// Number of sampling iterations performed
    pub iterations: usize,
}

impl SampleConsensusResult {
    fn unregistered(iterations: usize) -> Self {
        Self {
            transformation: RigidTransform::identity(),
            inliers: Vec::new(),
            iterations,
        }
    }
}

/// A correspondence whose endpoints are both measured points
struct Pair {
    correspondence: Correspondence,
    source: Point3f,
    target: Point3f,
}

/// Best candidate seen so far in the consensus search
#[derive(Clone)]
struct Candidate {
    transform: Isometry3<f32>,
    inlier_count: usize,
}

struct Search {
    best: Option<Candidate>,
    iterations: usize,
}

/// Robust rigid transform estimation from putative correspondences.
///
/// Randomly samples three correspondences, solves for the rigid motion they
/// imply and keeps the motion supported by the most correspondences.
#[derive(Debug, Clone, Default)]
pub struct RigidSampleConsensus {
    config: SampleConsensusConfig,
}

impl RigidSampleConsensus {
    pub fn new(config: SampleConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SampleConsensusConfig {
        &self.config
    }

    /// Estimate the transformation mapping `source` onto `target`.
    ///
    /// `index_query` of each correspondence indexes `source`, `index_match`
    /// indexes `target`. When no sample produces an inlier the result is the
    /// identity with an empty inlier set.
    ///
    /// # Errors
    /// * `EmptyCorrespondenceSet` if `correspondences` is empty
    /// * `InvalidData` for out-of-range indices or invalid configuration
    pub fn estimate<S, T>(
        &self,
        source: &PointCloud<S>,
        target: &PointCloud<T>,
        correspondences: &[Correspondence],
    ) -> Result<SampleConsensusResult>
    where
        S: Positioned,
        T: Positioned,
    {
        if correspondences.is_empty() {
            return Err(Error::EmptyCorrespondenceSet);
        }
        self.config.validate()?;

        let pairs = collect_pairs(source, target, correspondences)?;
        if pairs.len() < SAMPLE_SIZE {
            log::warn!(
                "Only {} usable correspondences, at least {} are required",
                pairs.len(),
                SAMPLE_SIZE
            );
            return Ok(SampleConsensusResult::unregistered(0));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let threshold_sq = self.config.inlier_threshold * self.config.inlier_threshold;
        // Pairs with non-finite endpoints can never be inliers
        let early_count = (self.config.early_termination_ratio * pairs.len() as f32).ceil() as usize;

        let initial = Search {
            best: None,
            iterations: 0,
        };
        let search = match (0..self.config.max_iterations).try_fold(initial, |search, _| {
            let search = Search {
                iterations: search.iterations + 1,
                ..search
            };

            // Degenerate samples are discarded and sampling continues
            let Ok(transform) = sample_transform(&mut rng, &pairs) else {
                return ControlFlow::Continue(search);
            };
            let inlier_count = count_inliers(&transform, &pairs, threshold_sq);

            let improves = search
                .best
                .as_ref()
                .map_or(inlier_count > 0, |best| inlier_count > best.inlier_count);
            if !improves {
                return ControlFlow::Continue(search);
            }

            let search = Search {
                best: Some(Candidate {
                    transform,
                    inlier_count,
                }),
                ..search
            };
            if inlier_count >= early_count {
                ControlFlow::Break(search)
            } else {
                ControlFlow::Continue(search)
            }
        }) {
            ControlFlow::Continue(search) | ControlFlow::Break(search) => search,
        };

        let Some(mut best) = search.best else {
            log::debug!("SAC found no inliers after {} iterations", search.iterations);
            return Ok(SampleConsensusResult::unregistered(search.iterations));
        };

        if self.config.refine {
            best = refine_candidate(best, &pairs, threshold_sq);
        }

        let inliers: Vec<Correspondence> = pairs
            .iter()
            .filter(|pair| is_inlier(&best.transform, pair, threshold_sq))
            .map(|pair| pair.correspondence)
            .collect();

        log::debug!(
            "SAC inliers {} of {} after {} iterations",
            inliers.len(),
            correspondences.len(),
            search.iterations
        );

        Ok(SampleConsensusResult {
            transformation: RigidTransform::from(best.transform),
            inliers,
            iterations: search.iterations,
        })
    }
}

/// Sample consensus registration with an explicit configuration
pub fn estimate_rigid_transform_sac<S, T>(
    source: &PointCloud<S>,
    target: &PointCloud<T>,
    correspondences: &[Correspondence],
    config: &SampleConsensusConfig,
) -> Result<SampleConsensusResult>
where
    S: Positioned,
    T: Positioned,
{
    RigidSampleConsensus::new(config.clone()).estimate(source, target, correspondences)
}

fn collect_pairs<S, T>(
    source: &PointCloud<S>,
    target: &PointCloud<T>,
    correspondences: &[Correspondence],
) -> Result<Vec<Pair>>
where
    S: Positioned,
    T: Positioned,
{
    let mut pairs = Vec::with_capacity(correspondences.len());
    for c in correspondences {
        let (Some(src), Some(tgt)) = (source.get(c.index_query), target.get(c.index_match)) else {
            return Err(Error::InvalidData(format!(
                "Correspondence ({}, {}) out of range for clouds of size {} and {}",
                c.index_query,
                c.index_match,
                source.len(),
                target.len()
            )));
        };
        if src.is_finite() && tgt.is_finite() {
            pairs.push(Pair {
                correspondence: *c,
                source: src.position(),
                target: tgt.position(),
            });
        }
    }
    Ok(pairs)
}

fn sample_transform(rng: &mut StdRng, pairs: &[Pair]) -> Result<Isometry3<f32>> {
    let indices = rand::seq::index::sample(rng, pairs.len(), SAMPLE_SIZE);
    let mut source = [Point3f::origin(); SAMPLE_SIZE];
    let mut target = [Point3f::origin(); SAMPLE_SIZE];
    for (slot, idx) in indices.iter().enumerate() {
        source[slot] = pairs[idx].source;
        target[slot] = pairs[idx].target;
    }

    if is_degenerate(&source) || is_degenerate(&target) {
        return Err(Error::DegenerateSample);
    }

    compute_transformation(&source, &target)
}

/// Coincident or colinear triples do not pin down a rotation
fn is_degenerate(points: &[Point3f; SAMPLE_SIZE]) -> bool {
    let [a, b, c] = points.map(|p| p.cast::<f64>());
    (b - a).cross(&(c - a)).norm_squared() < DEGENERACY_EPSILON
}

#[inline]
fn is_inlier(transform: &Isometry3<f32>, pair: &Pair, threshold_sq: f32) -> bool {
    (transform * pair.source - pair.target).norm_squared() <= threshold_sq
}

fn count_inliers(transform: &Isometry3<f32>, pairs: &[Pair], threshold_sq: f32) -> usize {
    pairs
        .iter()
        .filter(|pair| is_inlier(transform, pair, threshold_sq))
        .count()
}

/// Least-squares refit on the inliers of `best`, kept only if it does not lose support
fn refine_candidate(best: Candidate, pairs: &[Pair], threshold_sq: f32) -> Candidate {
    let (source, target): (Vec<Point3f>, Vec<Point3f>) = pairs
        .iter()
        .filter(|pair| is_inlier(&best.transform, pair, threshold_sq))
        .map(|pair| (pair.source, pair.target))
        .unzip();

    if source.len() <= SAMPLE_SIZE {
        return best;
    }

    match compute_transformation(&source, &target) {
        Ok(transform) => {
            let inlier_count = count_inliers(&transform, pairs, threshold_sq);
            if inlier_count >= best.inlier_count {
                Candidate {
                    transform,
                    inlier_count,
                }
            } else {
                best
            }
        }
        Err(_) => best,
    }
}

/// Compute the least-squares rigid transformation using SVD.
///
/// Accumulates in double precision: three-point samples are always coplanar,
/// so the cross-covariance has a vanishing singular value and the reflection
/// correction must flip exactly that axis.
pub fn compute_transformation(
    source_points: &[Point3f],
    target_points: &[Point3f],
) -> Result<Isometry3<f32>> {
    if source_points.len() != target_points.len() || source_points.len() < SAMPLE_SIZE {
        return Err(Error::InvalidData("Point correspondence mismatch".to_string()));
    }

    let n = source_points.len() as f64;

    // Compute centroids
    let source_centroid = source_points
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.coords.cast::<f64>())
        / n;
    let target_centroid = target_points
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.coords.cast::<f64>())
        / n;

    // Compute covariance matrix H
    let mut h = Matrix3::<f64>::zeros();
    for (src, tgt) in source_points.iter().zip(target_points.iter()) {
        let p = src.coords.cast::<f64>() - source_centroid;
        let q = tgt.coords.cast::<f64>() - target_centroid;
        h += p * q.transpose();
    }

    // SVD decomposition
    let svd = h.svd(true, true);
    let u = svd.u.ok_or_else(|| Error::Algorithm("SVD U matrix not available".to_string()))?;
    let v_t = svd.v_t.ok_or_else(|| Error::Algorithm("SVD V^T matrix not available".to_string()))?;

    // Two vanishing singular values: points are colinear
    let mut singular = [svd.singular_values[0], svd.singular_values[1], svd.singular_values[2]];
    singular.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if !(singular[1] > singular[2] * 1e-9) {
        return Err(Error::DegenerateSample);
    }

    // Compute rotation matrix
    let mut v = v_t.transpose();
    let mut r = v * u.transpose();

    // Ensure proper rotation (det(R) = 1)
    if r.determinant() < 0.0 {
        let (weakest, _) = svd.singular_values.argmin();
        let flipped = -v.column(weakest);
        v.set_column(weakest, &flipped);
        r = v * u.transpose();
    }

    let translation = target_centroid - r * source_centroid;
    if !translation.iter().chain(r.iter()).all(|v| v.is_finite()) {
        return Err(Error::DegenerateSample);
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
        r.map(|v| v as f32),
    ));

    Ok(Isometry3::from_parts(
        Translation3::new(translation.x as f32, translation.y as f32, translation.z as f32),
        rotation,
    ))
}

/// Apply an isometry to every point of a slice
pub fn transform_points(points: &[Point3f], transform: &Isometry3<f32>) -> Vec<Point3<f32>> {
    points.iter().map(|p| transform * p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn known_transform() -> Isometry3<f32> {
        Isometry3::from_parts(
            Translation3::new(0.5, -1.0, 2.0),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 0.8),
        )
    }

    fn random_points(rng: &mut StdRng, n: usize) -> Vec<Point3f> {
        (0..n)
            .map(|_| {
                Point3f::new(
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(0.5..4.0),
                )
            })
            .collect()
    }

    fn clean_problem(n: usize, seed: u64) -> (PointCloud<Point3f>, PointCloud<Point3f>, Vec<Correspondence>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let source = random_points(&mut rng, n);
        let target = transform_points(&source, &known_transform());
        let correspondences = (0..n).map(|i| Correspondence::new(i, i, 0.0)).collect();
        (
            PointCloud::from_points(source),
            PointCloud::from_points(target),
            correspondences,
        )
    }

    fn assert_close_to_known(result: &SampleConsensusResult) {
        let expected = RigidTransform::from(known_transform());
        let (angle, distance) = result.transformation.difference(&expected);
        assert!(angle < 0.01, "Rotation error too large: {}", angle);
        assert!(distance < 1e-3, "Translation error too large: {}", distance);
    }

    #[test]
    fn test_compute_transformation_exact() {
        let (source, target, _) = clean_problem(10, 1);
        let transform = compute_transformation(&source.points, &target.points).unwrap();
        let (angle, distance) =
            RigidTransform::from(transform).difference(&RigidTransform::from(known_transform()));
        assert!(angle < 1e-4);
        assert!(distance < 1e-4);
    }

    #[test]
    fn test_compute_transformation_three_points_with_reflection_risk() {
        // Three points are always coplanar; the solver must still return a rotation
        let source = [
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        let target = transform_points(&source, &known_transform());
        let transform = compute_transformation(&source, &target).unwrap();
        assert!(transform.rotation.to_rotation_matrix().matrix().determinant() > 0.99);
        for (s, t) in source.iter().zip(target.iter()) {
            assert!((transform * s - t).norm() < 1e-4);
        }
    }

    #[test]
    fn test_compute_transformation_colinear_is_degenerate() {
        let source: Vec<Point3f> = (0..5).map(|i| Point3f::new(i as f32, 0.0, 0.0)).collect();
        let result = compute_transformation(&source, &source);
        assert!(matches!(result, Err(Error::DegenerateSample)));
    }

    #[test]
    fn test_sac_recovers_known_transform() {
        let (source, target, correspondences) = clean_problem(50, 3);
        let config = SampleConsensusConfig::default().with_seed(11);

        let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config).unwrap();

        assert_close_to_known(&result);
        assert_eq!(result.inliers.len(), 50);
    }

    #[test]
    fn test_sac_with_outliers() {
        let (source, target, mut correspondences) = clean_problem(50, 5);
        let mut rng = StdRng::seed_from_u64(99);

        // 20 wrong pairings on top of 50 correct ones
        let k = 20;
        for _ in 0..k {
            let query = rng.gen_range(0..50);
            let mut wrong = rng.gen_range(0..50);
            while wrong == query {
                wrong = rng.gen_range(0..50);
            }
            correspondences.push(Correspondence::new(query, wrong, 1.0));
        }

        for refine in [false, true] {
            let config = SampleConsensusConfig::default().with_seed(2024).with_refine(refine);
            let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config).unwrap();

            assert_close_to_known(&result);
            assert!(result.inliers.len() >= correspondences.len() - k);
            assert!(result.inliers.iter().all(|c| c.index_query == c.index_match));
        }
    }

    #[test]
    fn test_refinement_is_off_by_default() {
        assert!(!SampleConsensusConfig::default().refine);
    }

    #[test]
    fn test_sac_is_reproducible_with_seed() {
        let (source, target, correspondences) = clean_problem(30, 8);
        let estimator = RigidSampleConsensus::new(
            SampleConsensusConfig::default().with_seed(5),
        );

        let first = estimator.estimate(&source, &target, &correspondences).unwrap();
        let second = estimator.estimate(&source, &target, &correspondences).unwrap();

        assert_eq!(first.transformation, second.transformation);
        assert_eq!(first.inliers, second.inliers);
        assert_eq!(first.iterations, second.iterations);
    }

    #[test]
    fn test_sac_early_termination() {
        let (source, target, correspondences) = clean_problem(20, 4);
        let config = SampleConsensusConfig::default().with_seed(1);

        let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config).unwrap();

        // Noise-free data: the first non-degenerate sample explains everything
        assert!(result.iterations < config.max_iterations);
        assert_eq!(result.inliers.len(), 20);
    }

    #[test]
    fn test_sac_empty_correspondences() {
        let (source, target, _) = clean_problem(5, 1);
        let result = estimate_rigid_transform_sac(&source, &target, &[], &SampleConsensusConfig::default());
        assert!(matches!(result, Err(Error::EmptyCorrespondenceSet)));
    }

    #[test]
    fn test_sac_out_of_range_correspondence() {
        let (source, target, _) = clean_problem(5, 1);
        let correspondences = vec![Correspondence::new(0, 17, 0.0)];
        let result =
            estimate_rigid_transform_sac(&source, &target, &correspondences, &SampleConsensusConfig::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_sac_all_degenerate_returns_identity() {
        let source = PointCloud::from_points((0..10).map(|i| Point3f::new(i as f32, 0.0, 0.0)).collect());
        let correspondences: Vec<Correspondence> = (0..10).map(|i| Correspondence::new(i, i, 0.0)).collect();
        let config = SampleConsensusConfig::default().with_seed(3).with_max_iterations(50);

        let result = estimate_rigid_transform_sac(&source, &source, &correspondences, &config).unwrap();

        assert!(result.transformation.is_identity(1e-6));
        assert!(result.inliers.is_empty());
        assert_eq!(result.iterations, 50);
    }

    #[test]
    fn test_sac_ignores_invalid_points() {
        let (mut source, target, correspondences) = clean_problem(20, 6);
        source[0] = Point3f::new(f32::NAN, 0.0, 0.0);
        let config = SampleConsensusConfig::default().with_seed(9);

        let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config).unwrap();

        assert_close_to_known(&result);
        assert_eq!(result.inliers.len(), 19);
        assert!(result.inliers.iter().all(|c| c.index_query != 0));
    }

    #[test]
    fn test_sac_early_termination_with_invalid_points() {
        let (mut source, target, correspondences) = clean_problem(30, 12);
        source[4] = Point3f::new(0.0, f32::NAN, 0.0);
        source[17] = Point3f::new(f32::INFINITY, 0.0, 0.0);
        let config = SampleConsensusConfig::default().with_seed(21);

        let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config).unwrap();

        // Every usable pair agrees, so sampling stops long before the cap
        assert_eq!(result.inliers.len(), 28);
        assert!(result.iterations < 10, "Ran {} iterations", result.iterations);
    }

    #[test]
    fn test_sac_rejects_invalid_config() {
        let (source, target, correspondences) = clean_problem(5, 1);
        let config = SampleConsensusConfig::default().with_inlier_threshold(0.0);
        let result = estimate_rigid_transform_sac(&source, &target, &correspondences, &config);
        assert!(result.is_err());
    }
}
