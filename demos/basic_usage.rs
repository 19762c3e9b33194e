//! Basic usage example for scanfuse
//!
//! Registers two views of the same synthetic scene, first step by step
//! with the matcher and estimator, then through a registration session.

use scanfuse_algorithms::{CorrespondenceMatcher, RigidSampleConsensus, SampleConsensusConfig};
use scanfuse_core::{RigidTransform, UnitQuaternion, Vector3};
use scanfuse_fusion::synthetic::SyntheticScene;
use scanfuse_fusion::{FusionConfig, RegistrationSession};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("scanfuse Basic Usage");
    println!("====================");

    let scene = SyntheticScene::generate(1000, 50, 128, 7);
    let camera_pose = RigidTransform::from_translation_rotation(
        Vector3::new(1.0, 0.0, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
    );
    let first = scene.observe(&RigidTransform::identity());
    let second = scene.observe(&camera_pose);

    // Step by step
    println!("\nMatching and estimation:");
    let matcher = CorrespondenceMatcher::default();
    let correspondences = matcher.match_reciprocal(&second.keypoints, &first.keypoints)?;
    println!("- {} reciprocal correspondences", correspondences.len());

    let estimator = RigidSampleConsensus::new(SampleConsensusConfig::default().with_seed(1));
    let result = estimator.estimate(&second.keypoints, &first.keypoints, &correspondences)?;
    let (angle, distance) = result.transformation.difference(&camera_pose);
    println!(
        "- {} inliers after {} iterations, error {:.2e} rad / {:.2e} m",
        result.inliers.len(),
        result.iterations,
        angle,
        distance
    );

    // Through a session
    println!("\nRegistration session:");
    let mut session = RegistrationSession::new(FusionConfig::default().with_seed(1))?;
    for frame in [first, second] {
        let report = session.ingest_frame(frame)?;
        println!(
            "- frame {}: {:?}, merged cloud has {} points",
            report.frame_index, report.outcome, report.merged_points
        );
    }

    let model = session.object_model("synthetic");
    println!(
        "\nObject model '{}': {} points, {} keypoints",
        model.name,
        model.point_count(),
        model.keypoint_count()
    );

    Ok(())
}
