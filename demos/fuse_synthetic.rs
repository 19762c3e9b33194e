//! Streaming fusion of a synthetic camera trajectory
//!
//! A producer thread observes a random scene along a trajectory and feeds
//! the frames to a background fusion worker; the main thread prints the
//! recovered pose of every frame next to the ground truth.
//!
//! ```text
//! cargo run -p scanfuse-demos --bin fuse_synthetic -- --frames 20 --config fusion.yaml
//! ```

use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::Parser;
use scanfuse_core::{RigidTransform, UnitQuaternion, Vector3};
use scanfuse_fusion::synthetic::SyntheticScene;
use scanfuse_fusion::{FusionConfig, FusionUpdate, FusionWorker};

#[derive(Parser, Debug)]
#[command(name = "fuse_synthetic", about = "Fuse a synthetic RGB-D trajectory")]
struct Args {
    /// Number of frames along the trajectory
    #[arg(long, default_value_t = 10)]
    frames: usize,

    /// Points per frame
    #[arg(long, default_value_t = 2000)]
    points: usize,

    /// Keypoints per frame
    #[arg(long, default_value_t = 80)]
    keypoints: usize,

    /// Seed for the scene and for sample consensus
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Rotation between consecutive frames, in degrees
    #[arg(long, default_value_t = 5.0)]
    step_degrees: f32,

    /// Translation between consecutive frames, in meters
    #[arg(long, default_value_t = 0.05)]
    step_meters: f32,

    /// Frames that may wait for registration
    #[arg(long, default_value_t = 4)]
    queue: usize,

    /// YAML fusion configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn trajectory(args: &Args) -> Vec<RigidTransform> {
    let step = RigidTransform::from_translation_rotation(
        Vector3::new(args.step_meters, 0.0, args.step_meters * 0.5),
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), args.step_degrees.to_radians()),
    );
    std::iter::successors(Some(RigidTransform::identity()), |pose| Some(*pose * step))
        .take(args.frames)
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FusionConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => FusionConfig::default().with_seed(args.seed),
    };
    let scene = SyntheticScene::generate(args.points, args.keypoints, config.descriptor_dimensionality, args.seed);
    let poses = trajectory(&args);

    let (worker, updates) = FusionWorker::spawn(config, args.queue)?;
    let producer = {
        let poses = poses.clone();
        thread::spawn(move || {
            for pose in &poses {
                if worker.submit(scene.observe(pose)).is_err() {
                    log::error!("Fusion worker stopped early");
                    break;
                }
            }
            worker.finish()
        })
    };

    println!("{:>5} {:>12} {:>8} {:>12} {:>12}", "frame", "outcome", "inliers", "rot err", "trans err");
    for (update, truth) in updates.iter().zip(&poses) {
        match update {
            FusionUpdate::Merged { report, cloud } => {
                let (angle, distance) = report.global_transform.difference(truth);
                println!(
                    "{:>5} {:>12} {:>8} {:>12.2e} {:>12.2e}  ({} points)",
                    report.frame_index,
                    format!("{:?}", report.outcome),
                    report.inliers,
                    angle,
                    distance,
                    cloud.len()
                );
            }
            FusionUpdate::Rejected { error } => println!("rejected: {}", error),
        }
    }

    let session = producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
    println!(
        "\nFused {} frames into {} points",
        session.frame_count(),
        session.merged_cloud().len()
    );

    Ok(())
}
