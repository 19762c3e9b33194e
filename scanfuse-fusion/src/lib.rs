//! # scanfuse Fusion
//!
//! Incremental registration and fusion of depth-camera frames.
//!
//! Each frame is an XYZRGB cloud plus a keypoint cloud with descriptors. A
//! [`RegistrationSession`] matches every frame's keypoints against the
//! previous frame's, estimates the relative rigid motion with sample
//! consensus, chains it into a global pose and appends the frame, moved into
//! the global frame, to a merged cloud.
//!
//! ```rust
//! use scanfuse_fusion::{FusionConfig, RegistrationSession};
//! use scanfuse_fusion::synthetic::SyntheticScene;
//! use scanfuse_core::RigidTransform;
//!
//! fn main() -> scanfuse_core::Result<()> {
//!     let config = FusionConfig::default().with_seed(1);
//!     let scene = SyntheticScene::generate(200, 20, config.descriptor_dimensionality, 3);
//!     let mut session = RegistrationSession::new(config)?;
//!
//!     let report = session.ingest_frame(scene.observe(&RigidTransform::identity()))?;
//!     assert_eq!(report.merged_points, 200);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod frame;
pub mod merged;
pub mod model;
pub mod session;
pub mod synthetic;
pub mod worker;

pub use config::*;
pub use frame::*;
pub use merged::*;
pub use model::*;
pub use session::*;
pub use worker::*;
