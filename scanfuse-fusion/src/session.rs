//! Frame-to-frame registration session.
//!
//! The session is a two-state machine. Before the first frame it is
//! *uninitialized*; the first frame becomes both the reference for the next
//! registration and the seed of the merged cloud. Every later frame is
//! *tracked*: its keypoints are matched against the previous frame's, the
//! relative motion is estimated and chained into the global pose, and the
//! frame is appended to the merged cloud in global coordinates.
//!
//! Matching always happens between two frames in their own local
//! coordinates; only merging uses the accumulated pose. A frame whose
//! descriptors have the wrong length is merged but never becomes the
//! reference, so the next frame registers against the last usable one.

use scanfuse_algorithms::{remove_invalid_points, voxel_grid_filter, CorrespondenceMatcher, RigidSampleConsensus};
use scanfuse_core::{ColoredPointCloud3f, Error, KeypointCloud, Result, RigidTransform};

use crate::config::{FusionConfig, RegistrationFailurePolicy};
use crate::frame::{Frame, FrameSource};
use crate::merged::MergedCloud;
use crate::model::ObjectModel;

/// Why a tracked frame was merged without updating the global pose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The frame's descriptors do not have the configured length
    DimensionMismatch { expected: usize, found: usize },
    /// No reciprocal descriptor matches with the previous frame
    NoCorrespondences,
}

/// What happened to the global pose during one `ingest`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// First frame; nothing to register against
    Initialized,
    /// Relative motion estimated and composed into the global pose
    Registered,
    /// Too few inliers under `HoldLastTransform`; pose left unchanged
    Held,
    /// Registration not attempted or not possible; pose left unchanged
    Skipped(SkipReason),
}

/// Summary of one ingested frame
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Zero-based position of the frame in the stream
    pub frame_index: u64,
    pub outcome: RegistrationOutcome,
    /// Estimated motion from this frame into the previous one
    pub local_transform: RigidTransform,
    /// Pose of this frame in the global frame after the update
    pub global_transform: RigidTransform,
    pub correspondences: usize,
    pub inliers: usize,
    pub iterations: usize,
    /// Points in the merged cloud after this frame
    pub merged_points: usize,
}

/// Everything a session carries from one frame to the next.
///
/// `frame_count` also serves as the state version: it increases by one with
/// every successful `ingest` and nothing else mutates the state.
#[derive(Debug, Clone, Default)]
pub struct RegistrationState {
    frame_count: u64,
    previous: Option<Frame>,
    global_transform: RigidTransform,
    merged: MergedCloud,
    merged_keypoints: KeypointCloud,
}

impl RegistrationState {
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_tracking(&self) -> bool {
        self.previous.is_some()
    }

    /// Previous frame's dense cloud, in its own coordinates
    pub fn previous_cloud(&self) -> Option<&ColoredPointCloud3f> {
        self.previous.as_ref().map(|frame| &frame.cloud)
    }

    /// Previous frame's keypoints, in its own coordinates
    pub fn previous_keypoints(&self) -> Option<&KeypointCloud> {
        self.previous.as_ref().map(|frame| &frame.keypoints)
    }

    pub fn global_transform(&self) -> RigidTransform {
        self.global_transform
    }

    pub fn merged_cloud(&self) -> &MergedCloud {
        &self.merged
    }

    pub fn merged_keypoints(&self) -> &KeypointCloud {
        &self.merged_keypoints
    }
}

/// Outcome of registering one frame pair, before anything is committed
struct Registration {
    outcome: RegistrationOutcome,
    local: RigidTransform,
    correspondences: usize,
    inliers: usize,
    iterations: usize,
}

impl Registration {
    fn skipped(reason: SkipReason, correspondences: usize) -> Self {
        Self {
            outcome: RegistrationOutcome::Skipped(reason),
            local: RigidTransform::identity(),
            correspondences,
            inliers: 0,
            iterations: 0,
        }
    }
}

/// Incremental registration and fusion driver.
///
/// `ingest` takes `&mut self`: exactly one registration runs at a time and
/// each one sees the state left by the previous call.
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    config: FusionConfig,
    matcher: CorrespondenceMatcher,
    estimator: RigidSampleConsensus,
    state: RegistrationState,
}

impl RegistrationSession {
    /// Create a session in the uninitialized state
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: config.matcher(),
            estimator: RigidSampleConsensus::new(config.sample_consensus()),
            config,
            state: RegistrationState::default(),
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.state.frame_count
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn global_transform(&self) -> RigidTransform {
        self.state.global_transform
    }

    pub fn merged_cloud(&self) -> &MergedCloud {
        &self.state.merged
    }

    /// Immutable view of the merged cloud as it stands now.
    ///
    /// Shares point storage with the session; later frames add new chunks
    /// and never copy or modify the points a snapshot refers to.
    pub fn merged_snapshot(&self) -> MergedCloud {
        self.state.merged.clone()
    }

    /// Package the fused scan under a name
    pub fn object_model(&self, name: impl Into<String>) -> ObjectModel {
        ObjectModel::new(name, self.state.merged.to_point_cloud(), self.state.merged_keypoints.clone())
    }

    /// Drop all accumulated state and return to the uninitialized state
    pub fn reset(&mut self) {
        self.state = RegistrationState::default();
    }

    /// Ingest a [`Frame`]
    pub fn ingest_frame(&mut self, frame: Frame) -> Result<IngestReport> {
        self.ingest(frame.cloud, frame.keypoints)
    }

    /// Register a frame against the previous one and merge it.
    ///
    /// Registration problems with a single frame pair (descriptor length
    /// mismatch, no reciprocal matches) do not fail the call: the frame is
    /// merged with the last known global pose and the report says why.
    /// After a descriptor length mismatch the previous frame stays the
    /// reference for the next call.
    ///
    /// # Errors
    /// * `InsufficientFrame` if the cloud is empty or has fewer keypoints
    ///   than `min_keypoints`; the state is left untouched.
    /// * `DimensionMismatch` if the first frame's descriptors do not have
    ///   the configured length; the session stays uninitialized.
    pub fn ingest(&mut self, cloud: ColoredPointCloud3f, keypoints: KeypointCloud) -> Result<IngestReport> {
        self.check_frame(&cloud, &keypoints)?;
        let frame_index = self.state.frame_count;

        let registration = match self.state.previous.as_ref() {
            None => return self.initialize(cloud, keypoints),
            Some(previous) => self.register(&keypoints, &previous.keypoints)?,
        };

        let applies = matches!(registration.outcome, RegistrationOutcome::Registered);
        let global_transform = if applies {
            self.state.global_transform * registration.local
        } else {
            self.state.global_transform
        };

        let usable_reference = !matches!(
            registration.outcome,
            RegistrationOutcome::Skipped(SkipReason::DimensionMismatch { .. })
        );
        let to_merge = self.prepare_for_merge(cloud.transformed(&global_transform))?;

        // Commit: nothing below can fail
        self.state.global_transform = global_transform;
        self.state.merged.push_frame(to_merge);
        if usable_reference {
            self.state
                .merged_keypoints
                .append(keypoints.transformed(&global_transform));
            self.state.previous = Some(Frame::new(cloud, keypoints));
        }
        self.state.frame_count += 1;

        let report = IngestReport {
            frame_index,
            outcome: registration.outcome,
            local_transform: registration.local,
            global_transform,
            correspondences: registration.correspondences,
            inliers: registration.inliers,
            iterations: registration.iterations,
            merged_points: self.state.merged.len(),
        };

        match report.outcome {
            RegistrationOutcome::Registered => log::info!(
                "Frame {}: registered with {} inliers of {} correspondences, merged cloud has {} points",
                frame_index,
                report.inliers,
                report.correspondences,
                report.merged_points
            ),
            outcome => log::warn!(
                "Frame {}: global pose unchanged ({:?}), merged cloud has {} points",
                frame_index,
                outcome,
                report.merged_points
            ),
        }

        Ok(report)
    }

    /// Feed every frame of `source` through the session.
    ///
    /// `on_merged` receives each report together with the merged cloud as it
    /// stands after that frame. Stops at the first hard error.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_merged: F) -> Result<u64>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&IngestReport, &MergedCloud),
    {
        let mut ingested = 0;
        while let Some(frame) = source.next_frame() {
            let report = self.ingest_frame(frame)?;
            on_merged(&report, &self.state.merged);
            ingested += 1;
        }
        Ok(ingested)
    }

    fn check_frame(&self, cloud: &ColoredPointCloud3f, keypoints: &KeypointCloud) -> Result<()> {
        if cloud.is_empty() {
            return Err(Error::InsufficientFrame {
                what: "points",
                required: 1,
                found: 0,
            });
        }
        if keypoints.len() < self.config.min_keypoints {
            return Err(Error::InsufficientFrame {
                what: "keypoints",
                required: self.config.min_keypoints,
                found: keypoints.len(),
            });
        }
        if !self.is_tracking() {
            keypoints.check_dimensionality(self.config.descriptor_dimensionality)?;
        }
        Ok(())
    }

    fn initialize(&mut self, cloud: ColoredPointCloud3f, keypoints: KeypointCloud) -> Result<IngestReport> {
        let merged = self.prepare_for_merge(cloud.clone())?;

        self.state.global_transform = RigidTransform::identity();
        self.state.merged = MergedCloud::from(merged);
        self.state.merged_keypoints = keypoints.clone();
        self.state.previous = Some(Frame::new(cloud, keypoints));
        self.state.frame_count = 1;

        log::info!(
            "Frame 0: session initialized, merged cloud has {} points",
            self.state.merged.len()
        );

        Ok(IngestReport {
            frame_index: 0,
            outcome: RegistrationOutcome::Initialized,
            local_transform: RigidTransform::identity(),
            global_transform: RigidTransform::identity(),
            correspondences: 0,
            inliers: 0,
            iterations: 0,
            merged_points: self.state.merged.len(),
        })
    }

    fn register(&self, next: &KeypointCloud, prev: &KeypointCloud) -> Result<Registration> {
        let correspondences = match self.matcher.match_reciprocal(next, prev) {
            Ok(correspondences) => correspondences,
            Err(Error::DimensionMismatch { expected, found }) => {
                log::warn!("Descriptor length {} does not match expected {}", found, expected);
                return Ok(Registration::skipped(
                    SkipReason::DimensionMismatch { expected, found },
                    0,
                ));
            }
            Err(e) => return Err(e),
        };

        let result = match self.estimator.estimate(next, prev, &correspondences) {
            Ok(result) => result,
            Err(Error::EmptyCorrespondenceSet) => {
                return Ok(Registration::skipped(SkipReason::NoCorrespondences, 0));
            }
            Err(e) => return Err(e),
        };

        let inliers = result.inliers.len();
        let hold = self.config.failure_policy == RegistrationFailurePolicy::HoldLastTransform
            && inliers < self.config.min_inliers;

        Ok(Registration {
            outcome: if hold {
                RegistrationOutcome::Held
            } else {
                RegistrationOutcome::Registered
            },
            local: result.transformation,
            correspondences: correspondences.len(),
            inliers,
            iterations: result.iterations,
        })
    }

    fn prepare_for_merge(&self, cloud: ColoredPointCloud3f) -> Result<ColoredPointCloud3f> {
        let cloud = if self.config.drop_invalid_points {
            remove_invalid_points(&cloud)
        } else {
            cloud
        };
        match self.config.merge_voxel_size {
            Some(size) => voxel_grid_filter(&cloud, size),
            None => Ok(cloud),
        }
    }
}
