//! Background fusion worker.
//!
//! Acquisition and registration often run at different rates. The worker
//! owns a [`RegistrationSession`] on a dedicated thread and consumes frames
//! from a bounded channel one at a time, so at most one registration is in
//! flight and the producer blocks once `capacity` frames are queued.
//! Every processed frame produces a [`FusionUpdate`] carrying an immutable
//! snapshot of the merged cloud. Snapshots share point storage with the
//! session, so updates left queued by a slow consumer hold chunk handles,
//! not copies of the cloud.
//!
//! ```rust,ignore
//! let (worker, updates) = FusionWorker::spawn(FusionConfig::default(), 4)?;
//! std::thread::spawn(move || {
//!     for frame in camera_frames() {
//!         if worker.submit(frame).is_err() { break; }
//!     }
//! });
//! for update in updates.iter() {
//!     viewer.show(update.cloud());
//! }
//! ```

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use scanfuse_core::{Error, Result};

use crate::config::FusionConfig;
use crate::frame::Frame;
use crate::merged::MergedCloud;
use crate::session::{IngestReport, RegistrationSession};

/// Result of processing one submitted frame
#[derive(Debug)]
pub enum FusionUpdate {
    /// The frame was merged
    Merged {
        report: IngestReport,
        cloud: MergedCloud,
    },
    /// The frame was rejected; the session state is unchanged
    Rejected { error: Error },
}

impl FusionUpdate {
    /// Merged cloud snapshot, if the frame was merged
    pub fn cloud(&self) -> Option<&MergedCloud> {
        match self {
            FusionUpdate::Merged { cloud, .. } => Some(cloud),
            FusionUpdate::Rejected { .. } => None,
        }
    }
}

/// Handle to a running fusion thread
pub struct FusionWorker {
    frames: Option<Sender<Frame>>,
    handle: Option<JoinHandle<RegistrationSession>>,
}

impl FusionWorker {
    /// Spawn the worker thread.
    ///
    /// `capacity` bounds the number of frames waiting for registration.
    pub fn spawn(config: FusionConfig, capacity: usize) -> Result<(Self, Receiver<FusionUpdate>)> {
        let session = RegistrationSession::new(config)?;
        Self::spawn_with_session(session, capacity)
    }

    /// Spawn the worker around an existing session
    pub fn spawn_with_session(
        session: RegistrationSession,
        capacity: usize,
    ) -> Result<(Self, Receiver<FusionUpdate>)> {
        let (frame_tx, frame_rx) = bounded(capacity.max(1));
        let (update_tx, update_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("fusion".into())
            .spawn(move || run_fusion_loop(session, frame_rx, update_tx))?;

        Ok((
            Self {
                frames: Some(frame_tx),
                handle: Some(handle),
            },
            update_rx,
        ))
    }

    /// Queue a frame, blocking while the queue is full
    pub fn submit(&self, frame: Frame) -> Result<()> {
        let sender = self.frames.as_ref().ok_or(Error::WorkerStopped)?;
        sender.send(frame).map_err(|_| Error::WorkerStopped)
    }

    /// Stop accepting frames, drain the queue and return the session
    pub fn finish(mut self) -> Result<RegistrationSession> {
        self.frames.take();
        let handle = self.handle.take().ok_or(Error::WorkerStopped)?;
        handle
            .join()
            .map_err(|_| Error::Algorithm("Fusion worker panicked".to_string()))
    }
}

impl Drop for FusionWorker {
    fn drop(&mut self) {
        self.frames.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_fusion_loop(
    mut session: RegistrationSession,
    frames: Receiver<Frame>,
    updates: Sender<FusionUpdate>,
) -> RegistrationSession {
    log::info!("Fusion worker started");

    for frame in frames.iter() {
        let update = match session.ingest_frame(frame) {
            Ok(report) => FusionUpdate::Merged {
                report,
                cloud: session.merged_snapshot(),
            },
            Err(error) => {
                log::error!("Frame rejected: {}", error);
                FusionUpdate::Rejected { error }
            }
        };

        // Keep fusing even when nobody listens; the session is returned on finish
        if updates.send(update).is_err() {
            log::trace!("Update receiver dropped");
        }
    }

    log::info!("Fusion worker stopped after {} frames", session.frame_count());
    session
}
