//! Frames delivered by the acquisition side

use scanfuse_core::{ColoredPointCloud3f, KeypointCloud};

/// One depth-camera frame: the dense colored cloud and its keypoints,
/// both in the camera's own coordinate frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub cloud: ColoredPointCloud3f,
    pub keypoints: KeypointCloud,
}

impl Frame {
    pub fn new(cloud: ColoredPointCloud3f, keypoints: KeypointCloud) -> Self {
        Self { cloud, keypoints }
    }
}

/// Supplier of frames, one per call, in acquisition order.
///
/// Buffering and device lifecycle live on the implementor's side. Any
/// iterator of frames is a source.
pub trait FrameSource {
    /// The next frame, or `None` once the stream has ended
    fn next_frame(&mut self) -> Option<Frame>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = Frame>,
{
    fn next_frame(&mut self) -> Option<Frame> {
        self.next()
    }
}
