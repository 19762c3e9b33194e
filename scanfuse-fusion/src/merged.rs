//! Append-only merged cloud.
//!
//! Every merged frame is stored as its own immutable chunk behind an `Arc`.
//! Appending pushes a new chunk and never touches existing points, so a
//! snapshot is a list of chunk handles: taking one copies no points, and a
//! snapshot held across later appends keeps sharing storage with the live
//! cloud.

use std::ops::Index;
use std::sync::Arc;

use scanfuse_core::{ColoredPoint3f, ColoredPointCloud3f};

/// The fused scene as a sequence of per-frame chunks in global coordinates
#[derive(Debug, Clone, Default)]
pub struct MergedCloud {
    chunks: Vec<Arc<ColoredPointCloud3f>>,
    /// Index of the first point of each chunk
    offsets: Vec<usize>,
    len: usize,
}

impl MergedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of points over all chunks
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Per-frame chunks in merge order
    pub fn chunks(&self) -> &[Arc<ColoredPointCloud3f>] {
        &self.chunks
    }

    /// Append a frame that is already in global coordinates
    pub fn push_frame(&mut self, cloud: ColoredPointCloud3f) {
        if cloud.is_empty() {
            return;
        }
        self.offsets.push(self.len);
        self.len += cloud.len();
        self.chunks.push(Arc::new(cloud));
    }

    /// Point at a global index
    pub fn get(&self, index: usize) -> Option<&ColoredPoint3f> {
        if index >= self.len {
            return None;
        }
        let chunk = self.offsets.partition_point(|&start| start <= index) - 1;
        self.chunks[chunk].get(index - self.offsets[chunk])
    }

    /// Iterate over all points in merge order
    pub fn iter(&self) -> impl Iterator<Item = &ColoredPoint3f> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// Number of points with finite coordinates
    pub fn valid_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.valid_count()).sum()
    }

    /// Whether both clouds hold the same chunk storage for a chunk index
    pub fn shares_chunk(&self, other: &Self, chunk: usize) -> bool {
        match (self.chunks.get(chunk), other.chunks.get(chunk)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Flatten into one contiguous cloud
    pub fn to_point_cloud(&self) -> ColoredPointCloud3f {
        let mut cloud = ColoredPointCloud3f::with_capacity(self.len);
        cloud.extend(self.iter().copied());
        cloud
    }
}

impl From<ColoredPointCloud3f> for MergedCloud {
    fn from(cloud: ColoredPointCloud3f) -> Self {
        let mut merged = Self::new();
        merged.push_frame(cloud);
        merged
    }
}

impl Index<usize> for MergedCloud {
    type Output = ColoredPoint3f;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(point) => point,
            None => panic!("index {} out of bounds for merged cloud of {} points", index, self.len),
        }
    }
}

impl PartialEq for MergedCloud {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl PartialEq<ColoredPointCloud3f> for MergedCloud {
    fn eq(&self, other: &ColoredPointCloud3f) -> bool {
        self.len == other.len() && self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(offset: f32, count: usize) -> ColoredPointCloud3f {
        (0..count)
            .map(|i| ColoredPoint3f::from_xyzrgb(offset + i as f32, 0.0, 1.0, 10, 20, 30))
            .collect()
    }

    #[test]
    fn test_indexing_across_chunks() {
        let mut merged = MergedCloud::new();
        merged.push_frame(frame(0.0, 3));
        merged.push_frame(ColoredPointCloud3f::new());
        merged.push_frame(frame(100.0, 2));

        assert_eq!(merged.len(), 5);
        assert_eq!(merged.chunks().len(), 2);
        assert_eq!(merged[2].position.x, 2.0);
        assert_eq!(merged[3].position.x, 100.0);
        assert_eq!(merged[4].position.x, 101.0);
        assert!(merged.get(5).is_none());
    }

    #[test]
    fn test_snapshot_shares_storage_after_append() {
        let mut merged = MergedCloud::from(frame(0.0, 4));
        let snapshot = merged.clone();
        merged.push_frame(frame(10.0, 4));

        assert_eq!(snapshot.len(), 4);
        assert_eq!(merged.len(), 8);
        assert!(merged.shares_chunk(&snapshot, 0));
    }

    #[test]
    fn test_flatten_matches_iteration() {
        let mut merged = MergedCloud::from(frame(0.0, 2));
        merged.push_frame(frame(5.0, 3));

        let flat = merged.to_point_cloud();
        assert_eq!(merged, flat);
        assert_eq!(flat.len(), 5);
    }
}
