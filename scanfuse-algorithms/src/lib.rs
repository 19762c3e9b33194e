//! # scanfuse Algorithms
//!
//! Algorithms used by the fusion pipeline: descriptor-space nearest neighbor
//! search, reciprocal correspondence estimation, sample-consensus rigid
//! registration and voxel filtering.

pub mod nearest_neighbor;
pub mod correspondence;
pub mod registration;
pub mod filtering;

// Re-export commonly used items
pub use nearest_neighbor::*;
pub use correspondence::*;
pub use registration::*;
pub use filtering::*;
