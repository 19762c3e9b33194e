//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use bytemuck::{Pod, Zeroable};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// An XYZRGB point as delivered by a depth camera.
///
/// Unmeasured pixels carry NaN coordinates. They are kept in clouds so that
/// indices stay stable, but every geometric computation skips them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct ColoredPoint3f {
    pub position: Point3f,
    pub color: [u8; 3],
    #[serde(skip)]
    _pad: u8,
}

// 12 bytes of position, 3 of color and one explicit padding byte.
unsafe impl Pod for ColoredPoint3f {}
unsafe impl Zeroable for ColoredPoint3f {}

impl ColoredPoint3f {
    /// Create a colored point
    pub fn new(position: Point3f, color: [u8; 3]) -> Self {
        Self {
            position,
            color,
            _pad: 0,
        }
    }

    /// Create a colored point from raw coordinates
    pub fn from_xyzrgb(x: f32, y: f32, z: f32, r: u8, g: u8, b: u8) -> Self {
        Self::new(Point3f::new(x, y, z), [r, g, b])
    }

    /// Create an unmeasured point (NaN coordinates)
    pub fn invalid() -> Self {
        Self::new(Point3f::new(f32::NAN, f32::NAN, f32::NAN), [0, 0, 0])
    }
}

impl Default for ColoredPoint3f {
    fn default() -> Self {
        Self::new(Point3f::origin(), [255, 255, 255])
    }
}

impl From<ColoredPoint3f> for Point3f {
    fn from(point: ColoredPoint3f) -> Self {
        point.position
    }
}
