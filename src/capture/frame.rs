//! Frame data structures for camera buffers

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{PipelineError, PipelineResult};

/// Sensor rotation reported alongside a camera buffer (clockwise)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a rotation from degrees; only quarter turns are accepted
    pub fn from_degrees(degrees: u32) -> PipelineResult<Self> {
        match degrees % 360 {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(PipelineError::Runtime(format!(
                "unsupported rotation {} degrees",
                other
            ))),
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether width and height trade places after rotating
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = PipelineError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// A raw frame as delivered by the camera
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Raw RGBA pixel data, row-major, no padding
    pub data: Vec<u8>,
    /// Buffer width in pixels
    pub width: u32,
    /// Buffer height in pixels
    pub height: u32,
    /// Rotation needed to make the buffer upright
    pub rotation: Rotation,
    /// Frame comes from a front-facing (mirrored) sensor
    pub front_facing: bool,
    /// Monotonic sequence number assigned at intake
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(data: Vec<u8>, width: u32, height: u32, rotation: Rotation, front_facing: bool) -> Self {
        Self {
            data,
            width,
            height,
            rotation,
            front_facing,
            sequence: 0,
            timestamp: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(270).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Deg90);
        assert!(Rotation::from_degrees(45).is_err());
    }

    #[test]
    fn test_rotation_swaps_axes() {
        assert!(!Rotation::Deg0.swaps_axes());
        assert!(Rotation::Deg90.swaps_axes());
        assert!(!Rotation::Deg180.swaps_axes());
        assert!(Rotation::Deg270.swaps_axes());
    }
}
