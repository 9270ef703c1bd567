//! Detection stage boundary
//!
//! The object detector is an external collaborator. This module defines the
//! values it produces and the trait the analysis worker drives it through.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use super::normalize::NormalizedFrame;

/// Normalized rectangle reported by the detector.
///
/// Coordinates are fractions of the analyzed image's width and height.
/// Two boxes are the same detection when their coordinates and label match;
/// the confidence score does not take part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Class label from the detector, if any
    #[serde(default)]
    pub label: Option<String>,
    /// Detector confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            label: None,
            confidence: None,
        }
    }

    /// Normalized width (may be non-positive for malformed boxes)
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Normalized height (may be non-positive for malformed boxes)
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    fn key_bits(&self) -> [u32; 4] {
        [
            canonical_bits(self.x1),
            canonical_bits(self.y1),
            canonical_bits(self.x2),
            canonical_bits(self.y2),
        ]
    }
}

/// Bit pattern with +0.0 and -0.0 folded together
fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 {
        0.0f32.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.key_bits() == other.key_bits() && self.label == other.label
    }
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_bits().hash(state);
        self.label.hash(state);
    }
}

/// Boxes produced for one analyzed image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFrame {
    /// Sequence of the frame the boxes were found in
    pub sequence: u64,
    /// Boxes in detector order
    pub boxes: Vec<BoundingBox>,
    /// Wall-clock cost of the detection pass
    pub inference_time: Duration,
}

impl DetectionFrame {
    pub fn new(sequence: u64, boxes: Vec<BoundingBox>, inference_time: Duration) -> Self {
        Self {
            sequence,
            boxes,
            inference_time,
        }
    }
}

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Nothing found; overlay clears and pending recognitions are abandoned
    Empty,
    /// One or more boxes found
    Detected(DetectionFrame),
}

impl DetectionOutcome {
    /// Fold a box list into an outcome, treating an empty list as `Empty`
    pub fn from_boxes(sequence: u64, boxes: Vec<BoundingBox>, inference_time: Duration) -> Self {
        if boxes.is_empty() {
            DetectionOutcome::Empty
        } else {
            DetectionOutcome::Detected(DetectionFrame::new(sequence, boxes, inference_time))
        }
    }
}

/// Object detector driven by the analysis worker.
///
/// Calls are blocking and never overlap: the worker owns the detector
/// exclusively.
pub trait Detector: Send {
    fn detect(&mut self, frame: &NormalizedFrame) -> anyhow::Result<DetectionOutcome>;
}

impl<F> Detector for F
where
    F: FnMut(&NormalizedFrame) -> anyhow::Result<DetectionOutcome> + Send,
{
    fn detect(&mut self, frame: &NormalizedFrame) -> anyhow::Result<DetectionOutcome> {
        self(frame)
    }
}
