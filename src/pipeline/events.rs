//! Message types flowing through the pipeline

use crossbeam_channel::Sender;
use std::time::Duration;

use crate::recognition::{RecognitionOutcome, ValidatedPlate};
use crate::vision::{BoundingBox, DetectionOutcome};

/// Messages consumed by the reconciler, the only writer of session state
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Result of a detection pass
    Detection(DetectionOutcome),
    /// Completion of a recognition request
    Recognition(RecognitionOutcome),
    /// Acknowledge once every earlier event has been applied
    Barrier(Sender<()>),
    /// Stop the reconciler
    Shutdown,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// Nothing detected; clear every annotation
    EmptyDetection,
    /// Boxes to display for the latest pass
    Detection {
        boxes: Vec<BoundingBox>,
        inference_time: Duration,
    },
    /// A new plate joined the result list
    PlateAccepted(ValidatedPlate),
    /// Text to draw over a box
    BoxTextUpdated { bbox: BoundingBox, text: String },
    /// Diagnostic only
    RecognitionFailed { reason: String },
}
