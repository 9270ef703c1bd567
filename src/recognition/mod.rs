//! Recognition Layer
//!
//! Per-box OCR fan-out and plate text validation.

pub mod dispatcher;
pub mod validator;

pub use dispatcher::RecognitionDispatcher;
pub use validator::{validate, ValidatedPlate};

use crate::vision::BoundingBox;

/// Completion of one recognition request
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// Engine produced text for the box
    Recognized {
        bbox: BoundingBox,
        sequence: u64,
        text: String,
    },
    /// Engine or crop failed; diagnostic only
    Failed {
        bbox: BoundingBox,
        sequence: u64,
        reason: String,
    },
}
