//! Vision Layer
//!
//! Frame normalization, the detector boundary, crop geometry and the OCR
//! engine boundary. Detector and OCR engine are external collaborators and
//! only appear here as traits.

pub mod crop;
pub mod detection;
pub mod normalize;
pub mod ocr;

pub use crop::{crop_box, PixelRect};
pub use detection::{BoundingBox, DetectionFrame, DetectionOutcome, Detector};
pub use normalize::{normalize, NormalizedFrame};
pub use ocr::{clean_recognized_text, OcrEngine};
