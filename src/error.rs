//! Pipeline error kinds
//!
//! None of these are fatal: each one drops the unit of work it belongs to
//! (a frame, a box, a recognition request) and the pipeline keeps running.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid frame {width}x{height}: {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Box geometry produces an empty crop")]
    EmptyCrop,

    #[error("Crop ({x}, {y}, {width}x{height}) lies outside {image_width}x{image_height} image")]
    CropOutOfBounds {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    },

    #[error("Text recognition failed: {0}")]
    OcrFailure(String),

    #[error("Text recognition timed out after {0:?}")]
    OcrTimeout(Duration),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl PipelineError {
    /// Build an `InvalidFrame` error
    pub fn invalid_frame(width: u32, height: u32, reason: impl Into<String>) -> Self {
        PipelineError::InvalidFrame {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Reason string forwarded to presentation diagnostics
    pub fn reason(&self) -> String {
        match self {
            PipelineError::OcrFailure(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
