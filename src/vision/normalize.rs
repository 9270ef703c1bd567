//! Frame normalization
//!
//! Turns a raw camera buffer into the upright RGBA image the detector and
//! the crop step work on. Rotation is applied first, then mirroring for
//! front-facing sensors.

use image::{imageops, RgbaImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::capture::{RawFrame, Rotation};
use crate::error::{PipelineError, PipelineResult};

/// Upright, analysis-ready frame
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    /// Sequence number inherited from the raw frame
    pub sequence: u64,
    /// Upright RGBA image, shared with in-flight recognition tasks
    pub image: Arc<RgbaImage>,
    /// When the raw frame was captured
    pub captured_at: Instant,
}

/// Normalize a raw frame, consuming its buffer
pub fn normalize(frame: RawFrame) -> PipelineResult<NormalizedFrame> {
    let RawFrame {
        data,
        width,
        height,
        rotation,
        front_facing,
        sequence,
        timestamp,
    } = frame;

    if width == 0 || height == 0 {
        return Err(PipelineError::invalid_frame(width, height, "non-positive dimensions"));
    }

    let expected = width as usize * height as usize * 4;
    if data.len() < expected {
        return Err(PipelineError::invalid_frame(
            width,
            height,
            format!("buffer holds {} bytes, expected {}", data.len(), expected),
        ));
    }

    let buffer = RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| PipelineError::invalid_frame(width, height, "buffer rejected"))?;

    let image = orient(buffer, rotation, front_facing);

    debug!(
        "Normalized frame #{} {}x{} -> {}x{} (rotation {}, mirrored: {})",
        sequence,
        width,
        height,
        image.width(),
        image.height(),
        rotation.degrees(),
        front_facing
    );

    Ok(NormalizedFrame {
        sequence,
        image: Arc::new(image),
        captured_at: timestamp,
    })
}

/// Rotate clockwise, then mirror horizontally if requested
pub fn orient(image: RgbaImage, rotation: Rotation, mirror: bool) -> RgbaImage {
    let mut upright = match rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => imageops::rotate90(&image),
        Rotation::Deg180 => imageops::rotate180(&image),
        Rotation::Deg270 => imageops::rotate270(&image),
    };

    if mirror {
        imageops::flip_horizontal_in_place(&mut upright);
    }

    upright
}
