//! Frame Intake Layer
//!
//! The camera (or a replayed recording) is an external collaborator that
//! hands over raw buffers. Frames reach the analysis worker through a
//! keep-latest slot so a slow detector never builds up a backlog.

pub mod frame;
pub mod slot;

pub use frame::{RawFrame, Rotation};
pub use slot::LatestFrameSlot;

/// Supplier of camera frames.
///
/// `next_frame` returning `None` means the stream is closed.
pub trait FrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RawFrame>>;
}

