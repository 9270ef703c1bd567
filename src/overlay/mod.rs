//! Overlay Layer
//!
//! Box/label reconciliation against the latest detection pass, display
//! geometry and optional snapshot rendering. Actual on-screen drawing
//! belongs to the presentation side.

pub mod layout;
pub mod snapshot;
pub mod state;

pub use snapshot::SnapshotWriter;
pub use state::OverlayState;
