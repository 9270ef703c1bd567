//! Session State
//!
//! Everything the scanner accumulates while it runs: accepted plates, the
//! live overlay and counters. Lives for the process only.

pub mod registry;
pub mod stats;

pub use registry::ResultRegistry;
pub use stats::{CounterSnapshot, PipelineCounters};

use std::time::Duration;

use crate::overlay::OverlayState;

/// State written by the reconciler and read by presentation
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Accepted plates
    pub registry: ResultRegistry,
    /// Boxes on screen and their labels
    pub overlay: OverlayState,
    /// Latency of the latest detection pass (zero after an empty pass)
    pub last_inference_time: Option<Duration>,
    /// Last diagnostic reported by recognition
    pub last_error: Option<String>,
}

impl SessionState {
    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}
