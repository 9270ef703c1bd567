//! Runtime counters shared by the pipeline threads

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters bumped from the worker, the dispatcher and the reconciler
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub frames_analyzed: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub detector_errors: AtomicU64,
    pub empty_detections: AtomicU64,
    pub recognitions_dispatched: AtomicU64,
    pub recognitions_completed: AtomicU64,
    pub recognitions_skipped: AtomicU64,
    pub recognitions_failed: AtomicU64,
    pub candidates_rejected: AtomicU64,
    pub stale_results: AtomicU64,
    pub plates_accepted: AtomicU64,
    /// Presentation notifications dropped because nobody drained the queue
    pub presentation_dropped: AtomicU64,
}

impl PipelineCounters {
    /// Recognition requests started but not yet finished
    pub fn recognitions_pending(&self) -> u64 {
        let dispatched = self.recognitions_dispatched.load(Ordering::Acquire);
        let completed = self.recognitions_completed.load(Ordering::Acquire);
        dispatched.saturating_sub(completed)
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            frames_analyzed: load(&self.frames_analyzed),
            frames_rejected: load(&self.frames_rejected),
            detector_errors: load(&self.detector_errors),
            empty_detections: load(&self.empty_detections),
            recognitions_dispatched: load(&self.recognitions_dispatched),
            recognitions_completed: load(&self.recognitions_completed),
            recognitions_skipped: load(&self.recognitions_skipped),
            recognitions_failed: load(&self.recognitions_failed),
            candidates_rejected: load(&self.candidates_rejected),
            stale_results: load(&self.stale_results),
            plates_accepted: load(&self.plates_accepted),
            presentation_dropped: load(&self.presentation_dropped),
        }
    }
}

/// Point-in-time copy of [`PipelineCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub frames_analyzed: u64,
    pub frames_rejected: u64,
    pub detector_errors: u64,
    pub empty_detections: u64,
    pub recognitions_dispatched: u64,
    pub recognitions_completed: u64,
    pub recognitions_skipped: u64,
    pub recognitions_failed: u64,
    pub candidates_rejected: u64,
    pub stale_results: u64,
    pub plates_accepted: u64,
    pub presentation_dropped: u64,
}
