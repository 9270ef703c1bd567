//! Keep-latest frame slot
//!
//! Single pending frame shared between the camera side and the analysis
//! worker. Submitting while a frame is still pending replaces it.

use parking_lot::{Condvar, Mutex};

use super::frame::RawFrame;

#[derive(Debug, Default)]
struct SlotInner {
    pending: Option<RawFrame>,
    next_sequence: u64,
    submitted: u64,
    superseded: u64,
    busy: bool,
    closed: bool,
}

/// Counters kept by the slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Frames handed to `submit`
    pub submitted: u64,
    /// Frames replaced before the worker picked them up
    pub superseded: u64,
}

/// Keep-only-latest handoff between producer and analysis worker
#[derive(Debug, Default)]
pub struct LatestFrameSlot {
    inner: Mutex<SlotInner>,
    ready: Condvar,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a frame, replacing any frame still waiting.
    ///
    /// Returns the assigned sequence number, or `None` once the slot is closed.
    pub fn submit(&self, mut frame: RawFrame) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.submitted += 1;
        frame.sequence = sequence;

        if inner.pending.replace(frame).is_some() {
            inner.superseded += 1;
        }
        drop(inner);

        self.ready.notify_one();
        Some(sequence)
    }

    /// Block until a frame is pending or the slot is closed.
    ///
    /// The consumer counts as busy until it calls [`finish`](Self::finish).
    pub fn take(&self) -> Option<RawFrame> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(frame) = inner.pending.take() {
                inner.busy = true;
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Mark the frame handed out by `take` as fully processed
    pub fn finish(&self) {
        self.inner.lock().busy = false;
    }

    /// No frame pending and none being processed
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.is_none() && !inner.busy
    }

    /// Close the slot; a pending frame is discarded and waiters wake up
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.pending = None;
        drop(inner);
        self.ready.notify_all();
    }

    pub fn stats(&self) -> SlotStats {
        let inner = self.inner.lock();
        SlotStats {
            submitted: inner.submitted,
            superseded: inner.superseded,
        }
    }
}
