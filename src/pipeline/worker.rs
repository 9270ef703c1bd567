//! Frame analysis worker
//!
//! A single thread pulls the latest frame, normalizes it, runs the detector
//! and fans the boxes out to recognition. The detector is owned here, so it
//! is never entered concurrently.

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::events::PipelineEvent;
use crate::capture::{LatestFrameSlot, RawFrame};
use crate::overlay::SnapshotWriter;
use crate::recognition::RecognitionDispatcher;
use crate::session::{PipelineCounters, SessionState};
use crate::vision::{normalize, DetectionOutcome, Detector, NormalizedFrame};

pub struct AnalysisWorker {
    slot: Arc<LatestFrameSlot>,
    detector: Box<dyn Detector>,
    dispatcher: RecognitionDispatcher,
    events: Sender<PipelineEvent>,
    counters: Arc<PipelineCounters>,
    state: Arc<RwLock<SessionState>>,
    snapshots: Option<SnapshotWriter>,
}

impl AnalysisWorker {
    pub fn new(
        slot: Arc<LatestFrameSlot>,
        detector: Box<dyn Detector>,
        dispatcher: RecognitionDispatcher,
        events: Sender<PipelineEvent>,
        counters: Arc<PipelineCounters>,
        state: Arc<RwLock<SessionState>>,
    ) -> Self {
        Self {
            slot,
            detector,
            dispatcher,
            events,
            counters,
            state,
            snapshots: None,
        }
    }

    pub fn with_snapshots(mut self, writer: Option<SnapshotWriter>) -> Self {
        self.snapshots = writer;
        self
    }

    /// Process frames until the slot closes
    pub fn run(mut self) {
        info!("Analysis worker started");

        while let Some(frame) = self.slot.take() {
            self.process(frame);
            self.slot.finish();
        }

        self.dispatcher.shutdown();
        info!("Analysis worker stopped");
    }

    fn process(&mut self, raw: RawFrame) {
        let sequence = raw.sequence;

        let frame = match normalize(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping frame #{}: {}", sequence, e);
                PipelineCounters::bump(&self.counters.frames_rejected);
                return;
            }
        };

        let outcome = match self.detector.detect(&frame) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Detector failed on frame #{}: {:#}", sequence, e);
                PipelineCounters::bump(&self.counters.detector_errors);
                return;
            }
        };

        PipelineCounters::bump(&self.counters.frames_analyzed);

        // Detection must be queued before its recognitions start
        let _ = self.events.send(PipelineEvent::Detection(outcome.clone()));

        match &outcome {
            DetectionOutcome::Empty => {
                debug!("Frame #{}: no detections", sequence);
                PipelineCounters::bump(&self.counters.empty_detections);
            }
            DetectionOutcome::Detected(detection) => {
                let summary = self.dispatcher.dispatch(&frame, detection);
                debug!(
                    "Frame #{}: {} boxes in {:?} ({} dispatched, {} degenerate, {} saturated, {} crop failures, frame age {:?})",
                    sequence,
                    detection.boxes.len(),
                    detection.inference_time,
                    summary.dispatched,
                    summary.degenerate,
                    summary.saturated,
                    summary.crop_failed,
                    frame.captured_at.elapsed()
                );
            }
        }

        self.write_snapshot(&frame, &outcome);
    }

    fn write_snapshot(&self, frame: &NormalizedFrame, outcome: &DetectionOutcome) {
        let Some(writer) = &self.snapshots else {
            return;
        };

        let mut overlay = self.state.read().overlay.clone();
        match outcome {
            DetectionOutcome::Empty => {
                overlay.clear();
            }
            DetectionOutcome::Detected(detection) => {
                overlay.reconcile(&detection.boxes);
            }
        }

        if let Err(e) = writer.write(frame.sequence, &frame.image, &overlay) {
            warn!("Snapshot failed: {:#}", e);
        }
    }
}
