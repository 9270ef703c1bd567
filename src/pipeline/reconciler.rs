//! Session state reconciler
//!
//! Drains [`PipelineEvent`]s in arrival order and applies them to the
//! session. A detection pass is always queued before the recognition
//! requests it starts, so overlay purges land before any result that could
//! refer to a departed box.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::events::{PipelineEvent, PresentationEvent};
use crate::recognition::{validate, RecognitionOutcome};
use crate::session::{PipelineCounters, SessionState};
use crate::vision::{BoundingBox, DetectionOutcome};

/// Whether the reconciler should keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Reconciler {
    state: Arc<RwLock<SessionState>>,
    presentation: Sender<PresentationEvent>,
    counters: Arc<PipelineCounters>,
    accept_orphaned_plates: bool,
}

impl Reconciler {
    pub fn new(
        state: Arc<RwLock<SessionState>>,
        presentation: Sender<PresentationEvent>,
        counters: Arc<PipelineCounters>,
        accept_orphaned_plates: bool,
    ) -> Self {
        Self {
            state,
            presentation,
            counters,
            accept_orphaned_plates,
        }
    }

    /// Apply events until shutdown or until every sender is gone
    pub fn run(self, events: Receiver<PipelineEvent>) {
        info!("Reconciler started");
        for event in events.iter() {
            if self.apply(event) == Flow::Stop {
                break;
            }
        }
        info!("Reconciler stopped");
    }

    /// Apply one event
    pub fn apply(&self, event: PipelineEvent) -> Flow {
        let notifications = match event {
            PipelineEvent::Detection(outcome) => self.apply_detection(outcome),
            PipelineEvent::Recognition(RecognitionOutcome::Recognized { bbox, sequence, text }) => {
                self.apply_text(bbox, sequence, text)
            }
            PipelineEvent::Recognition(RecognitionOutcome::Failed { bbox, sequence, reason }) => {
                debug!("Frame #{}: recognition failed for {:?}", sequence, bbox);
                self.state.write().set_error(reason.clone());
                vec![PresentationEvent::RecognitionFailed { reason }]
            }
            PipelineEvent::Barrier(ack) => {
                let _ = ack.send(());
                Vec::new()
            }
            PipelineEvent::Shutdown => return Flow::Stop,
        };

        for notification in notifications {
            // State is authoritative; a full or abandoned queue only loses notifications
            if let Err(TrySendError::Full(_)) = self.presentation.try_send(notification) {
                PipelineCounters::bump(&self.counters.presentation_dropped);
            }
        }

        Flow::Continue
    }

    fn apply_detection(&self, outcome: DetectionOutcome) -> Vec<PresentationEvent> {
        let mut state = self.state.write();

        match outcome {
            DetectionOutcome::Empty => {
                state.last_inference_time = Some(Duration::ZERO);
                if state.overlay.clear() {
                    debug!("Overlay cleared");
                    vec![PresentationEvent::EmptyDetection]
                } else {
                    Vec::new()
                }
            }
            DetectionOutcome::Detected(frame) => {
                state.last_inference_time = Some(frame.inference_time);
                if state.overlay.reconcile(&frame.boxes) {
                    debug!(
                        "Frame #{}: overlay now tracks {} boxes ({} labelled)",
                        frame.sequence,
                        frame.boxes.len(),
                        state.overlay.labelled_count()
                    );
                }
                vec![PresentationEvent::Detection {
                    boxes: frame.boxes,
                    inference_time: frame.inference_time,
                }]
            }
        }
    }

    fn apply_text(&self, bbox: BoundingBox, sequence: u64, text: String) -> Vec<PresentationEvent> {
        let mut state = self.state.write();
        let current = state.overlay.is_current(&bbox);

        if !current && !self.accept_orphaned_plates {
            debug!("Frame #{}: discarding result for departed box", sequence);
            PipelineCounters::bump(&self.counters.stale_results);
            return Vec::new();
        }

        let plate = match validate(&text) {
            Ok(plate) => plate,
            Err(rejection) => {
                debug!("Frame #{}: '{}' rejected ({})", sequence, text, rejection);
                PipelineCounters::bump(&self.counters.candidates_rejected);
                return Vec::new();
            }
        };

        let mut notifications = Vec::new();

        if state.registry.insert(plate.clone()) {
            info!("Accepted plate {}", plate);
            PipelineCounters::bump(&self.counters.plates_accepted);
            notifications.push(PresentationEvent::PlateAccepted(plate));
        }

        if current {
            state.overlay.attach_text(&bbox, text.clone());
            notifications.push(PresentationEvent::BoxTextUpdated { bbox, text });
        } else {
            PipelineCounters::bump(&self.counters.stale_results);
        }

        notifications
    }
}

/// Run the reconciler on its own thread
pub fn spawn(reconciler: Reconciler, events: Receiver<PipelineEvent>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("plate-reconciler".to_string())
        .spawn(move || {
            reconciler.run(events);
        })
        .inspect_err(|e| warn!("Failed to spawn reconciler: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::DetectionFrame;
    use crossbeam_channel::unbounded;

    struct Harness {
        reconciler: Reconciler,
        state: Arc<RwLock<SessionState>>,
        counters: Arc<PipelineCounters>,
        presented: Receiver<PresentationEvent>,
    }

    fn harness(accept_orphaned_plates: bool) -> Harness {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let counters = Arc::new(PipelineCounters::default());
        let (tx, presented) = unbounded();
        Harness {
            reconciler: Reconciler::new(state.clone(), tx, counters.clone(), accept_orphaned_plates),
            state,
            counters,
            presented,
        }
    }

    fn bx(x1: f32) -> BoundingBox {
        BoundingBox::new(x1, 0.4, x1 + 0.2, 0.5)
    }

    fn detected(sequence: u64, boxes: Vec<BoundingBox>) -> PipelineEvent {
        PipelineEvent::Detection(DetectionOutcome::Detected(DetectionFrame::new(
            sequence,
            boxes,
            Duration::from_millis(20),
        )))
    }

    fn recognized(bbox: BoundingBox, sequence: u64, text: &str) -> PipelineEvent {
        PipelineEvent::Recognition(RecognitionOutcome::Recognized {
            bbox,
            sequence,
            text: text.to_string(),
        })
    }

    fn drain(rx: &Receiver<PresentationEvent>) -> Vec<PresentationEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_valid_text_accepted_and_attached() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        h.reconciler.apply(recognized(bx(0.1), 0, "a123 bc"));

        let state = h.state.read();
        assert_eq!(state.registry.display_text(), "A123BC");
        // Raw text goes on the overlay, not the validated form
        assert_eq!(state.overlay.label(&bx(0.1)), Some("a123 bc"));
        assert_eq!(state.last_inference_time, Some(Duration::from_millis(20)));

        let events = drain(&h.presented);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], PresentationEvent::Detection { .. }));
        assert_eq!(events[1], PresentationEvent::PlateAccepted(validate("A123BC").unwrap()));
        assert_eq!(
            events[2],
            PresentationEvent::BoxTextUpdated { bbox: bx(0.1), text: "a123 bc".to_string() }
        );
    }

    #[test]
    fn test_invalid_text_silently_dropped() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        drain(&h.presented);

        h.reconciler.apply(recognized(bx(0.1), 0, "HELLO"));

        assert!(h.state.read().registry.is_empty());
        assert_eq!(h.state.read().overlay.label(&bx(0.1)), None);
        assert!(drain(&h.presented).is_empty());
        assert_eq!(h.counters.snapshot().candidates_rejected, 1);
    }

    #[test]
    fn test_duplicate_plate_only_updates_label() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1), bx(0.5)]));
        h.reconciler.apply(recognized(bx(0.1), 0, "A123BC"));
        drain(&h.presented);

        h.reconciler.apply(recognized(bx(0.5), 0, "A 123 BC"));

        assert_eq!(h.state.read().registry.len(), 1);
        let events = drain(&h.presented);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PresentationEvent::BoxTextUpdated { .. }));
    }

    #[test]
    fn test_stale_result_does_not_touch_overlay() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        h.reconciler.apply(detected(1, vec![bx(0.5)]));
        drain(&h.presented);

        h.reconciler.apply(recognized(bx(0.1), 0, "A123BC"));

        let state = h.state.read();
        assert_eq!(state.overlay.label(&bx(0.1)), None);
        assert_eq!(state.overlay.labelled_count(), 0);
        assert!(state.registry.is_empty());
        assert!(drain(&h.presented).is_empty());
        assert_eq!(h.counters.snapshot().stale_results, 1);
    }

    #[test]
    fn test_orphaned_plate_accepted_when_enabled() {
        let h = harness(true);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        h.reconciler.apply(PipelineEvent::Detection(DetectionOutcome::Empty));
        drain(&h.presented);

        h.reconciler.apply(recognized(bx(0.1), 0, "A123BC"));

        let state = h.state.read();
        assert_eq!(state.registry.len(), 1);
        assert!(state.overlay.is_empty());
        assert_eq!(
            drain(&h.presented),
            vec![PresentationEvent::PlateAccepted(validate("A123BC").unwrap())]
        );
    }

    #[test]
    fn test_same_box_in_next_frame_keeps_result() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        h.reconciler.apply(detected(1, vec![bx(0.1), bx(0.5)]));

        h.reconciler.apply(recognized(bx(0.1), 0, "A123BC"));
        assert_eq!(h.state.read().overlay.label(&bx(0.1)), Some("A123BC"));
    }

    #[test]
    fn test_empty_detection_clears_once() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        h.reconciler.apply(recognized(bx(0.1), 0, "A123BC"));
        drain(&h.presented);

        h.reconciler.apply(PipelineEvent::Detection(DetectionOutcome::Empty));
        h.reconciler.apply(PipelineEvent::Detection(DetectionOutcome::Empty));

        let state = h.state.read();
        assert!(state.overlay.is_empty());
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.last_inference_time, Some(Duration::ZERO));
        assert_eq!(drain(&h.presented), vec![PresentationEvent::EmptyDetection]);
    }

    #[test]
    fn test_failure_is_diagnostic_only() {
        let h = harness(false);
        h.reconciler.apply(detected(0, vec![bx(0.1)]));
        drain(&h.presented);

        h.reconciler.apply(PipelineEvent::Recognition(RecognitionOutcome::Failed {
            bbox: bx(0.1),
            sequence: 0,
            reason: "engine busy".to_string(),
        }));

        let state = h.state.read();
        assert_eq!(state.overlay.entries().count(), 1);
        assert_eq!(state.overlay.labelled_count(), 0);
        assert_eq!(state.last_error.as_deref(), Some("engine busy"));
        assert_eq!(
            drain(&h.presented),
            vec![PresentationEvent::RecognitionFailed { reason: "engine busy".to_string() }]
        );
    }

    #[test]
    fn test_barrier_and_shutdown() {
        let h = harness(false);
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);

        assert_eq!(h.reconciler.apply(PipelineEvent::Barrier(ack_tx)), Flow::Continue);
        assert!(ack_rx.try_recv().is_ok());
        assert_eq!(h.reconciler.apply(PipelineEvent::Shutdown), Flow::Stop);
    }

    #[test]
    fn test_full_presentation_queue_drops_notifications() {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let counters = Arc::new(PipelineCounters::default());
        let (tx, presented) = crossbeam_channel::bounded(1);
        let reconciler = Reconciler::new(state.clone(), tx, counters.clone(), false);

        reconciler.apply(detected(0, vec![bx(0.1)]));
        reconciler.apply(recognized(bx(0.1), 0, "A123BC"));

        // State is applied even though only the first notification fit
        assert_eq!(state.read().registry.len(), 1);
        assert_eq!(state.read().overlay.label(&bx(0.1)), Some("A123BC"));
        assert_eq!(presented.len(), 1);
        assert_eq!(counters.snapshot().presentation_dropped, 2);
    }
}
