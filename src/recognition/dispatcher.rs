//! Recognition dispatcher
//!
//! Crops every box of a detection pass out of the frame it was found in and
//! hands the crop to the OCR engine on a tokio runtime. Completions are
//! posted back as [`PipelineEvent::Recognition`] messages; nothing here
//! touches session state.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use image::RgbaImage;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::RecognitionOutcome;
use crate::config::RecognitionSettings;
use crate::error::PipelineError;
use crate::pipeline::events::PipelineEvent;
use crate::session::stats::PipelineCounters;
use crate::vision::{clean_recognized_text, crop_box, BoundingBox, DetectionFrame, NormalizedFrame, OcrEngine};

/// One crop bound to the box it came from
#[derive(Debug)]
pub struct RecognitionTask {
    /// Box the crop was taken from
    pub bbox: BoundingBox,
    /// Frame the box was detected in
    pub sequence: u64,
    /// Cropped plate image
    pub crop: RgbaImage,
}

impl RecognitionTask {
    /// Run the OCR request and turn its result into an outcome.
    ///
    /// Returns `None` when the engine succeeded but produced no text.
    pub async fn run(self, engine: Arc<dyn OcrEngine>, timeout: Option<Duration>) -> Option<RecognitionOutcome> {
        let RecognitionTask { bbox, sequence, crop } = self;

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, engine.recognize(crop)).await {
                Ok(result) => result.map_err(PipelineError::OcrFailure),
                Err(_) => Err(PipelineError::OcrTimeout(limit)),
            },
            None => engine.recognize(crop).await.map_err(PipelineError::OcrFailure),
        };

        match result {
            Ok(text) => match clean_recognized_text(&text) {
                Some(text) => Some(RecognitionOutcome::Recognized { bbox, sequence, text }),
                None => {
                    debug!("Frame #{}: recognizer returned no text", sequence);
                    None
                }
            },
            Err(e) => Some(RecognitionOutcome::Failed {
                bbox,
                sequence,
                reason: e.reason(),
            }),
        }
    }
}

/// What happened to the boxes of one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Recognition requests started
    pub dispatched: usize,
    /// Boxes with non-positive pixel size
    pub degenerate: usize,
    /// Boxes skipped because the in-flight cap was reached
    pub saturated: usize,
    /// Boxes whose crop failed
    pub crop_failed: usize,
}

/// Fans recognition requests out to the OCR engine
pub struct RecognitionDispatcher {
    runtime: Option<Runtime>,
    engine: Arc<dyn OcrEngine>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    events: Sender<PipelineEvent>,
    counters: Arc<PipelineCounters>,
}

impl RecognitionDispatcher {
    /// Create a dispatcher with its own runtime
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        settings: &RecognitionSettings,
        events: Sender<PipelineEvent>,
        counters: Arc<PipelineCounters>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.worker_threads.max(1))
            .thread_name("plate-ocr")
            .enable_all()
            .build()
            .context("Failed to build recognition runtime")?;

        let capacity = settings.max_in_flight.max(1);
        info!(
            "Recognition dispatcher ready ({} threads, {} in flight, timeout {:?})",
            settings.worker_threads.max(1),
            capacity,
            settings.timeout()
        );

        Ok(Self {
            runtime: Some(runtime),
            engine,
            permits: Arc::new(Semaphore::new(capacity)),
            timeout: settings.timeout(),
            events,
            counters,
        })
    }

    /// Start one recognition request per usable box of `detection`
    pub fn dispatch(&self, frame: &NormalizedFrame, detection: &DetectionFrame) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        let Some(runtime) = &self.runtime else {
            return summary;
        };

        for bbox in &detection.boxes {
            let crop = match crop_box(&frame.image, bbox) {
                Ok(crop) => crop,
                Err(PipelineError::EmptyCrop) => {
                    debug!("Frame #{}: skipping degenerate box {:?}", frame.sequence, bbox);
                    summary.degenerate += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Frame #{}: {}", frame.sequence, e);
                    summary.crop_failed += 1;
                    PipelineCounters::bump(&self.counters.recognitions_failed);
                    let _ = self.events.send(PipelineEvent::Recognition(RecognitionOutcome::Failed {
                        bbox: bbox.clone(),
                        sequence: frame.sequence,
                        reason: e.reason(),
                    }));
                    continue;
                }
            };

            let Some(permit) = self.try_permit() else {
                debug!("Frame #{}: recognition saturated, skipping box", frame.sequence);
                summary.saturated += 1;
                PipelineCounters::bump(&self.counters.recognitions_skipped);
                continue;
            };

            let task = RecognitionTask {
                bbox: bbox.clone(),
                sequence: frame.sequence,
                crop,
            };

            let engine = self.engine.clone();
            let timeout = self.timeout;
            let events = self.events.clone();
            let counters = self.counters.clone();

            summary.dispatched += 1;
            PipelineCounters::bump(&self.counters.recognitions_dispatched);

            runtime.spawn(async move {
                let outcome = task.run(engine, timeout).await;
                drop(permit);

                if let Some(outcome) = outcome {
                    if let RecognitionOutcome::Failed { reason, .. } = &outcome {
                        warn!("Text recognition failed: {}", reason);
                        PipelineCounters::bump(&counters.recognitions_failed);
                    }
                    // Receiver gone means the session is shutting down
                    let _ = events.send(PipelineEvent::Recognition(outcome));
                }

                // Bumped after the send so a drained counter implies a queued event
                counters.recognitions_completed.fetch_add(1, Ordering::Release);
            });
        }

        summary
    }

    fn try_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().try_acquire_owned().ok()
    }

    /// Stop the runtime without waiting for outstanding requests
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            info!("Recognition dispatcher stopped");
        }
    }
}

impl Drop for RecognitionDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crossbeam_channel::unbounded;

    struct FixedOcr(Result<String, String>);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _image: RgbaImage) -> Result<String, String> {
            self.0.clone()
        }
    }

    struct SlowOcr(Duration);

    #[async_trait]
    impl OcrEngine for SlowOcr {
        async fn recognize(&self, _image: RgbaImage) -> Result<String, String> {
            tokio::time::sleep(self.0).await;
            Ok("A123BC".to_string())
        }
    }

    fn settings(max_in_flight: usize, timeout_ms: u64) -> RecognitionSettings {
        RecognitionSettings {
            worker_threads: 1,
            max_in_flight,
            timeout_ms,
            accept_orphaned_plates: false,
        }
    }

    fn frame() -> NormalizedFrame {
        NormalizedFrame {
            sequence: 7,
            image: Arc::new(RgbaImage::new(100, 50)),
            captured_at: std::time::Instant::now(),
        }
    }

    fn detection(boxes: Vec<BoundingBox>) -> DetectionFrame {
        DetectionFrame::new(7, boxes, Duration::from_millis(5))
    }

    fn recv(rx: &crossbeam_channel::Receiver<PipelineEvent>) -> RecognitionOutcome {
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            PipelineEvent::Recognition(outcome) => outcome,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_recognized_text_is_cleaned() {
        let (tx, rx) = unbounded();
        let engine = Arc::new(FixedOcr(Ok(" A123\nBC ".to_string())));
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(4, 0), tx, Arc::default()).unwrap();

        let bbox = BoundingBox::new(0.1, 0.1, 0.5, 0.5);
        let summary = dispatcher.dispatch(&frame(), &detection(vec![bbox.clone()]));
        assert_eq!(summary.dispatched, 1);

        assert_eq!(
            recv(&rx),
            RecognitionOutcome::Recognized { bbox, sequence: 7, text: "A123 BC".to_string() }
        );
    }

    #[test]
    fn test_engine_failure_reported() {
        let (tx, rx) = unbounded();
        let engine = Arc::new(FixedOcr(Err("model not loaded".to_string())));
        let counters = Arc::new(PipelineCounters::default());
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(4, 0), tx, counters.clone()).unwrap();

        let bbox = BoundingBox::new(0.0, 0.0, 0.5, 0.5);
        dispatcher.dispatch(&frame(), &detection(vec![bbox.clone()]));

        assert_eq!(
            recv(&rx),
            RecognitionOutcome::Failed { bbox, sequence: 7, reason: "model not loaded".to_string() }
        );
    }

    #[test]
    fn test_degenerate_and_out_of_bounds_boxes() {
        let (tx, rx) = unbounded();
        let engine = Arc::new(FixedOcr(Ok("A123BC".to_string())));
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(4, 0), tx, Arc::default()).unwrap();

        let outside = BoundingBox::new(0.9, 0.1, 1.3, 0.3);
        let boxes = vec![BoundingBox::new(0.5, 0.1, 0.4, 0.3), outside.clone()];
        let summary = dispatcher.dispatch(&frame(), &detection(boxes));

        assert_eq!(summary.degenerate, 1);
        assert_eq!(summary.crop_failed, 1);
        assert_eq!(summary.dispatched, 0);
        match recv(&rx) {
            RecognitionOutcome::Failed { bbox, .. } => assert_eq!(bbox, outside),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_empty_text_produces_no_event() {
        let (tx, rx) = unbounded();
        let engine = Arc::new(FixedOcr(Ok(" \n ".to_string())));
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(4, 0), tx, Arc::default()).unwrap();

        dispatcher.dispatch(&frame(), &detection(vec![BoundingBox::new(0.0, 0.0, 0.5, 0.5)]));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_timeout_reported_as_failure() {
        let (tx, rx) = unbounded();
        let engine = Arc::new(SlowOcr(Duration::from_secs(5)));
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(4, 20), tx, Arc::default()).unwrap();

        dispatcher.dispatch(&frame(), &detection(vec![BoundingBox::new(0.0, 0.0, 0.5, 0.5)]));

        match recv(&rx) {
            RecognitionOutcome::Failed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_in_flight_cap_skips_boxes() {
        let (tx, _rx) = unbounded();
        let engine = Arc::new(SlowOcr(Duration::from_millis(300)));
        let dispatcher =
            RecognitionDispatcher::new(engine, &settings(2, 0), tx, Arc::default()).unwrap();

        let boxes = vec![
            BoundingBox::new(0.0, 0.0, 0.2, 0.2),
            BoundingBox::new(0.3, 0.0, 0.5, 0.2),
            BoundingBox::new(0.6, 0.0, 0.8, 0.2),
        ];
        let summary = dispatcher.dispatch(&frame(), &detection(boxes));

        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.saturated, 1);
    }
}
