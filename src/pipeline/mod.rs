//! Detection-to-recognition pipeline
//!
//! Wires the stages together:
//!
//! ```text
//! submit() -> LatestFrameSlot -> AnalysisWorker (normalize, detect)
//!                                   |-> PipelineEvent::Detection ------------> Reconciler -> SessionState
//!                                   '-> RecognitionDispatcher -> OCR tasks -> PipelineEvent::Recognition
//! ```
//!
//! The reconciler is the only writer of [`SessionState`]; presentation
//! reads copies through [`Pipeline::snapshot`] and listens on
//! [`Pipeline::presentation_events`].

pub mod events;
pub mod reconciler;
pub mod worker;

pub use events::{PipelineEvent, PresentationEvent};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::capture::{FrameSource, LatestFrameSlot, RawFrame};
use crate::config::AppConfig;
use crate::overlay::SnapshotWriter;
use crate::recognition::RecognitionDispatcher;
use crate::session::{CounterSnapshot, PipelineCounters, SessionState};
use crate::vision::{Detector, OcrEngine};

use reconciler::Reconciler;
use worker::AnalysisWorker;

/// Presentation notifications held for a slow or absent reader
pub const PRESENTATION_CAPACITY: usize = 256;

/// Statistics for a running or finished session
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub frames_submitted: u64,
    pub frames_superseded: u64,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    pub last_inference_ms: Option<u128>,
}

/// Running scanner session
pub struct Pipeline {
    slot: Arc<LatestFrameSlot>,
    state: Arc<RwLock<SessionState>>,
    counters: Arc<PipelineCounters>,
    events: Sender<PipelineEvent>,
    presentation: Receiver<PresentationEvent>,
    worker: Option<JoinHandle<()>>,
    reconciler: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the worker, the recognition runtime and the reconciler
    pub fn start(
        config: &AppConfig,
        detector: Box<dyn Detector>,
        engine: Arc<dyn OcrEngine>,
        snapshots: Option<SnapshotWriter>,
    ) -> Result<Self> {
        let slot = Arc::new(LatestFrameSlot::new());
        let state = Arc::new(RwLock::new(SessionState::default()));
        let counters = Arc::new(PipelineCounters::default());
        let (events_tx, events_rx) = unbounded();
        let (presentation_tx, presentation_rx) = bounded(PRESENTATION_CAPACITY);

        let reconciler = Reconciler::new(
            state.clone(),
            presentation_tx,
            counters.clone(),
            config.recognition.accept_orphaned_plates,
        );
        let reconciler_handle =
            reconciler::spawn(reconciler, events_rx).context("Failed to start reconciler thread")?;

        let dispatcher =
            RecognitionDispatcher::new(engine, &config.recognition, events_tx.clone(), counters.clone())?;

        let worker = AnalysisWorker::new(
            slot.clone(),
            detector,
            dispatcher,
            events_tx.clone(),
            counters.clone(),
            state.clone(),
        )
        .with_snapshots(snapshots);

        let worker_handle = std::thread::Builder::new()
            .name("plate-analysis".to_string())
            .spawn(move || worker.run())
            .context("Failed to start analysis thread")?;

        info!("Pipeline started");

        Ok(Self {
            slot,
            state,
            counters,
            events: events_tx,
            presentation: presentation_rx,
            worker: Some(worker_handle),
            reconciler: Some(reconciler_handle),
        })
    }

    /// Hand a frame to the analysis worker, replacing any frame still waiting.
    ///
    /// Returns the frame's sequence number, or `None` after shutdown.
    pub fn submit(&self, frame: RawFrame) -> Option<u64> {
        self.slot.submit(frame)
    }

    /// Feed every frame of `source`, pausing `interval` between frames
    pub fn run_source(&self, source: &mut dyn FrameSource, interval: Duration) -> Result<u64> {
        let mut submitted = 0;
        while let Some(frame) = source.next_frame()? {
            if self.submit(frame).is_none() {
                break;
            }
            submitted += 1;
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
        info!("Frame source closed after {} frames", submitted);
        Ok(submitted)
    }

    /// Receiver for presentation notifications.
    ///
    /// All receivers share one bounded queue. Notifications arriving while it
    /// is full are dropped and counted; session state is unaffected.
    pub fn presentation_events(&self) -> Receiver<PresentationEvent> {
        self.presentation.clone()
    }

    /// Copy of the session state, taken without holding the lock afterwards
    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn stats(&self) -> PipelineStats {
        let slot = self.slot.stats();
        PipelineStats {
            frames_submitted: slot.submitted,
            frames_superseded: slot.superseded,
            counters: self.counters.snapshot(),
            last_inference_ms: self.state.read().last_inference_time.map(|d| d.as_millis()),
        }
    }

    /// Wait until no frame is pending, no recognition is running and every
    /// resulting event has been applied. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while !(self.slot.is_idle() && self.counters.recognitions_pending() == 0) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let (ack_tx, ack_rx) = bounded(1);
        if self.events.send(PipelineEvent::Barrier(ack_tx)).is_err() {
            return false;
        }
        ack_rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .is_ok()
    }

    /// Stop accepting frames, release the worker and stop the reconciler.
    /// Outstanding recognition requests are abandoned.
    pub fn shutdown(&mut self) {
        self.slot.close();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Analysis worker panicked");
            }
        }

        let _ = self.events.send(PipelineEvent::Shutdown);
        if let Some(handle) = self.reconciler.take() {
            if handle.join().is_err() {
                warn!("Reconciler panicked");
            }
        }

        info!("Pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.worker.is_some() || self.reconciler.is_some() {
            self.shutdown();
        }
    }
}
