//! `RecordingSession`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! RecordingSession::new()
//!     └─► start()    → audio open, pipeline spawned, status = Recording,
//!         │            caller receives the SegmentReceiver
//!         └─► stop() → running=false, bounded wait for the pipeline's
//!                      final flush, status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS (COM / CoreAudio thread
//! affinity). `AudioCapture` is therefore created *inside* the
//! `spawn_blocking` closure so it never crosses a thread boundary. A sync
//! oneshot channel propagates any open-device errors back to the `start()`
//! caller; a second one carries the pipeline's completion signal so `stop()`
//! can wait for the final flush with a bounded timeout.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, RecvTimeoutError},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::AudioCapture,
    buffering::create_capture_ring,
    error::{CaesuraError, Result},
    events::{ActivityEvent, SessionStatus, StatusEvent},
    outbox::{segment_channel, SegmentReceiver, DEFAULT_QUEUE_CAPACITY},
    segmenting::{SegmentationEngine, SegmenterConfig, SegmenterDiagnostics, SegmenterSummary},
    sink::RecordingSink,
};

/// Broadcast channel capacity: 256 events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `RecordingSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Segmentation parameters, all in engine-rate samples/milliseconds.
    pub segmenter: SegmenterConfig,
    /// Bounded segment queue capacity, in segments. Default: 32.
    pub queue_capacity: usize,
    /// How long `stop()` waits for the pipeline's final flush before giving
    /// up and logging an error. Default: 2 s.
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stop_timeout: Duration::from_secs(2),
        }
    }
}

/// The top-level session handle.
///
/// `RecordingSession` is `Send + Sync`, all fields use interior mutability.
/// Wrap in `Arc<RecordingSession>` to share between the host command loop and
/// event-forwarding async tasks.
pub struct RecordingSession {
    config: SessionConfig,
    /// `true` while capture + pipeline are active.
    running: Arc<AtomicBool>,
    /// Canonical status (written atomically via Mutex, read from commands).
    status: Arc<Mutex<SessionStatus>>,
    /// Broadcast sender for status events.
    status_tx: broadcast::Sender<StatusEvent>,
    /// Broadcast sender for live level activity events.
    activity_tx: broadcast::Sender<ActivityEvent>,
    /// Full-recording accumulator, cleared on each `start()`.
    sink: Arc<RecordingSink>,
    /// Shared segmenter diagnostics counters.
    diagnostics: Arc<SegmenterDiagnostics>,
    /// Completion signal for the current pipeline run; replaced on `start()`.
    done_rx: Mutex<Option<Receiver<()>>>,
}

impl RecordingSession {
    /// Create a new session. Does not start capturing, call `start()`.
    pub fn new(config: SessionConfig) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let sink = Arc::new(RecordingSink::new(config.segmenter.sample_rate));
        let diagnostics = Arc::new(SegmenterDiagnostics::default());

        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            status_tx,
            activity_tx,
            sink,
            diagnostics,
            done_rx: Mutex::new(None),
        }
    }

    /// Start audio capture and the segmentation pipeline.
    ///
    /// Blocks until the audio device is confirmed open (or fails), then
    /// returns the receiving half of the segment queue. The pipeline
    /// continues running in a background blocking thread.
    ///
    /// # Errors
    /// - `CaesuraError::AlreadyRecording` if already started.
    /// - `CaesuraError::NoDefaultInputDevice` / `CaesuraError::AudioStream`
    ///   on device error.
    pub fn start(&self) -> Result<SegmentReceiver> {
        self.start_with_device(None)
    }

    /// Start the session using a preferred input device name.
    ///
    /// If `preferred_input_device` is `None`, default input selection is used.
    pub fn start_with_device(
        &self,
        preferred_input_device: Option<String>,
    ) -> Result<SegmentReceiver> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaesuraError::AlreadyRecording);
        }

        self.diagnostics.reset();
        self.sink.clear();
        self.running.store(true, Ordering::SeqCst);
        self.set_status(SessionStatus::Recording, None);

        let (producer, consumer) = create_capture_ring();
        let (seg_tx, seg_rx) = segment_channel(self.config.queue_capacity);

        // Clone all Arc-wrapped state before moving into the closure.
        let segmenter = self.config.segmenter.clone();
        let running = Arc::clone(&self.running);
        let activity_tx = self.activity_tx.clone();
        let sink = Arc::clone(&self.sink);
        let diagnostics = Arc::clone(&self.diagnostics);

        // Sync oneshot: pipeline thread signals open success/failure to
        // start(). Carries the actual capture sample rate on success.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();
        // Second oneshot: fires when the pipeline's final flush is done.
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

        tokio::task::spawn_blocking(move || {
            // ── Open audio device (must happen on THIS thread, cpal::Stream is !Send) ──
            let capture = match AudioCapture::open_with_preference(
                producer,
                Arc::clone(&running),
                preferred_input_device.as_deref(),
            ) {
                Ok(c) => {
                    let _ = open_tx.send(Ok(c.sample_rate));
                    c
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let capture_sample_rate = capture.sample_rate;
            let engine = SegmentationEngine::new(segmenter.clone(), seg_tx, diagnostics);

            // ── Run pipeline ──────────────────────────────────────────────────────────
            pipeline::run(pipeline::PipelineContext {
                segmenter,
                engine,
                consumer,
                running,
                activity_tx,
                sink,
                capture_sample_rate,
            });

            // Stream drops here, releasing the audio device on this thread.
            drop(capture);
            let _ = done_tx.send(());
        });

        // Block start() until device open is confirmed (receives actual sample rate).
        match open_rx.recv() {
            Ok(Ok(rate)) => {
                *self.done_rx.lock() = Some(done_rx);
                info!(capture_sample_rate = rate, "session started, recording");
                Ok(seg_rx)
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent: spawn_blocking panicked?
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some("pipeline failed to start".into()));
                Err(CaesuraError::Other(anyhow::anyhow!(
                    "pipeline task died unexpectedly"
                )))
            }
        }
    }

    /// Stop audio capture and wait for the pipeline's final flush.
    ///
    /// After this returns, the remainder segment (if any) and the
    /// end-of-stream sentinel have been pushed into the segment queue.
    ///
    /// # Errors
    /// - `CaesuraError::NotRecording` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CaesuraError::NotRecording);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("session stop requested");

        if let Some(done_rx) = self.done_rx.lock().take() {
            match done_rx.recv_timeout(self.config.stop_timeout) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    error!(
                        timeout_ms = self.config.stop_timeout.as_millis() as u64,
                        "pipeline did not finish within the stop timeout"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("pipeline thread exited without a completion signal");
                }
            }
        }

        self.set_status(SessionStatus::Stopped, None);
        Ok(())
    }

    /// Current session status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to live audio activity events (RMS level + floor flag).
    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Snapshot of segmenter counters for observability.
    pub fn diagnostics_snapshot(&self) -> SegmenterSummary {
        self.diagnostics.snapshot()
    }

    /// The full-recording accumulator (every sample captured this session).
    pub fn recording(&self) -> Arc<RecordingSink> {
        Arc::clone(&self.sink)
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(StatusEvent {
            status: new_status,
            detail,
        });
    }
}
