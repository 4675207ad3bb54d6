//! Consumer worker: drains the segment queue on its own thread.
//!
//! The worker pulls until the end-of-stream sentinel, classifies each
//! delivery with the energy/ZCR detector and logs its metadata. Recognition
//! or enhancement would consume the samples at the same point; this host
//! only classifies and counts.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use caesura_core::{is_speech_bearing, EnergyZcrVad, SegmentInfo, SegmentReceiver};
use tracing::{info, warn};

/// Totals reported by the worker once the sentinel arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerReport {
    /// Segments delivered before the sentinel.
    pub segments: usize,
    /// Segments the majority vote classified as speech-bearing.
    pub speech_bearing: usize,
    /// Total duration of delivered audio, in milliseconds.
    pub audio_ms: u64,
}

/// Handle to a running worker thread.
pub struct SegmentWorker {
    handle: JoinHandle<()>,
    report_rx: Receiver<WorkerReport>,
}

/// Spawn the consumer thread for one recording.
pub fn spawn(segments: SegmentReceiver) -> SegmentWorker {
    let (report_tx, report_rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let mut vad = EnergyZcrVad::default();
        let mut report = WorkerReport::default();
        let mut seq = 0u64;

        for segment in segments {
            let speech_bearing = is_speech_bearing(&mut vad, &segment);
            let info = SegmentInfo::describe(seq, &segment, speech_bearing);
            info!(
                seq = info.seq,
                start_ms = info.start_ms,
                duration_ms = info.duration_ms,
                rms = format_args!("{:.1}", info.rms),
                speech_bearing = info.speech_bearing,
                "segment received"
            );

            report.segments += 1;
            if speech_bearing {
                report.speech_bearing += 1;
            }
            report.audio_ms += info.duration_ms;
            seq += 1;
        }

        // The iterator ends only at the sentinel (or a vanished producer).
        let _ = report_tx.send(report);
    });

    SegmentWorker { handle, report_rx }
}

impl SegmentWorker {
    /// Wait for the worker to drain the queue, bounded by `timeout`.
    ///
    /// Returns `None` when the worker does not finish in time; the thread is
    /// then left to run out on its own rather than blocking shutdown.
    pub fn join(self, timeout: Duration) -> Option<WorkerReport> {
        match self.report_rx.recv_timeout(timeout) {
            Ok(report) => {
                let _ = self.handle.join();
                Some(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "segment worker did not finish in time, detaching"
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("segment worker exited without a report");
                let _ = self.handle.join();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use caesura_core::outbox::segment_channel;
    use caesura_core::AudioSegment;

    #[test]
    fn worker_counts_deliveries_and_reports_after_sentinel() {
        let (tx, rx) = segment_channel(8);
        let worker = spawn(rx);

        // 600 ms of loud audio, then 300 ms of silence.
        tx.put(AudioSegment::new(vec![8_000; 9_600], 16_000, 0))
            .expect("queue open");
        tx.put(AudioSegment::new(vec![0; 4_800], 16_000, 9_600))
            .expect("queue open");
        tx.finish().expect("sentinel");

        let report = worker
            .join(Duration::from_secs(2))
            .expect("report within timeout");
        assert_eq!(report.segments, 2);
        assert_eq!(report.audio_ms, 900);
        // Constant DC has no zero crossings, silence has no energy: neither
        // passes the speech gate.
        assert_eq!(report.speech_bearing, 0);
    }

    #[test]
    fn join_times_out_when_no_sentinel_arrives() {
        let (tx, rx) = segment_channel(8);
        let worker = spawn(rx);

        // Sender kept alive, no sentinel: the worker stays blocked.
        let report = worker.join(Duration::from_millis(50));
        assert!(report.is_none());
        drop(tx);
    }
}
