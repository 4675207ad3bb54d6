//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Drain ring buffer → Vec<f32> (one chunk per iteration)
//! 2. Resample from the capture rate to the engine rate
//! 3. Quantize to i16
//! 4. Append to the full-recording sink
//! 5. Broadcast an activity event (RMS level meter)
//! 6. Feed the segmentation engine (cycle → split search → gate → outbox)
//! ```
//!
//! On stop the ring is drained to empty and the resampler remainder is
//! flushed through the same path, then the engine performs its final flush
//! and sends the end-of-stream sentinel.
//!
//! The entire loop runs in `spawn_blocking`, keeping the Tokio executor free
//! for host I/O.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    audio::resample::RateConverter,
    buffering::{segment::rms_i16, CaptureConsumer, Consumer},
    events::ActivityEvent,
    segmenting::{SegmentationEngine, SegmenterConfig},
    sink::RecordingSink,
};

/// Chunk size drained from the ring buffer per iteration.
/// 20 ms at 48 kHz = 960 samples; at 16 kHz = 320 samples. The stop flag is
/// re-checked every drain; once it drops, only what is already in the ring
/// remains to process.
const DRAIN_CHUNK: usize = 960;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub segmenter: SegmenterConfig,
    pub engine: SegmentationEngine,
    pub consumer: CaptureConsumer,
    pub running: Arc<AtomicBool>,
    pub activity_tx: broadcast::Sender<ActivityEvent>,
    pub sink: Arc<RecordingSink>,
    pub capture_sample_rate: u32,
}

/// Convert resampled f32 samples to the engine's i16 domain.
fn quantize_into(samples: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
    );
}

/// Run the blocking pipeline until `ctx.running` becomes false.
pub fn run(ctx: PipelineContext) {
    info!("pipeline started");

    let PipelineContext {
        segmenter,
        mut engine,
        mut consumer,
        running,
        activity_tx,
        sink,
        capture_sample_rate,
    } = ctx;

    let mut resampler = match RateConverter::new(
        capture_sample_rate,
        segmenter.sample_rate,
        DRAIN_CHUNK,
    ) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create resampler: {e}");
            // The consumer still needs its sentinel.
            engine.finish();
            return;
        }
    };

    // Scratch buffers, reused each iteration.
    let mut raw = vec![0f32; DRAIN_CHUNK];
    let mut quantized: Vec<i16> = Vec::with_capacity(DRAIN_CHUNK);
    let mut activity_seq = 0u64;

    loop {
        // Stop takes effect once the ring is empty; the capture callback
        // stops feeding it as soon as the flag drops, so nothing already
        // captured is left behind.
        let stopping = !running.load(Ordering::Relaxed);

        let n = consumer.pop_slice(&mut raw);
        if n == 0 {
            if stopping {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(SLEEP_EMPTY_MS));
            continue;
        }

        let resampled = resampler.process(&raw[..n]);
        if resampled.is_empty() {
            // Partial chunk, rubato is waiting for more input.
            continue;
        }

        quantize_into(&resampled, &mut quantized);
        sink.append(&quantized);

        let rms = rms_i16(&quantized);
        let _ = activity_tx.send(ActivityEvent {
            seq: activity_seq,
            rms,
            above_floor: rms >= segmenter.energy_floor,
        });
        activity_seq = activity_seq.saturating_add(1);

        if activity_seq % 50 == 0 {
            debug!(
                rms = format_args!("{:.1}", rms),
                pending = engine.pending_samples(),
                "audio level check"
            );
        }

        engine.ingest(&quantized);
    }

    // Push the resampler remainder through the same path before the final
    // flush so the tail of the last utterance is not lost.
    let tail = resampler.flush();
    if !tail.is_empty() {
        quantize_into(&tail, &mut quantized);
        sink.append(&quantized);
        engine.ingest(&quantized);
    }

    let summary = engine.finish();
    info!(
        captured_samples = sink.len(),
        emitted = summary.segments_emitted,
        rejected = summary.rejected_short + summary.rejected_quiet,
        "pipeline stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Duration;

    use crate::buffering::{create_capture_ring, Producer};
    use crate::outbox::{segment_channel, SegmentReceiver};
    use crate::segmenting::SegmenterDiagnostics;

    fn spawn_pipeline(
        config: SegmenterConfig,
        capture_rate: u32,
    ) -> (
        crate::buffering::CaptureProducer,
        Arc<AtomicBool>,
        Arc<RecordingSink>,
        SegmentReceiver,
        broadcast::Receiver<ActivityEvent>,
        thread::JoinHandle<()>,
    ) {
        let (producer, consumer) = create_capture_ring();
        let (seg_tx, seg_rx) = segment_channel(64);
        let (activity_tx, activity_rx) = broadcast::channel(256);
        let running = Arc::new(AtomicBool::new(true));
        let sink = Arc::new(RecordingSink::new(config.sample_rate));
        let engine = SegmentationEngine::new(
            config.clone(),
            seg_tx,
            Arc::new(SegmenterDiagnostics::default()),
        );

        let ctx = PipelineContext {
            segmenter: config,
            engine,
            consumer,
            running: Arc::clone(&running),
            activity_tx,
            sink: Arc::clone(&sink),
            capture_sample_rate: capture_rate,
        };
        let handle = thread::spawn(move || run(ctx));
        (producer, running, sink, seg_rx, activity_rx, handle)
    }

    #[test]
    fn quantize_scales_and_clamps() {
        let mut out = Vec::new();
        quantize_into(&[0.0, 0.5, -0.5, 2.0, -2.0], &mut out);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 16383);
        assert_eq!(out[2], -16383);
        assert_eq!(out[3], 32767);
        assert_eq!(out[4], -32767);
    }

    #[test]
    fn passthrough_audio_reaches_sink_and_final_segment() {
        let (mut producer, running, sink, mut seg_rx, _activity_rx, handle) =
            spawn_pipeline(SegmenterConfig::default(), 16_000);

        // 300 ms of loud audio at the engine rate: exactly the minimum
        // segment length after the stop-time flush.
        producer.push_slice(&vec![0.5f32; 4_800]);
        thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(sink.len(), 4_800);

        let segment = seg_rx.recv().expect("final flush segment");
        assert_eq!(segment.len(), 4_800);
        assert_eq!(segment.start_offset, 0);
        assert!(seg_rx.recv().is_none(), "sentinel must follow");
    }

    #[test]
    fn activity_events_carry_rms_and_floor_flag() {
        let (mut producer, running, _sink, _seg_rx, mut activity_rx, handle) =
            spawn_pipeline(SegmenterConfig::default(), 16_000);

        producer.push_slice(&vec![0.5f32; 960]);
        thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        let event = activity_rx.try_recv().expect("activity event");
        assert!(event.above_floor);
        assert!((event.rms - 16383.0).abs() < 64.0, "rms={}", event.rms);
    }

    #[test]
    fn stop_without_audio_delivers_only_the_sentinel() {
        let (_producer, running, sink, mut seg_rx, _activity_rx, handle) =
            spawn_pipeline(SegmenterConfig::default(), 16_000);

        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert!(sink.is_empty());
        assert!(seg_rx.recv().is_none());
    }

    #[test]
    fn stop_drains_samples_left_in_the_ring() {
        let (mut producer, consumer) = create_capture_ring();
        let (seg_tx, mut seg_rx) = segment_channel(8);
        let (activity_tx, _activity_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let config = SegmenterConfig::default();
        let sink = Arc::new(RecordingSink::new(config.sample_rate));
        let engine = SegmentationEngine::new(
            config.clone(),
            seg_tx,
            Arc::new(SegmenterDiagnostics::default()),
        );

        // Preload the ring, then stop before the loop ever runs. The audio
        // was captured, so it must still reach the sink and the engine.
        producer.push_slice(&vec![0.5f32; 4_800]);
        running.store(false, Ordering::SeqCst);

        run(PipelineContext {
            segmenter: config,
            engine,
            consumer,
            running,
            activity_tx,
            sink: Arc::clone(&sink),
            capture_sample_rate: 16_000,
        });

        assert_eq!(sink.len(), 4_800);
        let segment = seg_rx.recv().expect("preloaded audio still emitted");
        assert_eq!(segment.len(), 4_800);
        assert!(seg_rx.recv().is_none(), "sentinel must follow");
    }

    #[test]
    fn device_rate_audio_is_resampled_to_engine_rate() {
        let (mut producer, running, sink, mut seg_rx, _activity_rx, handle) =
            spawn_pipeline(SegmenterConfig::default(), 48_000);

        // 100 ms at 48 kHz; resamples to about 1600 samples at 16 kHz,
        // well below the minimum segment duration.
        producer.push_slice(&vec![0.5f32; 4_800]);
        thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        let captured = sink.len();
        assert!(
            (1_500..=1_700).contains(&captured),
            "captured={captured}, expected about 1600"
        );
        // The short take is rejected by the gate; only the sentinel arrives.
        assert!(seg_rx.recv().is_none());
    }
}
