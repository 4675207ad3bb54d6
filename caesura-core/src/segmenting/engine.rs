//! The segmentation engine: owns the cycle buffer and the carry-over,
//! drives the split search, and pushes gated segments to the outbox.
//!
//! Exclusively owned by the processing thread; no locking on the buffers.
//! Accounting invariant, checked by the unit tests: at any instant
//! `resolved + carry.len() + buffer.len() == samples ingested`, where
//! `resolved` is the total length of candidates already pushed through the
//! gate (accepted or rejected; rejection never returns audio to the stream).

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use tracing::{debug, info, warn};

use crate::buffering::segment::{rms_i16, AudioSegment};
use crate::outbox::SegmentSender;
use crate::segmenting::{
    precheck::{PrecheckGate, PrecheckVerdict},
    splitter, SegmenterConfig,
};

pub struct SegmenterDiagnostics {
    pub samples_in: AtomicU64,
    pub samples_emitted: AtomicU64,
    pub samples_rejected: AtomicU64,
    pub samples_lost: AtomicU64,
    pub cycles_processed: AtomicUsize,
    pub splits_found: AtomicUsize,
    pub forced_cuts: AtomicUsize,
    pub segments_emitted: AtomicUsize,
    pub rejected_short: AtomicUsize,
    pub rejected_quiet: AtomicUsize,
    pub delivery_failures: AtomicUsize,
}

impl Default for SegmenterDiagnostics {
    fn default() -> Self {
        Self {
            samples_in: AtomicU64::new(0),
            samples_emitted: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            samples_lost: AtomicU64::new(0),
            cycles_processed: AtomicUsize::new(0),
            splits_found: AtomicUsize::new(0),
            forced_cuts: AtomicUsize::new(0),
            segments_emitted: AtomicUsize::new(0),
            rejected_short: AtomicUsize::new(0),
            rejected_quiet: AtomicUsize::new(0),
            delivery_failures: AtomicUsize::new(0),
        }
    }
}

impl SegmenterDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.samples_emitted.store(0, Ordering::Relaxed);
        self.samples_rejected.store(0, Ordering::Relaxed);
        self.samples_lost.store(0, Ordering::Relaxed);
        self.cycles_processed.store(0, Ordering::Relaxed);
        self.splits_found.store(0, Ordering::Relaxed);
        self.forced_cuts.store(0, Ordering::Relaxed);
        self.segments_emitted.store(0, Ordering::Relaxed);
        self.rejected_short.store(0, Ordering::Relaxed);
        self.rejected_quiet.store(0, Ordering::Relaxed);
        self.delivery_failures.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SegmenterSummary {
        SegmenterSummary {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            samples_emitted: self.samples_emitted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            samples_lost: self.samples_lost.load(Ordering::Relaxed),
            cycles_processed: self.cycles_processed.load(Ordering::Relaxed),
            splits_found: self.splits_found.load(Ordering::Relaxed),
            forced_cuts: self.forced_cuts.load(Ordering::Relaxed),
            segments_emitted: self.segments_emitted.load(Ordering::Relaxed),
            rejected_short: self.rejected_short.load(Ordering::Relaxed),
            rejected_quiet: self.rejected_quiet.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the segmenter counters. Also serves as the final
/// summary returned by [`SegmentationEngine::finish`].
#[derive(Debug, Clone, Copy)]
pub struct SegmenterSummary {
    pub samples_in: u64,
    pub samples_emitted: u64,
    pub samples_rejected: u64,
    pub samples_lost: u64,
    pub cycles_processed: usize,
    pub splits_found: usize,
    pub forced_cuts: usize,
    pub segments_emitted: usize,
    pub rejected_short: usize,
    pub rejected_quiet: usize,
    pub delivery_failures: usize,
}

pub struct SegmentationEngine {
    config: SegmenterConfig,
    gate: PrecheckGate,
    outbox: SegmentSender,
    /// Samples accumulated since the last cycle boundary. Always shorter
    /// than one cycle outside `ingest`.
    buffer: Vec<i16>,
    /// Unresolved audio from prior cycles, chronologically before `buffer`.
    carry: Vec<i16>,
    /// Absolute stream offset of `carry[0]`; advances whenever a candidate
    /// goes through the gate, whatever the verdict.
    base_offset: u64,
    /// Total samples ever ingested.
    ingested: u64,
    diagnostics: Arc<SegmenterDiagnostics>,
}

impl SegmentationEngine {
    pub fn new(
        config: SegmenterConfig,
        outbox: SegmentSender,
        diagnostics: Arc<SegmenterDiagnostics>,
    ) -> Self {
        let gate = PrecheckGate::new(&config);
        let cycle = config.cycle_samples();
        Self {
            config,
            gate,
            outbox,
            buffer: Vec::with_capacity(cycle),
            carry: Vec::new(),
            base_offset: 0,
            ingested: 0,
            diagnostics,
        }
    }

    /// Total samples ingested so far.
    pub fn samples_ingested(&self) -> u64 {
        self.ingested
    }

    /// Samples not yet resolved into a gated candidate (carry + buffer).
    pub fn pending_samples(&self) -> usize {
        self.carry.len() + self.buffer.len()
    }

    /// Current carry-over length in samples.
    pub fn carry_samples(&self) -> usize {
        self.carry.len()
    }

    /// Feed one frame batch. Any batch size is tolerated; an oversized batch
    /// drains as many full cycles as it completes.
    pub fn ingest(&mut self, frame: &[i16]) {
        if frame.is_empty() {
            return;
        }

        self.buffer.extend_from_slice(frame);
        self.ingested += frame.len() as u64;
        self.diagnostics
            .samples_in
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        let cycle_len = self.config.cycle_samples();
        while self.buffer.len() >= cycle_len {
            let cycle: Vec<i16> = self.buffer.drain(..cycle_len).collect();
            self.process_cycle(cycle);
        }
    }

    fn process_cycle(&mut self, cycle: Vec<i16>) {
        self.diagnostics
            .cycles_processed
            .fetch_add(1, Ordering::Relaxed);

        let cycle_rms = rms_i16(&cycle);
        let threshold = splitter::effective_threshold(cycle_rms, &self.config);
        let split = splitter::find_split_point(
            &cycle,
            threshold,
            self.config.search_margin_samples(),
            self.config.search_step_samples(),
        );

        debug!(
            cycle_rms = format_args!("{:.1}", cycle_rms),
            threshold = format_args!("{:.1}", threshold),
            split = ?split,
            carry = self.carry.len(),
            "cycle processed"
        );

        match split {
            Some(p) => {
                self.diagnostics.splits_found.fetch_add(1, Ordering::Relaxed);
                let mut candidate = std::mem::take(&mut self.carry);
                candidate.extend_from_slice(&cycle[..p]);
                self.gate_and_emit(candidate);
                self.carry = cycle[p..].to_vec();
            }
            None => {
                // Continuous speech spans the whole scan region; keep
                // accumulating until a pause shows up or the cap is hit.
                self.carry.extend_from_slice(&cycle);
                if self.carry.len() >= self.config.max_segment_samples() {
                    warn!(
                        carried = self.carry.len(),
                        "carry-over reached the maximum segment span, forcing a cut"
                    );
                    self.diagnostics.forced_cuts.fetch_add(1, Ordering::Relaxed);
                    let candidate = std::mem::take(&mut self.carry);
                    self.gate_and_emit(candidate);
                }
            }
        }
    }

    /// Push one candidate through the gate. The stream position advances by
    /// the candidate length regardless of the verdict; rejected audio is
    /// gone from the segment stream (the recording sink still has it).
    fn gate_and_emit(&mut self, samples: Vec<i16>) {
        if samples.is_empty() {
            debug!("discarding empty candidate");
            return;
        }

        let len = samples.len();
        let segment = AudioSegment::new(samples, self.config.sample_rate, self.base_offset);
        self.base_offset += len as u64;

        match self.gate.check(&segment) {
            PrecheckVerdict::Accept => {
                let start_ms = segment.start_ms();
                let duration_ms = segment.duration_ms();
                let rms = segment.rms();
                match self.outbox.put(segment) {
                    Ok(()) => {
                        self.diagnostics
                            .segments_emitted
                            .fetch_add(1, Ordering::Relaxed);
                        self.diagnostics
                            .samples_emitted
                            .fetch_add(len as u64, Ordering::Relaxed);
                        info!(
                            start_ms,
                            duration_ms,
                            rms = format_args!("{:.1}", rms),
                            "segment emitted"
                        );
                    }
                    Err(e) => {
                        self.diagnostics
                            .delivery_failures
                            .fetch_add(1, Ordering::Relaxed);
                        self.diagnostics
                            .samples_lost
                            .fetch_add(len as u64, Ordering::Relaxed);
                        warn!(error = %e, samples = len, "segment delivery failed, consumer is gone");
                    }
                }
            }
            PrecheckVerdict::TooShort => {
                self.diagnostics.rejected_short.fetch_add(1, Ordering::Relaxed);
                self.diagnostics
                    .samples_rejected
                    .fetch_add(len as u64, Ordering::Relaxed);
                debug!(
                    samples = len,
                    min_samples = self.config.min_segment_samples(),
                    "segment rejected: below minimum duration"
                );
            }
            PrecheckVerdict::TooQuiet => {
                self.diagnostics.rejected_quiet.fetch_add(1, Ordering::Relaxed);
                self.diagnostics
                    .samples_rejected
                    .fetch_add(len as u64, Ordering::Relaxed);
                debug!(
                    rms = format_args!("{:.1}", segment.rms()),
                    floor = format_args!("{:.1}", self.config.energy_floor),
                    "segment rejected: below energy floor"
                );
            }
        }
    }

    /// Stop-time flush: gate whatever is left (carry + partial cycle) as one
    /// final candidate, then send the end-of-stream sentinel.
    ///
    /// Consuming `self` makes a second flush or a late `ingest`
    /// unrepresentable.
    pub fn finish(mut self) -> SegmenterSummary {
        let mut tail = std::mem::take(&mut self.carry);
        tail.extend_from_slice(&self.buffer);
        self.buffer.clear();

        if !tail.is_empty() {
            debug!(samples = tail.len(), "flushing final segment on stop");
            self.gate_and_emit(tail);
        }

        let Self {
            outbox, diagnostics, ..
        } = self;

        if let Err(e) = outbox.finish() {
            warn!(error = %e, "end-of-stream sentinel not delivered");
        }

        let summary = diagnostics.snapshot();
        info!(
            samples_in = summary.samples_in,
            cycles = summary.cycles_processed,
            splits = summary.splits_found,
            forced_cuts = summary.forced_cuts,
            emitted = summary.segments_emitted,
            rejected_short = summary.rejected_short,
            rejected_quiet = summary.rejected_quiet,
            delivery_failures = summary.delivery_failures,
            "segmenter finished"
        );
        summary
    }
}
